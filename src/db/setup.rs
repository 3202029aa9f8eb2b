//! Provider setup loaded from a JSON file:
//!
//! ```json
//! {
//!   "slots": [{"day": "mon", "start": "18:30", "end": "02:00"}],
//!   "durations": [{"name": "1h", "price": 150}],
//!   "extras": [{"name": "massage", "price": 30}]
//! }
//! ```

use anyhow::Context;
use rusqlite::Connection;
use serde::Deserialize;

use super::queries;
use crate::models::availability::windows_from_json;
use crate::models::CatalogItem;

#[derive(Debug, Default, Deserialize)]
struct CatalogSection {
    #[serde(default)]
    durations: Vec<CatalogItem>,
    #[serde(default)]
    extras: Vec<CatalogItem>,
}

/// Replaces the provider's windows and upserts its catalog, in one transaction.
pub fn apply_setup(conn: &mut Connection, provider_id: &str, json: &str) -> anyhow::Result<()> {
    let windows = windows_from_json(json).context("invalid provider slots")?;
    let catalog: CatalogSection = serde_json::from_str(json).context("invalid provider catalog")?;

    let tx = conn.transaction()?;
    queries::replace_windows(&tx, provider_id, &windows)?;
    for item in &catalog.durations {
        if item.price.is_none() {
            tracing::warn!(duration = %item.name, "catalog duration has no price");
        }
        queries::upsert_duration(&tx, provider_id, &item.name, item.price)?;
    }
    for item in &catalog.extras {
        queries::upsert_extra(&tx, provider_id, &item.name, item.price)?;
    }
    tx.commit()?;

    tracing::info!(
        provider = %provider_id,
        windows = windows.len(),
        durations = catalog.durations.len(),
        extras = catalog.extras.len(),
        "provider setup applied"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    const SETUP: &str = r#"{
        "slots": [
            {"day": "mon", "start": "14:00", "end": "16:00"},
            {"day": "mon", "start": "18:30", "end": "02:00"}
        ],
        "durations": [{"name": "1h", "price": 150}, {"name": "2h", "price": 250}],
        "extras": [{"name": "massage", "price": 30}]
    }"#;

    #[test]
    fn test_apply_setup_replaces_windows() {
        let mut conn = db::init_db(":memory:").unwrap();
        apply_setup(&mut conn, "default", SETUP).unwrap();
        apply_setup(&mut conn, "default", SETUP).unwrap();

        assert_eq!(queries::get_windows_for_day(&conn, "default", 1).unwrap().len(), 2);
        let catalog = queries::get_catalog(&conn, "default").unwrap();
        assert_eq!(catalog.durations.len(), 2);
        assert_eq!(catalog.prices().extras.get("massage"), Some(&30));
    }

    #[test]
    fn test_invalid_slot_leaves_store_untouched() {
        let mut conn = db::init_db(":memory:").unwrap();
        apply_setup(&mut conn, "default", SETUP).unwrap();

        let bad = r#"{"slots": [{"day": "mon", "start": "9h", "end": "17:00"}]}"#;
        assert!(apply_setup(&mut conn, "default", bad).is_err());
        assert_eq!(queries::get_windows_for_day(&conn, "default", 1).unwrap().len(), 2);
    }
}
