use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Sentinel the booking tool may send when the client picked no extra.
pub const NONE_EXTRA: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    pub price: Option<i64>,
}

/// The provider's selectable durations and extras, as stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCatalog {
    pub durations: Vec<CatalogItem>,
    pub extras: Vec<CatalogItem>,
}

/// The closed sets a booking may draw from. The booking tool schema and the
/// enum check of the validation pipeline are both built from this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEnums {
    pub durations: Vec<String>,
    pub extras: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PriceCatalog {
    pub durations: HashMap<String, i64>,
    pub extras: HashMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog has no selectable duration")]
    EmptyDurations,
    #[error("no price configured for duration {0:?}")]
    MissingDurationPrice(String),
    #[error("no price configured for extra {0:?}")]
    MissingExtraPrice(String),
    #[error("duration label {0:?} is not a recognised length")]
    UnparseableDuration(String),
}

impl ProviderCatalog {
    pub fn enums(&self) -> Result<CatalogEnums, CatalogError> {
        if self.durations.is_empty() {
            return Err(CatalogError::EmptyDurations);
        }
        Ok(CatalogEnums {
            durations: self.durations.iter().map(|d| d.name.clone()).collect(),
            extras: self
                .extras
                .iter()
                .map(|e| e.name.clone())
                .filter(|name| name != NONE_EXTRA)
                .collect(),
        })
    }

    /// Only priced items make it into the price catalog; a selectable item
    /// without a price surfaces later as a configuration error.
    pub fn prices(&self) -> PriceCatalog {
        let priced = |items: &[CatalogItem]| {
            items
                .iter()
                .filter_map(|i| i.price.map(|p| (i.name.clone(), p)))
                .collect::<HashMap<_, _>>()
        };
        PriceCatalog {
            durations: priced(&self.durations),
            extras: priced(&self.extras),
        }
    }
}

/// Minutes for a duration label such as `30min`, `45`, `1h`, `1h30` or `2h15min`.
pub fn duration_minutes(label: &str) -> Result<u32, CatalogError> {
    let err = || CatalogError::UnparseableDuration(label.to_string());
    let s = label.trim().to_lowercase().replace(' ', "");
    if s.is_empty() {
        return Err(err());
    }

    let minutes = if let Some((hours, rest)) = s.split_once('h') {
        let hours: u32 = hours.parse().map_err(|_| err())?;
        let rest = rest.strip_suffix("min").unwrap_or(rest);
        let extra: u32 = if rest.is_empty() {
            0
        } else {
            rest.parse().map_err(|_| err())?
        };
        if extra >= 60 {
            return Err(err());
        }
        hours * 60 + extra
    } else {
        let digits = s
            .strip_suffix("min")
            .or_else(|| s.strip_suffix("mn"))
            .unwrap_or(&s);
        digits.parse().map_err(|_| err())?
    };

    if minutes == 0 {
        return Err(err());
    }
    Ok(minutes)
}
