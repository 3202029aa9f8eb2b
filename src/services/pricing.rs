use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries::{self, InsertOutcome};
use crate::models::{Appointment, AppointmentStatus, CatalogError, PriceCatalog};
use crate::services::clock;
use crate::services::validation::ValidatedBooking;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub base: i64,
    pub extras_total: i64,
    pub total: i64,
}

pub fn price(
    duration: &str,
    extras: &[String],
    catalog: &PriceCatalog,
) -> Result<PriceBreakdown, CatalogError> {
    let base = *catalog
        .durations
        .get(duration)
        .ok_or_else(|| CatalogError::MissingDurationPrice(duration.to_string()))?;

    let mut extras_total = 0;
    for extra in extras {
        extras_total += *catalog
            .extras
            .get(extra)
            .ok_or_else(|| CatalogError::MissingExtraPrice(extra.clone()))?;
    }

    Ok(PriceBreakdown {
        base,
        extras_total,
        total: base + extras_total,
    })
}

pub fn build_appointment(
    booking: &ValidatedBooking,
    price: &PriceBreakdown,
    conversation_id: &str,
    provider_id: &str,
    now: NaiveDateTime,
) -> Appointment {
    Appointment {
        id: uuid::Uuid::new_v4().to_string(),
        provider_id: provider_id.to_string(),
        conversation_id: conversation_id.to_string(),
        date: booking.date,
        start_minute: booking.start_minute,
        // wraps past midnight; compare start + duration to tell
        end_minute: clock::fold(booking.start_minute + booking.duration_minutes),
        duration_minutes: booking.duration_minutes,
        extras: booking.extras.clone(),
        total_price: price.total,
        status: AppointmentStatus::Confirmed,
        client_arrived: false,
        provider_ready: false,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(Appointment),
    /// The storage constraint on (conversation, date, start) already held a row.
    Duplicate,
}

pub fn create_appointment(
    conn: &Connection,
    booking: &ValidatedBooking,
    price: &PriceBreakdown,
    conversation_id: &str,
    provider_id: &str,
    now: NaiveDateTime,
) -> anyhow::Result<CreateOutcome> {
    let appt = build_appointment(booking, price, conversation_id, provider_id, now);
    match queries::insert_appointment(conn, &appt)? {
        InsertOutcome::Inserted => {
            tracing::info!(
                appointment = %appt.id,
                conversation = %conversation_id,
                date = %appt.date,
                start = %appt.start_time(),
                total = appt.total_price,
                "appointment created"
            );
            Ok(CreateOutcome::Created(appt))
        }
        InsertOutcome::Duplicate => {
            tracing::info!(conversation = %conversation_id, "appointment insert hit unique slot");
            Ok(CreateOutcome::Duplicate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{CatalogItem, ProviderCatalog};
    use chrono::{NaiveDate, Utc};

    fn catalog() -> PriceCatalog {
        ProviderCatalog {
            durations: vec![
                CatalogItem {
                    name: "1h".to_string(),
                    price: Some(150),
                },
                CatalogItem {
                    name: "2h".to_string(),
                    price: None,
                },
            ],
            extras: vec![
                CatalogItem {
                    name: "massage".to_string(),
                    price: Some(30),
                },
                CatalogItem {
                    name: "jacuzzi".to_string(),
                    price: Some(50),
                },
            ],
        }
        .prices()
    }

    fn booking(start: &str, duration: &str, minutes: u32) -> ValidatedBooking {
        ValidatedBooking {
            date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            start_minute: clock::parse_hhmm(start).unwrap(),
            duration: duration.to_string(),
            duration_minutes: minutes,
            extras: vec![],
        }
    }

    #[test]
    fn test_price_with_extras() {
        let extras = vec!["massage".to_string(), "jacuzzi".to_string()];
        let breakdown = price("1h", &extras, &catalog()).unwrap();
        assert_eq!(
            breakdown,
            PriceBreakdown {
                base: 150,
                extras_total: 80,
                total: 230
            }
        );
    }

    #[test]
    fn test_price_fails_fast_on_missing_mapping() {
        assert_eq!(
            price("2h", &[], &catalog()),
            Err(CatalogError::MissingDurationPrice("2h".to_string()))
        );
        assert_eq!(
            price("3h", &[], &catalog()),
            Err(CatalogError::MissingDurationPrice("3h".to_string()))
        );
        assert_eq!(
            price("1h", &["champagne".to_string()], &catalog()),
            Err(CatalogError::MissingExtraPrice("champagne".to_string()))
        );
    }

    #[test]
    fn test_end_time_wraps_past_midnight() {
        let breakdown = price("1h", &[], &catalog()).unwrap();
        let appt = build_appointment(
            &booking("23:30", "1h", 60),
            &breakdown,
            "+33600000001",
            "default",
            Utc::now().naive_utc(),
        );
        assert_eq!(appt.end_time(), "00:30");
        assert_eq!(appt.status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn test_create_is_idempotent() {
        let conn = db::init_db(":memory:").unwrap();
        let b = booking("19:00", "1h", 60);
        let breakdown = price("1h", &[], &catalog()).unwrap();
        let now = Utc::now().naive_utc();

        let first = create_appointment(&conn, &b, &breakdown, "+33600000001", "default", now).unwrap();
        let CreateOutcome::Created(appt) = first else {
            panic!("expected first insert to create");
        };
        assert_eq!(appt.end_time(), "20:00");
        assert_eq!(appt.total_price, 150);

        let second = create_appointment(&conn, &b, &breakdown, "+33600000001", "default", now).unwrap();
        assert!(matches!(second, CreateOutcome::Duplicate));

        let date = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        assert_eq!(queries::get_appointments_from(&conn, "default", date).unwrap().len(), 1);
    }
}
