use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{ffi, params, Connection};

use crate::models::{
    Appointment, AppointmentStatus, AvailabilityWindow, CatalogItem, ConversationMessage,
    ProviderCatalog,
};
use crate::services::clock;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Availability ──

pub fn get_windows_for_day(
    conn: &Connection,
    provider_id: &str,
    day_of_week: u8,
) -> anyhow::Result<Vec<AvailabilityWindow>> {
    let mut stmt = conn.prepare(
        "SELECT day_of_week, start_time, end_time FROM availability_windows
         WHERE provider_id = ?1 AND day_of_week = ?2 ORDER BY start_time ASC",
    )?;

    let rows = stmt.query_map(params![provider_id, day_of_week], |row| {
        Ok((
            row.get::<_, u8>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut windows = vec![];
    for row in rows {
        let (day, start, end) = row?;
        windows.push(AvailabilityWindow::new(day, &start, &end)?);
    }
    Ok(windows)
}

pub fn insert_window(
    conn: &Connection,
    provider_id: &str,
    window: &AvailabilityWindow,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO availability_windows (provider_id, day_of_week, start_time, end_time)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            provider_id,
            window.day_of_week,
            clock::format_hhmm(window.start_minute),
            clock::format_hhmm(window.end_minute),
        ],
    )?;
    Ok(())
}

/// Replaces every window of a provider.
pub fn replace_windows(
    conn: &Connection,
    provider_id: &str,
    windows: &[AvailabilityWindow],
) -> anyhow::Result<()> {
    conn.execute(
        "DELETE FROM availability_windows WHERE provider_id = ?1",
        params![provider_id],
    )?;
    for window in windows {
        insert_window(conn, provider_id, window)?;
    }
    Ok(())
}

// ── Catalog ──

pub fn get_catalog(conn: &Connection, provider_id: &str) -> anyhow::Result<ProviderCatalog> {
    Ok(ProviderCatalog {
        durations: catalog_items(
            conn,
            "SELECT label, price FROM catalog_durations WHERE provider_id = ?1 ORDER BY sort_order, label",
            provider_id,
        )?,
        extras: catalog_items(
            conn,
            "SELECT name, price FROM catalog_extras WHERE provider_id = ?1 ORDER BY sort_order, name",
            provider_id,
        )?,
    })
}

fn catalog_items(conn: &Connection, sql: &str, provider_id: &str) -> anyhow::Result<Vec<CatalogItem>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![provider_id], |row| {
        Ok(CatalogItem {
            name: row.get(0)?,
            price: row.get(1)?,
        })
    })?;

    let mut items = vec![];
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

pub fn upsert_duration(
    conn: &Connection,
    provider_id: &str,
    label: &str,
    price: Option<i64>,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO catalog_durations (provider_id, label, price, sort_order)
         VALUES (?1, ?2, ?3, (SELECT COUNT(*) FROM catalog_durations WHERE provider_id = ?1))
         ON CONFLICT(provider_id, label) DO UPDATE SET price = excluded.price",
        params![provider_id, label, price],
    )?;
    Ok(())
}

pub fn upsert_extra(
    conn: &Connection,
    provider_id: &str,
    name: &str,
    price: Option<i64>,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO catalog_extras (provider_id, name, price, sort_order)
         VALUES (?1, ?2, ?3, (SELECT COUNT(*) FROM catalog_extras WHERE provider_id = ?1))
         ON CONFLICT(provider_id, name) DO UPDATE SET price = excluded.price",
        params![provider_id, name, price],
    )?;
    Ok(())
}

// ── Appointments ──

/// Result of an appointment insert. Only the unique (conversation, date, start
/// time) index reports as `Duplicate`; other constraint failures are errors.
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> anyhow::Result<InsertOutcome> {
    let extras = serde_json::to_string(&appt.extras)?;
    let result = conn.execute(
        "INSERT INTO appointments (id, provider_id, conversation_id, date, start_time, end_time,
            duration_minutes, extras, total_price, status, client_arrived, provider_ready,
            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            appt.id,
            appt.provider_id,
            appt.conversation_id,
            appt.date.format(DATE_FORMAT).to_string(),
            appt.start_time(),
            appt.end_time(),
            appt.duration_minutes,
            extras,
            appt.total_price,
            appt.status.as_str(),
            appt.client_arrived,
            appt.provider_ready,
            appt.created_at.format(DATETIME_FORMAT).to_string(),
            appt.updated_at.format(DATETIME_FORMAT).to_string(),
        ],
    );

    match result {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE => {
            Ok(InsertOutcome::Duplicate)
        }
        Err(e) => Err(e.into()),
    }
}

const APPOINTMENT_COLUMNS: &str = "id, provider_id, conversation_id, date, start_time, end_time,
    duration_minutes, extras, total_price, status, client_arrived, provider_ready, created_at, updated_at";

/// Non-cancelled appointments of a provider dated `from` or later.
pub fn get_appointments_from(
    conn: &Connection,
    provider_id: &str,
    from: NaiveDate,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE provider_id = ?1 AND date >= ?2 AND status != 'cancelled'
         ORDER BY date ASC, start_time ASC"
    ))?;

    let rows = stmt.query_map(
        params![provider_id, from.format(DATE_FORMAT).to_string()],
        |row| Ok(parse_appointment_row(row)),
    )?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// Confirmed appointments of a conversation dated `from` to `to` inclusive,
/// earliest first.
pub fn get_confirmed_appointments(
    conn: &Connection,
    conversation_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE conversation_id = ?1 AND date BETWEEN ?2 AND ?3 AND status = 'confirmed'
         ORDER BY date ASC, start_time ASC"
    ))?;

    let rows = stmt.query_map(
        params![
            conversation_id,
            from.format(DATE_FORMAT).to_string(),
            to.format(DATE_FORMAT).to_string()
        ],
        |row| Ok(parse_appointment_row(row)),
    )?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// Flips `client_arrived`. Returns false when it was already set.
pub fn mark_client_arrived(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let now = Utc::now().naive_utc().format(DATETIME_FORMAT).to_string();
    let count = conn.execute(
        "UPDATE appointments SET client_arrived = 1, updated_at = ?1
         WHERE id = ?2 AND client_arrived = 0",
        params![now, id],
    )?;
    Ok(count > 0)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let date_str: String = row.get(3)?;
    let start_str: String = row.get(4)?;
    let end_str: String = row.get(5)?;
    let extras_json: String = row.get(7)?;
    let status_str: String = row.get(9)?;
    let created_at_str: String = row.get(12)?;
    let updated_at_str: String = row.get(13)?;

    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)?;
    let start_minute = clock::parse_hhmm(&start_str)
        .ok_or_else(|| anyhow::anyhow!("bad appointment start time: {start_str}"))?;
    let end_minute = clock::parse_hhmm(&end_str)
        .ok_or_else(|| anyhow::anyhow!("bad appointment end time: {end_str}"))?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, DATETIME_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());
    let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, DATETIME_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Appointment {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        conversation_id: row.get(2)?,
        date,
        start_minute,
        end_minute,
        duration_minutes: row.get(6)?,
        extras: serde_json::from_str(&extras_json).unwrap_or_default(),
        total_price: row.get(8)?,
        status: AppointmentStatus::parse(&status_str),
        client_arrived: row.get(10)?,
        provider_ready: row.get(11)?,
        created_at,
        updated_at,
    })
}

// ── Messages ──

pub fn append_message(
    conn: &Connection,
    conversation_id: &str,
    message: &ConversationMessage,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO messages (conversation_id, role, content) VALUES (?1, ?2, ?3)",
        params![conversation_id, message.role, message.content],
    )?;
    Ok(())
}

/// The latest `limit` messages of a conversation, oldest first.
pub fn get_recent_messages(
    conn: &Connection,
    conversation_id: &str,
    limit: usize,
) -> anyhow::Result<Vec<ConversationMessage>> {
    let mut stmt = conn.prepare(
        "SELECT role, content FROM (
             SELECT id, role, content FROM messages WHERE conversation_id = ?1
             ORDER BY id DESC LIMIT ?2
         ) ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![conversation_id, limit as i64], |row| {
        Ok(ConversationMessage {
            role: row.get(0)?,
            content: row.get(1)?,
        })
    })?;

    let mut messages = vec![];
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

// ── Rate Limits ──

pub fn count_rate_events(
    conn: &Connection,
    user_id: &str,
    from_ms: i64,
    to_ms: i64,
) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM rate_limit_events
         WHERE user_id = ?1 AND occurred_at_ms >= ?2 AND occurred_at_ms <= ?3",
        params![user_id, from_ms, to_ms],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn oldest_rate_event(
    conn: &Connection,
    user_id: &str,
    from_ms: i64,
    to_ms: i64,
) -> anyhow::Result<Option<i64>> {
    let oldest = conn.query_row(
        "SELECT MIN(occurred_at_ms) FROM rate_limit_events
         WHERE user_id = ?1 AND occurred_at_ms >= ?2 AND occurred_at_ms <= ?3",
        params![user_id, from_ms, to_ms],
        |row| row.get(0),
    )?;
    Ok(oldest)
}

pub fn insert_rate_event(conn: &Connection, user_id: &str, at_ms: i64) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO rate_limit_events (user_id, occurred_at_ms) VALUES (?1, ?2)",
        params![user_id, at_ms],
    )?;
    Ok(())
}

pub fn delete_rate_events_before(conn: &Connection, cutoff_ms: i64) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM rate_limit_events WHERE occurred_at_ms < ?1",
        params![cutoff_ms],
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn appointment(id: &str, conversation: &str, date: &str, start: &str) -> Appointment {
        let now = Utc::now().naive_utc();
        let start_minute = clock::parse_hhmm(start).unwrap();
        Appointment {
            id: id.to_string(),
            provider_id: "default".to_string(),
            conversation_id: conversation.to_string(),
            date: NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap(),
            start_minute,
            end_minute: clock::fold(start_minute + 60),
            duration_minutes: 60,
            extras: vec!["massage".to_string()],
            total_price: 180,
            status: AppointmentStatus::Confirmed,
            client_arrived: false,
            provider_ready: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_windows_round_trip_through_storage() {
        let conn = db::init_db(":memory:").unwrap();
        let window = AvailabilityWindow::new(3, "18:30", "02:00").unwrap();
        insert_window(&conn, "default", &window).unwrap();
        insert_window(&conn, "other", &window).unwrap();

        let windows = get_windows_for_day(&conn, "default", 3).unwrap();
        assert_eq!(windows, vec![window]);
        assert!(get_windows_for_day(&conn, "default", 4).unwrap().is_empty());
    }

    #[test]
    fn test_unique_slot_reports_duplicate() {
        let conn = db::init_db(":memory:").unwrap();
        let first = appointment("a-1", "+33600000001", "2025-06-16", "19:00");
        let second = appointment("a-2", "+33600000001", "2025-06-16", "19:00");

        assert!(matches!(
            insert_appointment(&conn, &first).unwrap(),
            InsertOutcome::Inserted
        ));
        assert!(matches!(
            insert_appointment(&conn, &second).unwrap(),
            InsertOutcome::Duplicate
        ));
    }

    #[test]
    fn test_cancelled_appointment_frees_unique_slot() {
        let conn = db::init_db(":memory:").unwrap();
        let mut first = appointment("a-1", "+33600000001", "2025-06-16", "19:00");
        first.status = AppointmentStatus::Cancelled;
        insert_appointment(&conn, &first).unwrap();

        let second = appointment("a-2", "+33600000001", "2025-06-16", "19:00");
        assert!(matches!(
            insert_appointment(&conn, &second).unwrap(),
            InsertOutcome::Inserted
        ));

        let date = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        let active = get_appointments_from(&conn, "default", date).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "a-2");
        assert_eq!(active[0].extras, vec!["massage"]);
        assert_eq!(active[0].end_time(), "20:00");
    }

    #[test]
    fn test_primary_key_clash_is_an_error() {
        let conn = db::init_db(":memory:").unwrap();
        let first = appointment("a-1", "+33600000001", "2025-06-16", "19:00");
        let same_id = appointment("a-1", "+33600000002", "2025-06-16", "21:00");

        insert_appointment(&conn, &first).unwrap();
        assert!(insert_appointment(&conn, &same_id).is_err());
    }

    #[test]
    fn test_confirmed_appointments_and_arrival() {
        let conn = db::init_db(":memory:").unwrap();
        insert_appointment(&conn, &appointment("a-1", "+33600000001", "2025-06-16", "19:00")).unwrap();
        insert_appointment(&conn, &appointment("a-0", "+33600000001", "2025-06-15", "01:00")).unwrap();
        insert_appointment(&conn, &appointment("a-2", "+33600000001", "2025-06-14", "19:00")).unwrap();

        let sunday = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let monday = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        let found = get_confirmed_appointments(&conn, "+33600000001", sunday, monday).unwrap();
        let ids: Vec<_> = found.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a-0", "a-1"]);
        assert!(get_confirmed_appointments(&conn, "+33600000002", sunday, monday)
            .unwrap()
            .is_empty());

        assert!(mark_client_arrived(&conn, "a-1").unwrap());
        assert!(!mark_client_arrived(&conn, "a-1").unwrap());
        let found = get_confirmed_appointments(&conn, "+33600000001", monday, monday).unwrap();
        assert!(found[0].client_arrived);
    }

    #[test]
    fn test_recent_messages_are_oldest_first() {
        let conn = db::init_db(":memory:").unwrap();
        for i in 0..5 {
            append_message(&conn, "c-1", &ConversationMessage::user(format!("msg{i}"))).unwrap();
        }
        append_message(&conn, "c-2", &ConversationMessage::user("other")).unwrap();

        let recent = get_recent_messages(&conn, "c-1", 3).unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg2", "msg3", "msg4"]);
    }

    #[test]
    fn test_catalog_preserves_insertion_order() {
        let conn = db::init_db(":memory:").unwrap();
        upsert_duration(&conn, "default", "1h", Some(150)).unwrap();
        upsert_duration(&conn, "default", "30min", Some(90)).unwrap();
        upsert_extra(&conn, "default", "massage", None).unwrap();
        upsert_duration(&conn, "default", "1h", Some(160)).unwrap();

        let catalog = get_catalog(&conn, "default").unwrap();
        let labels: Vec<_> = catalog.durations.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(labels, vec!["1h", "30min"]);
        assert_eq!(catalog.durations[0].price, Some(160));
        assert_eq!(catalog.extras[0].price, None);
    }
}
