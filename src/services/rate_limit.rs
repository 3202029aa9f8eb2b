use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::config::RateLimitConfig;
use crate::db::queries;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub retry_after_seconds: Option<u64>,
}

impl Admission {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_seconds: None,
        }
    }

    fn deny(retry_after_seconds: u64) -> Self {
        Self {
            allowed: false,
            retry_after_seconds: Some(retry_after_seconds),
        }
    }
}

// Count and insert are not one transaction; concurrent requests may overshoot.
pub fn admit(
    conn: &Connection,
    config: &RateLimitConfig,
    user_id: &str,
    now: DateTime<Utc>,
) -> Admission {
    match try_admit(conn, config, user_id, now) {
        Ok(admission) => admission,
        Err(e) => {
            tracing::warn!(error = %e, user = %user_id, "rate limiter failed, allowing request");
            Admission::allow()
        }
    }
}

fn try_admit(
    conn: &Connection,
    config: &RateLimitConfig,
    user_id: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<Admission> {
    let now_ms = now.timestamp_millis();
    let window_ms = config.window.as_millis() as i64;
    let from_ms = now_ms - window_ms;

    let count = queries::count_rate_events(conn, user_id, from_ms, now_ms)?;
    if count >= i64::from(config.max_requests) {
        let oldest = queries::oldest_rate_event(conn, user_id, from_ms, now_ms)?.unwrap_or(now_ms);
        let remaining_ms = (oldest + window_ms - now_ms).max(0);
        let retry_after = ((remaining_ms + 999) / 1000).max(1) as u64;
        tracing::info!(user = %user_id, count, retry_after, "rate limit exceeded");
        return Ok(Admission::deny(retry_after));
    }

    queries::insert_rate_event(conn, user_id, now_ms)?;
    Ok(Admission::allow())
}

pub fn cleanup(conn: &Connection, config: &RateLimitConfig, now: DateTime<Utc>) -> usize {
    let cutoff_ms = now.timestamp_millis() - config.retention.as_millis() as i64;
    match queries::delete_rate_events_before(conn, cutoff_ms) {
        Ok(deleted) => {
            if deleted > 0 {
                tracing::debug!(deleted, "removed expired rate limit events");
            }
            deleted
        }
        Err(e) => {
            tracing::warn!(error = %e, "rate limit cleanup failed");
            0
        }
    }
}
