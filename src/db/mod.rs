pub mod migrations;
pub mod queries;
pub mod setup;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use rusqlite::Connection;

use crate::errors::AppError;

pub type Db = Arc<Mutex<Connection>>;

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// Runs a blocking store operation off the async runtime, bounded by
/// `timeout`. An elapsed timeout surfaces as a retryable [`AppError::Timeout`].
pub async fn run<T, F>(db: &Db, timeout: Duration, op: &'static str, f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> anyhow::Result<T> + Send + 'static,
{
    let db = Arc::clone(db);
    let task = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))?;
        f(&conn)
    });

    match tokio::time::timeout(timeout, task).await {
        Err(_) => {
            tracing::warn!(op, ?timeout, "store operation timed out");
            Err(AppError::Timeout(op))
        }
        Ok(Err(join_err)) => Err(AppError::Store(format!("{op}: {join_err}"))),
        Ok(Ok(Err(e))) => Err(AppError::Store(format!("{op}: {e:#}"))),
        Ok(Ok(Ok(value))) => Ok(value),
    }
}
