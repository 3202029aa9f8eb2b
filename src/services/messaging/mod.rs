pub mod twilio;

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::AppError;

/// Outbound relay for plain-text messages.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()>;
}

/// Sends `body`, retrying up to `attempts` times in total, each attempt bounded
/// by `timeout`. The last failure surfaces as [`AppError::Messaging`].
pub async fn deliver(
    provider: &dyn MessagingProvider,
    to: &str,
    body: &str,
    attempts: u32,
    timeout: Duration,
) -> Result<(), AppError> {
    let mut last_error = String::from("no delivery attempted");
    for attempt in 1..=attempts.max(1) {
        match tokio::time::timeout(timeout, provider.send_message(to, body)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => last_error = format!("{e:#}"),
            Err(_) => last_error = format!("timed out after {timeout:?}"),
        }
        tracing::warn!(to = %to, attempt, error = %last_error, "message delivery failed");
    }
    Err(AppError::Messaging(last_error))
}
