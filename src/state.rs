use chrono::{DateTime, Utc};

use crate::config::AppConfig;
use crate::db::Db;
use crate::services::ai::LlmProvider;
use crate::services::messaging::MessagingProvider;

pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
    pub llm: Box<dyn LlmProvider>,
    pub messaging: Box<dyn MessagingProvider>,
    /// Source of "now" for every request.
    pub clock: fn() -> DateTime<Utc>,
}
