use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub provider_id: String,
    /// JSON file with the provider's weekly slots and catalog, applied at startup.
    pub provider_setup_file: Option<String>,
    pub history_limit: usize,
    pub booking: BookingPolicy,
    pub rate_limit: RateLimitConfig,
    pub timeouts: Timeouts,
    pub llm_provider: String,
    pub groq_api_key: String,
    pub groq_model: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    /// Address prefix such as `whatsapp:`; empty for plain SMS.
    pub twilio_channel: String,
    pub twilio_api_base: String,
    pub owner_phone: String,
}

/// Operating timezone and lead time shared by the availability engine and the
/// validation pipeline.
#[derive(Clone, Copy, Debug)]
pub struct BookingPolicy {
    pub timezone: Tz,
    pub lead_time_minutes: u32,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Paris,
            lead_time_minutes: 30,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    /// How long events are kept before cleanup; independent of `window`.
    pub retention: Duration,
    pub cleanup_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
            retention: Duration::from_secs(24 * 60 * 60),
            cleanup_interval: Duration::from_secs(600),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Timeouts {
    pub store: Duration,
    pub inference: Duration,
    pub relay: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            store: Duration::from_millis(2_000),
            inference: Duration::from_millis(20_000),
            relay: Duration::from_millis(10_000),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let tz_name = env::var("TIMEZONE").unwrap_or_else(|_| "Europe/Paris".to_string());
        let timezone = Tz::from_str(&tz_name)
            .map_err(|e| anyhow::anyhow!("invalid TIMEZONE {tz_name}: {e}"))?;

        Ok(Self {
            port: parse_var("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sameday.db".to_string()),
            provider_id: env::var("PROVIDER_ID").unwrap_or_else(|_| "default".to_string()),
            provider_setup_file: env::var("PROVIDER_SETUP_FILE").ok().filter(|p| !p.is_empty()),
            history_limit: parse_var("HISTORY_LIMIT", 20),
            booking: BookingPolicy {
                timezone,
                lead_time_minutes: parse_var("LEAD_TIME_MINUTES", 30),
            },
            rate_limit: RateLimitConfig {
                max_requests: parse_var("RATE_LIMIT_MAX_REQUESTS", 10),
                window: Duration::from_secs(parse_var("RATE_LIMIT_WINDOW_SECS", 60)),
                retention: Duration::from_secs(parse_var("RATE_LIMIT_RETENTION_SECS", 86_400)),
                cleanup_interval: Duration::from_secs(parse_var(
                    "RATE_LIMIT_CLEANUP_INTERVAL_SECS",
                    600,
                )),
            },
            timeouts: Timeouts {
                store: Duration::from_millis(parse_var("STORE_TIMEOUT_MS", 2_000)),
                inference: Duration::from_millis(parse_var("LLM_TIMEOUT_MS", 20_000)),
                relay: Duration::from_millis(parse_var("RELAY_TIMEOUT_MS", 10_000)),
            },
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "ollama".to_string()),
            groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            groq_model: env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string()),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
            twilio_channel: env::var("TWILIO_CHANNEL").unwrap_or_default(),
            twilio_api_base: env::var("TWILIO_API_BASE")
                .unwrap_or_else(|_| "https://api.twilio.com".to_string()),
            owner_phone: env::var("OWNER_PHONE").unwrap_or_default(),
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
