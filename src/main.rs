use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::Utc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use sameday::config::AppConfig;
use sameday::db::{self, Db};
use sameday::services::ai::groq::GroqProvider;
use sameday::services::ai::ollama::OllamaProvider;
use sameday::services::ai::LlmProvider;
use sameday::services::messaging::twilio::TwilioRelay;
use sameday::services::rate_limit;
use sameday::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;

    let mut conn = db::init_db(&config.database_url)?;
    if let Some(path) = &config.provider_setup_file {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read provider setup {path}"))?;
        db::setup::apply_setup(&mut conn, &config.provider_id, &json)?;
    }
    let db: Db = Arc::new(Mutex::new(conn));

    let llm: Box<dyn LlmProvider> = match config.llm_provider.as_str() {
        "groq" => {
            anyhow::ensure!(!config.groq_api_key.is_empty(), "GROQ_API_KEY must be set when LLM_PROVIDER=groq");
            tracing::info!("using Groq LLM provider (model: {})", config.groq_model);
            Box::new(GroqProvider::new(config.groq_api_key.clone(), config.groq_model.clone()))
        }
        _ => {
            tracing::info!("using Ollama LLM provider (url: {})", config.ollama_url);
            Box::new(OllamaProvider::new(config.ollama_url.clone(), config.ollama_model.clone()))
        }
    };
    let messaging = TwilioRelay::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_phone_number.clone(),
        config.twilio_channel.clone(),
        config.twilio_api_base.clone(),
    );

    spawn_rate_limit_cleanup(db.clone(), &config);

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        llm,
        messaging: Box::new(messaging),
        clock: Utc::now,
    });

    let app = sameday::router(state).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(
        timezone = %config.booking.timezone,
        lead_time = config.booking.lead_time_minutes,
        "starting server on {addr}"
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn spawn_rate_limit_cleanup(db: Db, config: &AppConfig) {
    let limits = config.rate_limit;
    let store_timeout = config.timeouts.store;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(limits.cleanup_interval);
        loop {
            ticker.tick().await;
            let result = db::run(&db, store_timeout, "rate limit cleanup", move |conn| {
                Ok(rate_limit::cleanup(conn, &limits, Utc::now()))
            })
            .await;
            if let Err(e) = result {
                tracing::warn!(error = %e, "rate limit cleanup skipped");
            }
        }
    });
}
