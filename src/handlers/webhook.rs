use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::Deserialize;

use crate::db;
use crate::errors::AppError;
use crate::services::conversation;
use crate::services::messaging;
use crate::services::rate_limit::{self, Admission};
use crate::state::AppState;

/// A failed relay send is tried once more before giving up.
const RELAY_ATTEMPTS: u32 = 2;

const FALLBACK_REPLY: &str =
    "Désolé, je rencontre un petit souci. Pouvez-vous réessayer dans un instant ?";

#[derive(Deserialize)]
#[allow(dead_code)]
pub struct InboundMessageForm {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To", default)]
    pub to: String,
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
}

pub async fn message_webhook(
    State(state): State<Arc<AppState>>,
    Form(form): Form<InboundMessageForm>,
) -> Response {
    match handle_message(&state, form).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn handle_message(state: &Arc<AppState>, form: InboundMessageForm) -> Result<Response, AppError> {
    let from = form.from.trim().to_string();
    let body = form.body.trim().to_string();

    if from.is_empty() {
        return Err(AppError::InvalidInput("missing sender".to_string()));
    }
    if body.is_empty() {
        return Err(AppError::InvalidInput("empty message body".to_string()));
    }

    tracing::info!(from = %from, sid = ?form.message_sid, "incoming message");

    let now = (state.clock)();
    let admission = {
        let cfg = state.config.rate_limit;
        let user = from.clone();
        db::run(&state.db, state.config.timeouts.store, "rate limit admit", move |conn| {
            Ok(rate_limit::admit(conn, &cfg, &user, now))
        })
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "rate limiter unavailable, allowing request");
            Admission::allow()
        })
    };

    if !admission.allowed {
        return Err(AppError::RateLimited {
            retry_after_seconds: admission.retry_after_seconds.unwrap_or(1),
        });
    }

    let outcome = match conversation::process_message(state, &from, &body, now).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, from = %from, kind = ?e.kind(), "conversation processing failed");
            if let Err(send_err) = messaging::deliver(
                state.messaging.as_ref(),
                &from,
                FALLBACK_REPLY,
                1,
                state.config.timeouts.relay,
            )
            .await
            {
                tracing::error!(error = %send_err, "failed to send fallback reply");
            }
            return Err(e);
        }
    };

    messaging::deliver(
        state.messaging.as_ref(),
        &from,
        outcome.reply(),
        RELAY_ATTEMPTS,
        state.config.timeouts.relay,
    )
    .await?;

    Ok(Json(serde_json::json!({
        "delivered": true,
        "outcome": outcome,
    }))
    .into_response())
}
