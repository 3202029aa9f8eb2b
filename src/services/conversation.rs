use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::db::{self, queries};
use crate::errors::{AppError, ErrorKind};
use crate::models::{Appointment, AvailabilityWindow, CatalogEnums, ConversationMessage, ProviderCatalog};
use crate::services::ai::tools::BOOKING_TOOL_NAME;
use crate::services::ai::{prompt, ChatReply};
use crate::services::availability::{compute_available_ranges, RangeDescription};
use crate::services::clock::{self, LocalNow};
use crate::services::mode::{self, InferenceRequest, ScheduleDay, WaitingRequest, WorkflowRequest};
use crate::services::pricing::{self, CreateOutcome};
use crate::services::validation::{self, BookingRejection, ValidationContext};
use crate::state::AppState;

const BOOKING_UNAVAILABLE: &str =
    "La réservation n'est pas possible pour le moment, veuillez réessayer un peu plus tard.";
const WAITING_DEFAULT_REPLY: &str = "Votre rendez-vous est bien confirmé, à tout à l'heure !";
const EMPTY_REPLY: &str = "Pouvez-vous reformuler votre message ?";

/// Result of handling one inbound message. `reply` is what gets relayed back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MessageOutcome {
    Replied {
        reply: String,
    },
    BookingCreated {
        reply: String,
        appointment_id: String,
        date: NaiveDate,
        start_time: String,
        end_time: String,
        total_price: i64,
    },
    /// The booking already exists; treated as success.
    AlreadyBooked {
        reply: String,
        appointment_id: Option<String>,
    },
    BookingRejected {
        reply: String,
        kind: ErrorKind,
        reason: String,
    },
    ArrivalRecorded {
        reply: String,
        appointment_id: String,
    },
}

impl MessageOutcome {
    pub fn reply(&self) -> &str {
        match self {
            MessageOutcome::Replied { reply }
            | MessageOutcome::BookingCreated { reply, .. }
            | MessageOutcome::AlreadyBooked { reply, .. }
            | MessageOutcome::BookingRejected { reply, .. }
            | MessageOutcome::ArrivalRecorded { reply, .. } => reply,
        }
    }
}

struct ProviderData {
    windows: Vec<AvailabilityWindow>,
    yesterday_windows: Vec<AvailabilityWindow>,
    appointments: Vec<Appointment>,
    catalog: ProviderCatalog,
}

struct ConversationData {
    history: Vec<ConversationMessage>,
    confirmed: Vec<Appointment>,
}

pub async fn process_message(
    state: &Arc<AppState>,
    conversation_id: &str,
    text: &str,
    now: DateTime<Utc>,
) -> Result<MessageOutcome, AppError> {
    let local = LocalNow::from_instant(now, state.config.booking.timezone);

    append(state, conversation_id, ConversationMessage::user(text)).await?;

    let (provider, conversation) = tokio::join!(
        fetch_provider_data(state, local),
        fetch_conversation_data(state, conversation_id, local.date),
    );
    let provider = provider?;
    let conversation = conversation?;

    let availability = compute_available_ranges(
        &provider.windows,
        &provider.appointments,
        &local,
        state.config.booking.lead_time_minutes,
    );
    let day = ScheduleDay::new(local, provider.yesterday_windows.clone());
    let request = mode::build_request(
        day.current(conversation.confirmed),
        &day,
        conversation.history,
        availability,
        &provider.catalog,
    );

    tracing::info!(
        conversation = %conversation_id,
        mode = ?request.mode(),
        "processing message"
    );

    let chat = prompt::chat_request(&request);
    let reply = match tokio::time::timeout(state.config.timeouts.inference, state.llm.chat(&chat)).await {
        Err(_) => return Err(AppError::Timeout("inference")),
        Ok(Err(e)) => return Err(AppError::Ai(format!("{e:#}"))),
        Ok(Ok(reply)) => reply,
    };

    let outcome = match request {
        InferenceRequest::Workflow(workflow) => {
            handle_workflow(state, conversation_id, local, now, &provider, workflow, reply).await?
        }
        InferenceRequest::Waiting(waiting) => handle_waiting(state, waiting, reply).await?,
    };

    append(
        state,
        conversation_id,
        ConversationMessage::assistant(outcome.reply()),
    )
    .await?;

    Ok(outcome)
}

async fn append(
    state: &Arc<AppState>,
    conversation_id: &str,
    message: ConversationMessage,
) -> Result<(), AppError> {
    let conversation_id = conversation_id.to_string();
    db::run(&state.db, state.config.timeouts.store, "append message", move |conn| {
        queries::append_message(conn, &conversation_id, &message)
    })
    .await
}

async fn fetch_provider_data(state: &Arc<AppState>, local: LocalNow) -> Result<ProviderData, AppError> {
    let provider_id = state.config.provider_id.clone();
    db::run(&state.db, state.config.timeouts.store, "fetch provider data", move |conn| {
        Ok(ProviderData {
            windows: queries::get_windows_for_day(conn, &provider_id, local.weekday)?,
            yesterday_windows: queries::get_windows_for_day(
                conn,
                &provider_id,
                (local.weekday + 6) % 7,
            )?,
            appointments: queries::get_appointments_from(conn, &provider_id, local.date)?,
            catalog: queries::get_catalog(conn, &provider_id)?,
        })
    })
    .await
}

async fn fetch_conversation_data(
    state: &Arc<AppState>,
    conversation_id: &str,
    today: NaiveDate,
) -> Result<ConversationData, AppError> {
    let conversation_id = conversation_id.to_string();
    let limit = state.config.history_limit;
    db::run(&state.db, state.config.timeouts.store, "fetch conversation data", move |conn| {
        Ok(ConversationData {
            history: queries::get_recent_messages(conn, &conversation_id, limit)?,
            confirmed: queries::get_confirmed_appointments(
                conn,
                &conversation_id,
                today.pred_opt().unwrap_or(today),
                today,
            )?,
        })
    })
    .await
}

async fn handle_workflow(
    state: &Arc<AppState>,
    conversation_id: &str,
    local: LocalNow,
    now: DateTime<Utc>,
    provider: &ProviderData,
    request: WorkflowRequest,
    reply: ChatReply,
) -> Result<MessageOutcome, AppError> {
    let (name, arguments) = match reply {
        ChatReply::Text(text) => return Ok(replied(text)),
        ChatReply::ToolCall { name, arguments } => (name, arguments),
    };

    let Some(enums) = request.booking else {
        tracing::warn!(conversation = %conversation_id, tool = %name, "tool call while booking is disabled");
        return Ok(replied(BOOKING_UNAVAILABLE.to_string()));
    };
    if name != BOOKING_TOOL_NAME {
        tracing::warn!(conversation = %conversation_id, tool = %name, "unknown tool call ignored");
        return Ok(replied(EMPTY_REPLY.to_string()));
    }

    book(
        state,
        conversation_id,
        local,
        now,
        provider,
        &enums,
        &request.availability,
        &arguments,
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn book(
    state: &Arc<AppState>,
    conversation_id: &str,
    local: LocalNow,
    now: DateTime<Utc>,
    provider: &ProviderData,
    enums: &CatalogEnums,
    availability: &RangeDescription,
    arguments: &serde_json::Value,
) -> Result<MessageOutcome, AppError> {
    let booking_request = match validation::parse_request(arguments) {
        Ok(r) => r,
        Err(rejection) => return Ok(rejected(conversation_id, rejection)),
    };

    let ctx = ValidationContext {
        conversation_id,
        now: local,
        lead_time_minutes: state.config.booking.lead_time_minutes,
        windows: &provider.windows,
        appointments: &provider.appointments,
        availability,
    };

    let validated = match validation::validate(&booking_request, enums, &ctx) {
        Ok(v) => v,
        Err(BookingRejection::Duplicate { appointment_id }) => {
            tracing::info!(conversation = %conversation_id, appointment = %appointment_id, "booking already exists");
            return Ok(MessageOutcome::AlreadyBooked {
                reply: already_booked_reply(),
                appointment_id: Some(appointment_id),
            });
        }
        Err(rejection) => return Ok(rejected(conversation_id, rejection)),
    };

    let breakdown = match pricing::price(&validated.duration, &validated.extras, &provider.catalog.prices()) {
        Ok(b) => b,
        Err(e) => return Ok(rejected(conversation_id, BookingRejection::Catalog(e))),
    };

    let created = {
        let conversation_id = conversation_id.to_string();
        let provider_id = state.config.provider_id.clone();
        let validated = validated.clone();
        db::run(&state.db, state.config.timeouts.store, "create appointment", move |conn| {
            pricing::create_appointment(
                conn,
                &validated,
                &breakdown,
                &conversation_id,
                &provider_id,
                now.naive_utc(),
            )
        })
        .await?
    };

    match created {
        CreateOutcome::Created(appt) => {
            let extras = if appt.extras.is_empty() {
                String::new()
            } else {
                format!(" + {}", appt.extras.join(", "))
            };
            let reply = format!(
                "C'est réservé ! Rendez-vous aujourd'hui à {} ({}{}), total {} €. À tout à l'heure !",
                clock::format_short(appt.start_minute),
                validated.duration,
                extras,
                appt.total_price
            );
            notify_owner(
                state,
                &format!(
                    "Nouvelle réservation : {} à {} ({}{}), {} €",
                    conversation_id,
                    appt.start_time(),
                    validated.duration,
                    extras,
                    appt.total_price
                ),
            )
            .await;

            Ok(MessageOutcome::BookingCreated {
                reply,
                start_time: appt.start_time(),
                end_time: appt.end_time(),
                appointment_id: appt.id,
                date: appt.date,
                total_price: appt.total_price,
            })
        }
        CreateOutcome::Duplicate => Ok(MessageOutcome::AlreadyBooked {
            reply: already_booked_reply(),
            appointment_id: None,
        }),
    }
}

async fn handle_waiting(
    state: &Arc<AppState>,
    request: WaitingRequest,
    reply: ChatReply,
) -> Result<MessageOutcome, AppError> {
    let appt = request.appointment;
    let raw = match reply {
        ChatReply::Text(text) => text,
        ChatReply::ToolCall { name, .. } => {
            tracing::warn!(appointment = %appt.id, tool = %name, "tool call ignored in waiting mode");
            String::new()
        }
    };

    let parsed = prompt::parse_waiting_reply(&raw);
    let message = if parsed.message.trim().is_empty() {
        WAITING_DEFAULT_REPLY.to_string()
    } else {
        parsed.message.clone()
    };

    if !parsed.arrival_confirmed() || appt.client_arrived {
        return Ok(replied(message));
    }

    let id = appt.id.clone();
    let flipped = db::run(&state.db, state.config.timeouts.store, "mark client arrived", move |conn| {
        queries::mark_client_arrived(conn, &id)
    })
    .await?;

    if !flipped {
        return Ok(replied(message));
    }

    tracing::info!(appointment = %appt.id, confidence = ?parsed.confidence, "client arrival recorded");
    notify_owner(
        state,
        &format!(
            "Client arrivé : {} (rendez-vous de {})",
            appt.conversation_id,
            appt.start_time()
        ),
    )
    .await;

    Ok(MessageOutcome::ArrivalRecorded {
        reply: message,
        appointment_id: appt.id,
    })
}

fn replied(text: String) -> MessageOutcome {
    let reply = if text.trim().is_empty() {
        EMPTY_REPLY.to_string()
    } else {
        text
    };
    MessageOutcome::Replied { reply }
}

fn rejected(conversation_id: &str, rejection: BookingRejection) -> MessageOutcome {
    let kind = rejection.kind();
    if kind == ErrorKind::Configuration {
        tracing::error!(conversation = %conversation_id, error = %rejection, "booking blocked by catalog configuration");
    } else {
        tracing::info!(conversation = %conversation_id, kind = ?kind, reason = %rejection, "booking rejected");
    }
    MessageOutcome::BookingRejected {
        reply: rejection.suggestion(),
        kind,
        reason: rejection.to_string(),
    }
}

fn already_booked_reply() -> String {
    BookingRejection::Duplicate {
        appointment_id: String::new(),
    }
    .suggestion()
}

/// Best-effort message to the provider; never fails the request.
async fn notify_owner(state: &Arc<AppState>, message: &str) {
    if state.config.owner_phone.is_empty() {
        tracing::warn!("owner_phone not configured, skipping notification");
        return;
    }
    let send = state
        .messaging
        .send_message(&state.config.owner_phone, message);
    match tokio::time::timeout(state.config.timeouts.relay, send).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "failed to notify owner"),
        Err(_) => tracing::error!("owner notification timed out"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use crate::config::{AppConfig, BookingPolicy, RateLimitConfig, Timeouts};
    use crate::models::CatalogItem;
    use crate::services::ai::{ChatRequest, LlmProvider};
    use crate::services::messaging::MessagingProvider;

    const CLIENT: &str = "+33612345678";

    struct SilentLlm;

    #[async_trait]
    impl LlmProvider for SilentLlm {
        async fn chat(&self, _request: &ChatRequest) -> anyhow::Result<ChatReply> {
            Ok(ChatReply::Text(String::new()))
        }
    }

    struct NullRelay;

    #[async_trait]
    impl MessagingProvider for NullRelay {
        async fn send_message(&self, _to: &str, _body: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    /// Monday 2025-06-16, 12:00 in Paris.
    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 16, 10, 0, 0).unwrap()
    }

    fn state() -> Arc<AppState> {
        let config = AppConfig {
            port: 3000,
            database_url: ":memory:".to_string(),
            provider_id: "default".to_string(),
            provider_setup_file: None,
            history_limit: 20,
            booking: BookingPolicy::default(),
            rate_limit: RateLimitConfig::default(),
            timeouts: Timeouts {
                store: Duration::from_secs(2),
                inference: Duration::from_secs(2),
                relay: Duration::from_secs(1),
            },
            llm_provider: "silent".to_string(),
            groq_api_key: String::new(),
            groq_model: String::new(),
            ollama_url: String::new(),
            ollama_model: String::new(),
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_phone_number: String::new(),
            twilio_channel: String::new(),
            twilio_api_base: String::new(),
            owner_phone: String::new(),
        };
        Arc::new(AppState {
            db: Arc::new(Mutex::new(db::init_db(":memory:").unwrap())),
            config,
            llm: Box::new(SilentLlm),
            messaging: Box::new(NullRelay),
            clock: noon,
        })
    }

    #[tokio::test]
    async fn test_insert_race_reports_already_booked() {
        let state = state();
        let local = LocalNow::from_instant(noon(), state.config.booking.timezone);

        // snapshot taken before either insert, as two concurrent messages would see it
        let provider = ProviderData {
            windows: vec![AvailabilityWindow::new(1, "18:30", "02:00").unwrap()],
            yesterday_windows: vec![],
            appointments: vec![],
            catalog: ProviderCatalog {
                durations: vec![CatalogItem {
                    name: "1h".to_string(),
                    price: Some(150),
                }],
                extras: vec![],
            },
        };
        let availability = compute_available_ranges(&provider.windows, &[], &local, 30);
        let enums = provider.catalog.enums().unwrap();
        let arguments = serde_json::json!({
            "duration": "1h",
            "extras": [],
            "date": "2025-06-16",
            "time": "19:00",
        });

        let first = book(&state, CLIENT, local, noon(), &provider, &enums, &availability, &arguments)
            .await
            .unwrap();
        assert!(matches!(first, MessageOutcome::BookingCreated { .. }));

        let second = book(&state, CLIENT, local, noon(), &provider, &enums, &availability, &arguments)
            .await
            .unwrap();
        assert_eq!(
            second,
            MessageOutcome::AlreadyBooked {
                reply: already_booked_reply(),
                appointment_id: None,
            }
        );

        let conn = state.db.lock().unwrap();
        let stored = queries::get_appointments_from(&conn, "default", local.date).unwrap();
        assert_eq!(stored.len(), 1);
    }
}
