use super::tools::{booking_tool, waiting_schema};
use super::{ChatRequest, Message, OutputContract};
use crate::services::mode::{Confidence, InferenceRequest, WaitingReply, WaitingRequest, WorkflowRequest};

const WORKFLOW_PROMPT: &str = "Tu es l'assistant de réservation d'un salon. Tu réponds par message, \
en français, de façon brève et chaleureuse. Les réservations se font uniquement pour le jour même.";

const WAITING_PROMPT: &str = "Tu es l'assistant d'un salon. Le client a déjà un rendez-vous confirmé \
aujourd'hui et aucune nouvelle réservation n'est possible dans cette conversation. Réponds \
uniquement avec un objet JSON de la forme \
{\"message\": string, \"client_arrived\": boolean, \"confidence\": \"low\"|\"medium\"|\"high\"}. \
Mets client_arrived à true seulement si le client dit clairement qu'il est arrivé sur place.";

pub fn chat_request(request: &InferenceRequest) -> ChatRequest {
    match request {
        InferenceRequest::Workflow(w) => workflow_request(w),
        InferenceRequest::Waiting(w) => waiting_request(w),
    }
}

fn workflow_request(request: &WorkflowRequest) -> ChatRequest {
    let mut system = format!(
        "{WORKFLOW_PROMPT}\n\nDate du jour : {}.\nDisponibilités restantes aujourd'hui : {}.",
        request.today.format("%Y-%m-%d"),
        request.availability
    );

    let output = match &request.booking {
        Some(enums) => {
            system.push_str(&format!(
                "\nDurées proposées : {}.",
                enums.durations.join(", ")
            ));
            if !enums.extras.is_empty() {
                system.push_str(&format!("\nOptions : {}.", enums.extras.join(", ")));
            }
            system.push_str(
                "\nQuand le client a choisi une durée et une heure dans les disponibilités, \
                 appelle l'outil de réservation. N'invente jamais de créneau.",
            );
            OutputContract::Tool(booking_tool(enums))
        }
        None => {
            system.push_str("\nAucune réservation n'est possible pour le moment, explique-le poliment.");
            OutputContract::FreeText
        }
    };

    ChatRequest {
        system_prompt: system,
        messages: request.history.iter().map(Message::from).collect(),
        output,
    }
}

fn waiting_request(request: &WaitingRequest) -> ChatRequest {
    let appt = &request.appointment;
    let system = format!(
        "{WAITING_PROMPT}\n\nRendez-vous : aujourd'hui de {} à {}.",
        appt.start_time(),
        appt.end_time()
    );

    ChatRequest {
        system_prompt: system,
        messages: request.history.iter().map(Message::from).collect(),
        output: OutputContract::JsonObject {
            schema: waiting_schema(),
        },
    }
}

/// Reads the WAITING reply, tolerating code fences and prose around the
/// object. Anything unreadable becomes a low-confidence, non-arrival reply
/// carrying the raw text.
pub fn parse_waiting_reply(raw: &str) -> WaitingReply {
    if let Ok(reply) = serde_json::from_str::<WaitingReply>(raw) {
        return reply;
    }

    let trimmed = raw.trim();
    let cleaned = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Ok(reply) = serde_json::from_str::<WaitingReply>(cleaned) {
        return reply;
    }

    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            if let Ok(reply) = serde_json::from_str::<WaitingReply>(&cleaned[start..=end]) {
                return reply;
            }
        }
    }

    tracing::warn!("failed to parse waiting reply as JSON, using fallback");
    WaitingReply {
        message: raw.to_string(),
        client_arrived: false,
        confidence: Confidence::Low,
    }
}
