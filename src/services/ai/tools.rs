use serde_json::json;

use super::ToolSpec;
use crate::models::catalog::NONE_EXTRA;
use crate::models::CatalogEnums;

pub const BOOKING_TOOL_NAME: &str = "propose_booking";

/// The booking tool. Durations and extras are closed enums taken from the
/// provider's catalog; the same enums are checked again on the way back.
pub fn booking_tool(enums: &CatalogEnums) -> ToolSpec {
    let mut extras = enums.extras.clone();
    extras.push(NONE_EXTRA.to_string());

    ToolSpec {
        name: BOOKING_TOOL_NAME.to_string(),
        description: "Propose une réservation pour aujourd'hui une fois que le client a choisi \
                      une durée et une heure."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "duration": {
                    "type": "string",
                    "enum": enums.durations,
                    "description": "Durée choisie par le client",
                },
                "extras": {
                    "type": "array",
                    "items": {"type": "string", "enum": extras},
                    "description": "Options choisies, [\"none\"] si aucune",
                },
                "date": {
                    "type": "string",
                    "pattern": "^\\d{4}-\\d{2}-\\d{2}$",
                    "description": "Date du jour au format YYYY-MM-DD",
                },
                "time": {
                    "type": "string",
                    "pattern": "^([01]\\d|2[0-3]):[0-5]\\d$",
                    "description": "Heure de début au format HH:MM (24h)",
                },
            },
            "required": ["duration", "extras", "date", "time"],
            "additionalProperties": false,
        }),
    }
}

/// Schema of the WAITING reply object.
pub fn waiting_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "message": {"type": "string"},
            "client_arrived": {"type": "boolean"},
            "confidence": {"type": "string", "enum": ["low", "medium", "high"]},
        },
        "required": ["message", "client_arrived", "confidence"],
    })
}
