use serde::{Deserialize, Serialize};

/// Arguments of a `propose_booking` tool call. Everything in here comes from
/// the inference provider and is untrusted until the validation pipeline
/// accepts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub duration: String,
    #[serde(default)]
    pub extras: Vec<String>,
    pub date: String,
    pub time: String,
}
