use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::services::clock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub provider_id: String,
    pub conversation_id: String,
    pub date: NaiveDate,
    pub start_minute: u32,
    /// Clock minute; lower than `start_minute` when the appointment ends after midnight.
    pub end_minute: u32,
    pub duration_minutes: u32,
    pub extras: Vec<String>,
    pub total_price: i64,
    pub status: AppointmentStatus,
    pub client_arrived: bool,
    pub provider_ready: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    pub fn start_time(&self) -> String {
        clock::format_hhmm(self.start_minute)
    }

    pub fn end_time(&self) -> String {
        clock::format_hhmm(self.end_minute)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => AppointmentStatus::Confirmed,
            "cancelled" => AppointmentStatus::Cancelled,
            "completed" => AppointmentStatus::Completed,
            _ => AppointmentStatus::Pending,
        }
    }
}
