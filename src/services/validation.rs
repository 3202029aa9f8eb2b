use chrono::NaiveDate;

use crate::errors::ErrorKind;
use crate::models::catalog::{duration_minutes, NONE_EXTRA};
use crate::models::{
    Appointment, AppointmentStatus, AvailabilityWindow, BookingRequest, CatalogEnums, CatalogError,
};
use crate::services::availability::RangeDescription;
use crate::services::clock::{self, LocalNow};
use crate::services::scheduling::{check_slot, has_conflict, SlotVerdict};

pub struct ValidationContext<'a> {
    pub conversation_id: &'a str,
    pub now: LocalNow,
    pub lead_time_minutes: u32,
    pub windows: &'a [AvailabilityWindow],
    pub appointments: &'a [Appointment],
    pub availability: &'a RangeDescription,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBooking {
    pub date: NaiveDate,
    pub start_minute: u32,
    pub duration: String,
    pub duration_minutes: u32,
    /// Deduplicated, without the `none` sentinel.
    pub extras: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingRejection {
    #[error("malformed booking request: {0}")]
    MalformedRequest(String),

    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("invalid time {0:?}, expected HH:MM")]
    InvalidTime(String),

    #[error("duration {requested:?} is not in the catalog")]
    UnknownDuration {
        requested: String,
        allowed: Vec<String>,
    },

    #[error("extra {requested:?} is not in the catalog")]
    UnknownExtra {
        requested: String,
        allowed: Vec<String>,
    },

    #[error("conversation already holds appointment {appointment_id} for this slot")]
    Duplicate { appointment_id: String },

    #[error("requested date {requested} is not today")]
    NotToday { requested: NaiveDate },

    #[error("slot is inside the lead time, earliest start is minute {earliest}")]
    TooSoon { earliest: u32 },

    #[error("slot is outside today's availability")]
    OutsideAvailability { available: String },

    #[error("slot overlaps an existing appointment")]
    SlotTaken { available: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl BookingRejection {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingRejection::Duplicate { .. } | BookingRejection::SlotTaken { .. } => {
                ErrorKind::Conflict
            }
            BookingRejection::Catalog(_) => ErrorKind::Configuration,
            _ => ErrorKind::ClientInput,
        }
    }

    pub fn suggestion(&self) -> String {
        match self {
            BookingRejection::MalformedRequest(_) => {
                "Je n'ai pas bien compris votre demande. Pouvez-vous préciser la durée et l'heure souhaitées ?".to_string()
            }
            BookingRejection::InvalidDate(_) => {
                "Je n'ai pas compris la date. Les réservations se font pour aujourd'hui uniquement.".to_string()
            }
            BookingRejection::InvalidTime(_) => {
                "Je n'ai pas compris l'heure. Pouvez-vous l'indiquer au format 19h00 ?".to_string()
            }
            BookingRejection::UnknownDuration { allowed, .. } => format!(
                "Cette durée n'est pas proposée. Durées disponibles : {}.",
                allowed.join(", ")
            ),
            BookingRejection::UnknownExtra { requested, allowed } => {
                if allowed.is_empty() {
                    format!("L'option « {requested} » n'est pas proposée.")
                } else {
                    format!(
                        "L'option « {requested} » n'est pas proposée. Options disponibles : {}.",
                        allowed.join(", ")
                    )
                }
            }
            BookingRejection::Duplicate { .. } => {
                "Votre rendez-vous est déjà confirmé, à tout à l'heure !".to_string()
            }
            BookingRejection::NotToday { .. } => {
                "Les réservations se font uniquement pour le jour même.".to_string()
            }
            BookingRejection::TooSoon { earliest } => format!(
                "Ce créneau est trop proche. Le plus tôt possible est {}.",
                clock::format_short(*earliest)
            ),
            BookingRejection::OutsideAvailability { available } => {
                format!("Ce créneau n'est pas disponible. Disponibilités : {available}.")
            }
            BookingRejection::SlotTaken { available } => {
                format!("Ce créneau vient d'être pris. Disponibilités : {available}.")
            }
            BookingRejection::Catalog(_) => {
                "La réservation est momentanément indisponible, veuillez réessayer plus tard.".to_string()
            }
        }
    }
}

pub fn parse_request(arguments: &serde_json::Value) -> Result<BookingRequest, BookingRejection> {
    serde_json::from_value(arguments.clone())
        .map_err(|e| BookingRejection::MalformedRequest(e.to_string()))
}

pub fn validate(
    request: &BookingRequest,
    enums: &CatalogEnums,
    ctx: &ValidationContext<'_>,
) -> Result<ValidatedBooking, BookingRejection> {
    // 1. Format
    let date = parse_iso_date(&request.date)
        .ok_or_else(|| BookingRejection::InvalidDate(request.date.clone()))?;
    let start_minute = clock::parse_hhmm(&request.time)
        .ok_or_else(|| BookingRejection::InvalidTime(request.time.clone()))?;

    // 2. Catalog membership
    if !enums.durations.iter().any(|d| d == &request.duration) {
        return Err(BookingRejection::UnknownDuration {
            requested: request.duration.clone(),
            allowed: enums.durations.clone(),
        });
    }
    let mut extras: Vec<String> = Vec::new();
    for extra in request.extras.iter().filter(|e| e.as_str() != NONE_EXTRA) {
        if !enums.extras.contains(extra) {
            return Err(BookingRejection::UnknownExtra {
                requested: extra.clone(),
                allowed: enums.extras.clone(),
            });
        }
        if !extras.contains(extra) {
            extras.push(extra.clone());
        }
    }
    let minutes = duration_minutes(&request.duration)?;

    // 3. Duplicate
    if let Some(existing) = ctx.appointments.iter().find(|a| {
        a.conversation_id == ctx.conversation_id
            && a.date == date
            && a.start_minute == start_minute
            && a.status != AppointmentStatus::Cancelled
    }) {
        return Err(BookingRejection::Duplicate {
            appointment_id: existing.id.clone(),
        });
    }

    // 4. Date scope
    if date != ctx.now.date {
        return Err(BookingRejection::NotToday { requested: date });
    }

    // 5. Slot
    let today: Vec<Appointment> = ctx
        .appointments
        .iter()
        .filter(|a| a.date == date)
        .cloned()
        .collect();
    let available = ctx.availability.to_string();

    match check_slot(
        start_minute,
        ctx.windows,
        &today,
        &ctx.now,
        ctx.lead_time_minutes,
    ) {
        SlotVerdict::Available { .. } => {}
        SlotVerdict::TooSoon { earliest } => return Err(BookingRejection::TooSoon { earliest }),
        SlotVerdict::OutsideAvailability => {
            return Err(BookingRejection::OutsideAvailability { available })
        }
        SlotVerdict::Occupied => return Err(BookingRejection::SlotTaken { available }),
    }
    if has_conflict(start_minute, minutes, &today) {
        return Err(BookingRejection::SlotTaken { available });
    }

    Ok(ValidatedBooking {
        date,
        start_minute,
        duration: request.duration.clone(),
        duration_minutes: minutes,
        extras,
    })
}

/// Strict `YYYY-MM-DD`.
fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let bytes = s.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
