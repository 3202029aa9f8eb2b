use crate::models::{Appointment, AppointmentStatus, AvailabilityWindow};
use crate::services::availability::{occupied_minutes, windows_for_day};
use crate::services::clock::{LocalNow, MINUTES_PER_DAY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotVerdict {
    Available { extended_minute: u32 },
    /// Inside a window but closer to now than the lead time allows.
    TooSoon { earliest: u32 },
    Occupied,
    OutsideAvailability,
}

/// Point check for a clock minute. Windows decide which side of midnight the
/// minute is on; when two windows disagree the later reading wins.
pub fn check_slot(
    candidate: u32,
    windows: &[AvailabilityWindow],
    appointments: &[Appointment],
    now: &LocalNow,
    lead_time_minutes: u32,
) -> SlotVerdict {
    let extended = windows_for_day(windows, now.weekday)
        .into_iter()
        .filter(|w| w.contains(candidate))
        .map(|w| w.to_extended(candidate))
        .max();

    let Some(extended) = extended else {
        return SlotVerdict::OutsideAvailability;
    };

    let min_allowed = now.minute_of_day() + lead_time_minutes;
    if extended < min_allowed {
        return SlotVerdict::TooSoon {
            earliest: min_allowed,
        };
    }

    if occupied_minutes(appointments, now.date).contains(&candidate) {
        return SlotVerdict::Occupied;
    }

    SlotVerdict::Available {
        extended_minute: extended,
    }
}

pub fn is_time_in_ranges(
    candidate: u32,
    windows: &[AvailabilityWindow],
    appointments: &[Appointment],
    now: &LocalNow,
    lead_time_minutes: u32,
) -> bool {
    matches!(
        check_slot(candidate, windows, appointments, now, lead_time_minutes),
        SlotVerdict::Available { .. }
    )
}

/// `appointments` must all share the candidate's date.
pub fn has_conflict(candidate_start: u32, duration: u32, appointments: &[Appointment]) -> bool {
    let start = i64::from(candidate_start);
    let end = start + i64::from(duration);
    let day = i64::from(MINUTES_PER_DAY);

    appointments
        .iter()
        .filter(|a| a.status != AppointmentStatus::Cancelled)
        .any(|a| {
            let other_start = i64::from(a.start_minute);
            let other_end = other_start + i64::from(a.duration_minutes);
            [-day, 0, day]
                .iter()
                .any(|shift| start < other_end + shift && end > other_start + shift)
        })
}
