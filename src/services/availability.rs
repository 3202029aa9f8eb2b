use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::NaiveDate;

use crate::models::{Appointment, AppointmentStatus, AvailabilityWindow};
use crate::services::clock::{self, LocalNow, MINUTES_PER_DAY};

pub const NO_AVAILABILITY_TODAY: &str = "Aucune disponibilité aujourd'hui";
pub const FULLY_BOOKED_TODAY: &str = "Plus aucun créneau disponible aujourd'hui";
pub const PAST_MIDNIGHT_MARKER: &str = " (jusqu'à demain matin)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeRange {
    pub start: u32,
    pub end: u32,
}

impl FreeRange {
    pub fn continues_past_midnight(&self) -> bool {
        self.end > MINUTES_PER_DAY
    }
}

impl fmt::Display for FreeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            clock::format_short(self.start),
            clock::format_short(self.end)
        )?;
        if self.continues_past_midnight() {
            f.write_str(PAST_MIDNIGHT_MARKER)?;
        }
        Ok(())
    }
}

/// Neither sentinel is bookable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeDescription {
    NoWindowsToday,
    FullyBooked,
    Available(Vec<FreeRange>),
}

impl RangeDescription {
    pub fn is_bookable(&self) -> bool {
        matches!(self, RangeDescription::Available(ranges) if !ranges.is_empty())
    }

    pub fn ranges(&self) -> &[FreeRange] {
        match self {
            RangeDescription::Available(ranges) => ranges,
            _ => &[],
        }
    }
}

impl fmt::Display for RangeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeDescription::NoWindowsToday => f.write_str(NO_AVAILABILITY_TODAY),
            RangeDescription::FullyBooked => f.write_str(FULLY_BOOKED_TODAY),
            RangeDescription::Available(ranges) => {
                let parts: Vec<String> = ranges.iter().map(|r| r.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

pub fn occupied_minutes(appointments: &[Appointment], date: NaiveDate) -> HashSet<u32> {
    appointments
        .iter()
        .filter(|a| a.date == date && a.status != AppointmentStatus::Cancelled)
        .flat_map(|a| {
            let end = clock::extended_end(a.start_minute, a.end_minute);
            (a.start_minute..end).map(clock::fold)
        })
        .collect()
}

pub fn windows_for_day(windows: &[AvailabilityWindow], weekday: u8) -> Vec<&AvailabilityWindow> {
    windows.iter().filter(|w| w.day_of_week == weekday).collect()
}

pub fn compute_available_ranges(
    windows: &[AvailabilityWindow],
    appointments: &[Appointment],
    now: &LocalNow,
    lead_time_minutes: u32,
) -> RangeDescription {
    let today = windows_for_day(windows, now.weekday);
    if today.is_empty() {
        return RangeDescription::NoWindowsToday;
    }

    let occupied = occupied_minutes(appointments, now.date);
    let min_allowed = now.minute_of_day() + lead_time_minutes;

    let free: BTreeSet<u32> = today
        .iter()
        .flat_map(|w| w.start_minute..w.extended_end())
        .filter(|&m| m >= min_allowed && !occupied.contains(&clock::fold(m)))
        .collect();

    let mut ranges: Vec<FreeRange> = Vec::new();
    for m in free {
        match ranges.last_mut() {
            Some(last) if last.end == m => last.end = m + 1,
            _ => ranges.push(FreeRange { start: m, end: m + 1 }),
        }
    }

    if ranges.is_empty() {
        RangeDescription::FullyBooked
    } else {
        RangeDescription::Available(ranges)
    }
}
