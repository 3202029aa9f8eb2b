use serde::{Deserialize, Serialize};

use crate::services::clock::{self, MINUTES_PER_DAY};

/// A recurring weekly opening. `end_minute <= start_minute` means the window
/// runs past midnight into the next day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    pub start_minute: u32,
    pub end_minute: u32,
}

impl AvailabilityWindow {
    pub fn new(day_of_week: u8, start: &str, end: &str) -> anyhow::Result<Self> {
        if day_of_week > 6 {
            anyhow::bail!("invalid day of week: {day_of_week}");
        }
        Ok(Self {
            day_of_week,
            start_minute: parse_time(start)?,
            end_minute: parse_time(end)?,
        })
    }

    pub fn crosses_midnight(&self) -> bool {
        self.end_minute <= self.start_minute
    }

    pub fn extended_end(&self) -> u32 {
        clock::extended_end(self.start_minute, self.end_minute)
    }

    /// Inclusive membership test for a clock minute, midnight aware.
    pub fn contains(&self, minute: u32) -> bool {
        if self.crosses_midnight() {
            minute >= self.start_minute || minute <= self.end_minute
        } else {
            minute >= self.start_minute && minute <= self.end_minute
        }
    }

    /// Position of a clock minute inside this window in extended space: minutes
    /// on the after-midnight side of a crossing window move up by a day.
    pub fn to_extended(&self, minute: u32) -> u32 {
        if self.crosses_midnight() && minute < self.start_minute {
            minute + MINUTES_PER_DAY
        } else {
            minute
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScheduleEntry {
    day: String,
    start: String,
    end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScheduleFile {
    slots: Vec<ScheduleEntry>,
}

/// Parses a provider schedule of the form
/// `{"slots":[{"day":"mon","start":"09:00","end":"17:00"}]}`.
pub fn windows_from_json(s: &str) -> anyhow::Result<Vec<AvailabilityWindow>> {
    let file: ScheduleFile = serde_json::from_str(s)?;
    file.slots
        .iter()
        .map(|slot| AvailabilityWindow::new(parse_weekday(&slot.day)?, &slot.start, &slot.end))
        .collect()
}

fn parse_weekday(s: &str) -> anyhow::Result<u8> {
    match s.to_lowercase().as_str() {
        "sun" => Ok(0),
        "mon" => Ok(1),
        "tue" => Ok(2),
        "wed" => Ok(3),
        "thu" => Ok(4),
        "fri" => Ok(5),
        "sat" => Ok(6),
        _ => Err(anyhow::anyhow!("invalid weekday: {s}")),
    }
}

fn parse_time(s: &str) -> anyhow::Result<u32> {
    clock::parse_hhmm(s).ok_or_else(|| anyhow::anyhow!("invalid time: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schedule_json() {
        let json = r#"{"slots":[{"day":"mon","start":"14:00","end":"16:00"},{"day":"Sun","start":"18:30","end":"02:00"}]}"#;
        let windows = windows_from_json(json).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].day_of_week, 1);
        assert_eq!(windows[1].day_of_week, 0);
        assert!(windows[1].crosses_midnight());
    }

    #[test]
    fn test_parse_invalid_day() {
        let json = r#"{"slots":[{"day":"xyz","start":"09:00","end":"17:00"}]}"#;
        assert!(windows_from_json(json).is_err());
    }

    #[test]
    fn test_parse_invalid_time() {
        let json = r#"{"slots":[{"day":"mon","start":"25:00","end":"17:00"}]}"#;
        assert!(windows_from_json(json).is_err());
    }

    #[test]
    fn test_contains_plain_window() {
        let w = AvailabilityWindow::new(1, "09:00", "17:00").unwrap();
        assert!(w.contains(540));
        assert!(w.contains(1020));
        assert!(!w.contains(539));
        assert!(!w.contains(1200));
    }

    #[test]
    fn test_contains_crossing_window() {
        let w = AvailabilityWindow::new(1, "18:30", "02:00").unwrap();
        assert!(w.contains(1140));
        assert!(w.contains(60));
        assert!(w.contains(120));
        assert!(!w.contains(180));
        assert!(!w.contains(1020));
        assert_eq!(w.to_extended(60), 1500);
        assert_eq!(w.to_extended(1140), 1140);
        assert_eq!(w.extended_end(), 1560);
    }
}
