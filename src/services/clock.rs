use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalNow {
    pub date: NaiveDate,
    /// 0 = Sunday .. 6 = Saturday.
    pub weekday: u8,
    pub hour: u32,
    pub minute: u32,
}

impl LocalNow {
    pub fn from_instant(instant: DateTime<Utc>, tz: Tz) -> Self {
        let local = instant.with_timezone(&tz);
        Self {
            date: local.date_naive(),
            weekday: local.weekday().num_days_from_sunday() as u8,
            hour: local.hour(),
            minute: local.minute(),
        }
    }

    pub fn minute_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }
}

/// An end at or before the start continues into the next day.
pub fn extended_end(start: u32, end: u32) -> u32 {
    if end <= start {
        end + MINUTES_PER_DAY
    } else {
        end
    }
}

pub fn fold(minute: u32) -> u32 {
    minute % MINUTES_PER_DAY
}

pub fn parse_hhmm(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return None;
    }
    if !s[..2].bytes().all(|b| b.is_ascii_digit()) || !s[3..].bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let hour: u32 = s[..2].parse().ok()?;
    let minute: u32 = s[3..].parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 60 + minute)
}

pub fn format_hhmm(minute: u32) -> String {
    let m = fold(minute);
    format!("{:02}:{:02}", m / 60, m % 60)
}

/// Short spoken form: `19h`, `18h30`, `0h`.
pub fn format_short(minute: u32) -> String {
    let m = fold(minute);
    let (h, mm) = (m / 60, m % 60);
    if mm == 0 {
        format!("{h}h")
    } else {
        format!("{h}h{mm:02}")
    }
}
