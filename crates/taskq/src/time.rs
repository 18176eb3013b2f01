//! Delay units and `runAt` formatting

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// Text layout of `runAt` in payloads, e.g. `2024-05-01 08:30:00`.
pub const RUN_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Unit for `TaskQueue::publish_with_delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// `amount` units as a duration; `None` when not positive or out of range.
    pub fn duration(self, amount: i64) -> Option<Duration> {
        if amount < 1 {
            return None;
        }
        match self {
            Self::Millisecond => Duration::try_milliseconds(amount),
            Self::Second => Duration::try_seconds(amount),
            Self::Minute => Duration::try_minutes(amount),
            Self::Hour => Duration::try_hours(amount),
            Self::Day => Duration::try_days(amount),
        }
    }
}

impl FromStr for TimeUnit {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ms" | "milli" | "millis" | "millisecond" | "milliseconds" => Ok(Self::Millisecond),
            "s" | "sec" | "secs" | "second" | "seconds" => Ok(Self::Second),
            "m" | "min" | "mins" | "minute" | "minutes" => Ok(Self::Minute),
            "h" | "hour" | "hours" => Ok(Self::Hour),
            "d" | "day" | "days" => Ok(Self::Day),
            other => Err(QueueError::InvalidTimeUnit(other.to_string())),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Millisecond => "millisecond",
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        };
        f.write_str(name)
    }
}

pub fn format_run_at(at: &DateTime<FixedOffset>) -> String {
    at.format(RUN_AT_FORMAT).to_string()
}

/// Parse `runAt` text as wall-clock time in `zone`.
pub fn parse_run_at(text: &str, zone: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(text.trim(), RUN_AT_FORMAT).ok()?;
    zone.from_local_datetime(&naive).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_durations() {
        assert_eq!(TimeUnit::Millisecond.duration(1500), Some(Duration::milliseconds(1500)));
        assert_eq!(TimeUnit::Minute.duration(2), Some(Duration::seconds(120)));
        assert_eq!(TimeUnit::Day.duration(1), Some(Duration::hours(24)));
        assert_eq!(TimeUnit::Second.duration(0), None);
        assert_eq!(TimeUnit::Hour.duration(-3), None);
        assert_eq!(TimeUnit::Day.duration(i64::MAX), None);
    }

    #[test]
    fn test_unit_parsing() {
        assert_eq!("ms".parse::<TimeUnit>().unwrap(), TimeUnit::Millisecond);
        assert_eq!("Seconds".parse::<TimeUnit>().unwrap(), TimeUnit::Second);
        assert_eq!(" h ".parse::<TimeUnit>().unwrap(), TimeUnit::Hour);
        assert!(matches!(
            "fortnight".parse::<TimeUnit>(),
            Err(QueueError::InvalidTimeUnit(_))
        ));
    }

    #[test]
    fn test_run_at_is_zone_local_but_timestamp_is_absolute() {
        let shanghai = FixedOffset::east_opt(8 * 3600).unwrap();
        let at = parse_run_at("2024-05-01 08:30:00", &shanghai).unwrap();
        assert_eq!(at.timestamp(), 1_714_523_400);
        assert_eq!(format_run_at(&at), "2024-05-01 08:30:00");

        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(format_run_at(&at.with_timezone(&utc)), "2024-05-01 00:30:00");
    }

    #[test]
    fn test_run_at_rejects_garbage() {
        let zone = FixedOffset::east_opt(0).unwrap();
        assert!(parse_run_at("", &zone).is_none());
        assert!(parse_run_at("2024-05-01T08:30:00Z", &zone).is_none());
        assert!(parse_run_at("tomorrow", &zone).is_none());
    }
}
