//! Start-clock utilities for the overlay schedule.
//!
//! Every generated clip is anchored to a single wall-clock start time.
//! Frame `i` shows `start + i` seconds, so the whole schedule is a pure
//! function of the resolved start and the frame index. This module provides:
//! - Time zone selection (`local`, `UTC`, a fixed `±HH:MM` offset, or an
//!   IANA name such as `Europe/Berlin`)
//! - Resolution of "now" or a fixed timestamp into a naive wall time
//! - The per-frame time offset

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{TicketTockError, TicketTockResult};

/// Accepted formats for a fixed start timestamp.
const START_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Time zone in which the wall clock is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeZoneSpec {
    /// The host's local time zone.
    #[default]
    Local,
    /// Coordinated Universal Time.
    Utc,
    /// A fixed offset from UTC.
    Fixed(FixedOffset),
    /// A named zone from the IANA database, daylight saving included.
    Named(Tz),
}

impl TimeZoneSpec {
    /// Wall time "now" in this zone.
    pub fn now(&self) -> NaiveDateTime {
        self.wall_time(Utc::now())
    }

    /// Convert an instant into wall time in this zone.
    pub fn wall_time(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            TimeZoneSpec::Local => instant.with_timezone(&Local).naive_local(),
            TimeZoneSpec::Utc => instant.naive_utc(),
            TimeZoneSpec::Fixed(offset) => instant.with_timezone(offset).naive_local(),
            TimeZoneSpec::Named(tz) => instant.with_timezone(tz).naive_local(),
        }
    }
}

impl FromStr for TimeZoneSpec {
    type Err = TicketTockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "local" => return Ok(TimeZoneSpec::Local),
            "utc" | "z" | "gmt" => return Ok(TimeZoneSpec::Utc),
            _ => {}
        }

        if let Some(offset) = parse_offset(trimmed) {
            return Ok(TimeZoneSpec::Fixed(offset));
        }
        trimmed.parse::<Tz>().map(TimeZoneSpec::Named).map_err(|_| {
            TicketTockError::configuration(format!(
                "Unknown time zone '{trimmed}'. Use: local, UTC, an offset like +05:30, \
                 or an IANA name like America/New_York"
            ))
        })
    }
}

impl fmt::Display for TimeZoneSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeZoneSpec::Local => write!(f, "local"),
            TimeZoneSpec::Utc => write!(f, "UTC"),
            TimeZoneSpec::Fixed(offset) => write!(f, "{offset}"),
            TimeZoneSpec::Named(tz) => f.write_str(tz.name()),
        }
    }
}

impl Serialize for TimeZoneSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeZoneSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw
        .strip_prefix("UTC")
        .or_else(|| raw.strip_prefix("utc"))
        .unwrap_or(raw);
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (rest.parse::<i32>().ok()?, 0),
    };
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Where the overlay clock starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartTime {
    /// Wall-clock time at the moment generation starts.
    #[default]
    Now,
    /// A fixed wall time, already expressed in the display zone.
    Fixed(NaiveDateTime),
}

impl StartTime {
    /// Parse a fixed start such as `2024-01-01T00:00:00`, or `now`.
    pub fn parse(raw: &str) -> TicketTockResult<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("now") {
            return Ok(StartTime::Now);
        }
        START_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .map(StartTime::Fixed)
            .ok_or_else(|| {
                TicketTockError::configuration(format!(
                    "Invalid start timestamp '{trimmed}'. Expected YYYY-MM-DDTHH:MM:SS or 'now'"
                ))
            })
    }

    /// Resolve to the wall time displayed on frame 0.
    pub fn resolve(&self, zone: TimeZoneSpec) -> NaiveDateTime {
        match self {
            StartTime::Now => zone.now(),
            StartTime::Fixed(at) => *at,
        }
    }
}

/// Wall time displayed on a given frame.
///
/// Fails when the result falls outside the representable calendar.
pub fn frame_time(start: NaiveDateTime, index: u32) -> TicketTockResult<NaiveDateTime> {
    start
        .checked_add_signed(Duration::seconds(i64::from(index)))
        .ok_or_else(|| {
            TicketTockError::configuration(format!(
                "start time {start} plus {index}s is past the last representable date"
            ))
        })
}
