//! Time utilities for banyad
//!
//! Booking slots are minute-precision wall-clock times scoped to the current
//! operating day; they are never full timestamps. A slot "14:30" always means
//! "today at 14:30".
//!
//! # Mock Time for Development
//!
//! In debug builds, the `BANYA_MOCK_TIME` environment variable can be set to
//! override the system time, which is useful for exercising day rollover and
//! slot expiry without waiting for midnight.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2026-03-01 23:59:00`)

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "BANYA_MOCK_TIME";

/// Cached mock time offset from the real time when the process started,
/// so mock time advances naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .and_then(|naive| Local.from_local_datetime(&naive).single())
                {
                    Some(mock_dt) => {
                        let offset = mock_dt.signed_duration_since(Local::now());
                        tracing::info!(
                            mock_time = %mock_time_str,
                            offset_secs = offset.num_seconds(),
                            "Mock time enabled"
                        );
                        return Some(offset);
                    }
                    None => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = "%Y-%m-%d %H:%M:%S",
                            "Invalid mock time, ignoring"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Get the current local time, respecting mock time settings in debug builds.
///
/// In release builds this always returns the real system time.
pub fn now() -> DateTime<Local> {
    let real_now = Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Error returned when a slot string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid slot '{input}': expected HH:MM between 00:00 and 23:59")]
pub struct SlotParseError {
    pub input: String,
}

/// Minute-precision time-of-day of a booking slot.
///
/// Rendered as `"HH:MM"` everywhere (wire, storage, logs); because hours and
/// minutes are zero-padded, lexicographic order on the rendered form equals
/// chronological order, which the storage layer relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slot {
    hour: u8,
    minute: u8,
}

impl Slot {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Minutes since midnight; the basis for slot ordering.
    pub fn minutes_from_midnight(&self) -> u32 {
        (self.hour as u32) * 60 + self.minute as u32
    }

    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    /// The slot a timestamp falls into (seconds truncated).
    pub fn of(dt: &DateTime<Local>) -> Self {
        Self::from_naive_time(dt.time())
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for Slot {
    type Err = SlotParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || SlotParseError {
            input: s.to_string(),
        };

        let (h, m) = s.split_once(':').ok_or_else(err)?;
        if h.len() != 2 || m.len() != 2 {
            return Err(err());
        }
        let hour: u8 = h.parse().map_err(|_| err())?;
        let minute: u8 = m.parse().map_err(|_| err())?;

        Slot::new(hour, minute).ok_or_else(err)
    }
}

impl TryFrom<String> for Slot {
    type Error = SlotParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Slot> for String {
    fn from(slot: Slot) -> Self {
        slot.to_string()
    }
}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slot {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.minutes_from_midnight()
            .cmp(&other.minutes_from_midnight())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    #[test]
    fn slot_parses_valid_times() {
        let slot: Slot = "14:30".parse().unwrap();
        assert_eq!(slot.hour(), 14);
        assert_eq!(slot.minute(), 30);

        let midnight: Slot = "00:00".parse().unwrap();
        assert_eq!(midnight.minutes_from_midnight(), 0);

        let last: Slot = "23:59".parse().unwrap();
        assert_eq!(last.minutes_from_midnight(), 24 * 60 - 1);
    }

    #[test]
    fn slot_rejects_malformed_input() {
        for input in ["24:00", "12:60", "9:30", "12:3", "1230", "ab:cd", "", "12:30:00"] {
            assert!(input.parse::<Slot>().is_err(), "expected '{}' to fail", input);
        }
    }

    #[test]
    fn slot_ordering_matches_clock_order() {
        let morning: Slot = "08:00".parse().unwrap();
        let noon: Slot = "12:00".parse().unwrap();
        let evening: Slot = "21:30".parse().unwrap();

        assert!(morning < noon);
        assert!(noon < evening);
    }

    #[test]
    fn slot_display_is_zero_padded() {
        let slot = Slot::new(8, 5).unwrap();
        assert_eq!(slot.to_string(), "08:05");
    }

    #[test]
    fn slot_text_order_equals_clock_order() {
        // The store compares slots as text; padding must keep that sound.
        let a = Slot::new(9, 59).unwrap();
        let b = Slot::new(10, 0).unwrap();
        assert!(a.to_string() < b.to_string());
        assert!(a < b);
    }

    #[test]
    fn slot_serde_round_trip_as_string() {
        let slot: Slot = "14:30".parse().unwrap();
        let json = serde_json::to_string(&slot).unwrap();
        assert_eq!(json, "\"14:30\"");

        let parsed: Slot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, slot);

        assert!(serde_json::from_str::<Slot>("\"25:00\"").is_err());
    }

    #[test]
    fn slot_of_truncates_seconds() {
        let dt = Local.with_ymd_and_hms(2026, 3, 1, 8, 0, 59).unwrap();
        assert_eq!(Slot::of(&dt), Slot::new(8, 0).unwrap());
    }

    #[test]
    fn now_returns_reasonable_time() {
        let t = now();
        assert!(t.year() >= 2020);
        assert!(t.year() <= 2100);
    }
}
