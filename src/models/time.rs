//! Timestamp formats used on disk and in speech.
//!
//! All timestamps are local wall-clock times without an offset, stored as
//! `YYYY-MM-DD HH:MM:SS` so the memory file stays readable by hand.

use chrono::{DateTime, Local, NaiveDateTime, Timelike};

/// On-disk timestamp format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Alternate formats accepted when reading.
const ACCEPTED_FORMATS: &[&str] = &[
    TIMESTAMP_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Returns the current local time with second precision.
#[must_use]
pub fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Formats a timestamp in the on-disk format.
#[must_use]
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a timestamp in any accepted format.
///
/// RFC 3339 timestamps with an offset are converted to local time.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|at| at.with_timezone(&Local).naive_local())
        })
}

/// Formats a timestamp for speech: `January 02 at 02:00 PM`.
#[must_use]
pub fn format_spoken(at: NaiveDateTime) -> String {
    at.format("%B %d at %I:%M %p").to_string()
}

/// Formats a timestamp for the calendar: `Tue January 02 at 02:00 PM`.
#[must_use]
pub fn format_calendar(at: NaiveDateTime) -> String {
    at.format("%a %B %d at %I:%M %p").to_string()
}

/// Serde adapter for [`NaiveDateTime`] in the on-disk format.
pub mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a timestamp.
    pub fn serialize<S>(at: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_timestamp(*at))
    }

    /// Deserializes a timestamp in any accepted format.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_timestamp(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}")))
    }
}

/// Serde adapter for optional timestamps.
pub mod option_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes an optional timestamp.
    #[allow(clippy::ref_option)]
    pub fn serialize<S>(at: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match at {
            Some(at) => serializer.serialize_some(&super::format_timestamp(*at)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an optional timestamp.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) => super::parse_timestamp(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}"))),
        }
    }
}
