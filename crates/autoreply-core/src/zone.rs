//! Mailbox time zone resolution and local-time normalization.
//!
//! Exchange reports mailbox zones either as IANA identifiers or as Windows zone
//! names ("W. Europe Standard Time"). Unknown names fall back to UTC instead of
//! failing the run.

use chrono::{Duration, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::error::{AutoReplyError, Result};
use crate::model::Instant;

/// Windows zone name → IANA zone, from the CLDR `windowsZones` territory "001" rows.
const WINDOWS_ZONES: &[(&str, &str)] = &[
    ("Dateline Standard Time", "Etc/GMT+12"),
    ("UTC-11", "Etc/GMT+11"),
    ("Hawaiian Standard Time", "Pacific/Honolulu"),
    ("Alaskan Standard Time", "America/Anchorage"),
    ("Pacific Standard Time", "America/Los_Angeles"),
    ("US Mountain Standard Time", "America/Phoenix"),
    ("Mountain Standard Time", "America/Denver"),
    ("Central America Standard Time", "America/Guatemala"),
    ("Central Standard Time", "America/Chicago"),
    ("Canada Central Standard Time", "America/Regina"),
    ("Eastern Standard Time", "America/New_York"),
    ("Atlantic Standard Time", "America/Halifax"),
    ("Newfoundland Standard Time", "America/St_Johns"),
    ("E. South America Standard Time", "America/Sao_Paulo"),
    ("Argentina Standard Time", "America/Buenos_Aires"),
    ("UTC-02", "Etc/GMT+2"),
    ("Azores Standard Time", "Atlantic/Azores"),
    ("UTC", "Etc/UTC"),
    ("GMT Standard Time", "Europe/London"),
    ("Greenwich Standard Time", "Atlantic/Reykjavik"),
    ("W. Europe Standard Time", "Europe/Berlin"),
    ("Central Europe Standard Time", "Europe/Budapest"),
    ("Romance Standard Time", "Europe/Paris"),
    ("Central European Standard Time", "Europe/Warsaw"),
    ("W. Central Africa Standard Time", "Africa/Lagos"),
    ("GTB Standard Time", "Europe/Bucharest"),
    ("E. Europe Standard Time", "Europe/Chisinau"),
    ("Egypt Standard Time", "Africa/Cairo"),
    ("FLE Standard Time", "Europe/Kiev"),
    ("Israel Standard Time", "Asia/Jerusalem"),
    ("South Africa Standard Time", "Africa/Johannesburg"),
    ("Turkey Standard Time", "Europe/Istanbul"),
    ("Arab Standard Time", "Asia/Riyadh"),
    ("Russian Standard Time", "Europe/Moscow"),
    ("Iran Standard Time", "Asia/Tehran"),
    ("Arabian Standard Time", "Asia/Dubai"),
    ("Pakistan Standard Time", "Asia/Karachi"),
    ("India Standard Time", "Asia/Calcutta"),
    ("Nepal Standard Time", "Asia/Katmandu"),
    ("Bangladesh Standard Time", "Asia/Dhaka"),
    ("SE Asia Standard Time", "Asia/Bangkok"),
    ("China Standard Time", "Asia/Shanghai"),
    ("Singapore Standard Time", "Asia/Singapore"),
    ("W. Australia Standard Time", "Australia/Perth"),
    ("Taipei Standard Time", "Asia/Taipei"),
    ("Tokyo Standard Time", "Asia/Tokyo"),
    ("Korea Standard Time", "Asia/Seoul"),
    ("Cen. Australia Standard Time", "Australia/Adelaide"),
    ("AUS Eastern Standard Time", "Australia/Sydney"),
    ("E. Australia Standard Time", "Australia/Brisbane"),
    ("New Zealand Standard Time", "Pacific/Auckland"),
];

/// Resolve a mailbox zone name to a `Tz`.
///
/// Tries the name as an IANA identifier, then as a Windows zone name, and
/// finally falls back to UTC.
pub fn resolve_zone(name: &str) -> Tz {
    if let Ok(tz) = name.parse::<Tz>() {
        return tz;
    }

    let mapped = WINDOWS_ZONES
        .iter()
        .find(|(windows, _)| *windows == name)
        .and_then(|(_, iana)| iana.parse::<Tz>().ok());

    match mapped {
        Some(tz) => tz,
        None => {
            tracing::warn!(zone = name, "unknown mailbox time zone, falling back to UTC");
            Tz::UTC
        }
    }
}

/// Interpret a wall-clock time in `tz`.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times inside a
/// spring-forward gap are shifted forward by the length of the gap.
pub fn localize(naive: NaiveDateTime, tz: Tz) -> Result<Instant> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => (1..=3)
            .find_map(|h| {
                tz.from_local_datetime(&(naive + Duration::hours(h)))
                    .earliest()
            })
            .ok_or_else(|| {
                AutoReplyError::InvalidDateTime(format!("{} does not exist in {}", naive, tz))
            }),
    }
}

/// Parse a Graph `dateTime` value such as `2024-01-10T00:00:00.0000000`.
pub fn parse_naive(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .map_err(|e| AutoReplyError::InvalidDateTime(format!("{}: {}", value, e)))
}

/// Format an instant as a Graph wall-clock `dateTime` (no offset).
pub fn to_wall_clock(instant: &Instant) -> String {
    instant.naive_local().format("%Y-%m-%dT%H:%M:%S").to_string()
}
