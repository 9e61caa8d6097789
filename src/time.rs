//! Normalization of source date specifications into event time ranges

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

use crate::event::EventTimeRange;
use crate::record::DateSpec;

/// Formats tried, in this order, on timestamps that are not strict RFC 3339
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];
/// Formats of timestamps that carry no offset at all
const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
];

#[derive(Clone, Debug, PartialEq, Error)]
pub enum NormalizeError {
    /// There is no start date: the record is not schedulable
    #[error("no start date")]
    MissingStart,
    #[error("unable to parse date {token:?}")]
    Unparseable { token: String },
    #[error("unknown time zone {name:?}")]
    UnknownTimeZone { name: String },
    /// The local time falls in a gap (e.g. during a DST change) of its time zone
    #[error("{token:?} does not exist in time zone {zone}")]
    NonexistentLocalTime { token: String, zone: String },
}

/// Convert a date specification into a canonical time range.
///
/// * a date-only start gives an all-day range, ending one day later unless an end is supplied
/// * a start with a time of day gives a timed range, ending one hour later unless an end is supplied
///
/// Timestamps without an offset are read in `spec.time_zone`, or in `default_zone` if it has none.
pub fn normalize(spec: &DateSpec, default_zone: Tz) -> Result<EventTimeRange, NormalizeError> {
    let start_token = match spec.start.as_deref().map(str::trim) {
        None | Some("") => return Err(NormalizeError::MissingStart),
        Some(token) => token,
    };
    let end_token = spec.end.as_deref().map(str::trim).filter(|token| token.is_empty() == false);

    let zone = match spec.time_zone.as_deref().map(str::trim) {
        None | Some("") => default_zone,
        Some(name) => name.parse::<Tz>()
            .map_err(|_| NormalizeError::UnknownTimeZone { name: name.to_string() })?,
    };

    if let Some(start) = parse_date_only(start_token) {
        let end = match end_token {
            None => None,
            Some(token) => Some(match parse_date_only(token) {
                Some(date) => date,
                None => parse_timestamp(token, zone)?.naive_local().date(),
            }),
        };
        return all_day_range(start, end, start_token);
    }

    let start = parse_timestamp(start_token, zone)?;
    let end = match end_token {
        None => None,
        Some(token) => Some(match parse_date_only(token) {
            Some(date) => midnight_in(date, start.offset())
                .ok_or_else(|| NormalizeError::Unparseable { token: token.to_string() })?,
            None => parse_timestamp(token, zone)?,
        }),
    };
    timed_range(start, end, start_token)
}

fn all_day_range(start: NaiveDate, end: Option<NaiveDate>, start_token: &str) -> Result<EventTimeRange, NormalizeError> {
    let next_day = start.checked_add_signed(Duration::days(1))
        .ok_or_else(|| NormalizeError::Unparseable { token: start_token.to_string() })?;

    let end = match end {
        None => next_day,
        Some(end) if end <= start => {
            log::debug!("All-day range starting {} ends on {}, extending it to a single day", start, end);
            next_day
        },
        Some(end) => end,
    };
    Ok(EventTimeRange::AllDay { start, end })
}

fn timed_range(start: DateTime<FixedOffset>, end: Option<DateTime<FixedOffset>>, start_token: &str) -> Result<EventTimeRange, NormalizeError> {
    let default_end = start.checked_add_signed(Duration::hours(1))
        .ok_or_else(|| NormalizeError::Unparseable { token: start_token.to_string() })?;

    let end = match end {
        None => default_end,
        Some(end) if end <= start => {
            log::warn!("Event starting {} ends before it starts ({}), using a one-hour event instead", start, end);
            default_end
        },
        Some(end) => end,
    };
    Ok(EventTimeRange::Timed { start, end })
}

/// Returns `Some` if `token` is a calendar date without a time component
fn parse_date_only(token: &str) -> Option<NaiveDate> {
    if token.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()
}

/// Parse a timestamp, accepting a few common deviations from RFC 3339
fn parse_timestamp(token: &str, zone: Tz) -> Result<DateTime<FixedOffset>, NormalizeError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Ok(dt);
    }

    // Trailing zero-offset markers mean UTC
    let with_offset = match token.strip_suffix('Z').or_else(|| token.strip_suffix('z')) {
        Some(stripped) => format!("{}+00:00", stripped),
        None => token.to_string(),
    };
    for format in OFFSET_FORMATS.iter() {
        if let Ok(dt) = DateTime::parse_from_str(&with_offset, format) {
            return Ok(dt);
        }
    }

    for format in NAIVE_FORMATS.iter() {
        if let Ok(naive) = NaiveDateTime::parse_from_str(token, format) {
            return match zone.from_local_datetime(&naive).earliest() {
                Some(local) => Ok(local.with_timezone(&local.offset().fix())),
                None => Err(NormalizeError::NonexistentLocalTime { token: token.to_string(), zone: zone.name().to_string() }),
            };
        }
    }

    Err(NormalizeError::Unparseable { token: token.to_string() })
}

fn midnight_in(date: NaiveDate, offset: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    offset.from_local_datetime(&naive).single()
}


#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_all_day_default_end() {
        let range = normalize(&DateSpec::starting("2024-03-01"), Tz::UTC).unwrap();
        assert_eq!(range, EventTimeRange::AllDay { start: date(2024, 3, 1), end: date(2024, 3, 2) });
        assert!(range.is_all_day());
        assert_eq!(range.end_string(), "2024-03-02");
    }

    #[test]
    fn test_all_day_end_passes_through() {
        let range = normalize(&DateSpec::between("2024-03-01", "2024-03-04"), Tz::UTC).unwrap();
        assert_eq!(range, EventTimeRange::AllDay { start: date(2024, 3, 1), end: date(2024, 3, 4) });
    }

    #[test]
    fn test_all_day_spans_at_least_one_day() {
        let range = normalize(&DateSpec::between("2024-03-01", "2024-03-01"), Tz::UTC).unwrap();
        assert_eq!(range, EventTimeRange::AllDay { start: date(2024, 3, 1), end: date(2024, 3, 2) });
    }

    #[test]
    fn test_all_day_across_year_end() {
        let range = normalize(&DateSpec::starting("2024-12-31"), Tz::UTC).unwrap();
        assert_eq!(range, EventTimeRange::AllDay { start: date(2024, 12, 31), end: date(2025, 1, 1) });
    }

    #[test]
    fn test_timed_default_end() {
        let range = normalize(&DateSpec::starting("2024-03-01T09:00:00Z"), Tz::UTC).unwrap();
        assert_eq!(range, EventTimeRange::Timed { start: ts("2024-03-01T09:00:00Z"), end: ts("2024-03-01T10:00:00Z") });
        assert!(range.is_all_day() == false);
        assert_eq!(range.end_string(), "2024-03-01T10:00:00Z");
    }

    #[test]
    fn test_timed_with_end() {
        let spec = DateSpec::between("2024-03-01T09:00:00.000+01:00", "2024-03-01T12:30:00.000+01:00");
        let range = normalize(&spec, Tz::UTC).unwrap();
        assert_eq!(range, EventTimeRange::Timed { start: ts("2024-03-01T08:00:00Z"), end: ts("2024-03-01T11:30:00Z") });
    }

    #[test]
    fn test_timed_end_before_start() {
        let spec = DateSpec::between("2024-03-01T09:00:00Z", "2024-03-01T08:00:00Z");
        let range = normalize(&spec, Tz::UTC).unwrap();
        assert_eq!(range, EventTimeRange::Timed { start: ts("2024-03-01T09:00:00Z"), end: ts("2024-03-01T10:00:00Z") });
    }

    #[test]
    fn test_permissive_timestamps() {
        // No seconds
        let range = normalize(&DateSpec::starting("2024-03-01T09:00Z"), Tz::UTC).unwrap();
        assert_eq!(range, EventTimeRange::Timed { start: ts("2024-03-01T09:00:00Z"), end: ts("2024-03-01T10:00:00Z") });

        // Compact offset
        let range = normalize(&DateSpec::starting("2024-03-01T09:00:00+0200"), Tz::UTC).unwrap();
        assert_eq!(range, EventTimeRange::Timed { start: ts("2024-03-01T07:00:00Z"), end: ts("2024-03-01T08:00:00Z") });
    }

    #[test]
    fn test_naive_timestamps_use_zone() {
        let spec = DateSpec::starting("2024-07-01T09:00:00").in_zone("Europe/Paris");
        let range = normalize(&spec, Tz::UTC).unwrap();
        assert_eq!(range, EventTimeRange::Timed { start: ts("2024-07-01T07:00:00Z"), end: ts("2024-07-01T08:00:00Z") });

        // Without a zone of its own, the default one applies
        let spec = DateSpec::starting("2024-01-15T09:00:00");
        let range = normalize(&spec, Tz::America__New_York).unwrap();
        assert_eq!(range, EventTimeRange::Timed { start: ts("2024-01-15T14:00:00Z"), end: ts("2024-01-15T15:00:00Z") });
    }

    #[test]
    fn test_nonexistent_local_time() {
        let spec = DateSpec::starting("2024-03-31T02:30:00").in_zone("Europe/Paris");
        assert!(matches!(normalize(&spec, Tz::UTC), Err(NormalizeError::NonexistentLocalTime { .. })));
    }

    #[test]
    fn test_failures() {
        assert_eq!(normalize(&DateSpec::default(), Tz::UTC), Err(NormalizeError::MissingStart));
        assert_eq!(normalize(&DateSpec::starting("  "), Tz::UTC), Err(NormalizeError::MissingStart));
        assert_eq!(
            normalize(&DateSpec::starting("next tuesday"), Tz::UTC),
            Err(NormalizeError::Unparseable { token: "next tuesday".to_string() })
        );
        assert!(matches!(
            normalize(&DateSpec::starting("2024-03-01T09:00:00").in_zone("Mars/Olympus"), Tz::UTC),
            Err(NormalizeError::UnknownTimeZone { .. })
        ));
    }
}
