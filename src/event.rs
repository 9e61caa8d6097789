//! Calendar events, as mapped from source records and as stored in the target calendar

use std::fmt::{Display, Formatter};

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};


/// The identifier of a source record, stamped on the calendar event that mirrors it.
///
/// This is the join key between the source and the target.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalKey {
    content: String,
}

impl ExternalKey {
    pub fn as_str(&self) -> &str {
        &self.content
    }
}
impl From<String> for ExternalKey {
    fn from(content: String) -> Self {
        Self { content }
    }
}
impl From<&str> for ExternalKey {
    fn from(content: &str) -> Self {
        Self { content: content.to_string() }
    }
}
impl Display for ExternalKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.content)
    }
}


/// A normalized event time window.
///
/// All-day ranges use an exclusive end date, like calendars do: a single-day event on March 1st ends on March 2nd.
/// Timed ranges compare by instant, so `09:00Z` and `10:00+01:00` are the same start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventTimeRange {
    AllDay { start: NaiveDate, end: NaiveDate },
    Timed { start: DateTime<FixedOffset>, end: DateTime<FixedOffset> },
}

impl EventTimeRange {
    pub fn is_all_day(&self) -> bool {
        matches!(self, EventTimeRange::AllDay { .. })
    }

    /// The start, formatted the way calendar APIs expect it
    pub fn start_string(&self) -> String {
        match self {
            EventTimeRange::AllDay { start, .. } => start.format("%Y-%m-%d").to_string(),
            EventTimeRange::Timed { start, .. } => start.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// The end, formatted the way calendar APIs expect it
    pub fn end_string(&self) -> String {
        match self {
            EventTimeRange::AllDay { end, .. } => end.format("%Y-%m-%d").to_string(),
            EventTimeRange::Timed { end, .. } => end.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

impl Display for EventTimeRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            EventTimeRange::AllDay { .. } => write!(f, "{} .. {} (all day)", self.start_string(), self.end_string()),
            EventTimeRange::Timed { .. } => write!(f, "{} .. {}", self.start_string(), self.end_string()),
        }
    }
}


/// A target-ready representation of a source record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MappedEvent {
    external_key: ExternalKey,
    summary: String,
    description: String,
    time_range: EventTimeRange,
}

impl MappedEvent {
    pub fn new(external_key: ExternalKey, summary: String, description: String, time_range: EventTimeRange) -> Self {
        Self { external_key, summary, description, time_range }
    }

    pub fn external_key(&self) -> &ExternalKey    { &self.external_key }
    pub fn summary(&self) -> &str                 { &self.summary      }
    pub fn description(&self) -> &str             { &self.description  }
    pub fn time_range(&self) -> &EventTimeRange   { &self.time_range   }

    /// Whether `stored` already shows exactly this content, so that updating it would change nothing
    pub fn is_reflected_by(&self, stored: &TargetEvent) -> bool {
        self.summary == stored.summary
            && stored.description.as_deref() == Some(self.description.as_str())
            && stored.time_range.as_ref() == Some(&self.time_range)
    }
}


/// An event read from the target calendar
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetEvent {
    /// The identifier the calendar assigned to this event
    id: String,
    /// Only set on events created by this system
    managed_key: Option<ExternalKey>,
    summary: String,
    description: Option<String>,
    /// `None` when the calendar returned a time specification this crate could not read
    time_range: Option<EventTimeRange>,
}

impl TargetEvent {
    pub fn new(id: String, managed_key: Option<ExternalKey>, summary: String,
               description: Option<String>, time_range: Option<EventTimeRange>) -> Self
    {
        Self { id, managed_key, summary, description, time_range }
    }

    /// Build the event a calendar would store for `mapped`, once it assigned it `id`
    pub fn from_mapped(id: String, mapped: &MappedEvent) -> Self {
        Self {
            id,
            managed_key: Some(mapped.external_key.clone()),
            summary: mapped.summary.clone(),
            description: Some(mapped.description.clone()),
            time_range: Some(mapped.time_range.clone()),
        }
    }

    pub fn id(&self) -> &str                               { &self.id }
    pub fn managed_key(&self) -> Option<&ExternalKey>      { self.managed_key.as_ref() }
    pub fn summary(&self) -> &str                          { &self.summary }
    pub fn description(&self) -> Option<&str>              { self.description.as_deref() }
    pub fn time_range(&self) -> Option<&EventTimeRange>    { self.time_range.as_ref() }

    pub fn is_managed(&self) -> bool {
        self.managed_key.is_some()
    }

    /// Replace the content of this event, but keep its id and managed key
    pub fn apply(&mut self, mapped: &MappedEvent) {
        self.summary = mapped.summary.clone();
        self.description = Some(mapped.description.clone());
        self.time_range = Some(mapped.time_range.clone());
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_ranges_compare_by_instant() {
        let utc = EventTimeRange::Timed {
            start: DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z").unwrap(),
            end: DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z").unwrap(),
        };
        let paris = EventTimeRange::Timed {
            start: DateTime::parse_from_rfc3339("2024-03-01T10:00:00+01:00").unwrap(),
            end: DateTime::parse_from_rfc3339("2024-03-01T11:00:00+01:00").unwrap(),
        };
        assert_eq!(utc, paris);
        assert_eq!(utc.start_string(), "2024-03-01T09:00:00Z");
    }

    #[test]
    fn test_is_reflected_by() {
        let range = EventTimeRange::AllDay {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        };
        let mapped = MappedEvent::new(ExternalKey::from("A"), "Launch".to_string(), "Synced".to_string(), range);

        let mut stored = TargetEvent::from_mapped("evt-1".to_string(), &mapped);
        assert!(mapped.is_reflected_by(&stored));

        stored.summary = "Launch (edited)".to_string();
        assert!(mapped.is_reflected_by(&stored) == false);

        stored.apply(&mapped);
        assert!(mapped.is_reflected_by(&stored));
        assert_eq!(stored.id(), "evt-1");
        assert_eq!(stored.managed_key(), Some(&ExternalKey::from("A")));
    }
}
