//! JSON shapes of the Google Calendar v3 API, and their conversion to this crate's events

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::event::{EventTimeRange, ExternalKey, MappedEvent, TargetEvent};

/// An `Events` resource. Only the fields this crate reads or writes are declared.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_properties: Option<ExtendedProperties>,
}

/// Either `date` (all-day events) or `date_time` is set
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedProperties {
    /// Properties only visible to the application that set them
    #[serde(default)]
    pub private: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub shared: HashMap<String, String>,
}

/// One page of an `events.list` reply
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventList {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}


impl GoogleEvent {
    /// The body of an `events.insert` request for `event`, stamped with its external key
    pub fn from_mapped(event: &MappedEvent, key_property: &str) -> Self {
        let (start, end) = event_date_times(event.time_range());
        let mut private = HashMap::new();
        private.insert(key_property.to_string(), event.external_key().to_string());

        Self {
            summary: Some(event.summary().to_string()),
            description: Some(event.description().to_string()),
            start: Some(start),
            end: Some(end),
            extended_properties: Some(ExtendedProperties { private, shared: HashMap::new() }),
            ..Self::default()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    /// Returns the external key stored on this event, if any
    pub fn managed_key(&self, key_property: &str) -> Option<ExternalKey> {
        self.extended_properties
            .as_ref()
            .and_then(|props| props.private.get(key_property))
            .filter(|key| key.is_empty() == false)
            .map(|key| ExternalKey::from(key.as_str()))
    }

    /// Convert to a [`TargetEvent`]. Returns `None` for events without an id.
    pub fn into_target_event(self, key_property: &str) -> Option<TargetEvent> {
        let managed_key = self.managed_key(key_property);
        let time_range = match (&self.start, &self.end) {
            (Some(start), Some(end)) => parse_time_range(start, end),
            _ => None,
        };
        let id = self.id?;

        Some(TargetEvent::new(
            id,
            managed_key,
            self.summary.unwrap_or_default(),
            self.description,
            time_range,
        ))
    }
}

/// The body of an `events.patch` request that replaces the content of an event with `event`.
///
/// The unused half of `start` and `end` is explicitly cleared, so that an event can switch between all-day and timed.
pub fn patch_body(event: &MappedEvent) -> Value {
    let range = event.time_range();
    let (start, end) = match range {
        EventTimeRange::AllDay { .. } => (
            json!({ "date": range.start_string(), "dateTime": null, "timeZone": null }),
            json!({ "date": range.end_string(), "dateTime": null, "timeZone": null }),
        ),
        EventTimeRange::Timed { .. } => (
            json!({ "date": null, "dateTime": range.start_string() }),
            json!({ "date": null, "dateTime": range.end_string() }),
        ),
    };

    json!({
        "summary": event.summary(),
        "description": event.description(),
        "start": start,
        "end": end,
    })
}

fn event_date_times(range: &EventTimeRange) -> (EventDateTime, EventDateTime) {
    match range {
        EventTimeRange::AllDay { .. } => (
            EventDateTime { date: Some(range.start_string()), ..EventDateTime::default() },
            EventDateTime { date: Some(range.end_string()), ..EventDateTime::default() },
        ),
        EventTimeRange::Timed { .. } => (
            EventDateTime { date_time: Some(range.start_string()), ..EventDateTime::default() },
            EventDateTime { date_time: Some(range.end_string()), ..EventDateTime::default() },
        ),
    }
}

fn parse_time_range(start: &EventDateTime, end: &EventDateTime) -> Option<EventTimeRange> {
    if let (Some(start), Some(end)) = (&start.date, &end.date) {
        return Some(EventTimeRange::AllDay {
            start: NaiveDate::parse_from_str(start, "%Y-%m-%d").ok()?,
            end: NaiveDate::parse_from_str(end, "%Y-%m-%d").ok()?,
        });
    }
    if let (Some(start), Some(end)) = (&start.date_time, &end.date_time) {
        return Some(EventTimeRange::Timed {
            start: DateTime::parse_from_rfc3339(start).ok()?,
            end: DateTime::parse_from_rfc3339(end).ok()?,
        });
    }
    None
}
