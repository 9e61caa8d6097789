//! Conversion of source records into target-ready events

use chrono_tz::Tz;
use serde_json::Value;
use thiserror::Error;

use crate::config::{self, DEFAULT_TITLE, DESCRIPTION_PREFIX};
use crate::event::{ExternalKey, MappedEvent};
use crate::record::{DateSpec, SourceRecord};
use crate::time::{self, NormalizeError};

/// What mapping a single record produced, when it did not fail
#[derive(Clone, Debug, PartialEq)]
pub enum RecordOutcome {
    Mapped(MappedEvent),
    /// The record has no usable date: nothing should be scheduled for it
    Skipped(NormalizeError),
}

/// The record is structurally invalid. It is counted and excluded from the run.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum MappingError {
    #[error("record has no identifier")]
    MissingId,
    #[error("malformed title property {property:?}: {reason}")]
    MalformedTitle { property: String, reason: String },
    #[error("malformed date property {property:?}: {reason}")]
    MalformedDate { property: String, reason: String },
}

/// How records are read
#[derive(Clone, Debug)]
pub struct MappingOptions {
    /// Properties that may carry the title, by order of preference.
    /// Any other `title` property is used when none of them has a non-empty value.
    pub title_properties: Vec<String>,
    pub date_property: String,
    pub default_title: String,
    pub description_prefix: String,
    /// Zone of the timestamps that carry neither an offset nor a zone
    pub default_time_zone: Tz,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            title_properties: vec![String::from("Name"), String::from("Title")],
            date_property: String::from("Date"),
            default_title: config::current(&DEFAULT_TITLE),
            description_prefix: config::current(&DESCRIPTION_PREFIX),
            default_time_zone: Tz::UTC,
        }
    }
}

/// Convert one record into an event.
///
/// The external key of the resulting event is always the record id.
pub fn map_record(record: &SourceRecord, options: &MappingOptions) -> Result<RecordOutcome, MappingError> {
    if record.id().trim().is_empty() {
        return Err(MappingError::MissingId);
    }

    let spec = match extract_date(record, &options.date_property)? {
        None => return Ok(RecordOutcome::Skipped(NormalizeError::MissingStart)),
        Some(spec) => spec,
    };
    let time_range = match time::normalize(&spec, options.default_time_zone) {
        Err(err) => return Ok(RecordOutcome::Skipped(err)),
        Ok(range) => range,
    };

    let summary = extract_title(record, &options.title_properties)?
        .unwrap_or_else(|| options.default_title.clone());
    let description = format!("{}{}", options.description_prefix, record.url());

    Ok(RecordOutcome::Mapped(MappedEvent::new(
        ExternalKey::from(record.id()),
        summary,
        description,
        time_range,
    )))
}

/// Returns the first non-empty title, or `None` if no title property has any text
fn extract_title(record: &SourceRecord, preferred: &[String]) -> Result<Option<String>, MappingError> {
    for name in preferred {
        if let Some(value) = record.property(name) {
            if let Some(title) = title_text(name, value)? {
                return Ok(Some(title));
            }
        }
    }

    for (name, value) in record.properties() {
        if preferred.contains(name) || property_type(value) != Some("title") {
            continue;
        }
        if let Some(title) = title_text(name, value)? {
            return Ok(Some(title));
        }
    }

    Ok(None)
}

/// Read the text of a `title` property. Properties of other types carry no title.
fn title_text(name: &str, value: &Value) -> Result<Option<String>, MappingError> {
    let malformed = |reason: &str| MappingError::MalformedTitle { property: name.to_string(), reason: reason.to_string() };

    if property_type(value) != Some("title") {
        return Ok(None);
    }
    let segments = match value.get("title") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(segments)) => segments,
        Some(_) => return Err(malformed("expected a list of rich text segments")),
    };

    let mut text = String::new();
    for segment in segments {
        match segment.get("plain_text") {
            Some(Value::String(s)) => text.push_str(s),
            Some(Value::Null) | None if segment.is_object() => continue,
            _ => return Err(malformed("rich text segment without plain text")),
        }
    }

    let text = text.trim();
    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(text.to_string()))
    }
}

/// Read the date property. `None` means the record has no date at all.
fn extract_date(record: &SourceRecord, property: &str) -> Result<Option<DateSpec>, MappingError> {
    let malformed = |reason: &str| MappingError::MalformedDate { property: property.to_string(), reason: reason.to_string() };

    let value = match record.property(property) {
        None => return Ok(None),
        Some(value) => value,
    };
    if property_type(value) != Some("date") {
        return Err(malformed("not a date property"));
    }

    let date = match value.get("date") {
        None | Some(Value::Null) => return Ok(None),
        Some(date) if date.is_object() => date,
        Some(_) => return Err(malformed("expected an object")),
    };

    Ok(Some(DateSpec {
        start: optional_string(property, date, "start")?,
        end: optional_string(property, date, "end")?,
        time_zone: optional_string(property, date, "time_zone")?,
    }))
}

/// Read a string field of the `date` object of `property`
fn optional_string(property: &str, object: &Value, field: &str) -> Result<Option<String>, MappingError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(MappingError::MalformedDate {
            property: property.to_string(),
            reason: format!("{} is not a string", field),
        }),
    }
}

fn property_type(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    use crate::event::EventTimeRange;

    fn mapped(outcome: RecordOutcome) -> MappedEvent {
        match outcome {
            RecordOutcome::Mapped(event) => event,
            other => panic!("Expected a mapped event, got {:?}", other),
        }
    }

    #[test]
    fn test_map_all_day_record() {
        let record = SourceRecord::new("page-a", "https://www.notion.so/page-a")
            .with_title("Name", "Team offsite")
            .with_date("Date", DateSpec::starting("2024-01-01"));

        let event = mapped(map_record(&record, &MappingOptions::default()).unwrap());
        assert_eq!(event.external_key().as_str(), "page-a");
        assert_eq!(event.summary(), "Team offsite");
        assert_eq!(event.description(), "Synced from Notion: https://www.notion.so/page-a");
        assert_eq!(event.time_range(), &EventTimeRange::AllDay {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        });
    }

    #[test]
    fn test_title_fallbacks() {
        let options = MappingOptions::default();

        // No title at all
        let record = SourceRecord::new("p", "u").with_date("Date", DateSpec::starting("2024-01-01"));
        assert_eq!(mapped(map_record(&record, &options).unwrap()).summary(), "Untitled Event");

        // An empty preferred title falls back to another title property
        let record = SourceRecord::new("p", "u")
            .with_title("Name", "   ")
            .with_title("Task", "From another column")
            .with_date("Date", DateSpec::starting("2024-01-01"));
        assert_eq!(mapped(map_record(&record, &options).unwrap()).summary(), "From another column");

        // Segments are concatenated
        let record = SourceRecord::new("p", "u")
            .with_raw_property("Name", json!({
                "type": "title",
                "title": [ {"plain_text": "Quarterly "}, {"plain_text": "review"} ],
            }))
            .with_date("Date", DateSpec::starting("2024-01-01"));
        assert_eq!(mapped(map_record(&record, &options).unwrap()).summary(), "Quarterly review");
    }

    #[test]
    fn test_custom_options() {
        let options = MappingOptions {
            date_property: String::from("When"),
            default_title: String::from("(no title)"),
            description_prefix: String::from("See "),
            default_time_zone: Tz::Europe__Paris,
            ..MappingOptions::default()
        };
        let record = SourceRecord::new("p", "https://n.so/p")
            .with_date("When", DateSpec::starting("2024-07-01T09:00:00"));

        let event = mapped(map_record(&record, &options).unwrap());
        assert_eq!(event.summary(), "(no title)");
        assert_eq!(event.description(), "See https://n.so/p");
        assert_eq!(event.time_range().start_string(), "2024-07-01T09:00:00+02:00");
    }

    #[test]
    fn test_skips() {
        let options = MappingOptions::default();

        let no_date_property = SourceRecord::new("b", "u").with_title("Name", "B");
        assert_eq!(map_record(&no_date_property, &options).unwrap(), RecordOutcome::Skipped(NormalizeError::MissingStart));

        let empty_date = SourceRecord::new("b", "u").with_raw_property("Date", json!({"type": "date", "date": null}));
        assert_eq!(map_record(&empty_date, &options).unwrap(), RecordOutcome::Skipped(NormalizeError::MissingStart));

        let garbage = SourceRecord::new("b", "u").with_date("Date", DateSpec::starting("soon"));
        assert!(matches!(map_record(&garbage, &options).unwrap(), RecordOutcome::Skipped(NormalizeError::Unparseable { .. })));
    }

    #[test]
    fn test_failures() {
        let options = MappingOptions::default();

        let no_id = SourceRecord::new("", "u").with_date("Date", DateSpec::starting("2024-01-01"));
        assert_eq!(map_record(&no_id, &options), Err(MappingError::MissingId));

        let bad_title = SourceRecord::new("c", "u")
            .with_raw_property("Name", json!({"type": "title", "title": "not a list"}))
            .with_date("Date", DateSpec::starting("2024-01-01"));
        assert!(matches!(map_record(&bad_title, &options), Err(MappingError::MalformedTitle { .. })));

        let bad_segment = SourceRecord::new("c", "u")
            .with_raw_property("Name", json!({"type": "title", "title": [42]}))
            .with_date("Date", DateSpec::starting("2024-01-01"));
        assert!(matches!(map_record(&bad_segment, &options), Err(MappingError::MalformedTitle { .. })));

        let wrong_type = SourceRecord::new("c", "u").with_raw_property("Date", json!({"type": "number", "number": 3}));
        assert!(matches!(map_record(&wrong_type, &options), Err(MappingError::MalformedDate { .. })));

        let bad_start = SourceRecord::new("c", "u").with_raw_property("Date", json!({"type": "date", "date": {"start": 20240101}}));
        assert!(matches!(map_record(&bad_start, &options), Err(MappingError::MalformedDate { .. })));

        let bad_zone = SourceRecord::new("c", "u").with_raw_property("Date", json!({"type": "date", "date": {"start": "2024-01-01", "time_zone": 1}}));
        assert_eq!(map_record(&bad_zone, &options), Err(MappingError::MalformedDate {
            property: "Date".to_string(),
            reason: "time_zone is not a string".to_string(),
        }));
    }
}
