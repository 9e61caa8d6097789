//! Records read from the source store (a Notion database)

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A page of the source database, as it was returned by the last query.
///
/// Its properties are kept in their raw JSON shape: checking their structure is the job of the [`mapper`](crate::mapper).
/// This system never modifies a `SourceRecord`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Stable identifier of the page, used as the external key
    id: String,
    /// Link back to the page
    #[serde(default)]
    url: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

impl SourceRecord {
    pub fn new<S: ToString, U: ToString>(id: S, url: U) -> Self {
        Self { id: id.to_string(), url: url.to_string(), properties: Map::new() }
    }

    pub fn with_properties(id: String, url: String, properties: Map<String, Value>) -> Self {
        Self { id, url, properties }
    }

    pub fn id(&self) -> &str    { &self.id  }
    pub fn url(&self) -> &str   { &self.url }
    pub fn properties(&self) -> &Map<String, Value> { &self.properties }
    pub fn property(&self, name: &str) -> Option<&Value> { self.properties.get(name) }

    /// Add a `title` property made of a single plain-text segment
    pub fn with_title(mut self, property: &str, title: &str) -> Self {
        self.properties.insert(property.to_string(), json!({
            "type": "title",
            "title": [ { "type": "text", "plain_text": title } ],
        }));
        self
    }

    /// Add a `date` property
    pub fn with_date(mut self, property: &str, spec: DateSpec) -> Self {
        self.properties.insert(property.to_string(), json!({
            "type": "date",
            "date": spec,
        }));
        self
    }

    /// Add a property with an arbitrary JSON value
    pub fn with_raw_property(mut self, property: &str, value: Value) -> Self {
        self.properties.insert(property.to_string(), value);
        self
    }
}


/// A raw date specification, in the shape a Notion `date` property uses.
///
/// `start` and `end` are either date-only tokens (`2024-03-01`) or timestamps (`2024-03-01T09:00:00.000+01:00`).
/// `time_zone` is an IANA zone name that applies to timestamps without an offset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DateSpec {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

impl DateSpec {
    pub fn starting<S: ToString>(start: S) -> Self {
        Self { start: Some(start.to_string()), end: None, time_zone: None }
    }

    pub fn between<S: ToString, E: ToString>(start: S, end: E) -> Self {
        Self { start: Some(start.to_string()), end: Some(end.to_string()), time_zone: None }
    }

    pub fn in_zone<Z: ToString>(mut self, time_zone: Z) -> Self {
        self.time_zone = Some(time_zone.to_string());
        self
    }
}
