//! In-memory record source and event target
//!
//! They are used by the integration tests, possibly with a [`MockBehaviour`] to make some calls fail,
//! and by the command-line tool to read records from a JSON dump instead of a live database.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::SyncError;
use crate::event::{ExternalKey, MappedEvent, TargetEvent};
use crate::mock_behaviour::MockBehaviour;
use crate::record::SourceRecord;
use crate::traits::{EventTarget, RecordSource};


/// A record source backed by a list of records
#[derive(Debug, Default)]
pub struct MemorySource {
    records: Vec<SourceRecord>,
    mock_behaviour: Option<Arc<Mutex<MockBehaviour>>>,
}

/// Supported shapes of record dumps
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordDump {
    /// The body of a Notion database query
    QueryResponse { results: Vec<SourceRecord> },
    List(Vec<SourceRecord>),
}

impl MemorySource {
    pub fn new(records: Vec<SourceRecord>) -> Self {
        Self { records, mock_behaviour: None }
    }

    /// Load records from a JSON file, either a list of pages or the body of a database query
    pub fn from_file(path: &Path) -> Result<Self, SyncError> {
        let file = std::fs::File::open(path)
            .map_err(|err| SyncError::source_unavailable(format!("Unable to open file {:?}: {}", path, err)))?;
        let dump: RecordDump = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|err| SyncError::source_unavailable(format!("Unable to read records from {:?}: {}", path, err)))?;

        let records = match dump {
            RecordDump::QueryResponse { results } => results,
            RecordDump::List(records) => records,
        };
        Ok(Self::new(records))
    }

    pub fn set_mock_behaviour(&mut self, mock_behaviour: Option<Arc<Mutex<MockBehaviour>>>) {
        self.mock_behaviour = mock_behaviour;
    }

    pub fn records(&self) -> &[SourceRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut Vec<SourceRecord> {
        &mut self.records
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn list_records(&mut self) -> Result<Vec<SourceRecord>, SyncError> {
        check_behaviour(&self.mock_behaviour, MockBehaviour::can_list_records)?;
        Ok(self.records.clone())
    }
}


/// A calendar that lives in memory.
///
/// Events are listed in the order they were inserted.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    events: Vec<TargetEvent>,
    mock_behaviour: Option<Arc<Mutex<MockBehaviour>>>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<TargetEvent>) -> Self {
        Self { events, mock_behaviour: None }
    }

    pub fn set_mock_behaviour(&mut self, mock_behaviour: Option<Arc<Mutex<MockBehaviour>>>) {
        self.mock_behaviour = mock_behaviour;
    }

    /// Store an event as is, e.g. one that was not created by this system
    pub fn insert(&mut self, event: TargetEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[TargetEvent] {
        &self.events
    }

    pub fn get(&self, id: &str) -> Option<&TargetEvent> {
        self.events.iter().find(|event| event.id() == id)
    }

    /// Every event that carries `key`. There should never be more than one.
    pub fn events_for_key(&self, key: &ExternalKey) -> Vec<&TargetEvent> {
        self.events.iter()
            .filter(|event| event.managed_key() == Some(key))
            .collect()
    }

    fn position(&self, id: &str) -> Result<usize, SyncError> {
        self.events.iter()
            .position(|event| event.id() == id)
            .ok_or_else(|| SyncError::target_unavailable(format!("No event with id {}", id)))
    }
}

#[async_trait]
impl EventTarget for MemoryTarget {
    async fn connect(&mut self) -> Result<(), SyncError> {
        check_behaviour(&self.mock_behaviour, MockBehaviour::can_connect)
    }

    async fn list_managed_events(&mut self) -> Result<Vec<TargetEvent>, SyncError> {
        check_behaviour(&self.mock_behaviour, MockBehaviour::can_list_managed_events)?;
        Ok(self.events.clone())
    }

    async fn create_event(&mut self, event: &MappedEvent) -> Result<TargetEvent, SyncError> {
        check_behaviour(&self.mock_behaviour, MockBehaviour::can_create_event)?;
        let id = uuid::Uuid::new_v4().to_hyphenated().to_string();
        let created = TargetEvent::from_mapped(id, event);
        self.events.push(created.clone());
        Ok(created)
    }

    async fn update_event(&mut self, id: &str, event: &MappedEvent) -> Result<(), SyncError> {
        check_behaviour(&self.mock_behaviour, MockBehaviour::can_update_event)?;
        let position = self.position(id)?;
        self.events[position].apply(event);
        Ok(())
    }

    async fn delete_event(&mut self, id: &str) -> Result<(), SyncError> {
        check_behaviour(&self.mock_behaviour, MockBehaviour::can_delete_event)?;
        let position = self.position(id)?;
        self.events.remove(position);
        Ok(())
    }
}


fn check_behaviour<F>(mock_behaviour: &Option<Arc<Mutex<MockBehaviour>>>, check: F) -> Result<(), SyncError>
where
    F: FnOnce(&mut MockBehaviour) -> Result<(), SyncError>,
{
    match mock_behaviour {
        None => Ok(()),
        Some(behaviour) => match behaviour.lock() {
            Ok(mut guard) => check(&mut guard),
            Err(poisoned) => check(&mut poisoned.into_inner()),
        },
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DateSpec;

    #[tokio::test]
    async fn test_from_file() {
        let path = std::env::temp_dir().join(format!("records-{}.json", uuid::Uuid::new_v4()));
        let body = serde_json::json!({
            "object": "list",
            "results": [
                SourceRecord::new("a", "https://n.so/a").with_title("Name", "A").with_date("Date", DateSpec::starting("2024-01-01")),
                SourceRecord::new("b", "https://n.so/b"),
            ],
            "has_more": false,
        });
        std::fs::write(&path, body.to_string()).unwrap();

        let mut source = MemorySource::from_file(&path).unwrap();
        let records = source.list_records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id(), "a");
        assert_eq!(records[1].url(), "https://n.so/b");

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(MemorySource::from_file(&path), Err(SyncError::SourceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_missing_event() {
        let mut target = MemoryTarget::new();
        assert!(matches!(target.delete_event("nope").await, Err(SyncError::TargetUnavailable(_))));
    }
}
