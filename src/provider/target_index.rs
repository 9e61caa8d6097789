//! Index of the managed events of a target calendar, by external key

use std::collections::HashMap;

use crate::event::{ExternalKey, TargetEvent};

/// The managed events of a calendar, keyed by their external key.
///
/// Calendars should hold at most one event per key. When a previous run went wrong and left several,
/// the first one listed is kept in the index and the others are reported as [`duplicates`](Self::duplicates).
#[derive(Clone, Debug, Default)]
pub struct TargetIndex {
    events: HashMap<ExternalKey, TargetEvent>,
    duplicates: Vec<TargetEvent>,
}

impl TargetIndex {
    /// Build an index from the events of a calendar. Unmanaged events are left out.
    pub fn build<I: IntoIterator<Item = TargetEvent>>(events: I) -> Self {
        let mut index = Self::default();

        for event in events {
            let key = match event.managed_key() {
                None => continue,
                Some(key) => key.clone(),
            };

            if index.events.contains_key(&key) {
                log::warn!("Calendar holds several events for key {} (found {} again). The surplus will be deleted.", key, event.id());
                index.duplicates.push(event);
            } else {
                index.events.insert(key, event);
            }
        }

        index
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, key: &ExternalKey) -> Option<&TargetEvent> {
        self.events.get(key)
    }

    /// Remove an entry, so that it is no longer considered an orphan
    pub fn take(&mut self, key: &ExternalKey) -> Option<TargetEvent> {
        self.events.remove(key)
    }

    /// Events that share their key with an event listed earlier
    pub fn duplicates(&self) -> &[TargetEvent] {
        &self.duplicates
    }

    /// Consume the index. Returns the events still indexed, then the duplicates.
    pub fn into_parts(self) -> (Vec<TargetEvent>, Vec<TargetEvent>) {
        (self.events.into_iter().map(|(_, event)| event).collect(), self.duplicates)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, key: Option<&str>) -> TargetEvent {
        TargetEvent::new(id.to_string(), key.map(ExternalKey::from), format!("Event {}", id), None, None)
    }

    #[test]
    fn test_index_skips_unmanaged_events() {
        let index = TargetIndex::build(vec![
            event("1", Some("A")),
            event("2", None),
            event("3", Some("B")),
        ]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.get(&ExternalKey::from("A")).map(|e| e.id()), Some("1"));
        assert_eq!(index.get(&ExternalKey::from("B")).map(|e| e.id()), Some("3"));
        assert!(index.duplicates().is_empty());
    }

    #[test]
    fn test_first_listed_event_is_canonical() {
        let index = TargetIndex::build(vec![
            event("1", Some("A")),
            event("2", Some("A")),
            event("3", Some("A")),
        ]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&ExternalKey::from("A")).map(|e| e.id()), Some("1"));
        let duplicate_ids: Vec<&str> = index.duplicates().iter().map(|e| e.id()).collect();
        assert_eq!(duplicate_ids, vec!["2", "3"]);
    }

    #[test]
    fn test_take() {
        let mut index = TargetIndex::build(vec![event("1", Some("A")), event("2", Some("B"))]);
        assert_eq!(index.take(&ExternalKey::from("A")).map(|e| e.id().to_string()), Some("1".to_string()));
        assert!(index.take(&ExternalKey::from("A")).is_none());

        let (remaining, duplicates) = index.into_parts();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id(), "2");
        assert!(duplicates.is_empty());
    }
}
