//! The set of calendar changes that converges a target to its source

use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use crate::event::{ExternalKey, MappedEvent};
use crate::provider::target_index::TargetIndex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteReason {
    /// The source record of this event is gone
    Orphan,
    /// Another event already carries the same key
    Duplicate,
}

/// A single change to apply to the target calendar
#[derive(Clone, Debug, PartialEq)]
pub enum SyncAction {
    Create(MappedEvent),
    Update { target_id: String, event: MappedEvent },
    /// The event already shows the content of its source record
    Unchanged { target_id: String, key: ExternalKey },
    Delete { target_id: String, key: ExternalKey, summary: String, reason: DeleteReason },
}

impl SyncAction {
    pub fn key(&self) -> &ExternalKey {
        match self {
            SyncAction::Create(event) => event.external_key(),
            SyncAction::Update { event, .. } => event.external_key(),
            SyncAction::Unchanged { key, .. } => key,
            SyncAction::Delete { key, .. } => key,
        }
    }

    /// Whether applying this action needs a call to the calendar
    pub fn is_mutation(&self) -> bool {
        matches!(self, SyncAction::Create(_) | SyncAction::Update { .. } | SyncAction::Delete { .. })
    }
}

impl Display for SyncAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            SyncAction::Create(event) => write!(f, "create  {} \"{}\" [{}]", event.external_key(), event.summary(), event.time_range()),
            SyncAction::Update { target_id, event } => write!(f, "update  {} \"{}\" [{}] (event {})", event.external_key(), event.summary(), event.time_range(), target_id),
            SyncAction::Unchanged { target_id, key } => write!(f, "keep    {} (event {})", key, target_id),
            SyncAction::Delete { target_id, key, summary, reason } => {
                let why = match reason {
                    DeleteReason::Orphan => "no longer in the source",
                    DeleteReason::Duplicate => "duplicate",
                };
                write!(f, "delete  {} \"{}\" (event {}, {})", key, summary, target_id, why)
            },
        }
    }
}


/// The ordered list of actions of a sync run.
///
/// Creations and updates follow the order of the source records. Deletions come last.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncPlan {
    actions: Vec<SyncAction>,
    /// Source records dropped because an earlier record had the same id
    duplicate_records: usize,
    /// Orphans left in the calendar because orphan deletion is disabled
    kept_orphans: usize,
    /// Events left as they are because their record is still in the source, but could not be mapped
    kept_unmapped: usize,
}

impl SyncPlan {
    /// Diff the mapped source records against the current managed events of the calendar.
    ///
    /// `source_keys` holds the id of every record of the source snapshot, mapped or not.
    /// Only events whose key is missing from it are orphans.
    pub fn compute(mapped: Vec<MappedEvent>, source_keys: &HashSet<ExternalKey>, mut index: TargetIndex, delete_orphans: bool) -> Self {
        let mut plan = Self::default();
        let mut seen: HashSet<ExternalKey> = HashSet::new();

        for event in mapped {
            if seen.insert(event.external_key().clone()) == false {
                log::warn!("Several source records have the id {}. Only the first one is synced.", event.external_key());
                plan.duplicate_records += 1;
                continue;
            }

            match index.take(event.external_key()) {
                None => {
                    log::debug!("*   {} is a new record", event.external_key());
                    plan.actions.push(SyncAction::Create(event));
                },
                Some(stored) if event.is_reflected_by(&stored) => {
                    log::trace!("*   {} is up to date", event.external_key());
                    plan.actions.push(SyncAction::Unchanged { target_id: stored.id().to_string(), key: event.external_key().clone() });
                },
                Some(stored) => {
                    log::debug!("*   {} has changed", event.external_key());
                    plan.actions.push(SyncAction::Update { target_id: stored.id().to_string(), event });
                },
            }
        }

        let (mut orphans, duplicates) = index.into_parts();
        // Orphans are deleted in key order
        orphans.sort_by(|l, r| l.managed_key().cmp(&r.managed_key()));

        for orphan in orphans {
            let key = match orphan.managed_key() {
                Some(key) => key.clone(),
                None => continue,
            };
            if source_keys.contains(&key) {
                log::debug!("Keeping event {} ({}): its record has no usable content this time", orphan.id(), key);
                plan.kept_unmapped += 1;
                continue;
            }
            if delete_orphans == false {
                log::info!("Keeping event {} ({}) although its source record is gone", orphan.id(), key);
                plan.kept_orphans += 1;
                continue;
            }
            log::debug!("#   {} is an orphan", key);
            plan.actions.push(SyncAction::Delete {
                target_id: orphan.id().to_string(),
                key,
                summary: orphan.summary().to_string(),
                reason: DeleteReason::Orphan,
            });
        }

        for duplicate in duplicates {
            let key = match duplicate.managed_key() {
                Some(key) => key.clone(),
                None => continue,
            };
            log::debug!("#   {} has a duplicate event {}", key, duplicate.id());
            plan.actions.push(SyncAction::Delete {
                target_id: duplicate.id().to_string(),
                key,
                summary: duplicate.summary().to_string(),
                reason: DeleteReason::Duplicate,
            });
        }

        plan
    }

    pub fn actions(&self) -> &[SyncAction] {
        &self.actions
    }

    pub fn into_actions(self) -> Vec<SyncAction> {
        self.actions
    }

    pub fn duplicate_records(&self) -> usize {
        self.duplicate_records
    }

    pub fn kept_orphans(&self) -> usize {
        self.kept_orphans
    }

    pub fn kept_unmapped(&self) -> usize {
        self.kept_unmapped
    }

    /// Number of calls to the calendar needed to apply this plan
    pub fn mutation_count(&self) -> usize {
        self.actions.iter().filter(|action| action.is_mutation()).count()
    }

    pub fn is_noop(&self) -> bool {
        self.mutation_count() == 0
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::event::{EventTimeRange, TargetEvent};

    fn day(d: u32) -> EventTimeRange {
        EventTimeRange::AllDay {
            start: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, d + 1).unwrap(),
        }
    }

    fn mapped(key: &str, summary: &str, d: u32) -> MappedEvent {
        MappedEvent::new(ExternalKey::from(key), summary.to_string(), format!("Synced from Notion: {}", key), day(d))
    }

    fn stored(id: &str, event: &MappedEvent) -> TargetEvent {
        TargetEvent::from_mapped(id.to_string(), event)
    }

    fn keys(keys: &[&str]) -> HashSet<ExternalKey> {
        keys.iter().map(|key| ExternalKey::from(*key)).collect()
    }

    #[test]
    fn test_empty_target() {
        let plan = SyncPlan::compute(vec![mapped("A", "a", 1), mapped("B", "b", 2)], &keys(&["A", "B"]), TargetIndex::default(), true);
        let keys: Vec<&str> = plan.actions().iter().map(|a| a.key().as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert!(plan.actions().iter().all(|a| matches!(a, SyncAction::Create(_))));
        assert_eq!(plan.mutation_count(), 2);
    }

    #[test]
    fn test_three_way_diff() {
        let a = mapped("A", "a", 1);
        let b = mapped("B", "b", 2);
        let b_renamed = mapped("B", "b, renamed", 2);
        let c = mapped("C", "c", 3);
        let unmanaged = TargetEvent::new("evt-x".to_string(), None, "Dentist".to_string(), None, Some(day(9)));

        let index = TargetIndex::build(vec![stored("evt-a", &a), stored("evt-b", &b), stored("evt-c", &c), unmanaged]);
        let plan = SyncPlan::compute(vec![a.clone(), b_renamed.clone(), mapped("D", "d", 4)], &keys(&["A", "B", "D"]), index, true);

        assert_eq!(plan.actions(), &[
            SyncAction::Unchanged { target_id: "evt-a".to_string(), key: ExternalKey::from("A") },
            SyncAction::Update { target_id: "evt-b".to_string(), event: b_renamed },
            SyncAction::Create(mapped("D", "d", 4)),
            SyncAction::Delete { target_id: "evt-c".to_string(), key: ExternalKey::from("C"), summary: "c".to_string(), reason: DeleteReason::Orphan },
        ]);
        assert_eq!(plan.mutation_count(), 3);
    }

    #[test]
    fn test_unchanged_source_is_noop() {
        let a = mapped("A", "a", 1);
        let index = TargetIndex::build(vec![stored("evt-a", &a)]);
        let plan = SyncPlan::compute(vec![a], &keys(&["A"]), index, true);
        assert!(plan.is_noop());
    }

    #[test]
    fn test_duplicates_are_deleted() {
        let a = mapped("A", "a", 1);
        let index = TargetIndex::build(vec![stored("evt-1", &a), stored("evt-2", &a)]);
        let plan = SyncPlan::compute(vec![a], &keys(&["A"]), index, true);

        assert_eq!(plan.actions().len(), 2);
        assert!(matches!(&plan.actions()[0], SyncAction::Unchanged { target_id, .. } if target_id == "evt-1"));
        assert!(matches!(&plan.actions()[1], SyncAction::Delete { target_id, reason: DeleteReason::Duplicate, .. } if target_id == "evt-2"));
    }

    #[test]
    fn test_keep_orphans() {
        let a = mapped("A", "a", 1);
        let index = TargetIndex::build(vec![stored("evt-a", &a), stored("evt-a2", &a)]);
        let plan = SyncPlan::compute(Vec::new(), &keys(&[]), index, false);

        // Duplicates are removed even when orphans are kept
        assert_eq!(plan.kept_orphans(), 1);
        assert_eq!(plan.actions().len(), 1);
        assert!(matches!(&plan.actions()[0], SyncAction::Delete { target_id, reason: DeleteReason::Duplicate, .. } if target_id == "evt-a2"));
    }

    #[test]
    fn test_duplicate_source_records() {
        let plan = SyncPlan::compute(vec![mapped("A", "first", 1), mapped("A", "second", 2)], &keys(&["A"]), TargetIndex::default(), true);
        assert_eq!(plan.duplicate_records(), 1);
        assert_eq!(plan.actions(), &[SyncAction::Create(mapped("A", "first", 1))]);
    }

    #[test]
    fn test_unmapped_records_keep_their_event() {
        let a = mapped("A", "a", 1);
        let b = mapped("B", "b", 2);
        let index = TargetIndex::build(vec![stored("evt-a", &a), stored("evt-a2", &a), stored("evt-b", &b)]);

        // A is still in the source, but was not mapped this time
        let plan = SyncPlan::compute(vec![b], &keys(&["A", "B"]), index, true);
        assert_eq!(plan.kept_unmapped(), 1);
        assert_eq!(plan.actions(), &[
            SyncAction::Unchanged { target_id: "evt-b".to_string(), key: ExternalKey::from("B") },
            SyncAction::Delete { target_id: "evt-a2".to_string(), key: ExternalKey::from("A"), summary: "a".to_string(), reason: DeleteReason::Duplicate },
        ]);
    }
}
