//! This module reconciles a target calendar with its source of truth
//!
//! A run reads every source record, maps it to an event, diffs these events against the managed events
//! of the calendar (by external key) and applies the resulting creations, updates and deletions.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::SyncError;
use crate::event::{ExternalKey, MappedEvent};
use crate::mapper::{self, MappingOptions, RecordOutcome};
use crate::record::SourceRecord;
use crate::traits::{EventTarget, RecordSource};

pub mod plan;
pub mod sync_progress;
pub mod target_index;
use plan::{SyncAction, SyncPlan};
use sync_progress::{FeedbackSender, SyncEvent, SyncProgress, SyncSummary};
use target_index::TargetIndex;

/// Policies of a sync run
#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// Delete managed events whose source record is gone
    pub delete_orphans: bool,
    /// Sync even when the source returns no records at all.
    /// When this is false, an empty source is treated as "nothing to sync" rather than "delete everything".
    /// In that case, removing the last record of the source leaves its event in the calendar: orphans are only
    /// deleted while at least one record remains.
    pub allow_empty_source: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { delete_orphans: true, allow_empty_source: false }
    }
}


/// A reconciliation engine between a [`RecordSource`] and an [`EventTarget`].
///
/// Usually, the source is a [`NotionSource`](crate::notion::NotionSource) and the target a
/// [`GoogleCalendarTarget`](crate::google::GoogleCalendarTarget).
/// Tests use [`MemorySource`](crate::memory::MemorySource) and [`MemoryTarget`](crate::memory::MemoryTarget) instead.
///
/// A run is stateless: everything it needs is read again from both ends. Running two syncs at the same time against the same
/// calendar may create the same event twice, this is up to the caller to prevent.
pub struct Reconciler<S, T>
where
    S: RecordSource + Send,
    T: EventTarget + Send,
{
    source: S,
    target: T,
    options: SyncOptions,
    mapping: MappingOptions,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl<S, T> Reconciler<S, T>
where
    S: RecordSource + Send,
    T: EventTarget + Send,
{
    /// Create a reconciler with the default options
    pub fn new(source: S, target: T) -> Self {
        Self {
            source, target,
            options: SyncOptions::default(),
            mapping: MappingOptions::default(),
            cancel_flag: None,
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_mapping_options(mut self, mapping: MappingOptions) -> Self {
        self.mapping = mapping;
        self
    }

    /// Once `flag` is set, the current run stops before its next calendar call.
    /// Changes applied so far are kept.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    /// Returns the record source
    pub fn source(&self) -> &S { &self.source }
    /// Returns the record source
    pub fn source_mut(&mut self) -> &mut S { &mut self.source }
    /// Returns the target calendar
    pub fn target(&self) -> &T { &self.target }
    /// Returns the target calendar
    pub fn target_mut(&mut self) -> &mut T { &mut self.target }

    /// Performs a sync run, and provide feeedback to the user about the progress.
    ///
    /// Problems with single records or single calendar calls are logged (using the `log::*` macros) and counted in the
    /// returned summary: they never stop the run.
    /// An error is only returned if either end cannot be read at all, in which case the calendar is left untouched.
    pub async fn sync_with_feedback(&mut self, feedback_sender: FeedbackSender) -> Result<SyncSummary, SyncError> {
        let mut progress = SyncProgress::new_with_feedback_channel(feedback_sender);
        self.run_sync(&mut progress).await
    }

    /// Performs a sync run, without giving any feedback.
    ///
    /// See [`Self::sync_with_feedback`]
    pub async fn sync(&mut self) -> Result<SyncSummary, SyncError> {
        let mut progress = SyncProgress::new();
        self.run_sync(&mut progress).await
    }

    /// Compute what a sync run would do, without changing the calendar
    pub async fn plan(&mut self) -> Result<SyncPlan, SyncError> {
        let mut progress = SyncProgress::new();
        Ok(self.prepare(&mut progress).await?.unwrap_or_default())
    }

    async fn run_sync(&mut self, progress: &mut SyncProgress) -> Result<SyncSummary, SyncError> {
        progress.info("Starting a sync.");
        progress.feedback(SyncEvent::Started);

        let plan = match self.prepare(progress).await {
            Err(err) => {
                progress.error(&format!("Sync terminated because of an error: {}", err));
                progress.feedback(SyncEvent::Finished{ success: false });
                return Err(err);
            },
            Ok(None) => None,
            Ok(Some(plan)) => Some(plan),
        };

        if let Some(plan) = plan {
            self.apply(plan, progress).await;
        }

        progress.info("Sync ended");
        progress.feedback(SyncEvent::Finished{ success: progress.is_success() });
        Ok(progress.summary.clone())
    }

    /// Read both ends and diff them. Returns `None` when there is nothing to sync.
    async fn prepare(&mut self, progress: &mut SyncProgress) -> Result<Option<SyncPlan>, SyncError> {
        let records = self.source.list_records().await?;
        progress.info(&format!("Found {} source records", records.len()));
        if records.is_empty() && self.options.allow_empty_source == false {
            progress.warn("The source has no records, nothing to sync.");
            return Ok(None);
        }

        self.target.connect().await?;
        let events = self.target.list_managed_events().await?;
        let index = TargetIndex::build(events);
        progress.info(&format!("Found {} previously synced events", index.len()));

        let mapped = self.map_records(&records, progress);
        let source_keys: HashSet<ExternalKey> = records.iter()
            .map(|record| ExternalKey::from(record.id()))
            .collect();

        progress.debug("Finding the differences to sync...");
        let plan = SyncPlan::compute(mapped, &source_keys, index, self.options.delete_orphans);
        progress.summary.skipped += plan.duplicate_records();
        if plan.kept_unmapped() > 0 {
            progress.debug(&format!("{} events are kept as they are, since their record could not be mapped", plan.kept_unmapped()));
        }
        Ok(Some(plan))
    }

    fn map_records(&self, records: &[SourceRecord], progress: &mut SyncProgress) -> Vec<MappedEvent> {
        let mut mapped = Vec::with_capacity(records.len());
        progress.reset_counter();

        for record in records {
            progress.increment_counter(1);
            match mapper::map_record(record, &self.mapping) {
                Ok(RecordOutcome::Mapped(event)) => mapped.push(event),
                Ok(RecordOutcome::Skipped(reason)) => {
                    progress.debug(&format!("Skipping record {} without a valid date ({})", record.id(), reason));
                    progress.summary.skipped += 1;
                },
                Err(err) => {
                    progress.warn(&format!("Unable to map record {}: {}", record.id(), err));
                    progress.summary.failed_to_map += 1;
                },
            }
        }

        progress.feedback(SyncEvent::InProgress{
            phase: "mapping".to_string(),
            items_done_already: progress.counter(),
            details: format!("{} events to sync", mapped.len()),
        });
        mapped
    }

    async fn apply(&mut self, plan: SyncPlan, progress: &mut SyncProgress) {
        progress.trace("Committing changes...");
        progress.reset_counter();

        for action in plan.into_actions() {
            if progress.summary.cancelled {
                // Only the events that need no change are still counted
                if let SyncAction::Unchanged { .. } = action {
                    progress.summary.unchanged += 1;
                }
                continue;
            }
            if action.is_mutation() && self.is_cancelled() {
                progress.warn("Sync cancelled, the remaining changes will be applied at next sync.");
                progress.summary.cancelled = true;
                continue;
            }

            let details = action.key().to_string();
            match action {
                SyncAction::Unchanged { .. } => {
                    progress.summary.unchanged += 1;
                    continue;
                },
                SyncAction::Create(event) => {
                    progress.debug(&format!("> Creating event for {}", event.external_key()));
                    match self.target.create_event(&event).await {
                        Err(err) => {
                            progress.error(&format!("Unable to create event for {}: {}", event.external_key(), err));
                            progress.summary.failed += 1;
                        },
                        Ok(created) => {
                            if created.managed_key() != Some(event.external_key()) {
                                progress.error(&format!("Event {} was created without its key {}. It will not be found by the next syncs.", created.id(), event.external_key()));
                            }
                            progress.info(&format!("Created event: {}", event.summary()));
                            progress.summary.created += 1;
                        },
                    }
                },
                SyncAction::Update { target_id, event } => {
                    progress.debug(&format!("> Updating event {} for {}", target_id, event.external_key()));
                    match self.target.update_event(&target_id, &event).await {
                        Err(err) => {
                            progress.error(&format!("Unable to update event {} for {}: {}", target_id, event.external_key(), err));
                            progress.summary.failed += 1;
                        },
                        Ok(()) => {
                            progress.info(&format!("Updated event: {}", event.summary()));
                            progress.summary.updated += 1;
                        },
                    }
                },
                SyncAction::Delete { target_id, key, summary, reason } => {
                    progress.debug(&format!("> Deleting event {} for {} ({:?})", target_id, key, reason));
                    match self.target.delete_event(&target_id).await {
                        Err(err) => {
                            progress.error(&format!("Unable to delete event {} for {}: {}", target_id, key, err));
                            progress.summary.failed += 1;
                        },
                        Ok(()) => {
                            progress.info(&format!("Deleted event: {}", summary));
                            progress.summary.deleted += 1;
                        },
                    }
                },
            }

            progress.increment_counter(1);
            progress.feedback(SyncEvent::InProgress{
                phase: "applying".to_string(),
                items_done_already: progress.counter(),
                details,
            });
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}
