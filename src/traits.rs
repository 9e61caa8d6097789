//! The seams between the reconciliation engine and the stores it syncs

use async_trait::async_trait;

use crate::error::SyncError;
use crate::event::{MappedEvent, TargetEvent};
use crate::record::SourceRecord;

/// The source of truth (usually a Notion database)
#[async_trait]
pub trait RecordSource {
    /// Returns a snapshot of every record this source contains, in the source order.
    /// Paging through the store is up to the implementor.
    ///
    /// Failing here aborts the sync run.
    async fn list_records(&mut self) -> Result<Vec<SourceRecord>, SyncError>;
}

/// The calendar that mirrors the source (usually a Google calendar)
#[async_trait]
pub trait EventTarget {
    /// Establish or check the connection to the calendar.
    /// This is called before any other method, and failing here aborts the sync run.
    async fn connect(&mut self) -> Result<(), SyncError> {
        Ok(())
    }

    /// Returns the events of the calendar.
    ///
    /// Implementors may return events that are not managed by this system (they are ignored),
    /// but must not omit any managed one.
    async fn list_managed_events(&mut self) -> Result<Vec<TargetEvent>, SyncError>;

    /// Insert a new event stamped with the external key of `event`
    async fn create_event(&mut self, event: &MappedEvent) -> Result<TargetEvent, SyncError>;

    /// Replace the content of an existing event. Its id and external key are left untouched.
    async fn update_event(&mut self, id: &str, event: &MappedEvent) -> Result<(), SyncError>;

    async fn delete_event(&mut self, id: &str) -> Result<(), SyncError>;
}
