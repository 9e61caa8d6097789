//! This crate keeps a calendar in sync with a database of records.
//!
//! Every record of a [`RecordSource`](traits::RecordSource) (usually a Notion database, see the [`notion`] module) that has a
//! date becomes an event of an [`EventTarget`](traits::EventTarget) (usually a Google Calendar, see the [`google`] module). \
//! Events created this way carry the id of their record, so that later runs update or delete them instead of creating them again.
//! Events of the calendar that do not carry such an id are never touched.
//!
//! A sync run is driven by a [`Reconciler`](provider::Reconciler). \
//! Records are converted by the [`mapper`] module, whose date handling lives in [`time`].
//! The [`memory`] module provides in-memory ends, that are used by the tests and to replay a JSON dump of records.

pub mod traits;
pub mod error;
pub use error::SyncError;
pub mod config;

pub mod record;
pub use record::{DateSpec, SourceRecord};
pub mod event;
pub use event::{EventTimeRange, ExternalKey, MappedEvent, TargetEvent};
pub mod time;
pub mod mapper;

pub mod provider;
pub use provider::{Reconciler, SyncOptions};
pub use provider::sync_progress::SyncSummary;

pub mod notion;
pub mod google;
pub mod memory;
pub mod mock_behaviour;

pub mod utils;
