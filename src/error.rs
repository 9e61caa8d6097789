//! Errors that abort a sync run
//!
//! Problems that only concern a single record or a single calendar call are not errors at this level:
//! they are reported as [`NormalizeError`](crate::time::NormalizeError), [`MappingError`](crate::mapper::MappingError)
//! or counted in the [`SyncSummary`](crate::provider::sync_progress::SyncSummary).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The source store could not be read (transport or authentication failure)
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The target calendar could not be reached, or refused a call
    #[error("target unavailable: {0}")]
    TargetUnavailable(String),

    /// Missing or invalid settings
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    pub fn source_unavailable<S: ToString>(msg: S) -> Self {
        Self::SourceUnavailable(msg.to_string())
    }

    pub fn target_unavailable<S: ToString>(msg: S) -> Self {
        Self::TargetUnavailable(msg.to_string())
    }

    pub fn config<S: ToString>(msg: S) -> Self {
        Self::Config(msg.to_string())
    }
}
