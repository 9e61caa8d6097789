//! This module provides ways to tweak the in-memory backends, so that they can return errors on some tests

use crate::error::SyncError;

/// This stores some behaviour tweaks, that describe how a mocked instance will behave during a given test
///
/// So that a functions fails _n_ times after _m_ initial successes, set `(m, n)` for the suited parameter
#[derive(Default, Clone, Debug)]
pub struct MockBehaviour {
    /// If this is true, every action will be allowed
    pub is_suspended: bool,

    // From the RecordSource trait
    pub list_records_behaviour: (u32, u32),

    // From the EventTarget trait
    pub connect_behaviour: (u32, u32),
    pub list_managed_events_behaviour: (u32, u32),
    pub create_event_behaviour: (u32, u32),
    pub update_event_behaviour: (u32, u32),
    pub delete_event_behaviour: (u32, u32),
}

impl MockBehaviour {
    pub fn new() -> Self {
        Self::default()
    }

    /// All items will fail at once, for `n_fails` times
    pub fn fail_now(n_fails: u32) -> Self {
        Self {
            is_suspended: false,
            list_records_behaviour: (0, n_fails),
            connect_behaviour: (0, n_fails),
            list_managed_events_behaviour: (0, n_fails),
            create_event_behaviour: (0, n_fails),
            update_event_behaviour: (0, n_fails),
            delete_event_behaviour: (0, n_fails),
        }
    }

    /// Suspend this mock behaviour until you call `resume`
    pub fn suspend(&mut self) {
        self.is_suspended = true;
    }
    /// Make this behaviour active again
    pub fn resume(&mut self) {
        self.is_suspended = false;
    }

    pub fn can_list_records(&mut self) -> Result<(), SyncError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.list_records_behaviour, "list_records").map_err(SyncError::SourceUnavailable)
    }
    pub fn can_connect(&mut self) -> Result<(), SyncError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.connect_behaviour, "connect").map_err(SyncError::TargetUnavailable)
    }
    pub fn can_list_managed_events(&mut self) -> Result<(), SyncError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.list_managed_events_behaviour, "list_managed_events").map_err(SyncError::TargetUnavailable)
    }
    pub fn can_create_event(&mut self) -> Result<(), SyncError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.create_event_behaviour, "create_event").map_err(SyncError::TargetUnavailable)
    }
    pub fn can_update_event(&mut self) -> Result<(), SyncError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.update_event_behaviour, "update_event").map_err(SyncError::TargetUnavailable)
    }
    pub fn can_delete_event(&mut self) -> Result<(), SyncError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.delete_event_behaviour, "delete_event").map_err(SyncError::TargetUnavailable)
    }
}


/// Return Ok(()) in case the value is `(1+, _)` or `(_, 0)`, or return Err and decrement otherwise
fn decrement(value: &mut (u32, u32), descr: &str) -> Result<(), String> {
    let remaining_successes = value.0;
    let remaining_failures = value.1;

    if remaining_successes > 0 {
        value.0 -= 1;
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    } else if remaining_failures > 0 {
        value.1 -= 1;
        log::debug!("Mock behaviour: failing a {} ({:?})", descr, value);
        Err(format!("Mocked behaviour requires this {} to fail this time. ({:?})", descr, value))
    } else {
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    }
}
