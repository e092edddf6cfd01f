use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

/// Start of the current run of timestamping failures
///
/// Opened by the first failure, closed by the next success. Repeated
/// failures never move the start forward.
#[derive(Debug, Default)]
pub struct FailureWindow {
    first_failure_at: Mutex<Option<DateTime<Utc>>>,
}

impl FailureWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first_failure_at(&self) -> Option<DateTime<Utc>> {
        *self.lock()
    }

    pub fn is_open(&self) -> bool {
        self.first_failure_at().is_some()
    }

    /// Close the window. Returns whether it was open.
    pub fn record_success(&self) -> bool {
        self.lock().take().is_some()
    }

    /// Open the window at `at` unless already open. Returns whether it opened.
    pub fn record_failure(&self, at: DateTime<Utc>) -> bool {
        let mut guard = self.lock();
        if guard.is_some() {
            return false;
        }
        *guard = Some(at);
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<DateTime<Utc>>> {
        self.first_failure_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
