use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::timestamper::TimestampResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticState {
    Ok,
    Error,
}

/// Last known status of one TSA
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticStatus {
    pub state: DiagnosticState,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub at: DateTime<Utc>,
}

impl DiagnosticStatus {
    pub fn ok(at: DateTime<Utc>) -> Self {
        Self {
            state: DiagnosticState::Ok,
            error_code: None,
            message: None,
            at,
        }
    }

    pub fn error(code: &str, message: String, at: DateTime<Utc>) -> Self {
        Self {
            state: DiagnosticState::Error,
            error_code: Some(code.to_string()),
            message: Some(message),
            at,
        }
    }
}

/// Per-TSA status map, overwritten on every attempt
#[derive(Debug, Default)]
pub struct Diagnostics {
    statuses: Mutex<BTreeMap<String, DiagnosticStatus>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, tsa_url: &str, status: DiagnosticStatus) {
        self.lock().insert(tsa_url.to_string(), status);
    }

    /// Record every TSA touched by one task
    pub fn record(&self, result: &TimestampResult, at: DateTime<Utc>) {
        let mut statuses = self.lock();
        for (url, error) in result.errors_by_url() {
            statuses.insert(
                url.clone(),
                DiagnosticStatus::error(error.error_code(), error.to_string(), at),
            );
        }
        if let TimestampResult::Succeeded(s) = result {
            statuses.insert(s.source_url.clone(), DiagnosticStatus::ok(at));
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, DiagnosticStatus> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, DiagnosticStatus>> {
        self.statuses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
