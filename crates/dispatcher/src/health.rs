//! HealthMonitor - default error reporter
//!
//! Counts reported errors per severity and degrades a health status. The
//! status only ever gets worse until `reset`.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use contracts::{DispatchError, ErrorReporter, Severity};
use serde::Serialize;
use tracing::{error, warn};

/// Process health derived from the worst reported severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    #[default]
    Excellent,
    Fair,
    TakingStrain,
    Poor,
}

impl HealthStatus {
    fn for_severity(severity: Severity) -> Self {
        match severity {
            Severity::Low => Self::Fair,
            Severity::Medium => Self::TakingStrain,
            Severity::High | Severity::Fatal => Self::Poor,
        }
    }
}

/// Last error seen by the monitor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastError {
    pub message: String,
    pub severity: Severity,
    pub area: String,
}

/// Point-in-time view of the monitor
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub counts: BTreeMap<Severity, u64>,
    pub last_error: Option<LastError>,
}

#[derive(Debug, Default)]
pub struct HealthMonitor {
    state: Mutex<HealthSnapshot>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> HealthStatus {
        self.lock().status
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        self.lock().clone()
    }

    pub fn reset(&self) {
        *self.lock() = HealthSnapshot::default();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HealthSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ErrorReporter for HealthMonitor {
    fn report(&self, err: &DispatchError, area: &str, severity: Severity) {
        if severity >= Severity::High {
            error!(area, ?severity, error = %err, "error reported");
        } else {
            warn!(area, ?severity, error = %err, "error reported");
        }

        let mut state = self.lock();
        *state.counts.entry(severity).or_insert(0) += 1;
        state.status = state.status.max(HealthStatus::for_severity(severity));
        state.last_error = Some(LastError {
            message: err.to_string(),
            severity,
            area: area.to_string(),
        });
    }
}
