//! ErrorReporter trait - process-wide error/health sink
//!
//! Receives failures that cannot be encoded back to the client, such as a
//! failing success/fail encoding step.

use serde::{Deserialize, Serialize};

use crate::DispatchError;

/// Error severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Fatal,
}

/// System error sink
pub trait ErrorReporter: Send + Sync {
    /// Record an error raised in `area`
    fn report(&self, error: &DispatchError, area: &str, severity: Severity);
}
