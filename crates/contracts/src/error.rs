//! Dispatch error taxonomy
//!
//! Three classes: not-found / access-denied / system. Every error carries a
//! human-readable message, the originating area and an optional wrapped cause.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error class, surfaced through the adapter's failure encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Unresolved resource, e.g. an unknown protocol version
    NotFound,
    /// Rejected by the authorization stage
    AccessDenied,
    /// Any unexpected internal or collaborator failure
    System,
}

impl ErrorKind {
    /// Numeric code used by wire encodings
    pub fn code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::AccessDenied => 403,
            Self::System => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::AccessDenied => write!(f, "access denied"),
            Self::System => write!(f, "system"),
        }
    }
}

/// Unified error type for stages, adapters and the dispatch service
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[error("{kind} error in {area}: {message}")]
pub struct DispatchError {
    pub kind: ErrorKind,
    pub message: String,
    pub area: String,
    #[source]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<DispatchError>>,
}

impl DispatchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, area: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            area: area.into(),
            cause: None,
        }
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>, area: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message, area)
    }

    /// Create an access-denied error
    pub fn access_denied(message: impl Into<String>, area: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessDenied, message, area)
    }

    /// Create a system error
    pub fn system(message: impl Into<String>, area: impl Into<String>) -> Self {
        Self::new(ErrorKind::System, message, area)
    }

    /// Wrap `cause` in a new error raised from `area`
    pub fn wrap(cause: DispatchError, message: impl Into<String>, area: impl Into<String>) -> Self {
        Self {
            kind: cause.kind,
            message: message.into(),
            area: area.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Unwrap every wrapping layer and return the originating error
    pub fn into_root(self) -> Self {
        let mut current = self;
        while let Some(cause) = current.cause.take() {
            current = *cause;
        }
        current
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(e: serde_json::Error) -> Self {
        Self::system(format!("json error: {e}"), "serialization")
    }
}
