//! Dispatcher construction errors
//!
//! Runtime failures use `contracts::DispatchError`; these errors only come
//! out of building or reconfiguring the service.

use contracts::DispatchError;
use thiserror::Error;

use crate::catalog::StageRole;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// The static protocol table has no factory for a required version
    #[error("no protocol factory registered for '{version}'")]
    MissingFactory { version: String },

    /// An adapter's one-time setup failed
    #[error("failed to initialize protocol adapter '{version}': {source}")]
    AdapterInit {
        version: String,
        #[source]
        source: DispatchError,
    },

    /// The stage catalog lacks collaborators the settings need
    #[error("stage catalog is missing required roles: {roles:?}")]
    MissingStages { roles: Vec<StageRole> },

    /// Settings rejected at build or reconfigure time
    #[error("invalid settings: {message}")]
    InvalidSettings { message: String },
}

impl DispatcherError {
    pub fn missing_factory(version: impl Into<String>) -> Self {
        Self::MissingFactory {
            version: version.into(),
        }
    }

    pub fn invalid_settings(message: impl Into<String>) -> Self {
        Self::InvalidSettings {
            message: message.into(),
        }
    }
}
