//! Error types for CLI operations.

use config_loader::ConfigError;
use dispatcher::DispatcherError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Settings could not be loaded
    #[error("Failed to load settings: {0}")]
    Config(#[from] ConfigError),

    /// The dispatch service could not be built
    #[error("Failed to build dispatch service: {0}")]
    Dispatcher(#[from] DispatcherError),

    /// Invalid command-line input
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
