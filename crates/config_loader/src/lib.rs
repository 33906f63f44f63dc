//! # Config Loader
//!
//! Loads dispatch settings.
//!
//! Responsibilities:
//! - Parse TOML/JSON settings files
//! - Validate settings
//! - Produce `DispatchSettings`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let settings = ConfigLoader::load_from_path(Path::new("dispatch.toml")).unwrap();
//! println!("protocol: {}", settings.protocol.current_key());
//! ```

mod error;
mod parser;
mod validator;

pub use contracts::DispatchSettings;
pub use error::ConfigError;
pub use parser::ConfigFormat;

use std::path::Path;

/// Settings loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load settings from a file path
    ///
    /// The format is detected from the extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<DispatchSettings, ConfigError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load settings from a string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<DispatchSettings, ConfigError> {
        let settings = parser::parse(content, format)?;
        validator::validate(&settings)?;
        Ok(settings)
    }

    /// Accepted settings combinations worth flagging to the operator
    pub fn warnings(settings: &DispatchSettings) -> Vec<String> {
        validator::warnings(settings)
    }

    pub fn to_toml(settings: &DispatchSettings) -> Result<String, ConfigError> {
        toml::to_string_pretty(settings)
            .map_err(|e| ConfigError::parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(settings: &DispatchSettings) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(settings)
            .map_err(|e| ConfigError::parse(format!("JSON serialize error: {e}")))
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::parse("cannot determine file format from extension"))?;

        ConfigFormat::from_extension(ext)
            .ok_or_else(|| ConfigError::parse(format!("unsupported config format: .{ext}")))
    }
}
