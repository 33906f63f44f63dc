//! DispatchSettings - Config Loader output
//!
//! The serializable part of the dispatch configuration. Stage objects and
//! adapters are attached programmatically when the service is built.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Dispatch service flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DispatchSettings {
    /// Secure mode: authorization, secure store/login and auditing
    #[serde(default)]
    pub secure: bool,

    /// Include the logging stage in every stack
    #[serde(default, alias = "loggingEnabled")]
    pub logging_enabled: bool,

    /// Include benchmark start/end stages in inbound stacks
    #[serde(default, alias = "benchMarkEnabled")]
    pub benchmark_enabled: bool,

    /// Include the audit stage (only effective in secure mode)
    #[serde(default, alias = "auditEnabled")]
    pub audit_enabled: bool,

    /// Capacity of the lifecycle event channel
    #[serde(default = "default_event_capacity")]
    #[validate(range(min = 1))]
    pub event_capacity: usize,

    /// Protocol family and current version
    #[serde(default)]
    #[validate(nested)]
    pub protocol: ProtocolSettings,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            secure: false,
            logging_enabled: false,
            benchmark_enabled: false,
            audit_enabled: false,
            event_capacity: default_event_capacity(),
            protocol: ProtocolSettings::default(),
        }
    }
}

impl DispatchSettings {
    /// The audit stage is only compiled in secure mode
    pub fn audit_active(&self) -> bool {
        self.secure && self.audit_enabled
    }
}

fn default_event_capacity() -> usize {
    64
}

/// Protocol family settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ProtocolSettings {
    /// Family name; version keys are `<family>_<n>`, legacy clients send
    /// the bare family name
    #[serde(default = "default_family")]
    #[validate(length(min = 1))]
    pub family: String,

    /// Latest protocol version shipped with this build
    #[serde(default = "default_current_version")]
    #[validate(range(min = 1))]
    pub current_version: u32,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            family: default_family(),
            current_version: default_current_version(),
        }
    }
}

impl ProtocolSettings {
    /// Version key for major version `n`, e.g. `happn_3`
    pub fn version_key(&self, n: u32) -> String {
        format!("{}_{}", self.family, n)
    }

    /// Version key of the current build
    pub fn current_key(&self) -> String {
        self.version_key(self.current_version)
    }
}

fn default_family() -> String {
    "happn".to_string()
}

fn default_current_version() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = DispatchSettings::default();
        assert!(!settings.secure);
        assert_eq!(settings.protocol.current_key(), "happn_3");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_camel_case_aliases() {
        let settings: DispatchSettings = serde_json::from_str(
            r#"{"secure": true, "loggingEnabled": true, "benchMarkEnabled": true}"#,
        )
        .unwrap();
        assert!(settings.logging_enabled);
        assert!(settings.benchmark_enabled);
        assert!(!settings.audit_active());
    }

    #[test]
    fn test_nested_validation() {
        let mut settings = DispatchSettings::default();
        settings.protocol.current_version = 0;
        assert!(settings.validate().is_err());
    }
}
