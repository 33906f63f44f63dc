//! Settings validation
//!
//! Rules:
//! - protocol family non-empty, without `.` or `_`
//! - protocol version >= 1
//! - event capacity >= 1
//!
//! Audit without secure mode is accepted with a warning.

use contracts::DispatchSettings;
use validator::Validate;

use crate::error::ConfigError;

/// Validate settings, returning the first error found
pub fn validate(settings: &DispatchSettings) -> Result<(), ConfigError> {
    validate_protocol_family(settings)?;
    settings
        .validate()
        .map_err(|e| ConfigError::validation("settings", e.to_string()))?;
    Ok(())
}

/// Accepted but suspicious combinations
pub fn warnings(settings: &DispatchSettings) -> Vec<String> {
    let mut warnings = Vec::new();
    if settings.audit_enabled && !settings.secure {
        warnings.push("audit_enabled has no effect unless secure is set".to_string());
    }
    warnings
}

fn validate_protocol_family(settings: &DispatchSettings) -> Result<(), ConfigError> {
    let family = &settings.protocol.family;
    if family.is_empty() {
        return Err(ConfigError::validation(
            "protocol.family",
            "protocol family cannot be empty",
        ));
    }
    // the separators of version keys and session protocol strings
    if let Some(c) = family.chars().find(|c| matches!(c, '.' | '_')) {
        return Err(ConfigError::validation(
            "protocol.family",
            format!("protocol family '{family}' cannot contain '{c}'"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&DispatchSettings::default()).is_ok());
        assert!(warnings(&DispatchSettings::default()).is_empty());
    }

    #[test]
    fn test_family_separators_rejected() {
        for family in ["", "happn.v", "happn_x"] {
            let mut settings = DispatchSettings::default();
            settings.protocol.family = family.to_string();
            let err = validate(&settings).unwrap_err();
            assert!(err.to_string().contains("protocol.family"), "{family}: {err}");
        }
    }

    #[test]
    fn test_zero_version_rejected() {
        let mut settings = DispatchSettings::default();
        settings.protocol.current_version = 0;
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn test_zero_event_capacity_rejected() {
        let settings = DispatchSettings {
            event_capacity: 0,
            ..Default::default()
        };
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn test_audit_without_secure_warns() {
        let settings = DispatchSettings {
            audit_enabled: true,
            ..Default::default()
        };
        assert!(validate(&settings).is_ok());
        assert_eq!(warnings(&settings).len(), 1);
    }
}
