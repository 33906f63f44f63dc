//! JSON protocol adapter and service wiring for the CLI.
//!
//! Every protocol version speaks plain JSON: the raw payload is the request
//! itself, responses are `{status, protocol, ...}` objects.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use config_loader::ConfigLoader;
use contracts::{DispatchError, DispatchSettings, Message, ProtocolAdapter, Session};
use dispatcher::{DispatchService, ProtocolTable, StageCatalog, StageRole};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{CliError, Result};

/// Plain-JSON adapter for one protocol version
#[derive(Debug)]
pub struct JsonAdapter {
    version: String,
}

impl JsonAdapter {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

#[async_trait]
impl ProtocolAdapter for JsonAdapter {
    async fn transform_in(&self, message: &mut Message) -> std::result::Result<(), DispatchError> {
        message.request = Some(serde_json::from_value(message.raw.clone())?);
        Ok(())
    }

    async fn transform_out(&self, message: &mut Message) -> std::result::Result<(), DispatchError> {
        let request = message.request()?;
        message.raw = json!({
            "protocol": self.version,
            "publication": request,
        });
        Ok(())
    }

    async fn transform_system(
        &self,
        message: &mut Message,
    ) -> std::result::Result<(), DispatchError> {
        let request = message.request()?;
        message.raw = json!({
            "protocol": self.version,
            "system": request,
        });
        Ok(())
    }

    async fn emit(&self, message: &Message, session: &Session) -> std::result::Result<(), DispatchError> {
        debug!(
            session = %session.id,
            message_id = %message.id,
            payload = %message.raw,
            "emitted"
        );
        Ok(())
    }

    async fn success(&self, message: &mut Message) -> std::result::Result<(), DispatchError> {
        message.response = Some(json!({
            "status": "ok",
            "protocol": self.version,
            "id": message.id.as_str(),
            "action": message.action(),
            "attachments": message.attachments,
        }));
        Ok(())
    }

    async fn fail(&self, message: &mut Message) -> std::result::Result<(), DispatchError> {
        let error = message.error.as_ref();
        message.response = Some(json!({
            "status": "error",
            "protocol": self.version,
            "id": message.id.as_str(),
            "error": {
                "code": error.map(|e| e.kind.code()),
                "kind": error.map(|e| e.kind),
                "message": error.map(|e| e.message.as_str()),
            },
        }));
        Ok(())
    }
}

/// Factory table with a JSON adapter for every version up to the current one
pub fn protocol_table(settings: &DispatchSettings) -> ProtocolTable {
    let mut table = ProtocolTable::new();
    for n in 1..=settings.protocol.current_version {
        let version = settings.protocol.version_key(n);
        table.insert(n, move || {
            Arc::new(JsonAdapter::new(version.clone())) as Arc<dyn ProtocolAdapter>
        });
    }
    table
}

/// Build a dispatch service over JSON adapters
///
/// Collaborator roles are no-ops; logging, no-store and acknowledgements
/// use the dispatcher's built-in stages.
pub fn build_service(settings: DispatchSettings) -> Result<DispatchService> {
    let table = protocol_table(&settings);
    let catalog = StageCatalog::passthrough()
        .without(StageRole::Log)
        .without(StageRole::NoStore)
        .without(StageRole::Acknowledge);

    Ok(DispatchService::builder(settings, table)
        .catalog(catalog)
        .build()?)
}

/// Load and validate settings, logging accepted-but-suspicious combinations
pub fn load_settings(path: &Path) -> Result<DispatchSettings> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    let settings = ConfigLoader::load_from_path(path)?;
    for warning in ConfigLoader::warnings(&settings) {
        warn!(config = %path.display(), "{warning}");
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ErrorKind;
    use serde_json::Value;

    fn session() -> Arc<Session> {
        Arc::new(Session::new("s1", "happn_3"))
    }

    #[tokio::test]
    async fn test_round_trip_success() {
        let adapter = JsonAdapter::new("happn_3");
        let mut message = Message::new("m1", session(), json!({"action": "get", "path": "/a"}));

        adapter.transform_in(&mut message).await.unwrap();
        adapter.success(&mut message).await.unwrap();

        let response = message.response.unwrap();
        assert_eq!(response["status"], "ok");
        assert_eq!(response["action"], "get");
    }

    #[tokio::test]
    async fn test_fail_encodes_error_code() {
        let adapter = JsonAdapter::new("happn");
        let mut message = Message::new("m1", session(), Value::Null);
        message.error = Some(DispatchError::not_found("gone", "protocol"));

        adapter.fail(&mut message).await.unwrap();

        let response = message.response.unwrap();
        assert_eq!(response["error"]["code"], 404);
        assert_eq!(response["error"]["kind"], json!(ErrorKind::NotFound));
    }

    #[test]
    fn test_build_service_registers_all_versions() {
        let service = build_service(DispatchSettings::default()).unwrap();
        assert_eq!(
            service.stats().protocols,
            vec!["happn", "happn_1", "happn_2", "happn_3"]
        );
    }

    #[test]
    fn test_load_settings_missing_file() {
        let err = load_settings(Path::new("/nonexistent/dispatch.toml")).unwrap_err();
        assert!(matches!(err, CliError::ConfigNotFound { .. }));
    }
}
