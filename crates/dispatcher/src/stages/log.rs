//! LogStage - logs a message summary via tracing

use async_trait::async_trait;
use contracts::{DispatchError, Message, Stage};
use tracing::{debug, instrument};

/// Stage that logs every message passing through a stack
#[derive(Debug, Clone)]
pub struct LogStage {
    name: String,
}

impl LogStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LogStage {
    fn default() -> Self {
        Self::new("log")
    }
}

#[async_trait]
impl Stage for LogStage {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_stage",
        skip(self, message),
        fields(message_id = %message.id)
    )]
    async fn process(&self, message: &mut Message) -> Result<(), DispatchError> {
        let action = message.action().map(|a| a.as_str()).unwrap_or("-");
        let path = message
            .request
            .as_ref()
            .and_then(|r| r.path.as_deref())
            .unwrap_or("-");

        debug!(
            stage = %self.name,
            session = %message.session.id,
            protocol = %message.session.protocol,
            action,
            path,
            has_error = message.error.is_some(),
            "message in flight"
        );
        Ok(())
    }
}
