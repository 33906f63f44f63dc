//! AcknowledgeStage - resolves acknowledged publications

use std::sync::Arc;

use async_trait::async_trait;
use contracts::{DispatchError, Message, Stage};
use serde_json::{json, Value};

use crate::publication::AcknowledgementRegistry;

/// Handles `ack` requests against the acknowledgement registry
///
/// The publication id is read from `data.publicationId`, falling back to
/// `options.publicationId`.
#[derive(Debug, Clone)]
pub struct AcknowledgeStage {
    registry: Arc<AcknowledgementRegistry>,
}

impl AcknowledgeStage {
    pub fn new(registry: Arc<AcknowledgementRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Stage for AcknowledgeStage {
    fn name(&self) -> &str {
        "acknowledge"
    }

    async fn process(&self, message: &mut Message) -> Result<(), DispatchError> {
        let request = message.request()?;
        let publication_id = request
            .data
            .get("publicationId")
            .or_else(|| request.options.as_ref().and_then(|o| o.get("publicationId")))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                DispatchError::system("ack request carries no publicationId", "publisher")
            })?
            .to_string();

        let complete = self.registry.acknowledge(&publication_id)?;
        message.attach(
            "acknowledgement",
            json!({ "publicationId": publication_id, "complete": complete }),
        );
        Ok(())
    }
}
