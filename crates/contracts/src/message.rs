//! Message-in-flight
//!
//! The unit threaded through a pipeline. The executor owns it for the
//! duration of one run and lends it to each stage exclusively.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::{Action, Consistency, DispatchError, MessageId, Session};

/// Structured request options
pub type Options = Map<String, Value>;

/// Decoded client request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub action: Action,

    /// Target path, if the action addresses data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Request payload
    #[serde(default)]
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
}

impl Request {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            path: None,
            data: Value::Null,
            options: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    /// `options.noStore` is set and truthy
    pub fn no_store(&self) -> bool {
        self.flag("noStore")
    }

    /// `options.noPublish` is set and truthy
    pub fn no_publish(&self) -> bool {
        self.flag("noPublish")
    }

    /// Consistency level requested for the publication, default transactional
    pub fn consistency(&self) -> Consistency {
        self.options
            .as_ref()
            .and_then(|o| o.get("consistency"))
            .and_then(Value::as_u64)
            .and_then(|n| u8::try_from(n).ok())
            .and_then(|n| Consistency::try_from(n).ok())
            .unwrap_or_default()
    }

    fn flag(&self, name: &str) -> bool {
        self.options
            .as_ref()
            .and_then(|o| o.get(name))
            .is_some_and(truthy)
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Message-in-flight
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,

    pub session: Arc<Session>,

    /// Raw payload as received from (or destined to) the transport
    pub raw: Value,

    /// Decoded request, populated by the adapter's inbound transform
    pub request: Option<Request>,

    /// Encoded response, populated by the adapter's success/fail encoding
    pub response: Option<Value>,

    pub error: Option<DispatchError>,

    /// Data attached by stages for later stages (recipients, publication ids)
    pub attachments: Map<String, Value>,

    /// Written by the executor's begin step on every run
    pub begun_at: Option<Instant>,
}

impl Message {
    pub fn new(id: impl Into<MessageId>, session: Arc<Session>, raw: Value) -> Self {
        Self {
            id: id.into(),
            session,
            raw,
            request: None,
            response: None,
            error: None,
            attachments: Map::new(),
            begun_at: None,
        }
    }

    /// Build an already-decoded message (outbound and system traffic)
    pub fn with_request(id: impl Into<MessageId>, session: Arc<Session>, request: Request) -> Self {
        let mut message = Self::new(id, session, Value::Null);
        message.request = Some(request);
        message
    }

    /// Decoded request
    ///
    /// # Errors
    /// System error if the inbound transform did not decode a request
    pub fn request(&self) -> Result<&Request, DispatchError> {
        self.request.as_ref().ok_or_else(|| {
            DispatchError::system(
                format!("message {} has no decoded request", self.id),
                "message",
            )
        })
    }

    pub fn action(&self) -> Option<Action> {
        self.request.as_ref().map(|r| r.action)
    }

    pub fn attach(&mut self, key: impl Into<String>, value: Value) {
        self.attachments.insert(key.into(), value);
    }
}
