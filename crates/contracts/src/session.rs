//! Session - connected client context
//!
//! Owned by the transport layer. The dispatch core only reads the protocol
//! string.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client connection state (numeric codes match the client library)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    #[default]
    Uninitialized,
    Active,
    Disconnected,
    Error,
    Reconnecting,
    Connecting,
    Connected,
    Disconnecting,
}

impl SessionState {
    pub fn code(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Active => 1,
            Self::Disconnected => 2,
            Self::Error => 3,
            Self::Reconnecting => 4,
            Self::Connecting => 5,
            Self::Connected => 6,
            Self::Disconnecting => 7,
        }
    }
}

/// A connected client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier assigned by the transport
    pub id: String,

    /// Declared protocol, e.g. `happn_3`, `happn_3.1` or legacy `happn`
    pub protocol: String,

    #[serde(default)]
    pub state: SessionState,

    /// Opaque transport context
    #[serde(default)]
    pub context: Value,
}

impl Session {
    pub fn new(id: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            protocol: protocol.into(),
            state: SessionState::Connected,
            context: Value::Null,
        }
    }
}
