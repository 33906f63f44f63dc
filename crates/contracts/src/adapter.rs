//! ProtocolAdapter trait - per-version encode/decode
//!
//! One adapter per supported wire-protocol version. Adapters are initialized
//! once by the registry and then shared read-only by every session speaking
//! that version.

use async_trait::async_trait;

use crate::{DispatchError, Message, Session};

/// Protocol-version adapter
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// One-time setup, called by the registry before the adapter is used
    fn initialize(&self) -> Result<(), DispatchError> {
        Ok(())
    }

    /// Decode `message.raw` into `message.request`
    ///
    /// # Errors
    /// Protocol-specific decode error on malformed input
    async fn transform_in(&self, message: &mut Message) -> Result<(), DispatchError>;

    /// Encode an outbound publication into `message.raw`
    async fn transform_out(&self, message: &mut Message) -> Result<(), DispatchError>;

    /// Encode a system message; runs as a stage inside the system stack
    async fn transform_system(&self, message: &mut Message) -> Result<(), DispatchError>;

    /// Hand an encoded message to the transport for `session`
    async fn emit(&self, message: &Message, session: &Session) -> Result<(), DispatchError>;

    /// Encode a successful response into `message.response`
    async fn success(&self, message: &mut Message) -> Result<(), DispatchError>;

    /// Encode `message.error` into `message.response`
    async fn fail(&self, message: &mut Message) -> Result<(), DispatchError>;
}
