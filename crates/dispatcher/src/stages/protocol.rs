//! Stages wrapping adapter operations
//!
//! Lets adapter transforms and encodings run inside a pipeline like any
//! other stage.

use async_trait::async_trait;
use contracts::{DispatchError, Message, Stage};

use crate::registry::Protocol;

/// Runs the adapter's system transform
#[derive(Clone)]
pub struct SystemTransform {
    protocol: Protocol,
}

impl SystemTransform {
    pub fn new(protocol: Protocol) -> Self {
        Self { protocol }
    }
}

#[async_trait]
impl Stage for SystemTransform {
    fn name(&self) -> &str {
        "system-transform"
    }

    async fn process(&self, message: &mut Message) -> Result<(), DispatchError> {
        self.protocol.adapter().transform_system(message).await
    }
}

/// Encodes the response, through `success` or `fail`
#[derive(Clone)]
pub struct EncodeResponse {
    protocol: Protocol,
    failed: bool,
}

impl EncodeResponse {
    pub fn success(protocol: Protocol) -> Self {
        Self {
            protocol,
            failed: false,
        }
    }

    pub fn fail(protocol: Protocol) -> Self {
        Self {
            protocol,
            failed: true,
        }
    }
}

#[async_trait]
impl Stage for EncodeResponse {
    fn name(&self) -> &str {
        if self.failed {
            "encode-fail"
        } else {
            "encode-success"
        }
    }

    async fn process(&self, message: &mut Message) -> Result<(), DispatchError> {
        if self.failed {
            self.protocol.adapter().fail(message).await
        } else {
            self.protocol.adapter().success(message).await
        }
    }
}
