//! No-op stages

use async_trait::async_trait;
use contracts::{DispatchError, Message, Stage};

/// Stage that leaves the message untouched
#[derive(Debug, Clone)]
pub struct Passthrough {
    name: String,
}

impl Passthrough {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for Passthrough {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _message: &mut Message) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// Store-skip stage for `set` requests carrying `noStore`
///
/// The request data is echoed back as the stored value so publication
/// stages see the same shape as after a real store.
#[derive(Debug, Clone, Default)]
pub struct NoStore;

#[async_trait]
impl Stage for NoStore {
    fn name(&self) -> &str {
        "no-store"
    }

    async fn process(&self, message: &mut Message) -> Result<(), DispatchError> {
        let data = message.request()?.data.clone();
        message.attach("stored", data);
        Ok(())
    }
}
