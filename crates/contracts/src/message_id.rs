//! MessageId - shared message identifier

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Identifier of one message-in-flight.
///
/// Copied into benchmark markers, log fields and publication ids; clones
/// share one allocation.
///
/// # Examples
/// ```
/// use contracts::MessageId;
///
/// let id: MessageId = "m1".into();
/// assert_eq!(id.clone(), id);
/// assert_eq!(id.as_str(), "m1");
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Arc<str>);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Arc<str> hashes like str, so maps keyed by MessageId accept &str lookups
impl Borrow<str> for MessageId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<u64> for MessageId {
    fn from(n: u64) -> Self {
        Self::from(n.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({:?})", &*self.0)
    }
}
