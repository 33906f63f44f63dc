//! Publication consistency levels

use serde::{Deserialize, Serialize};

/// When a publish operation counts as complete relative to its recipients.
///
/// Encoded on the wire as its numeric value (`options.consistency`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Consistency {
    /// Respond once recipients have been notified
    Queued,
    /// Queue the publication and complete immediately
    Deferred,
    /// Complete once every recipient has been written to
    #[default]
    Transactional,
    /// Complete once every recipient has acknowledged receipt
    Acknowledged,
}

impl Consistency {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Deferred => 1,
            Self::Transactional => 2,
            Self::Acknowledged => 3,
        }
    }
}

impl From<Consistency> for u8 {
    fn from(level: Consistency) -> Self {
        level.as_u8()
    }
}

impl TryFrom<u8> for Consistency {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Queued),
            1 => Ok(Self::Deferred),
            2 => Ok(Self::Transactional),
            3 => Ok(Self::Acknowledged),
            other => Err(format!("invalid consistency level: {other}")),
        }
    }
}
