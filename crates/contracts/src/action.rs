//! Request actions
//!
//! The closed set of actions a client can request. The action alone decides
//! most of the stage composition of an inbound pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DispatchError;

/// Client request action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Get,
    Set,
    Remove,
    On,
    Off,
    Describe,
    ConfigureSession,
    Login,
    Disconnect,
    Ack,
    RevokeSession,
    RequestNonce,
}

impl Action {
    /// Every action, in declaration order
    pub const ALL: [Action; 12] = [
        Action::Get,
        Action::Set,
        Action::Remove,
        Action::On,
        Action::Off,
        Action::Describe,
        Action::ConfigureSession,
        Action::Login,
        Action::Disconnect,
        Action::Ack,
        Action::RevokeSession,
        Action::RequestNonce,
    ];

    /// Wire name of the action
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Remove => "remove",
            Self::On => "on",
            Self::Off => "off",
            Self::Describe => "describe",
            Self::ConfigureSession => "configure-session",
            Self::Login => "login",
            Self::Disconnect => "disconnect",
            Self::Ack => "ack",
            Self::RevokeSession => "revoke-session",
            Self::RequestNonce => "request-nonce",
        }
    }

    /// Actions checked by the authorization stage in secure mode
    pub fn requires_authorization(self) -> bool {
        matches!(self, Self::Get | Self::Set | Self::On | Self::Remove)
    }

    /// Subscription actions carry ephemeral listener/reference ids in their
    /// options, which must never influence stage composition.
    pub fn is_subscription(self) -> bool {
        matches!(self, Self::On | Self::Off)
    }

    /// Actions whose options can switch the store/publish stages
    pub fn is_mutation(self) -> bool {
        matches!(self, Self::Set | Self::Remove)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| DispatchError::system(format!("unknown action: {s}"), "protocol"))
    }
}
