//! Stage catalog
//!
//! Maps every processing role an inbound stack can contain to the
//! collaborator stage implementing it. Storage, security, subscription and
//! publication engines register their stages here.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use contracts::{DispatchSettings, StageRef};

use crate::error::DispatcherError;
use crate::stages::Passthrough;

/// Role a stage plays in a compiled stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageRole {
    Log,
    Authorize,
    NonceRequest,
    Store,
    SecureStore,
    NoStore,
    Remove,
    Get,
    Recipients,
    Publish,
    PrepareSubscribe,
    Subscribe,
    Unsubscribe,
    Describe,
    ConfigureSession,
    Login,
    UnsecureLogin,
    Disconnect,
    Acknowledge,
    RevokeSession,
    Audit,
}

impl StageRole {
    pub const ALL: [StageRole; 21] = [
        StageRole::Log,
        StageRole::Authorize,
        StageRole::NonceRequest,
        StageRole::Store,
        StageRole::SecureStore,
        StageRole::NoStore,
        StageRole::Remove,
        StageRole::Get,
        StageRole::Recipients,
        StageRole::Publish,
        StageRole::PrepareSubscribe,
        StageRole::Subscribe,
        StageRole::Unsubscribe,
        StageRole::Describe,
        StageRole::ConfigureSession,
        StageRole::Login,
        StageRole::UnsecureLogin,
        StageRole::Disconnect,
        StageRole::Acknowledge,
        StageRole::RevokeSession,
        StageRole::Audit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Authorize => "authorize",
            Self::NonceRequest => "nonce-request",
            Self::Store => "store",
            Self::SecureStore => "secure-store",
            Self::NoStore => "no-store",
            Self::Remove => "remove",
            Self::Get => "get",
            Self::Recipients => "recipients",
            Self::Publish => "publish",
            Self::PrepareSubscribe => "prepare-subscribe",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Describe => "describe",
            Self::ConfigureSession => "configure-session",
            Self::Login => "login",
            Self::UnsecureLogin => "unsecure-login",
            Self::Disconnect => "disconnect",
            Self::Acknowledge => "acknowledge",
            Self::RevokeSession => "revoke-session",
            Self::Audit => "audit",
        }
    }

    /// Whether some stack can contain this role under `settings`
    pub fn required_by(self, settings: &DispatchSettings) -> bool {
        match self {
            Self::Log => settings.logging_enabled,
            Self::Authorize | Self::SecureStore | Self::Login => settings.secure,
            Self::Store | Self::UnsecureLogin => !settings.secure,
            Self::Audit => settings.audit_active(),
            _ => true,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for StageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborator stages by role, as supplied by the embedding server
#[derive(Clone, Default)]
pub struct StageCatalog {
    stages: HashMap<StageRole, StageRef>,
}

impl StageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with a no-op stage named after every role
    pub fn passthrough() -> Self {
        let stages = StageRole::ALL
            .into_iter()
            .map(|role| (role, Arc::new(Passthrough::new(role.as_str())) as StageRef))
            .collect();
        Self { stages }
    }

    pub fn with(mut self, role: StageRole, stage: StageRef) -> Self {
        self.stages.insert(role, stage);
        self
    }

    pub fn without(mut self, role: StageRole) -> Self {
        self.stages.remove(&role);
        self
    }

    pub fn insert(&mut self, role: StageRole, stage: StageRef) {
        self.stages.insert(role, stage);
    }

    /// Insert `stage` unless the role is already provided
    pub fn insert_default(&mut self, role: StageRole, stage: StageRef) {
        self.stages.entry(role).or_insert(stage);
    }

    pub fn contains(&self, role: StageRole) -> bool {
        self.stages.contains_key(&role)
    }

    /// Roles `settings` needs that nobody provided
    pub fn missing_roles(&self, settings: &DispatchSettings) -> Vec<StageRole> {
        StageRole::ALL
            .into_iter()
            .filter(|role| role.required_by(settings) && !self.stages.contains_key(role))
            .collect()
    }

    /// Freeze the catalog for compilation under `settings`
    ///
    /// Roles that cannot appear under `settings` and were not provided are
    /// filled with a passthrough so lookups stay infallible.
    ///
    /// # Errors
    /// `MissingStages` when a role the settings need is not provided
    pub fn resolve(&self, settings: &DispatchSettings) -> Result<ResolvedCatalog, DispatcherError> {
        let missing = self.missing_roles(settings);
        if !missing.is_empty() {
            return Err(DispatcherError::MissingStages { roles: missing });
        }

        let stages = StageRole::ALL
            .into_iter()
            .map(|role| {
                self.stages
                    .get(&role)
                    .cloned()
                    .unwrap_or_else(|| Arc::new(Passthrough::new(role.as_str())))
            })
            .collect();

        Ok(ResolvedCatalog { stages })
    }
}

impl fmt::Debug for StageCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut roles: Vec<_> = self.stages.keys().collect();
        roles.sort();
        f.debug_struct("StageCatalog").field("roles", &roles).finish()
    }
}

/// Complete role table, one stage per role
#[derive(Clone)]
pub struct ResolvedCatalog {
    stages: Vec<StageRef>,
}

impl ResolvedCatalog {
    pub fn get(&self, role: StageRole) -> StageRef {
        Arc::clone(&self.stages[role.index()])
    }
}
