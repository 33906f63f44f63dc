//! Stage trait - one unit of pipeline processing
//!
//! Authorization, storage, publication, logging and every other processing
//! step implement this trait. Stages may complete synchronously or suspend;
//! the executor awaits each one before starting the next.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{DispatchError, Message};

/// Shared reference to a stage, as stored in compiled stacks
pub type StageRef = Arc<dyn Stage>;

/// Pipeline stage
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name (used for logs and failure reports)
    fn name(&self) -> &str;

    /// Process the message in place
    ///
    /// # Errors
    /// Any error stops the pipeline; no later stage runs.
    async fn process(&self, message: &mut Message) -> Result<(), DispatchError>;
}
