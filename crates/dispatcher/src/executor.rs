//! Pipeline executor
//!
//! Runs a stage list over one message. The executor owns the message and
//! lends it to each stage in turn; the first failure stops the run.

use std::time::Instant;

use contracts::{DispatchError, Message, StageRef};
use thiserror::Error;
use tracing::{debug, instrument};

/// A run stopped at a failing stage
///
/// Carries the message as it was when the stage failed and the root cause
/// of the failure.
#[derive(Debug, Error)]
#[error("stage '{stage}' failed: {error}")]
pub struct PipelineFailure {
    pub message: Box<Message>,
    #[source]
    pub error: DispatchError,
    pub stage: String,
}

impl PipelineFailure {
    pub fn new(message: Message, error: DispatchError, stage: impl Into<String>) -> Self {
        Self {
            message: Box::new(message),
            error: error.into_root(),
            stage: stage.into(),
        }
    }
}

/// Run `stages` in order over `message`
///
/// A begin step stamps `message.begun_at` before the first stage.
///
/// # Errors
/// The first stage failure, with the message handed back
#[instrument(name = "pipeline", skip_all, fields(message_id = %message.id, stages = stages.len()))]
pub async fn execute(stages: &[StageRef], mut message: Message) -> Result<Message, PipelineFailure> {
    message.begun_at = Some(Instant::now());

    for (index, stage) in stages.iter().enumerate() {
        debug!(index, stage = stage.name(), "running stage");
        if let Err(e) = stage.process(&mut message).await {
            let failure = PipelineFailure::new(message, e, stage.name());
            debug!(
                index,
                stage = %failure.stage,
                error = %failure.error,
                "stage failed, stopping pipeline"
            );
            observability::record_stage_failure(&failure.stage, &failure.error.kind.to_string());
            return Err(failure);
        }
    }

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use contracts::{Session, Stage};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        name: String,
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Stage for Counting {
        fn name(&self) -> &str {
            &self.name
        }

        async fn process(&self, message: &mut Message) -> Result<(), DispatchError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            message.attach(self.name.clone(), json!(true));
            if self.fail {
                let root = DispatchError::access_denied("unauthorized", "security");
                return Err(DispatchError::wrap(root, "stage failed", "pipeline"));
            }
            Ok(())
        }
    }

    fn stage(name: &str, runs: &Arc<AtomicUsize>, fail: bool) -> StageRef {
        Arc::new(Counting {
            name: name.to_string(),
            runs: Arc::clone(runs),
            fail,
        })
    }

    fn message() -> Message {
        Message::new("m1", Arc::new(Session::new("s1", "happn_3")), Value::Null)
    }

    #[tokio::test]
    async fn test_runs_all_stages_in_order() {
        let runs = Arc::new(AtomicUsize::new(0));
        let stages = vec![stage("a", &runs, false), stage("b", &runs, false)];

        let out = execute(&stages, message()).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(out.begun_at.is_some());
        let keys: Vec<_> = out.attachments.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_failure_short_circuits() {
        let before = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));
        let stages = vec![
            stage("first", &before, false),
            stage("authorize", &before, true),
            stage("store", &after, false),
            stage("publish", &after, false),
        ];

        let failure = execute(&stages, message()).await.unwrap_err();
        assert_eq!(before.load(Ordering::SeqCst), 2);
        assert_eq!(after.load(Ordering::SeqCst), 0);
        assert_eq!(failure.stage, "authorize");
        assert_eq!(failure.error, DispatchError::access_denied("unauthorized", "security"));
        assert!(failure.message.attachments.contains_key("authorize"));
    }

    #[tokio::test]
    async fn test_empty_stack_only_begins() {
        let out = execute(&[], message()).await.unwrap();
        assert!(out.begun_at.is_some());
    }
}
