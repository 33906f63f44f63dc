//! Benchmark start/end stages

use std::sync::Arc;

use async_trait::async_trait;
use contracts::{DispatchError, Message, Stage};

use crate::benchmark::BenchmarkTracker;

/// Opens a benchmark measurement for the message
#[derive(Debug, Clone)]
pub struct BenchmarkStart {
    tracker: Arc<BenchmarkTracker>,
}

impl BenchmarkStart {
    pub fn new(tracker: Arc<BenchmarkTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl Stage for BenchmarkStart {
    fn name(&self) -> &str {
        "benchmark-start"
    }

    async fn process(&self, message: &mut Message) -> Result<(), DispatchError> {
        let action = message.request()?.action;
        self.tracker.start(action, message.id.clone());
        Ok(())
    }
}

/// Closes the measurement opened by [`BenchmarkStart`]
#[derive(Debug, Clone)]
pub struct BenchmarkEnd {
    tracker: Arc<BenchmarkTracker>,
}

impl BenchmarkEnd {
    pub fn new(tracker: Arc<BenchmarkTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl Stage for BenchmarkEnd {
    fn name(&self) -> &str {
        "benchmark-end"
    }

    async fn process(&self, message: &mut Message) -> Result<(), DispatchError> {
        let action = message.request()?.action;
        self.tracker.end(action, &message.id);
        Ok(())
    }
}
