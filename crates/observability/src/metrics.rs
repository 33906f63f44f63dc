//! Dispatch metrics
//!
//! Prometheus recorders for the dispatch service plus an in-memory latency
//! aggregator for summaries.

use std::collections::BTreeMap;

use contracts::Action;
use metrics::{counter, gauge, histogram};

/// Record one processed message
///
/// `direction` is `inbound`, `outbound` or `system`; `outcome` is
/// `success` or `failure`.
pub fn record_message_processed(direction: &str, action: &str, outcome: &str) {
    counter!(
        "pubsub_dispatch_messages_total",
        "direction" => direction.to_string(),
        "action" => action.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a protocol resolution attempt
pub fn record_protocol_resolved(protocol: &str, found: bool) {
    let status = if found { "found" } else { "not_found" };
    counter!(
        "pubsub_dispatch_protocol_resolutions_total",
        "protocol" => protocol.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a stage failure that short-circuited a pipeline
pub fn record_stage_failure(stage: &str, kind: &str) {
    counter!(
        "pubsub_dispatch_stage_failures_total",
        "stage" => stage.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record one benchmarked request latency
pub fn record_benchmark_latency_ms(action: &str, latency_ms: f64) {
    histogram!(
        "pubsub_dispatch_request_latency_ms",
        "action" => action.to_string()
    )
    .record(latency_ms);
}

/// Record the number of compiled stacks held by the cache
pub fn record_stack_cache_size(size: usize) {
    gauge!("pubsub_dispatch_stack_cache_size").set(size as f64);
}

/// Per-action latency aggregator
///
/// Aggregates in memory for end-of-run summaries.
#[derive(Debug, Clone, Default)]
pub struct LatencyAggregator {
    pub total: u64,
    pub failures: u64,
    pub per_action: BTreeMap<Action, RunningStats>,
}

impl LatencyAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, action: Action, latency_ms: f64, success: bool) {
        self.total += 1;
        if !success {
            self.failures += 1;
        }
        self.per_action.entry(action).or_default().push(latency_ms);
    }

    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            total: self.total,
            failures: self.failures,
            failure_rate: if self.total > 0 {
                self.failures as f64 / self.total as f64 * 100.0
            } else {
                0.0
            },
            per_action: self
                .per_action
                .iter()
                .map(|(action, stats)| (*action, StatsSummary::from(stats)))
                .collect(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Latency summary
#[derive(Debug, Clone, Default)]
pub struct LatencySummary {
    pub total: u64,
    pub failures: u64,
    pub failure_rate: f64,
    pub per_action: BTreeMap<Action, StatsSummary>,
}

impl std::fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Latency Summary ===")?;
        writeln!(f, "Total messages: {}", self.total)?;
        writeln!(f, "Failures: {} ({:.2}%)", self.failures, self.failure_rate)?;
        for (action, stats) in &self.per_action {
            writeln!(f, "  {}: {}", action, stats)?;
        }
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        if self.count == 0 {
            (self.min, self.max) = (value, value);
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
