//! Per-action latency benchmarking
//!
//! `start` and `end` bracket the action-specific part of an inbound stack.
//! Starts are keyed by message id; a start without a matching end stays in
//! memory until the process exits.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use contracts::{Action, MessageId};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Default)]
struct ActionBenchmark {
    current: HashMap<MessageId, Instant>,
    count: u64,
    total_time: Duration,
    avg: Duration,
}

/// Benchmark figures for one action
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchmarkSnapshot {
    pub count: u64,
    pub total_time_ms: f64,
    pub avg_ms: f64,
    /// Started measurements still waiting for their end
    pub in_flight: usize,
}

/// Shared benchmark tracker
#[derive(Debug, Default)]
pub struct BenchmarkTracker {
    stats: Mutex<HashMap<Action, ActionBenchmark>>,
}

impl BenchmarkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, action: Action, id: MessageId) {
        self.start_at(action, id, Instant::now());
    }

    /// Record a start marker at `at` and count the request
    pub fn start_at(&self, action: Action, id: MessageId, at: Instant) {
        let mut stats = self.lock();
        let stat = stats.entry(action).or_default();
        stat.current.insert(id, at);
        stat.count += 1;
    }

    pub fn end(&self, action: Action, id: &MessageId) -> Option<Duration> {
        self.end_at(action, id, Instant::now())
    }

    /// Close the measurement started for `id`
    ///
    /// Returns the elapsed time, or `None` when no start was recorded.
    pub fn end_at(&self, action: Action, id: &MessageId, at: Instant) -> Option<Duration> {
        let mut stats = self.lock();
        let Some(stat) = stats.get_mut(&action) else {
            debug!(%action, message_id = %id, "benchmark end without any start");
            return None;
        };
        let Some(started) = stat.current.remove(id) else {
            debug!(%action, message_id = %id, "benchmark end without matching start");
            return None;
        };

        let elapsed = at.saturating_duration_since(started);
        stat.total_time += elapsed;
        stat.avg = stat.total_time / u32::try_from(stat.count).unwrap_or(u32::MAX).max(1);

        drop(stats);
        observability::record_benchmark_latency_ms(action.as_str(), duration_ms(elapsed));
        Some(elapsed)
    }

    pub fn snapshot(&self, action: Action) -> Option<BenchmarkSnapshot> {
        self.lock().get(&action).map(to_snapshot)
    }

    /// Figures for every action seen so far, keyed by wire name
    pub fn snapshot_all(&self) -> BTreeMap<String, BenchmarkSnapshot> {
        self.lock()
            .iter()
            .map(|(action, stat)| (action.as_str().to_string(), to_snapshot(stat)))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Action, ActionBenchmark>> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn to_snapshot(stat: &ActionBenchmark) -> BenchmarkSnapshot {
    BenchmarkSnapshot {
        count: stat.count,
        total_time_ms: duration_ms(stat.total_time),
        avg_ms: duration_ms(stat.avg),
        in_flight: stat.current.len(),
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
