//! Replay statistics.

use std::time::Duration;

use dispatcher::DispatchStats;
use observability::LatencyAggregator;

/// Statistics from a replay run
#[derive(Debug, Clone, Default)]
pub struct ReplayStats {
    /// Records handed to the service
    pub processed: u64,

    /// Records that could not be decoded
    pub malformed: u64,

    /// Records answered with an error
    pub failed: u64,

    pub duration: Duration,

    /// Per-action latency as seen by the caller
    pub latency: LatencyAggregator,

    /// Service statistics at the end of the run
    pub dispatch: Option<DispatchStats>,
}

impl ReplayStats {
    /// Records per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.processed as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Replay Statistics ===\n");
        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Processed: {}", self.processed);
        println!("   ├─ Failed: {}", self.failed);
        println!("   ├─ Malformed: {}", self.malformed);
        println!("   └─ Throughput: {:.2} msg/s", self.throughput());

        println!("\n{}", self.latency.summary());

        if let Some(ref dispatch) = self.dispatch {
            println!("Dispatch");
            println!("   ├─ Protocols: {}", dispatch.protocols.join(", "));
            println!("   ├─ Cached stacks: {}", dispatch.stack_cache_size);
            println!("   └─ Protocol usage:");
            for (protocol, count) in &dispatch.protocol_counts {
                println!("        {protocol}: {count}");
            }

            if !dispatch.benchmarks.is_empty() {
                println!("\nBenchmarks");
                for (action, bench) in &dispatch.benchmarks {
                    println!(
                        "   {action}: count={}, total={:.3}ms, avg={:.3}ms",
                        bench.count, bench.total_time_ms, bench.avg_ms
                    );
                }
            }
        }
        println!();
    }
}
