//! Traffic replay through the dispatch service.

mod runner;
mod stats;

pub use runner::{Replay, ReplayConfig};
pub use stats::ReplayStats;
