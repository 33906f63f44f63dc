//! Built-in stages
//!
//! Stages the dispatcher owns itself: logging, benchmarking, adapter
//! wrappers, acknowledgement handling and the no-op fillers.

mod acknowledge;
mod benchmark;
mod log;
mod passthrough;
mod protocol;

pub use self::acknowledge::AcknowledgeStage;
pub use self::benchmark::{BenchmarkEnd, BenchmarkStart};
pub use self::log::LogStage;
pub use self::passthrough::{NoStore, Passthrough};
pub use self::protocol::{EncodeResponse, SystemTransform};
