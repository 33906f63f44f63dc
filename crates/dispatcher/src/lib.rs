//! # Dispatcher
//!
//! Message-dispatch core of the pub/sub server.
//!
//! Responsibilities:
//! - Resolve a session's protocol version to its adapter
//! - Compile and cache per-action stage stacks
//! - Run stacks over messages and encode the outcome
//! - Track benchmarks, acknowledgements and error health

pub mod benchmark;
pub mod catalog;
pub mod error;
pub mod events;
pub mod executor;
pub mod health;
pub mod publication;
pub mod registry;
pub mod service;
pub mod stack;
pub mod stages;

pub use benchmark::{BenchmarkSnapshot, BenchmarkTracker};
pub use catalog::{ResolvedCatalog, StageCatalog, StageRole};
pub use error::DispatcherError;
pub use events::{DispatchEvent, EventBus};
pub use executor::{execute, PipelineFailure};
pub use health::{HealthMonitor, HealthSnapshot, HealthStatus};
pub use publication::{AcknowledgementRegistry, Delivery, Publication, PublicationReport};
pub use registry::{Protocol, ProtocolFactory, ProtocolRegistry, ProtocolTable};
pub use service::{DispatchService, DispatchServiceBuilder, DispatchStats};
pub use stack::{key_for, Stack, StackCache, StackCompiler};
