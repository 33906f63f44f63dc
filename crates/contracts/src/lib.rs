//! # Contracts
//!
//! Frozen interface contracts shared by every dispatch crate: the
//! message-in-flight, sessions, actions, the error taxonomy, and the
//! `Stage` / `ProtocolAdapter` / `ErrorReporter` seams that external
//! collaborators plug into.
//!
//! Business crates depend on this crate only; reverse dependencies are
//! prohibited.

mod action;
mod adapter;
mod consistency;
mod error;
mod message;
mod message_id;
mod reporter;
mod session;
mod settings;
mod stage;

pub use action::*;
pub use adapter::ProtocolAdapter;
pub use consistency::Consistency;
pub use error::*;
pub use message::*;
pub use message_id::MessageId;
pub use reporter::{ErrorReporter, Severity};
pub use session::*;
pub use settings::*;
pub use stage::{Stage, StageRef};
