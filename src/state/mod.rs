//! State management module.
//!
//! Contains the Relay (shared process state) and the room registry.

mod registry;
mod relay;

pub use registry::{LeaveOutcome, RoomRegistry};
pub use relay::{OUTGOING_QUEUE_SIZE, Relay};
