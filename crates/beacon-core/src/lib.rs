//! beacon-core — shared types, wire protocol, and configuration.
//! All other Beacon crates depend on this one.

pub mod clock;
pub mod config;
pub mod protocol;

pub use clock::now_millis;
pub use protocol::{ClientMessage, NodeId, ServerMessage};
