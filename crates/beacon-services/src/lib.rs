//! beacon-services — connection registry, routing, fan-out, and liveness.
//!
//! The transport (see `beacon-api`) owns sockets. Everything here works on
//! [`NodeChannel`] handles, so the whole relay can be driven in tests with
//! in-memory queues.

pub mod broadcast;
pub mod channel;
pub mod liveness;
pub mod registry;
pub mod router;
pub mod scorer;

pub use broadcast::BroadcastEngine;
pub use channel::{ChannelClosed, Delivery, NodeChannel, Outbound};
pub use liveness::LivenessMonitor;
pub use registry::{ConnectionRegistry, Node, RegistryError};
pub use router::{MessageRouter, RouteOutcome, RouterSettings};
