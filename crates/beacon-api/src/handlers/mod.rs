//! HTTP handlers — the WebSocket endpoint and read-only relay state.

pub mod status;
pub mod ws;

use std::time::Duration;

use beacon_services::{ConnectionRegistry, MessageRouter};

#[derive(Clone)]
pub struct ApiState {
    pub router: MessageRouter,
    pub registry: ConnectionRegistry,
    /// Transport ping cadence for each connection.
    pub heartbeat_interval: Duration,
}

pub use status::{handle_health, handle_nodes, handle_status};
pub use ws::handle_ws;
