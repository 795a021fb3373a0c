//! Beacon integration test harness.
//!
//! Drives the relay end to end through `beacon-services` with in-memory
//! channels standing in for WebSocket connections. Each `Peer` owns the
//! receiving end of its node's outbound queue, exactly as the transport
//! writer would.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;

use beacon_core::{NodeId, ServerMessage};
use beacon_services::{
    BroadcastEngine, ConnectionRegistry, LivenessMonitor, MessageRouter, NodeChannel, Outbound,
    RouterSettings,
};

mod discovery;
mod liveness;
mod routing;

// ── Harness ───────────────────────────────────────────────────────────────────

pub struct Relay {
    pub registry: ConnectionRegistry,
    pub router: MessageRouter,
    pub monitor: LivenessMonitor,
}

impl Relay {
    pub fn new() -> Self {
        let registry = ConnectionRegistry::new("node");
        let broadcast = BroadcastEngine::new(registry.clone());
        let router = MessageRouter::new(
            registry.clone(),
            broadcast.clone(),
            RouterSettings::default(),
        );
        let monitor = LivenessMonitor::new(
            registry.clone(),
            broadcast,
            60_000,
            Duration::from_secs(60),
        );
        Self {
            registry,
            router,
            monitor,
        }
    }

    pub fn connect(&self) -> Peer {
        let (channel, rx) = NodeChannel::new();
        let id = self
            .router
            .on_connect(channel, "127.0.0.1:0")
            .expect("registration should succeed");
        Peer { id, rx }
    }
}

pub struct Peer {
    pub id: NodeId,
    pub rx: UnboundedReceiver<Outbound>,
}

impl Peer {
    /// Every text frame queued so far, decoded.
    pub fn frames(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            if let Outbound::Text(text) = frame {
                out.push(serde_json::from_str(&text).expect("relay sent invalid JSON"));
            }
        }
        out
    }

    /// Simulate the socket going away: the writer drops its receiver.
    pub fn hang_up(self) -> NodeId {
        self.id
    }
}

pub fn id_set<'a>(ids: impl IntoIterator<Item = &'a NodeId>) -> HashSet<NodeId> {
    ids.into_iter().cloned().collect()
}

pub fn peer_lists(frames: &[ServerMessage]) -> Vec<HashSet<NodeId>> {
    frames
        .iter()
        .filter_map(|f| match f {
            ServerMessage::PeerList { peers, .. } => Some(id_set(peers)),
            _ => None,
        })
        .collect()
}

pub fn count_kind(frames: &[ServerMessage], kind: &str) -> usize {
    frames.iter().filter(|f| f.kind() == kind).count()
}
