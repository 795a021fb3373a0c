//! Liveness monitor — evicts nodes that have gone quiet.
//!
//! `last_seen` is refreshed by every inbound frame and by every heartbeat
//! pong. A node silent for longer than the stale window is removed, its
//! channel is asked to close, and the remaining nodes get a node-left
//! frame with `reason: "timeout"`.

use std::time::Duration;

use tokio::sync::broadcast;

use beacon_core::config::TimingConfig;
use beacon_core::{now_millis, NodeId, ServerMessage};

use crate::broadcast::BroadcastEngine;
use crate::channel::NodeChannel;
use crate::registry::ConnectionRegistry;

pub const TIMEOUT_REASON: &str = "timeout";

pub struct LivenessMonitor {
    registry: ConnectionRegistry,
    broadcast: BroadcastEngine,
    stale_after_ms: u64,
    interval: Duration,
}

impl LivenessMonitor {
    pub fn new(
        registry: ConnectionRegistry,
        broadcast: BroadcastEngine,
        stale_after_ms: u64,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            broadcast,
            stale_after_ms,
            interval,
        }
    }

    pub fn from_timing(
        registry: ConnectionRegistry,
        broadcast: BroadcastEngine,
        timing: &TimingConfig,
    ) -> Self {
        Self::new(registry, broadcast, timing.stale_after_ms, timing.sweep_interval())
    }

    /// One pass over a registry snapshot. Returns the evicted ids.
    ///
    /// Staleness is re-checked at removal time, so a node touched after
    /// the snapshot was taken survives.
    pub fn sweep(&self, now: u64) -> Vec<NodeId> {
        let stale_after = self.stale_after_ms;
        let mut evicted = Vec::new();

        for (id, node) in self.registry.snapshot() {
            if now.saturating_sub(node.last_seen) <= stale_after {
                continue;
            }
            let Some(removed) = self
                .registry
                .remove_if(&id, |n| now.saturating_sub(n.last_seen) > stale_after)
            else {
                continue;
            };
            removed.channel.close();

            let total_nodes = self.registry.size();
            tracing::info!(
                node_id = %id,
                silent_ms = now.saturating_sub(removed.last_seen),
                total_nodes,
                "evicting stale node"
            );

            self.broadcast.broadcast(
                &ServerMessage::NodeLeft {
                    node_id: id.clone(),
                    timestamp: now,
                    total_nodes,
                    reason: Some(TIMEOUT_REASON.to_string()),
                },
                None,
            );
            evicted.push(id);
        }

        evicted
    }

    /// Sweep on a fixed cadence until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut interval = tokio::time::interval_at(start, self.interval);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            stale_after_ms = self.stale_after_ms,
            "liveness monitor starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("liveness monitor shutting down");
                    return;
                }
                _ = interval.tick() => {
                    let evicted = self.sweep(now_millis());
                    tracing::debug!(
                        evicted = evicted.len(),
                        remaining = self.registry.size(),
                        "liveness sweep complete"
                    );
                }
            }
        }
    }
}

/// Start the per-connection heartbeat: a transport ping every `period`.
///
/// The task is attached to the node and aborted when the node is removed.
/// It also stops on its own once the channel closes. The matching pong is
/// expected to call [`ConnectionRegistry::touch`].
pub fn spawn_heartbeat(
    registry: &ConnectionRegistry,
    node_id: &str,
    channel: NodeChannel,
    period: Duration,
) -> bool {
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            ticker.tick().await;
            if channel.ping().is_err() {
                return;
            }
        }
    });
    registry.attach_timer(node_id, task.abort_handle())
}
