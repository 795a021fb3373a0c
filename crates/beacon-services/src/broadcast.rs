//! Fan-out of a single frame to many nodes.

use beacon_core::ServerMessage;

use crate::channel::Delivery;
use crate::registry::ConnectionRegistry;

/// Delivers frames to a filtered subset of the registry.
///
/// Never removes nodes: a closed channel is skipped and left for the
/// close path or the liveness sweep to clean up.
#[derive(Clone)]
pub struct BroadcastEngine {
    registry: ConnectionRegistry,
}

impl BroadcastEngine {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Send `message` to every open node except `exclude`.
    /// Returns the number of nodes the frame was queued for.
    pub fn broadcast(&self, message: &ServerMessage, exclude: Option<&str>) -> usize {
        let text = match message.to_json() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, kind = message.kind(), "failed to encode broadcast");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut skipped = 0;
        for (id, node) in self.registry.snapshot() {
            if exclude == Some(id.as_str()) {
                continue;
            }
            match node.channel.send_text(text.clone()) {
                Delivery::Delivered => delivered += 1,
                Delivery::Skipped => skipped += 1,
            }
        }

        tracing::debug!(kind = message.kind(), delivered, skipped, "broadcast");
        delivered
    }
}
