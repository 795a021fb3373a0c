//! Message router — drives every node state transition.
//!
//! Connection lifecycle events ([`MessageRouter::on_connect`],
//! [`MessageRouter::on_close`]) and inbound text frames
//! ([`MessageRouter::handle_text`]) all come through here. Each inbound
//! frame yields a [`RouteOutcome`] describing what happened to it.

use std::time::Duration;

use beacon_core::config::BeaconConfig;
use beacon_core::protocol::INVALID_FORMAT;
use beacon_core::{now_millis, ClientMessage, NodeId, ServerMessage};

use crate::broadcast::BroadcastEngine;
use crate::channel::{Delivery, NodeChannel};
use crate::registry::{ConnectionRegistry, RegistryError};
use crate::scorer;

/// What became of one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Relayed or fanned out to this many nodes.
    Delivered(usize),
    /// Answered to the sender only.
    Replied,
    /// `signal` target absent or closed; the sender got an error.
    TargetNotFound,
    /// Frame did not decode; the sender got an error.
    ParseError,
    /// Unknown kind, or sender no longer registered.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub welcome_message: String,
    pub shutdown_message: String,
    /// Delay before the first peer-list after welcome.
    pub peer_list_delay: Duration,
}

impl RouterSettings {
    pub fn from_config(config: &BeaconConfig) -> Self {
        Self {
            welcome_message: config.relay.welcome_message.clone(),
            shutdown_message: config.relay.shutdown_message.clone(),
            peer_list_delay: config.timing.peer_list_delay(),
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from_config(&BeaconConfig::default())
    }
}

#[derive(Clone)]
pub struct MessageRouter {
    registry: ConnectionRegistry,
    broadcast: BroadcastEngine,
    settings: RouterSettings,
}

impl MessageRouter {
    pub fn new(
        registry: ConnectionRegistry,
        broadcast: BroadcastEngine,
        settings: RouterSettings,
    ) -> Self {
        Self {
            registry,
            broadcast,
            settings,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Register a freshly opened channel and announce it.
    ///
    /// The welcome frame is queued before the node-joined broadcast. A
    /// peer-list follows after `peer_list_delay`; it must be called from
    /// within a tokio runtime.
    pub fn on_connect(
        &self,
        channel: NodeChannel,
        remote_addr: impl Into<String>,
    ) -> Result<NodeId, RegistryError> {
        let now = now_millis();
        let remote_addr = remote_addr.into();
        let node_id = self
            .registry
            .register_at(channel.clone(), remote_addr.clone(), now)?;
        let total_nodes = self.registry.size();

        tracing::info!(node_id = %node_id, remote = %remote_addr, total_nodes, "node connected");

        channel.send(&ServerMessage::Welcome {
            node_id: node_id.clone(),
            timestamp: now,
            message: self.settings.welcome_message.clone(),
            total_nodes,
        });

        self.broadcast.broadcast(
            &ServerMessage::NodeJoined {
                node_id: node_id.clone(),
                timestamp: now,
                total_nodes,
            },
            Some(&node_id),
        );

        self.schedule_peer_list(node_id.clone());
        Ok(node_id)
    }

    fn schedule_peer_list(&self, node_id: NodeId) {
        let router = self.clone();
        let delay = self.settings.peer_list_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            router.send_peer_list(&node_id);
        });
    }

    /// Send `node_id` the ids of every other node, computed now.
    /// Returns false if the node is gone or its channel is closed.
    pub fn send_peer_list(&self, node_id: &str) -> bool {
        let Some(node) = self.registry.get(node_id) else {
            return false;
        };
        if !node.channel.is_open() {
            return false;
        }
        let peers = self.registry.ids_except(node_id);
        node.channel.send(&ServerMessage::PeerList {
            peers,
            timestamp: now_millis(),
        }) == Delivery::Delivered
    }

    /// The node's channel closed. Removes it and tells everyone else.
    ///
    /// Returns false if the node had already been removed (e.g. by the
    /// liveness sweep); no second node-left is sent in that case.
    pub fn on_close(&self, node_id: &str) -> bool {
        if self.registry.remove(node_id).is_none() {
            return false;
        }
        let total_nodes = self.registry.size();
        tracing::info!(node_id = %node_id, total_nodes, "node disconnected");

        self.broadcast.broadcast(
            &ServerMessage::NodeLeft {
                node_id: node_id.to_string(),
                timestamp: now_millis(),
                total_nodes,
                reason: None,
            },
            None,
        );
        true
    }

    /// Tell every node the relay is going away and ask each channel to close.
    /// New connections are refused from here on. Returns the number of
    /// nodes notified.
    pub fn shutdown(&self) -> usize {
        self.registry.close();
        let notified = self.broadcast.broadcast(
            &ServerMessage::ServerShutdown {
                message: self.settings.shutdown_message.clone(),
                timestamp: now_millis(),
            },
            None,
        );
        for (_, node) in self.registry.snapshot() {
            node.channel.close();
        }
        notified
    }

    // ── Inbound frames ───────────────────────────────────────────────────────

    pub fn handle_text(&self, node_id: &str, text: &str) -> RouteOutcome {
        self.handle_text_at(node_id, text, now_millis())
    }

    /// Handle one inbound frame with an explicit clock reading.
    ///
    /// Frames from a node that is no longer registered (evicted, or
    /// closed but not yet torn down) are dropped unread.
    pub fn handle_text_at(&self, node_id: &str, text: &str, now: u64) -> RouteOutcome {
        if !self.registry.touch(node_id, now) {
            tracing::debug!(node_id = %node_id, "dropping frame from unregistered node");
            return RouteOutcome::Ignored;
        }

        match ClientMessage::parse(text) {
            Ok(message) => self.route(node_id, message, now),
            Err(e) => {
                tracing::debug!(node_id = %node_id, error = %e, "malformed frame");
                self.reply(node_id, &ServerMessage::error(INVALID_FORMAT, now));
                RouteOutcome::ParseError
            }
        }
    }

    fn route(&self, node_id: &str, message: ClientMessage, now: u64) -> RouteOutcome {
        tracing::trace!(node_id = %node_id, kind = message.kind(), "routing frame");

        match message {
            ClientMessage::Signal { to, signal } => self.relay_signal(node_id, to, signal, now),

            ClientMessage::Broadcast { data } => {
                let delivered = self.broadcast.broadcast(
                    &ServerMessage::Broadcast {
                        from: node_id.to_string(),
                        data,
                        timestamp: now,
                    },
                    Some(node_id),
                );
                RouteOutcome::Delivered(delivered)
            }

            ClientMessage::BootstrapAnnouncement { score, known_peers } => {
                self.announce_bootstrap(node_id, score, known_peers, now)
            }

            ClientMessage::PeerDiscovery {} => {
                let peers = self.registry.ids_except(node_id);
                self.reply(node_id, &ServerMessage::PeerList { peers, timestamp: now });
                RouteOutcome::Replied
            }

            ClientMessage::Ping { timestamp } => {
                self.reply(
                    node_id,
                    &ServerMessage::Pong {
                        timestamp: now,
                        original: timestamp,
                    },
                );
                RouteOutcome::Replied
            }

            ClientMessage::Unknown => {
                tracing::debug!(node_id = %node_id, "ignoring unknown message type");
                RouteOutcome::Ignored
            }
        }
    }

    fn relay_signal(
        &self,
        from: &str,
        to: NodeId,
        signal: serde_json::Value,
        now: u64,
    ) -> RouteOutcome {
        let delivery = match self.registry.get(&to) {
            Some(target) if target.channel.is_open() => target.channel.send(&ServerMessage::Signal {
                from: from.to_string(),
                signal,
                timestamp: now,
            }),
            _ => Delivery::Skipped,
        };

        match delivery {
            Delivery::Delivered => {
                tracing::debug!(from = %from, to = %to, "signal relayed");
                RouteOutcome::Delivered(1)
            }
            Delivery::Skipped => {
                tracing::debug!(from = %from, to = %to, "signal target not found");
                self.reply(from, &ServerMessage::target_not_found(&to, now));
                RouteOutcome::TargetNotFound
            }
        }
    }

    fn announce_bootstrap(
        &self,
        node_id: &str,
        supplied: Option<f64>,
        known_peers: Option<Vec<NodeId>>,
        now: u64,
    ) -> RouteOutcome {
        let score = self.registry.update(node_id, |node| {
            if let Some(peers) = known_peers {
                node.known_peers = peers.into_iter().collect();
            }
            let score = match supplied {
                Some(s) => scorer::clamp_supplied(s),
                None => scorer::score(node, now),
            };
            node.is_bootstrap_candidate = true;
            node.bootstrap_score = score;
            score
        });

        let Some(bootstrap_score) = score else {
            tracing::warn!(node_id = %node_id, "bootstrap announcement from unregistered node");
            return RouteOutcome::Ignored;
        };

        tracing::info!(node_id = %node_id, bootstrap_score, "bootstrap node announced");

        let delivered = self.broadcast.broadcast(
            &ServerMessage::BootstrapAnnouncement {
                bootstrap_id: node_id.to_string(),
                bootstrap_score,
                timestamp: now,
            },
            Some(node_id),
        );
        RouteOutcome::Delivered(delivered)
    }

    fn reply(&self, node_id: &str, message: &ServerMessage) -> Delivery {
        match self.registry.get(node_id) {
            Some(node) => node.channel.send(message),
            None => Delivery::Skipped,
        }
    }
}
