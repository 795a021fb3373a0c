//! Beacon connection protocol — JSON text frames over a WebSocket.
//!
//! Every frame is an object whose `type` field selects the variant.
//! Field names on the wire are camelCase; variant tags are kebab-case.
//! These names ARE the protocol and are shared with browser clients, so
//! renaming a field here is a breaking change.
//!
//! The relay never interprets `signal` or `data` payloads. They are kept
//! as raw [`serde_json::Value`]s and forwarded verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Relay-assigned node identity, `<prefix>-<8 lowercase alphanumerics>`.
pub type NodeId = String;

/// Reply text for frames that cannot be decoded.
pub const INVALID_FORMAT: &str = "Invalid message format";

// ── Client → server ──────────────────────────────────────────────────────────

/// A frame sent by a peer to the relay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Negotiation payload for a single peer.
    Signal {
        to: NodeId,
        #[serde(default)]
        signal: Value,
    },

    /// Application payload for every other peer.
    Broadcast {
        #[serde(default)]
        data: Value,
    },

    /// The sender offers itself as a bootstrap node.
    ///
    /// `score` overrides the computed score; a non-numeric `score` makes
    /// the frame malformed. `knownPeers` replaces the sender's claimed
    /// peer set before scoring.
    #[serde(rename_all = "camelCase")]
    BootstrapAnnouncement {
        #[serde(default)]
        score: Option<f64>,
        #[serde(default)]
        known_peers: Option<Vec<NodeId>>,
    },

    /// Request the current list of other peers.
    PeerDiscovery {},

    /// Application-level ping. `timestamp` is echoed back as `original`.
    Ping {
        #[serde(default)]
        timestamp: Value,
    },

    /// Any well-formed frame with a `type` the relay does not know.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Decode a text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Wire tag of this message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Signal { .. } => "signal",
            ClientMessage::Broadcast { .. } => "broadcast",
            ClientMessage::BootstrapAnnouncement { .. } => "bootstrap-announcement",
            ClientMessage::PeerDiscovery {} => "peer-discovery",
            ClientMessage::Ping { .. } => "ping",
            ClientMessage::Unknown => "unknown",
        }
    }
}

// ── Server → client ──────────────────────────────────────────────────────────

/// A frame sent by the relay to a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// First frame on every connection.
    #[serde(rename_all = "camelCase")]
    Welcome {
        node_id: NodeId,
        timestamp: u64,
        message: String,
        total_nodes: usize,
    },

    #[serde(rename_all = "camelCase")]
    NodeJoined {
        node_id: NodeId,
        timestamp: u64,
        total_nodes: usize,
    },

    /// `reason` is present only for liveness evictions (`"timeout"`).
    #[serde(rename_all = "camelCase")]
    NodeLeft {
        node_id: NodeId,
        timestamp: u64,
        total_nodes: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    PeerList {
        peers: Vec<NodeId>,
        timestamp: u64,
    },

    Signal {
        from: NodeId,
        signal: Value,
        timestamp: u64,
    },

    Broadcast {
        from: NodeId,
        data: Value,
        timestamp: u64,
    },

    #[serde(rename_all = "camelCase")]
    BootstrapAnnouncement {
        bootstrap_id: NodeId,
        bootstrap_score: u8,
        timestamp: u64,
    },

    Pong {
        timestamp: u64,
        original: Value,
    },

    Error {
        message: String,
        timestamp: u64,
    },

    ServerShutdown {
        message: String,
        timestamp: u64,
    },
}

impl ServerMessage {
    /// Encode as a text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire tag of this message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::NodeJoined { .. } => "node-joined",
            ServerMessage::NodeLeft { .. } => "node-left",
            ServerMessage::PeerList { .. } => "peer-list",
            ServerMessage::Signal { .. } => "signal",
            ServerMessage::Broadcast { .. } => "broadcast",
            ServerMessage::BootstrapAnnouncement { .. } => "bootstrap-announcement",
            ServerMessage::Pong { .. } => "pong",
            ServerMessage::Error { .. } => "error",
            ServerMessage::ServerShutdown { .. } => "server-shutdown",
        }
    }

    pub fn error(message: impl Into<String>, timestamp: u64) -> Self {
        ServerMessage::Error {
            message: message.into(),
            timestamp,
        }
    }

    /// The reply for a `signal` whose target is gone.
    pub fn target_not_found(to: &str, timestamp: u64) -> Self {
        Self::error(format!("Target node {} not found", to), timestamp)
    }
}
