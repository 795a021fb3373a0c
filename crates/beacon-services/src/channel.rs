//! Outbound half of a peer connection.
//!
//! A [`NodeChannel`] is a cheap, cloneable handle onto a per-connection
//! queue. The transport drains the queue into the socket; once it stops
//! (socket closed, writer gone) the channel reports itself closed and
//! every further send is skipped. Sends never block.

use beacon_core::ServerMessage;
use tokio::sync::mpsc;

/// A frame queued for the connection writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A serialized JSON text frame.
    Text(String),
    /// Transport-level liveness probe.
    Ping,
    /// Ask the writer to close the socket.
    Close,
}

/// Result of a single fire-and-forget send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The channel was not open. Nothing was queued.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("channel closed")]
pub struct ChannelClosed;

#[derive(Debug, Clone)]
pub struct NodeChannel {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl NodeChannel {
    /// Create a channel and the receiver the connection writer drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Open until the writer drops its receiver.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    pub fn send_text(&self, text: String) -> Delivery {
        if !self.is_open() {
            return Delivery::Skipped;
        }
        match self.tx.send(Outbound::Text(text)) {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::Skipped,
        }
    }

    /// Serialize and queue a single frame.
    pub fn send(&self, message: &ServerMessage) -> Delivery {
        match message.to_json() {
            Ok(text) => self.send_text(text),
            Err(e) => {
                tracing::warn!(error = %e, kind = message.kind(), "failed to encode frame");
                Delivery::Skipped
            }
        }
    }

    pub fn ping(&self) -> Result<(), ChannelClosed> {
        self.tx.send(Outbound::Ping).map_err(|_| ChannelClosed)
    }

    /// Request closure. Idempotent; a no-op on a closed channel.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}
