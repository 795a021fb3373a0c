//! Connection registry — the authoritative set of connected nodes.
//!
//! A concurrent map from node id to [`Node`], shared between the
//! connection tasks, the router and the liveness monitor. Readers that
//! need to iterate take a [`ConnectionRegistry::snapshot`]; nothing sends
//! to a peer while holding a map reference.
//!
//! Per-node background tasks (the heartbeat) are attached with
//! [`ConnectionRegistry::attach_timer`] and aborted on removal.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use tokio::task::AbortHandle;

use beacon_core::{now_millis, NodeId};

use crate::channel::NodeChannel;

/// Length of the random suffix of a node id.
pub const ID_SUFFIX_LEN: usize = 8;

/// Give up after this many consecutive id collisions.
pub const MAX_ID_ATTEMPTS: usize = 16;

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A connected peer.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub channel: NodeChannel,
    /// Informational; taken from the socket at upgrade time.
    pub remote_addr: String,
    /// Unix ms.
    pub connected_at: u64,
    /// Unix ms. Never moves backwards.
    pub last_seen: u64,
    pub is_bootstrap_candidate: bool,
    /// Always within [0, 100].
    pub bootstrap_score: u8,
    /// Peers this node claims to know. Scoring input only.
    pub known_peers: HashSet<NodeId>,
    /// Registration order, for stable snapshots.
    seq: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no free node id after {0} attempts")]
    IdSpaceExhausted(usize),
    #[error("registry is closed to new nodes")]
    Closed,
}

type IdGenerator = dyn Fn(&str) -> NodeId + Send + Sync;

struct Inner {
    nodes: DashMap<NodeId, Node>,
    timers: DashMap<NodeId, Vec<AbortHandle>>,
    prefix: String,
    next_seq: AtomicU64,
    closed: AtomicBool,
    generate: Box<IdGenerator>,
}

/// Shared handle to the registry. Clones refer to the same map.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<Inner>,
}

/// Generate a candidate id: `<prefix>-` followed by 8 chars of [a-z0-9].
pub fn generate_id(prefix: &str) -> NodeId {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", prefix, suffix)
}

impl ConnectionRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_generator(prefix, generate_id)
    }

    /// Registry with a custom id source. Used to exercise collisions.
    pub fn with_generator(
        prefix: impl Into<String>,
        generate: impl Fn(&str) -> NodeId + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                nodes: DashMap::new(),
                timers: DashMap::new(),
                prefix: prefix.into(),
                next_seq: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                generate: Box::new(generate),
            }),
        }
    }

    /// Register a new connection at the current time.
    pub fn register(
        &self,
        channel: NodeChannel,
        remote_addr: impl Into<String>,
    ) -> Result<NodeId, RegistryError> {
        self.register_at(channel, remote_addr, now_millis())
    }

    /// Register a new connection with an explicit clock reading.
    ///
    /// The id is claimed through a vacant-entry insert, so two concurrent
    /// registrations can never end up with the same id.
    pub fn register_at(
        &self,
        channel: NodeChannel,
        remote_addr: impl Into<String>,
        now: u64,
    ) -> Result<NodeId, RegistryError> {
        if self.is_closed() {
            return Err(RegistryError::Closed);
        }
        let remote_addr = remote_addr.into();
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = (self.inner.generate)(&self.inner.prefix);
            match self.inner.nodes.entry(id.clone()) {
                Entry::Occupied(_) => {
                    tracing::warn!(node_id = %id, attempt, "node id collision, regenerating");
                }
                Entry::Vacant(slot) => {
                    slot.insert(Node {
                        id: id.clone(),
                        channel,
                        remote_addr,
                        connected_at: now,
                        last_seen: now,
                        is_bootstrap_candidate: false,
                        bootstrap_score: 0,
                        known_peers: HashSet::new(),
                        seq: self.inner.next_seq.fetch_add(1, Ordering::Relaxed),
                    });
                    return Ok(id);
                }
            }
        }
        Err(RegistryError::IdSpaceExhausted(MAX_ID_ATTEMPTS))
    }

    pub fn get(&self, id: &str) -> Option<Node> {
        self.inner.nodes.get(id).map(|n| n.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.nodes.contains_key(id)
    }

    /// Remove a node and cancel its timers. Idempotent.
    pub fn remove(&self, id: &str) -> Option<Node> {
        let removed = self.inner.nodes.remove(id).map(|(_, node)| node);
        self.cancel_timers(id);
        removed
    }

    /// Remove a node only if `pred` holds for its current state.
    ///
    /// The check and the removal happen under the same shard lock.
    pub fn remove_if(&self, id: &str, pred: impl FnOnce(&Node) -> bool) -> Option<Node> {
        let removed = self
            .inner
            .nodes
            .remove_if(id, |_, node| pred(node))
            .map(|(_, node)| node);
        if removed.is_some() {
            self.cancel_timers(id);
        }
        removed
    }

    /// Bump `last_seen`. Returns false, and does nothing, for unknown ids.
    pub fn touch(&self, id: &str, now: u64) -> bool {
        match self.inner.nodes.get_mut(id) {
            Some(mut node) => {
                node.last_seen = node.last_seen.max(now);
                true
            }
            None => false,
        }
    }

    /// Mutate a node in place. Returns `None` if the node is not registered.
    ///
    /// `f` runs under the shard lock; it must not call back into the registry.
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut Node) -> R) -> Option<R> {
        self.inner.nodes.get_mut(id).map(|mut node| f(&mut node))
    }

    /// Point-in-time copy of all nodes, in registration order.
    pub fn snapshot(&self) -> Vec<(NodeId, Node)> {
        let mut nodes: Vec<Node> = self.inner.nodes.iter().map(|e| e.value().clone()).collect();
        nodes.sort_by_key(|n| n.seq);
        nodes.into_iter().map(|n| (n.id.clone(), n)).collect()
    }

    /// Ids of every registered node except `id`, in registration order.
    pub fn ids_except(&self, id: &str) -> Vec<NodeId> {
        self.snapshot()
            .into_iter()
            .filter(|(other, _)| other != id)
            .map(|(other, _)| other)
            .collect()
    }

    pub fn size(&self) -> usize {
        self.inner.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.nodes.is_empty()
    }

    /// Refuse all further registrations. Existing nodes are untouched.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Tie a background task to a node's lifetime.
    ///
    /// Returns false, and aborts the task, if the node is already gone.
    pub fn attach_timer(&self, id: &str, handle: AbortHandle) -> bool {
        self.inner
            .timers
            .entry(id.to_string())
            .or_default()
            .push(handle);
        // A removal racing with this attach may have already swept the
        // timer table; re-check so the task cannot outlive the node.
        if self.contains(id) {
            true
        } else {
            self.cancel_timers(id);
            false
        }
    }

    fn cancel_timers(&self, id: &str) {
        if let Some((_, handles)) = self.inner.timers.remove(id) {
            for handle in handles {
                handle.abort();
            }
        }
    }
}
