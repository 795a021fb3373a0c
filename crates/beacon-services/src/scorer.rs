//! Bootstrap suitability score.
//!
//! Used only when a bootstrap announcement carries no explicit score.
//! Five points per claimed peer plus one point per full minute connected,
//! capped at 100.

use crate::registry::Node;

pub const MAX_SCORE: u8 = 100;
pub const POINTS_PER_PEER: u64 = 5;
pub const MS_PER_POINT: u64 = 60_000;

/// Score a node at time `now` (unix ms). Pure.
pub fn score(node: &Node, now: u64) -> u8 {
    let peers = (node.known_peers.len() as u64).saturating_mul(POINTS_PER_PEER);
    let minutes = now.saturating_sub(node.connected_at) / MS_PER_POINT;
    peers.saturating_add(minutes).min(MAX_SCORE as u64) as u8
}

/// Clamp a client-supplied score into [0, 100]. Fractions truncate; NaN is 0.
pub fn clamp_supplied(score: f64) -> u8 {
    if score.is_nan() {
        return 0;
    }
    score.clamp(0.0, MAX_SCORE as f64) as u8
}
