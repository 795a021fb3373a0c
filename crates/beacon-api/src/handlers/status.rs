//! /health, /api/status, /api/nodes handlers.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use beacon_core::{now_millis, NodeId};

use super::ApiState;

// ── /health ───────────────────────────────────────────────────────────────────

pub async fn handle_health() -> &'static str {
    "OK"
}

// ── /status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub node_count: usize,
    pub node_ids: Vec<NodeId>,
    pub timestamp: u64,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let node_ids: Vec<NodeId> = state
        .registry
        .snapshot()
        .into_iter()
        .map(|(id, _)| id)
        .collect();

    Json(StatusResponse {
        node_count: node_ids.len(),
        node_ids,
        timestamp: now_millis(),
    })
}

// ── /nodes ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct NodesResponse {
    pub nodes: Vec<NodeInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub remote_addr: String,
    pub connected_secs: u64,
    pub last_seen_secs: u64,
    pub is_bootstrap_candidate: bool,
    pub bootstrap_score: u8,
    pub known_peers: usize,
}

pub async fn handle_nodes(State(state): State<ApiState>) -> Json<NodesResponse> {
    let now = now_millis();
    let nodes = state
        .registry
        .snapshot()
        .into_iter()
        .map(|(id, node)| NodeInfo {
            id,
            remote_addr: node.remote_addr,
            connected_secs: now.saturating_sub(node.connected_at) / 1000,
            last_seen_secs: now.saturating_sub(node.last_seen) / 1000,
            is_bootstrap_candidate: node.is_bootstrap_candidate,
            bootstrap_score: node.bootstrap_score,
            known_peers: node.known_peers.len(),
        })
        .collect();

    Json(NodesResponse { nodes })
}
