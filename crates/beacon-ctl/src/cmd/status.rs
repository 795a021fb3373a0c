//! Relay status and node listing commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    node_count: usize,
    node_ids: Vec<String>,
    timestamp: u64,
}

#[derive(Deserialize)]
struct NodesResponse {
    nodes: Vec<NodeInfo>,
}

#[derive(Deserialize)]
struct NodeInfo {
    id: String,
    remote_addr: String,
    connected_secs: u64,
    last_seen_secs: u64,
    is_bootstrap_candidate: bool,
    bootstrap_score: u8,
    known_peers: usize,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Beacon Relay Status");
    println!("═══════════════════════════════════════");
    println!("  Connected nodes : {}", resp.node_count);
    println!("  As of           : {} ms", resp.timestamp);

    if resp.node_ids.is_empty() {
        println!("\n  No nodes connected.");
    } else {
        println!();
        for id in &resp.node_ids {
            println!("  • {}", id);
        }
    }

    Ok(())
}

pub async fn cmd_nodes(port: u16) -> Result<()> {
    let resp: NodesResponse = get_json(&format!("{}/nodes", base_url(port))).await?;

    if resp.nodes.is_empty() {
        println!("No nodes connected.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Connected Nodes ({})", resp.nodes.len());
    println!("═══════════════════════════════════════");

    for n in &resp.nodes {
        let marker = if n.is_bootstrap_candidate { "★" } else { " " };
        println!("  ┌─ {} {}", marker, n.id);
        println!("  │  addr        : {}", n.remote_addr);
        println!("  │  connected   : {}s", n.connected_secs);
        if n.is_bootstrap_candidate {
            println!("  │  bootstrap   : score {}", n.bootstrap_score);
        }
        println!("  │  known peers : {}", n.known_peers);
        println!("  └─ last seen   : {}s ago", n.last_seen_secs);
    }

    Ok(())
}
