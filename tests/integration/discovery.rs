use std::time::Duration;

use serde_json::json;

use beacon_core::ServerMessage;
use beacon_services::RouteOutcome;

use crate::*;

/// Register A, B, C; discovery from A sees B and C; after B leaves only C.
#[tokio::test(start_paused = true)]
async fn test_discovery_tracks_departures() {
    let relay = Relay::new();
    let mut a = relay.connect();
    let b = relay.connect();
    let mut c = relay.connect();
    a.frames();
    c.frames();

    let discover = json!({"type": "peer-discovery"}).to_string();
    assert_eq!(relay.router.handle_text(&a.id, &discover), RouteOutcome::Replied);
    assert_eq!(peer_lists(&a.frames()), vec![id_set([&b.id, &c.id])]);

    let b_id = b.hang_up();
    assert!(relay.router.on_close(&b_id));

    relay.router.handle_text(&a.id, &discover);
    let frames_a = a.frames();
    let frames_c = c.frames();

    for frames in [&frames_a, &frames_c] {
        let left: Vec<_> = frames
            .iter()
            .filter(|f| matches!(f, ServerMessage::NodeLeft { node_id, .. } if *node_id == b_id))
            .collect();
        assert_eq!(left.len(), 1, "expected exactly one node-left for B");
    }
    assert_eq!(peer_lists(&frames_a), vec![id_set([&c.id])]);
}

/// Every registration yields one welcome to the newcomer and one
/// node-joined to each existing node, never to the newcomer itself.
#[tokio::test(start_paused = true)]
async fn test_join_notifications() {
    let relay = Relay::new();
    let mut peers: Vec<Peer> = Vec::new();

    for n in 1..=4 {
        let mut newcomer = relay.connect();
        let frames = newcomer.frames();
        assert_eq!(count_kind(&frames, "welcome"), 1);
        assert_eq!(count_kind(&frames, "node-joined"), 0);
        assert!(matches!(
            &frames[0],
            ServerMessage::Welcome { total_nodes, .. } if *total_nodes == n
        ));

        for existing in peers.iter_mut() {
            let frames = existing.frames();
            assert_eq!(frames.len(), 1);
            assert!(matches!(
                &frames[0],
                ServerMessage::NodeJoined { node_id, total_nodes, .. }
                    if *node_id == newcomer.id && *total_nodes == n
            ));
        }
        peers.push(newcomer);
    }
}

/// The delayed peer-list reflects who is registered when it is sent.
#[tokio::test(start_paused = true)]
async fn test_delayed_peer_list_reflects_delivery_time() {
    let relay = Relay::new();
    let mut a = relay.connect();
    let b = relay.connect();

    tokio::time::sleep(Duration::from_millis(500)).await;
    let mut c = relay.connect();
    relay.router.on_close(&b.hang_up());

    // A's timer fires at 1000ms: sees C, not B.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(peer_lists(&a.frames()), vec![id_set([&c.id])]);

    // C's own list arrives 1000ms after C registered.
    c.frames();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(peer_lists(&c.frames()), vec![id_set([&a.id])]);
}

/// A newcomer whose socket closes during the delay gets no peer-list.
#[tokio::test(start_paused = true)]
async fn test_delayed_peer_list_skips_closed_channel() {
    let relay = Relay::new();
    let a = relay.connect();
    let a_id = a.hang_up();

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(!relay.router.send_peer_list(&a_id));
}
