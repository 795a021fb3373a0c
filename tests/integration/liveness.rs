use serde_json::json;

use beacon_core::ServerMessage;
use beacon_services::RouteOutcome;

use crate::*;

/// A silent node is evicted exactly once; the later socket close is quiet.
#[tokio::test(start_paused = true)]
async fn test_stale_node_evicted_once() {
    let relay = Relay::new();
    let mut a = relay.connect();
    let mut b = relay.connect();
    a.frames();
    b.frames();

    let a_seen = relay.registry.get(&a.id).unwrap().last_seen;
    // B keeps talking; A goes silent.
    relay
        .router
        .handle_text_at(&b.id, r#"{"type":"ping","timestamp":1}"#, a_seen + 50_000);
    b.frames();

    let evicted = relay.monitor.sweep(a_seen + 60_001);
    assert_eq!(evicted, vec![a.id.clone()]);

    // Frames still in flight from A are not relayed.
    let late = json!({"type": "broadcast", "data": "still here"}).to_string();
    assert_eq!(
        relay.router.handle_text_at(&a.id, &late, a_seen + 60_002),
        RouteOutcome::Ignored
    );

    // A's transport now reports the close; no second announcement.
    assert!(!relay.router.on_close(&a.id));
    assert!(relay.registry.contains(&b.id));

    let frames_b = b.frames();
    let left: Vec<_> = frames_b
        .iter()
        .filter_map(|f| match f {
            ServerMessage::NodeLeft { node_id, reason, .. } if *node_id == a.id => Some(reason.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(left, vec![Some("timeout".to_string())]);
    assert_eq!(count_kind(&frames_b, "broadcast"), 0);

    // A was asked to close.
    let mut saw_close = false;
    while let Ok(frame) = a.rx.try_recv() {
        saw_close |= frame == Outbound::Close;
    }
    assert!(saw_close);
}

/// Heartbeat acknowledgments alone keep a node alive.
#[tokio::test(start_paused = true)]
async fn test_pong_touch_keeps_node_alive() {
    let relay = Relay::new();
    let a = relay.connect();
    let start = relay.registry.get(&a.id).unwrap().last_seen;

    for beat in 1..=5 {
        relay.registry.touch(&a.id, start + beat * 30_000);
    }
    assert!(relay.monitor.sweep(start + 150_000 + 59_000).is_empty());
    assert!(relay.registry.contains(&a.id));
}
