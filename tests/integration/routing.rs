use serde_json::json;

use beacon_core::protocol::INVALID_FORMAT;
use beacon_core::ServerMessage;
use beacon_services::RouteOutcome;

use crate::*;

/// A full signaling exchange: offer A→B, answer B→A, payloads untouched.
#[tokio::test(start_paused = true)]
async fn test_offer_answer_exchange() {
    let relay = Relay::new();
    let mut a = relay.connect();
    let mut b = relay.connect();
    a.frames();
    b.frames();

    let offer = json!({"type": "offer", "sdp": "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\n"});
    let frame = json!({"type": "signal", "to": b.id, "signal": offer}).to_string();
    assert_eq!(relay.router.handle_text(&a.id, &frame), RouteOutcome::Delivered(1));

    let answer = json!({"type": "answer", "sdp": "v=0\r\n", "ice": [{"candidate": "c1"}]});
    let frame = json!({"type": "signal", "to": a.id, "signal": answer}).to_string();
    assert_eq!(relay.router.handle_text(&b.id, &frame), RouteOutcome::Delivered(1));

    let got_b = b.frames();
    assert_eq!(got_b.len(), 1);
    assert!(matches!(
        &got_b[0],
        ServerMessage::Signal { from, signal, .. } if *from == a.id && *signal == offer
    ));

    let got_a = a.frames();
    assert_eq!(got_a.len(), 1);
    assert!(matches!(
        &got_a[0],
        ServerMessage::Signal { from, signal, .. } if *from == b.id && *signal == answer
    ));
}

/// Signal to a departed peer: one error to the sender, nothing delivered.
#[tokio::test(start_paused = true)]
async fn test_signal_to_departed_peer() {
    let relay = Relay::new();
    let mut a = relay.connect();
    let b = relay.connect();
    let b_id = b.hang_up();
    a.frames();

    // B's socket is gone but the close has not been processed yet.
    let frame = json!({"type": "signal", "to": b_id, "signal": "x"}).to_string();
    assert_eq!(relay.router.handle_text(&a.id, &frame), RouteOutcome::TargetNotFound);
    let frames = a.frames();
    assert_eq!(frames.len(), 1);
    assert!(matches!(
        &frames[0],
        ServerMessage::Error { message, .. } if *message == format!("Target node {} not found", b_id)
    ));
}

/// Malformed input never closes the connection or touches other state.
#[tokio::test(start_paused = true)]
async fn test_malformed_frames_keep_connection() {
    let relay = Relay::new();
    let mut a = relay.connect();
    let mut b = relay.connect();
    a.frames();
    b.frames();

    for junk in ["", "{", "[1,2,3]", "\"str\"", r#"{"type":"signal"}"#, r#"{"no":"type"}"#] {
        assert_eq!(relay.router.handle_text(&a.id, junk), RouteOutcome::ParseError, "{junk}");
    }

    let frames = a.frames();
    assert_eq!(frames.len(), 6);
    assert!(frames
        .iter()
        .all(|f| matches!(f, ServerMessage::Error { message, .. } if message == INVALID_FORMAT)));
    assert!(b.frames().is_empty());

    let node = relay.registry.get(&a.id).unwrap();
    assert!(!node.is_bootstrap_candidate);
    assert_eq!(relay.registry.size(), 2);
}

/// Bootstrap announcements are seen by everyone else, with a clamped score.
#[tokio::test(start_paused = true)]
async fn test_bootstrap_announcement_fanout() {
    let relay = Relay::new();
    let mut a = relay.connect();
    let mut b = relay.connect();
    let mut c = relay.connect();
    a.frames();
    b.frames();
    c.frames();

    let frame = json!({"type": "bootstrap-announcement", "score": -20}).to_string();
    assert_eq!(relay.router.handle_text(&a.id, &frame), RouteOutcome::Delivered(2));

    assert!(a.frames().is_empty());
    for peer in [&mut b, &mut c] {
        let frames = peer.frames();
        assert_eq!(frames.len(), 1);
        assert!(matches!(
            &frames[0],
            ServerMessage::BootstrapAnnouncement { bootstrap_id, bootstrap_score: 0, .. }
                if *bootstrap_id == a.id
        ));
    }
    assert!(relay.registry.get(&a.id).unwrap().is_bootstrap_candidate);
}

/// Graceful shutdown: every node is told, then every channel is closed.
#[tokio::test(start_paused = true)]
async fn test_shutdown_sequence() {
    let relay = Relay::new();
    let mut peers = vec![relay.connect(), relay.connect(), relay.connect()];
    for p in peers.iter_mut() {
        p.frames();
    }

    assert_eq!(relay.router.shutdown(), 3);

    for p in peers.iter_mut() {
        match p.rx.try_recv().unwrap() {
            Outbound::Text(text) => {
                let msg: ServerMessage = serde_json::from_str(&text).unwrap();
                assert_eq!(msg.kind(), "server-shutdown");
            }
            other => panic!("expected shutdown notice, got {:?}", other),
        }
        assert_eq!(p.rx.try_recv().unwrap(), Outbound::Close);
    }
}
