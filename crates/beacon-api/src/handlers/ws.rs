//! WebSocket endpoint — one task set per connected peer.
//!
//! The socket is split in two. The writer drains the node's outbound queue
//! into the sink; the reader feeds text frames to the router and pongs to
//! the registry. When the reader ends, for any reason, the node is removed.
//! A reader whose writer has already sent `Close` waits at most
//! [`CLOSE_REPLY_TIMEOUT`] for the peer to answer before giving up.

use std::fmt::Display;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;

use beacon_core::now_millis;
use beacon_services::liveness::spawn_heartbeat;
use beacon_services::{NodeChannel, Outbound};

use super::ApiState;

/// How long a closed-by-relay connection waits for the peer's close reply.
pub const CLOSE_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn handle_ws(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<ApiState>,
) -> Response {
    ws.on_upgrade(move |socket| run_connection(socket, addr, state))
}

async fn run_connection(socket: WebSocket, addr: SocketAddr, state: ApiState) {
    let (sink, stream) = socket.split();
    drive(sink, stream, addr, state).await;
}

/// Run one peer connection over any message sink/stream pair.
async fn drive<W, R>(mut sink: W, mut stream: R, addr: SocketAddr, state: ApiState)
where
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: Display,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
{
    let (channel, outbound) = NodeChannel::new();

    let node_id = match state.router.on_connect(channel.clone(), addr.to_string()) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(remote = %addr, error = %e, "rejecting connection");
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
    };

    let mut writer = tokio::spawn(write_frames(sink, outbound, node_id.clone()));

    spawn_heartbeat(&state.registry, &node_id, channel, state.heartbeat_interval);

    loop {
        tokio::select! {
            frame = stream.next() => {
                let Some(frame) = frame else { break };
                match frame {
                    Ok(Message::Text(text)) => {
                        state.router.handle_text(&node_id, text.as_str());
                    }
                    Ok(Message::Binary(data)) => {
                        state
                            .router
                            .handle_text(&node_id, &String::from_utf8_lossy(&data));
                    }
                    Ok(Message::Pong(_)) => {
                        state.registry.touch(&node_id, now_millis());
                    }
                    // axum answers pings itself.
                    Ok(Message::Ping(_)) => {}
                    Ok(Message::Close(frame)) => {
                        tracing::debug!(node_id = %node_id, ?frame, "peer closed connection");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(node_id = %node_id, error = %e, "websocket error");
                        break;
                    }
                }
            }
            _ = &mut writer => {
                // Close sent, or the socket stopped taking writes.
                let answered = tokio::time::timeout(CLOSE_REPLY_TIMEOUT, async {
                    while let Some(Ok(message)) = stream.next().await {
                        if matches!(message, Message::Close(_)) {
                            return;
                        }
                    }
                })
                .await
                .is_ok();
                tracing::debug!(node_id = %node_id, answered, "writer finished, dropping connection");
                break;
            }
        }
    }

    state.router.on_close(&node_id);
    writer.abort();
}

async fn write_frames<W>(mut sink: W, mut outbound: UnboundedReceiver<Outbound>, node_id: String)
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    while let Some(frame) = outbound.recv().await {
        let message = match frame {
            Outbound::Text(text) => Message::Text(text.into()),
            Outbound::Ping => Message::Ping(Bytes::new()),
            Outbound::Close => {
                let _ = sink.send(Message::Close(None)).await;
                return;
            }
        };
        if let Err(e) = sink.send(message).await {
            tracing::debug!(node_id = %node_id, error = %e, "socket write failed");
            return;
        }
    }
}
