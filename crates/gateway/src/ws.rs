use std::{net::SocketAddr, sync::Arc, time::Instant};

use {
    axum::extract::ws::{Message, WebSocket},
    futures::{SinkExt, stream::StreamExt},
    switchboard_protocol::{
        ClientFrame, ErrorShape, EventFrame, Hello, MAX_CLIENT_FRAME_BYTES, PROTOCOL_VERSION,
        error_codes, events,
    },
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use crate::state::{ConnectedClient, GatewayState};

/// Handle a single WebSocket connection: hello, then join/leave frames until
/// the client goes away.
pub async fn handle_connection(socket: WebSocket, state: Arc<GatewayState>, remote_addr: SocketAddr) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, remote_ip = %remote_addr.ip(), "ws: new connection");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (client_tx, mut client_rx) = mpsc::unbounded_channel::<String>();

    // Write loop: forwards frames from the client channel to the socket.
    let write_conn_id = conn_id.clone();
    let write_handle = tokio::spawn(async move {
        while let Some(msg) = client_rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                debug!(conn_id = %write_conn_id, "ws: write loop closed");
                break;
            }
        }
    });

    let hello = Hello {
        protocol: PROTOCOL_VERSION,
        conn_id: conn_id.clone(),
        server_version: state.version.clone(),
    };
    send_event(&client_tx, events::HELLO, serde_json::to_value(&hello).unwrap_or_default());

    state
        .register_client(ConnectedClient {
            conn_id: conn_id.clone(),
            connected_at: Instant::now(),
        })
        .await;

    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t.to_string(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "ws: read error");
                break;
            },
        };

        if text.len() > MAX_CLIENT_FRAME_BYTES {
            warn!(conn_id = %conn_id, size = text.len(), "ws: frame too large");
            send_error(
                &client_tx,
                error_codes::FRAME_TOO_LARGE,
                format!("frame exceeds {MAX_CLIENT_FRAME_BYTES} bytes"),
            );
            continue;
        }

        let frame: ClientFrame = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "ws: invalid frame");
                send_error(&client_tx, error_codes::INVALID_FRAME, e.to_string());
                continue;
            },
        };

        match frame {
            ClientFrame::JoinConversation { conversation_id } => {
                state
                    .hub
                    .join(&conversation_id, &conn_id, client_tx.clone())
                    .await;
                debug!(conn_id = %conn_id, conversation_id = %conversation_id, "ws: joined");
                send_event(
                    &client_tx,
                    events::JOINED,
                    serde_json::json!({ "conversation_id": conversation_id }),
                );
            },
            ClientFrame::LeaveConversation { conversation_id } => {
                state.hub.leave(&conversation_id, &conn_id).await;
                debug!(conn_id = %conn_id, conversation_id = %conversation_id, "ws: left");
                send_event(
                    &client_tx,
                    events::LEFT,
                    serde_json::json!({ "conversation_id": conversation_id }),
                );
            },
            ClientFrame::Ping => {
                send_event(&client_tx, events::PONG, serde_json::json!({}));
            },
        }
    }

    // ── Cleanup ──────────────────────────────────────────────────────────

    let duration = state
        .remove_client(&conn_id)
        .await
        .map(|c| c.connected_at.elapsed())
        .unwrap_or_default();
    info!(
        conn_id = %conn_id,
        duration_secs = duration.as_secs(),
        "ws: connection closed"
    );

    drop(client_tx);
    write_handle.abort();
}

fn send_event(tx: &mpsc::UnboundedSender<String>, event: &str, payload: serde_json::Value) {
    if let Ok(frame) = serde_json::to_string(&EventFrame::new(event, payload)) {
        let _ = tx.send(frame);
    }
}

fn send_error(tx: &mpsc::UnboundedSender<String>, code: &str, message: String) {
    if let Ok(frame) = serde_json::to_string(&EventFrame::error(ErrorShape::new(code, message))) {
        let _ = tx.send(frame);
    }
}
