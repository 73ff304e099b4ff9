//! WebSocket Handler
//!
//! Transport glue: upgrades HTTP requests to WebSocket and pumps frames
//! between the socket and the lifecycle controller. Non-upgrade requests
//! are rejected by the extractor before the relay core is involved.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::lifecycle::LifecycleController;
use super::registry::Connection;
use crate::api::AppState;

/// WebSocket upgrade handler, mounted at `GET /ws`.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let controller = Arc::clone(&state.controller);
    ws.on_upgrade(move |socket| handle_socket(socket, controller))
}

/// Pump an established WebSocket connection.
///
/// Outbound frames travel through an unbounded channel drained by a
/// dedicated task, so broadcast passes never block on this peer. Inbound
/// frames are fed to the controller one at a time, preserving arrival order.
async fn handle_socket(socket: WebSocket, controller: Arc<LifecycleController>) {
    let (mut sink, mut stream) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn = Connection::new(tx);

    if let Err(e) = controller.on_open(&conn).await {
        tracing::warn!(connection_id = %conn.id(), error = %e, "Connection rejected");
        let _ = sink.close().await;
        return;
    }

    let conn_id = conn.id().to_string();

    // Task to forward queued frames to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                tracing::debug!(
                    connection_id = %conn_id,
                    "WebSocket send failed, stopping outbound pump"
                );
                break;
            }
        }
    });

    let controller_for_recv = Arc::clone(&controller);
    let conn_for_recv = Arc::clone(&conn);

    // Task to feed inbound frames to the controller
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(frame) => {
                    if !handle_frame(&controller_for_recv, &conn_for_recv, frame).await {
                        break;
                    }
                }
                Err(e) => {
                    controller_for_recv
                        .on_error(&conn_for_recv, &e.to_string())
                        .await;
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    // A transport that vanished without a close frame still funnels through
    // the idempotent close path.
    controller.on_close(&conn, 1006, "connection dropped").await;
}

/// Handle one inbound frame.
///
/// Returns false when the connection should stop pumping.
async fn handle_frame(
    controller: &Arc<LifecycleController>,
    conn: &Arc<Connection>,
    frame: Message,
) -> bool {
    match frame {
        Message::Text(text) => {
            match controller.on_message(conn, &text).await {
                Ok(report) => {
                    tracing::trace!(
                        connection_id = %conn.id(),
                        delivered = report.delivered,
                        members = report.members,
                        "Frame relayed"
                    );
                }
                Err(e) => {
                    // Frame dropped, connection stays open
                    tracing::debug!(
                        connection_id = %conn.id(),
                        error = %e,
                        "Malformed frame dropped"
                    );
                }
            }
            true
        }
        Message::Binary(_) => {
            // Wire format is UTF-8 JSON text; anything else is undecodable
            tracing::debug!(connection_id = %conn.id(), "Binary frame dropped");
            true
        }
        Message::Ping(_) | Message::Pong(_) => {
            // Axum answers pings automatically
            true
        }
        Message::Close(close_frame) => {
            let (code, reason) = close_frame
                .map(|f| (f.code, f.reason.to_string()))
                .unwrap_or((1005, String::new()));
            controller.on_close(conn, code, &reason).await;
            false
        }
    }
}
