//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection. Inbound
//! frames are routed one at a time, so messages from one client are
//! answered in order. Responses and broadcasts share one outbound queue,
//! drained by a dedicated writer task.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};

use super::lifecycle::{on_close, on_open};
use crate::app_state::AppState;
use crate::domain::Connection;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Joins the global key on open and leaves every key on close.
/// - Routes each text or binary frame through the [`crate::router::MessageRouter`]
///   and queues the response.
/// - Forwards queued responses and broadcasts to the client.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (ws_tx, mut ws_rx) = socket.split();
    let (conn, outbound_rx) = Connection::new(state.outbound_buffer);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let writer = tokio::spawn(write_loop(ws_tx, outbound_rx, shutdown_rx, conn.clone()));

    if let Err(e) = on_open(&state.registry, &conn).await {
        tracing::warn!(conn = %conn.id(), error = %e, "failed to join global key");
    }

    loop {
        tokio::select! {
            biased;
            () = conn.closed() => break,
            msg = ws_rx.next() => {
                let delivered = match msg {
                    Some(Ok(Message::Text(text))) => {
                        respond(&state, &conn, text.as_str().as_bytes()).await
                    }
                    Some(Ok(Message::Binary(bytes))) => respond(&state, &conn, &bytes).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => true,
                    Some(Err(e)) => {
                        tracing::debug!(conn = %conn.id(), error = %e, "ws read failed");
                        break;
                    }
                };
                if !delivered {
                    break;
                }
            }
        }
    }

    on_close(&state.registry, &conn);
    // Every response is queued by now; let the writer flush and close.
    let _ = shutdown_tx.send(());
    if let Err(e) = writer.await {
        tracing::warn!(conn = %conn.id(), error = %e, "ws writer task failed");
    }
}

/// Routes one payload and queues the response. Returns `false` once the
/// connection can no longer accept output.
async fn respond(state: &AppState, conn: &Connection, raw: &[u8]) -> bool {
    let response = state.router.on_message(raw, conn).await;
    match conn.send_json(&response).await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(conn = %conn.id(), error = %e, "response dropped");
            false
        }
    }
}

/// Forwards queued output to the socket until shutdown, then sends a close
/// frame. A failed write closes the connection so the read loop stops too.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<String>,
    mut shutdown: oneshot::Receiver<()>,
    conn: Connection,
) {
    loop {
        tokio::select! {
            // Drain queued output before honouring shutdown.
            biased;
            text = outbound.recv() => {
                let Some(text) = text else {
                    break;
                };
                if ws_tx.send(Message::text(text)).await.is_err() {
                    conn.close();
                    break;
                }
            }
            _ = &mut shutdown => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
        }
    }
}
