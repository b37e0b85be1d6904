//! WebSocket handler for real-time reading updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{header, HeaderMap},
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::server::state::AppState;
use crate::store::Subscription;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let origin = peer
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    ws.on_upgrade(move |socket| handle_socket(socket, state, origin, user_agent))
}

/// Handles an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, origin: String, user_agent: String) {
    // Registers and queues the latest reading, if there is one.
    let subscription = state.broadcaster.subscribe();
    let id = subscription.id();

    tracing::info!(
        subscriber = %id,
        %origin,
        %user_agent,
        replayed = subscription.replayed(),
        connections = state.broadcaster.subscriber_count(),
        "WebSocket session established"
    );

    let (sender, mut receiver) = socket.split();

    // Forward queued payloads to the socket
    let mut send_task = tokio::spawn(forward_payloads(subscription, sender, state.send_timeout));

    // Inbound frames only tell us when the peer goes away
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "WebSocket read failed");
                    break;
                }
            }
        }
    });

    // Whichever side finishes first tears down the other
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // The subscription was owned by the send task; make sure it is gone even
    // if the task had not yet been polled to completion.
    state.broadcaster.unsubscribe(id);

    tracing::info!(
        subscriber = %id,
        %origin,
        connections = state.broadcaster.subscriber_count(),
        "WebSocket session closed"
    );
}

/// Drains `subscription` into the socket until the registry drops it, a
/// write fails, or a write exceeds `send_timeout`.
async fn forward_payloads<S>(mut subscription: Subscription, mut sender: S, send_timeout: Duration)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let id = subscription.id();

    while let Some(payload) = subscription.recv().await {
        match tokio::time::timeout(send_timeout, sender.send(Message::Text(payload.to_string())))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(subscriber = %id, error = %e, "WebSocket write failed");
                return;
            }
            Err(_) => {
                tracing::warn!(
                    subscriber = %id,
                    timeout_ms = send_timeout.as_millis() as u64,
                    "WebSocket write timed out"
                );
                return;
            }
        }
    }

    // Queue closed by the registry
    let _ = sender.send(Message::Close(None)).await;
}
