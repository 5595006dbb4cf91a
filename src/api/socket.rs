//! WebSocket transport for the relay

use super::AppState;
use crate::relay::{ConnectionRegistry, ProductionRelay, ServerEvent};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();
    run_connection(state.relay, sender, receiver).await;
}

/// Pump frames from `frames` into the relay and relay events into `sink`
/// until the peer closes, then drop the connection from the relay.
pub(crate) async fn run_connection<W, R, E>(relay: Arc<ProductionRelay>, mut sink: W, mut frames: R)
where
    W: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let (conn, outbound) = relay.connect();

    // Single writer per connection; events leave in the order they were queued
    let writer = tokio::spawn(async move {
        let mut events = ReceiverStream::new(outbound);
        while let Some(event) = events.next().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(conn, error = %e, "Failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(Message::Text(text)) => relay.handle_frame(conn, &text).await,
            Ok(Message::Binary(_)) => {
                tracing::warn!(conn, "Binary frame ignored");
                relay.registry().send_to(
                    conn,
                    ServerEvent::Error("Binary frames are not supported".to_string()),
                );
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                tracing::debug!(conn, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Dropping the registry entry closes the outbound channel and ends the writer
    relay.disconnect(conn);
    if let Err(e) = writer.await {
        tracing::debug!(conn, error = %e, "Writer task ended abnormally");
    }
}
