//! Helpers and fakes for relay tests

use super::auth::{AuthError, TokenVerifier};
use super::protocol::ServerEvent;
use super::registry::{ConnectionId, ConnectionRegistry, InMemoryRegistry};
use super::{ProductionRelay, Relay, TokenAllowList};
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

/// Verifier that refuses every token
pub struct DenyAll;

#[async_trait]
impl TokenVerifier for DenyAll {
    async fn verify(&self, user_id: &str, _token: &str) -> Result<(), AuthError> {
        Err(AuthError::Rejected(user_id.to_string()))
    }
}

pub fn relay() -> ProductionRelay {
    Relay::new(InMemoryRegistry::new(), TokenAllowList::default())
}

/// Open a connection and authenticate it as `user_id`
pub async fn authenticated<R, V>(
    relay: &Relay<R, V>,
    user_id: &str,
) -> (ConnectionId, mpsc::Receiver<ServerEvent>)
where
    R: ConnectionRegistry,
    V: TokenVerifier,
{
    let (conn, rx) = relay.connect();
    let frame = json!({
        "event": "authenticate",
        "data": { "userId": user_id, "token": format!("token-{user_id}") }
    });
    relay.handle_frame(conn, &frame.to_string()).await;
    (conn, rx)
}

/// Everything queued for a connection so far
pub fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
