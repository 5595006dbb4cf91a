//! Real-time conversation relay
//!
//! Fans chat and typing events out to the other members of a conversation
//! room. Transport-agnostic: the socket handler feeds text frames in and
//! drains each connection's outbound channel.

pub mod auth;
pub mod protocol;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{AuthError, TokenAllowList, TokenVerifier};
pub use protocol::{ClientEvent, ServerEvent};
pub use registry::{
    ClientSession, ConnectionId, ConnectionRegistry, InMemoryRegistry, OUTBOUND_BUFFER,
};

use crate::flow::Sender;
use protocol::{
    AuthenticatePayload, ChatMessage, InboundMessage, TypingNotice, TypingPayload, UNKNOWN_USER,
};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Relay wired to the in-process registry and allow-list verifier
pub type ProductionRelay = Relay<InMemoryRegistry, TokenAllowList>;

pub struct Relay<R, V> {
    registry: R,
    verifier: V,
    next_connection: AtomicU64,
}

impl<R, V> Relay<R, V>
where
    R: ConnectionRegistry,
    V: TokenVerifier,
{
    pub fn new(registry: R, verifier: V) -> Self {
        Self {
            registry,
            verifier,
            next_connection: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    /// Register a new connection and hand back its outbound channel
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let conn = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        self.registry.register(conn, tx);
        tracing::info!(conn, "Client connected");
        (conn, rx)
    }

    /// Drop the connection's session and memberships. Peers are not told.
    pub fn disconnect(&self, conn: ConnectionId) {
        let rooms = self.registry.rooms(conn);
        let session = self.registry.unregister(conn);
        tracing::info!(
            conn,
            user_id = session.as_ref().map_or(UNKNOWN_USER, |s| s.user_id.as_str()),
            rooms = rooms.len(),
            "Client disconnected"
        );
    }

    /// Decode and dispatch one text frame. Malformed frames never reach peers.
    pub async fn handle_frame(&self, conn: ConnectionId, text: &str) {
        match ClientEvent::parse(text) {
            Ok(event) => self.handle(conn, event).await,
            Err(e) => {
                tracing::warn!(conn, error = %e, "Dropping malformed event");
                self.reject(conn, e.to_string());
            }
        }
    }

    pub async fn handle(&self, conn: ConnectionId, event: ClientEvent) {
        tracing::debug!(conn, event = event.name(), "Relay event");
        match event {
            ClientEvent::Authenticate(payload) => self.authenticate(conn, payload).await,
            ClientEvent::JoinConversation(payload) => {
                if self.registry.join(conn, &payload.conversation_id) {
                    tracing::info!(conn, room = %payload.conversation_id, "Joined conversation");
                }
            }
            ClientEvent::LeaveConversation(payload) => {
                if self.registry.leave(conn, &payload.conversation_id) {
                    tracing::info!(conn, room = %payload.conversation_id, "Left conversation");
                }
            }
            ClientEvent::SendMessage(message) => self.send_message(conn, message),
            ClientEvent::Typing(payload) => self.typing(conn, payload),
        }
    }

    async fn authenticate(&self, conn: ConnectionId, payload: AuthenticatePayload) {
        if let Err(e) = self.verifier.verify(&payload.user_id, &payload.token).await {
            tracing::warn!(conn, user_id = %payload.user_id, error = %e, "Authentication rejected");
            self.reject(conn, e.to_string());
            return;
        }

        let session = ClientSession {
            user_id: payload.user_id,
            token: payload.token,
        };
        let user_id = session.user_id.clone();
        if self.registry.set_session(conn, session) {
            tracing::info!(conn, user_id = %user_id, "Client authenticated");
        }
    }

    fn send_message(&self, conn: ConnectionId, message: InboundMessage) {
        let Some(session) = self.registry.session(conn) else {
            tracing::warn!(conn, room = %message.conversation_id, "Message from unauthenticated connection");
            self.reject(conn, "Authenticate before sending messages");
            return;
        };

        if message.sender != Sender::User {
            tracing::debug!(conn, claimed = ?message.sender, "Ignoring client-asserted sender role");
        }

        let client_id = message.id;
        let room = message.conversation_id;
        let stamped = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            content: message.content,
            sender: Sender::User,
            kind: message.kind,
            conversation_id: room.clone(),
            timestamp: chrono::Utc::now(),
            user_id: session.user_id,
            metadata: message.metadata,
        };
        let message_id = stamped.id.clone();

        let delivered = self
            .registry
            .broadcast(&room, conn, &ServerEvent::Message(stamped));
        tracing::debug!(conn, room = %room, message_id = %message_id, delivered, "Message relayed");

        self.registry
            .send_to(conn, ServerEvent::MessageDelivered(client_id));
    }

    fn typing(&self, conn: ConnectionId, payload: TypingPayload) {
        let user_id = self
            .registry
            .session(conn)
            .map_or_else(|| UNKNOWN_USER.to_string(), |s| s.user_id);

        let notice = ServerEvent::Typing(TypingNotice {
            user_id,
            conversation_id: payload.conversation_id.clone(),
            is_typing: payload.is_typing,
        });
        self.registry
            .broadcast(&payload.conversation_id, conn, &notice);
    }

    fn reject(&self, conn: ConnectionId, message: impl Into<String>) {
        self.registry.send_to(conn, ServerEvent::Error(message.into()));
    }
}
