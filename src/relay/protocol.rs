//! Relay wire protocol
//!
//! Every frame is a JSON text frame shaped `{"event": <name>, "data": <payload>}`.

use crate::flow::Sender;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User id reported for connections that never authenticated
pub const UNKNOWN_USER: &str = "unknown";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{event} is missing {field}")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Voice,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

// ============================================================================
// Inbound
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatePayload {
    pub user_id: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPayload {
    pub conversation_id: String,
}

/// A chat message as submitted by a client; `id` is only echoed in the ack
/// and `sender` is never trusted
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub content: String,
    #[serde(default)]
    pub sender: Sender,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub conversation_id: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub conversation_id: String,
    pub is_typing: bool,
}

/// Events a client may send
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Authenticate(AuthenticatePayload),
    JoinConversation(RoomPayload),
    LeaveConversation(RoomPayload),
    SendMessage(InboundMessage),
    Typing(TypingPayload),
}

impl ClientEvent {
    /// Decode a text frame and check required fields are non-empty
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let event: Self = serde_json::from_str(text)?;
        event.validate()?;
        Ok(event)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Authenticate(_) => "authenticate",
            ClientEvent::JoinConversation(_) => "join_conversation",
            ClientEvent::LeaveConversation(_) => "leave_conversation",
            ClientEvent::SendMessage(_) => "send_message",
            ClientEvent::Typing(_) => "typing",
        }
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        let event = self.name();
        let require = |field: &'static str, value: &str| {
            if value.trim().is_empty() {
                Err(ProtocolError::MissingField { event, field })
            } else {
                Ok(())
            }
        };

        match self {
            ClientEvent::Authenticate(p) => {
                require("userId", &p.user_id)?;
                require("token", &p.token)
            }
            ClientEvent::JoinConversation(p) | ClientEvent::LeaveConversation(p) => {
                require("conversationId", &p.conversation_id)
            }
            ClientEvent::SendMessage(m) => {
                require("conversationId", &m.conversation_id)?;
                require("content", &m.content)
            }
            ClientEvent::Typing(t) => require("conversationId", &t.conversation_id),
        }
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// A message as rebroadcast by the relay, with server-assigned identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
    /// Authenticated user that submitted the message
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    pub user_id: String,
    pub conversation_id: String,
    pub is_typing: bool,
}

/// Events the relay sends to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Message(ChatMessage),
    /// Client-supplied id of the acknowledged message
    MessageDelivered(Option<String>),
    Typing(TypingNotice),
    Error(String),
}
