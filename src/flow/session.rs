//! Ephemeral conversation progress

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Who produced a turn or message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    #[default]
    User,
    Bot,
}

/// One exchanged line of the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub sender: Sender,
    pub content: String,
    /// Node the turn belongs to; `None` for closing text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

impl Turn {
    pub fn bot(content: impl Into<String>, node_id: Option<String>) -> Self {
        Self {
            sender: Sender::Bot,
            content: content.into(),
            node_id,
        }
    }

    pub fn user(content: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            content: content.into(),
            node_id: Some(node_id.into()),
        }
    }
}

/// Progress through one configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSession {
    pub configuration_id: String,
    /// Node awaiting an answer; `None` once the session has ended
    pub current_node: Option<String>,
    pub answers: BTreeMap<String, String>,
    pub transcript: Vec<Turn>,
    pub terminated: bool,
}

impl ConversationSession {
    pub fn is_answered(&self, node_id: &str) -> bool {
        self.answers.contains_key(node_id)
    }

    pub(super) fn finish(&mut self) {
        self.current_node = None;
        self.terminated = true;
    }
}
