//! Conversation flow engine
//!
//! Walks a configured question tree with pure transitions: the same
//! configuration, session and answer always produce the same next step.

pub mod catalog;
pub mod config;
mod engine;
pub mod session;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{parse_document, ConfigCatalog, ImportOutcome};
pub use config::{
    AnswerOption, BotConfiguration, ConfigError, NextStep, NodeKind, QuestionNode, ANY_ANSWER,
};
pub use engine::{advance, start, Advance, AdvanceError};
pub use session::{ConversationSession, Sender, Turn};
