//! Pure flow transitions
//!
//! `advance` never reads the clock, randomness or any shared state; replaying
//! the same configuration, session and answer yields the same result.

use super::config::{BotConfiguration, NextStep, NodeKind, QuestionNode, ANY_ANSWER};
use super::session::{ConversationSession, Turn};
use std::collections::BTreeMap;
use thiserror::Error;

/// Result of a successful advance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    pub session: ConversationSession,
    /// True only on the call that ended the session
    pub terminated: bool,
}

impl Advance {
    pub fn next_node(&self) -> Option<&str> {
        self.session.current_node.as_deref()
    }
}

/// Reasons an answer is refused. The session is left untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdvanceError {
    #[error("Conversation has already ended")]
    SessionEnded,
    #[error("Question {0} has already been answered")]
    AlreadyAnswered(String),
    #[error("Question {0} requires an answer")]
    AnswerRequired(String),
    #[error("{answer:?} is not an option for question {node}")]
    InvalidChoice { node: String, answer: String },
}

/// Open a session on the first node of `config`
///
/// A configuration without nodes yields a session that is already over.
pub fn start(config: &BotConfiguration) -> ConversationSession {
    let mut session = ConversationSession {
        configuration_id: config.id.clone(),
        current_node: None,
        answers: BTreeMap::new(),
        transcript: Vec::new(),
        terminated: false,
    };

    match config.first_node() {
        Some(node) => present(&mut session, node),
        None => session.finish(),
    }
    session
}

/// Record `answer` for the current node and move to the next one
pub fn advance(
    config: &BotConfiguration,
    session: &ConversationSession,
    answer: &str,
) -> Result<Advance, AdvanceError> {
    if session.terminated {
        return Err(AdvanceError::SessionEnded);
    }
    let Some(current_id) = session.current_node.as_deref() else {
        return Err(AdvanceError::SessionEnded);
    };
    if session.is_answered(current_id) {
        return Err(AdvanceError::AlreadyAnswered(current_id.to_string()));
    }

    let mut next = session.clone();

    // The configuration changed under the session; end it rather than fail
    let Some(node) = config.node(current_id) else {
        next.finish();
        return Ok(Advance {
            session: next,
            terminated: true,
        });
    };

    let recorded = accept_answer(node, answer)?;
    next.answers.insert(node.id.clone(), recorded.clone());
    next.transcript.push(Turn::user(answer, node.id.clone()));

    // Missing targets and revisits both end the conversation. Refusing to
    // re-enter an answered node bounds every session by the node count.
    let target = resolve_next(node, &recorded)
        .and_then(|id| config.node(id))
        .filter(|target| !next.is_answered(&target.id));

    match target {
        Some(target) => {
            present(&mut next, target);
            Ok(Advance {
                session: next,
                terminated: false,
            })
        }
        None => {
            next.finish();
            Ok(Advance {
                session: next,
                terminated: true,
            })
        }
    }
}

fn present(session: &mut ConversationSession, node: &QuestionNode) {
    session
        .transcript
        .push(Turn::bot(node.question.clone(), Some(node.id.clone())));
    session.current_node = Some(node.id.clone());
}

/// Validate an answer and return the value to record
fn accept_answer(node: &QuestionNode, answer: &str) -> Result<String, AdvanceError> {
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        if node.required {
            return Err(AdvanceError::AnswerRequired(node.id.clone()));
        }
        return Ok(ANY_ANSWER.to_string());
    }

    if !node.kind.is_choice() {
        return Ok(answer.to_string());
    }

    node.option_for(trimmed)
        .map(|opt| opt.value.clone())
        .ok_or_else(|| AdvanceError::InvalidChoice {
            node: node.id.clone(),
            answer: answer.to_string(),
        })
}

/// Option-level override first, then the node-level `next`
fn resolve_next<'a>(node: &'a QuestionNode, answer: &str) -> Option<&'a str> {
    if node.kind.is_choice() {
        let override_target = node
            .options
            .iter()
            .find(|opt| opt.value == answer)
            .and_then(|opt| opt.next.as_deref());
        if override_target.is_some() {
            return override_target;
        }
    }

    match node.next.as_ref()? {
        NextStep::Node(id) => Some(id.as_str()),
        NextStep::Branch(map) if node.kind == NodeKind::Text => {
            map.get(ANY_ANSWER).map(String::as_str)
        }
        NextStep::Branch(map) => map.get(answer).map(String::as_str),
    }
}
