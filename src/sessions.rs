//! Server-side conversation sessions
//!
//! Holds ephemeral flow sessions in memory so HTTP clients can drive the
//! engine. Nothing here is persisted; sessions vanish with the process.

use crate::flow::{self, AdvanceError, BotConfiguration, ConversationSession, Turn};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Bot turn appended once when a session ends
pub const CLOSING_MESSAGE: &str =
    "Thank you! Your responses have been submitted. You will be contacted shortly.";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Question {answered} is not the current question")]
    StaleQuestion { answered: String },
    #[error(transparent)]
    Rejected(#[from] AdvanceError),
}

/// A session plus the identity the manager assigned it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    #[serde(flatten)]
    pub session: ConversationSession,
}

/// Result of answering through the manager
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub record: SessionRecord,
    /// True only for the answer that ended the session
    pub terminated: bool,
}

#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session on `config`
    pub async fn start(&self, config: &BotConfiguration) -> SessionRecord {
        let record = SessionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            session: open(config),
        };
        tracing::info!(
            session_id = %record.id,
            config_id = %config.id,
            "Session started"
        );
        self.sessions
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        record
    }

    pub async fn get(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Feed an answer for `question_id` to the engine and store the
    /// resulting session. Answers to any node but the current one are
    /// refused, so a retried request cannot land on the next question.
    pub async fn answer(
        &self,
        id: &str,
        config: &BotConfiguration,
        question_id: &str,
        answer: &str,
    ) -> Result<AnswerOutcome, SessionError> {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        if record.session.is_answered(question_id) {
            tracing::debug!(session_id = %id, question_id, "Duplicate answer rejected");
            return Err(AdvanceError::AlreadyAnswered(question_id.to_string()).into());
        }
        if record.session.terminated {
            return Err(AdvanceError::SessionEnded.into());
        }
        if record.session.current_node.as_deref() != Some(question_id) {
            return Err(SessionError::StaleQuestion {
                answered: question_id.to_string(),
            });
        }

        let advanced = match flow::advance(config, &record.session, answer) {
            Ok(advanced) => advanced,
            Err(e) => {
                tracing::debug!(session_id = %id, error = %e, "Answer rejected");
                return Err(e.into());
            }
        };

        record.session = advanced.session;
        if advanced.terminated {
            record.session.transcript.push(Turn::bot(CLOSING_MESSAGE, None));
            tracing::info!(
                session_id = %id,
                answers = record.session.answers.len(),
                "Session completed"
            );
        }

        Ok(AnswerOutcome {
            record: record.clone(),
            terminated: advanced.terminated,
        })
    }

    /// End a session whose configuration is no longer available
    pub async fn terminate(&self, id: &str) -> Result<SessionRecord, SessionError> {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        if !record.session.terminated {
            record.session.current_node = None;
            record.session.terminated = true;
            record.session.transcript.push(Turn::bot(CLOSING_MESSAGE, None));
            tracing::warn!(session_id = %id, "Session ended without its configuration");
        }
        Ok(record.clone())
    }

    /// Replace a session's progress with a fresh start, keeping its id
    pub async fn reset(
        &self,
        id: &str,
        config: &BotConfiguration,
    ) -> Result<SessionRecord, SessionError> {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        record.started_at = Utc::now();
        record.session = open(config);
        tracing::info!(session_id = %id, "Session reset");
        Ok(record.clone())
    }

    pub async fn discard(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn open(config: &BotConfiguration) -> ConversationSession {
    let mut session = flow::start(config);
    if session.terminated {
        session.transcript.push(Turn::bot(CLOSING_MESSAGE, None));
    }
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::testing::{branch, choice, config, text};
    use crate::flow::Sender;

    fn scenario() -> BotConfiguration {
        config(vec![
            choice("A", &["Yes", "No"], Some(branch(&[("Yes", "B")]))),
            text("B", None),
        ])
    }

    fn closing_count(record: &SessionRecord) -> usize {
        record
            .session
            .transcript
            .iter()
            .filter(|t| t.sender == Sender::Bot && t.content == CLOSING_MESSAGE)
            .count()
    }

    #[tokio::test]
    async fn test_closing_message_emitted_once() {
        let manager = SessionManager::new();
        let cfg = scenario();
        let record = manager.start(&cfg).await;

        let outcome = manager.answer(&record.id, &cfg, "A", "No").await.unwrap();
        assert!(outcome.terminated);
        assert_eq!(closing_count(&outcome.record), 1);

        let err = manager.answer(&record.id, &cfg, "A", "No").await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(AdvanceError::AlreadyAnswered(_))));
        let err = manager.answer(&record.id, &cfg, "B", "late").await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(AdvanceError::SessionEnded)));
        assert_eq!(closing_count(&manager.get(&record.id).await.unwrap()), 1);
    }

    #[tokio::test]
    async fn test_rejected_answer_leaves_session_untouched() {
        let manager = SessionManager::new();
        let cfg = scenario();
        let record = manager.start(&cfg).await;

        let err = manager.answer(&record.id, &cfg, "A", "").await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(AdvanceError::AnswerRequired(_))));
        assert_eq!(manager.get(&record.id).await.unwrap().session, record.session);
    }

    #[tokio::test]
    async fn test_retried_answer_does_not_reach_next_question() {
        let manager = SessionManager::new();
        let cfg = scenario();
        let record = manager.start(&cfg).await;

        manager.answer(&record.id, &cfg, "A", "Yes").await.unwrap();
        let err = manager.answer(&record.id, &cfg, "A", "Yes").await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(AdvanceError::AlreadyAnswered(ref node)) if node == "A"));

        let session = manager.get(&record.id).await.unwrap().session;
        assert_eq!(session.answers.len(), 1);
        assert_eq!(session.current_node.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_answer_for_other_question_is_stale() {
        let manager = SessionManager::new();
        let cfg = scenario();
        let record = manager.start(&cfg).await;

        let err = manager.answer(&record.id, &cfg, "B", "early").await.unwrap_err();
        assert!(matches!(err, SessionError::StaleQuestion { ref answered } if answered == "B"));
        assert_eq!(manager.get(&record.id).await.unwrap().session, record.session);
    }

    #[tokio::test]
    async fn test_empty_configuration_closes_on_start() {
        let manager = SessionManager::new();
        let record = manager.start(&config(vec![])).await;
        assert!(record.session.terminated);
        assert_eq!(closing_count(&record), 1);
    }

    #[tokio::test]
    async fn test_reset_keeps_id() {
        let manager = SessionManager::new();
        let cfg = scenario();
        let record = manager.start(&cfg).await;
        manager.answer(&record.id, &cfg, "A", "Yes").await.unwrap();

        let reset = manager.reset(&record.id, &cfg).await.unwrap();
        assert_eq!(reset.id, record.id);
        assert!(reset.session.answers.is_empty());
        assert_eq!(reset.session.current_node.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_terminate_and_discard() {
        let manager = SessionManager::new();
        let cfg = scenario();
        let record = manager.start(&cfg).await;

        let ended = manager.terminate(&record.id).await.unwrap();
        assert!(ended.session.terminated);
        let again = manager.terminate(&record.id).await.unwrap();
        assert_eq!(closing_count(&again), 1);

        assert!(manager.discard(&record.id).await);
        assert!(!manager.discard(&record.id).await);
        assert!(matches!(
            manager.answer(&record.id, &cfg, "A", "Yes").await,
            Err(SessionError::NotFound(_))
        ));
        assert_eq!(manager.len().await, 0);
    }
}
