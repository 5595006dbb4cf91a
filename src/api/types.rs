//! API request and response types

use crate::flow::{BotConfiguration, ImportOutcome, QuestionNode};
use crate::sessions::SessionRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub connections: usize,
}

#[derive(Debug, Serialize)]
pub struct ConfigurationListResponse {
    pub configurations: Vec<BotConfiguration>,
}

#[derive(Debug, Serialize)]
pub struct ConfigurationResponse {
    pub configuration: BotConfiguration,
}

#[derive(Debug, Serialize)]
pub struct ImportedConfiguration {
    pub id: String,
    pub outcome: ImportOutcome,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: Vec<ImportedConfiguration>,
}

/// Request to start a session; without an id the default configuration is used
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    #[serde(default)]
    pub configuration_id: Option<String>,
}

/// An answer names the question it answers so retries are not applied twice
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_id: String,
    pub answer: String,
}

/// A session with the question it is waiting on
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session: SessionRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<QuestionNode>,
    /// Set on answer responses; true only for the answer that ended the session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminated: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
