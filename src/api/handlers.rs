//! HTTP request handlers

use super::socket;
use super::types::{
    AnswerRequest, ConfigurationListResponse, ConfigurationResponse, ErrorResponse,
    HealthResponse, ImportResponse, ImportedConfiguration, SessionResponse, StartSessionRequest,
    SuccessResponse,
};
use super::AppState;
use crate::flow::{BotConfiguration, ConfigError, QuestionNode};
use crate::sessions::{SessionError, SessionRecord};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Relay transport
        .route("/ws", get(socket::upgrade))
        .route("/health", get(health))
        // Configuration catalog
        .route(
            "/api/configurations",
            get(list_configurations).post(import_configurations),
        )
        .route("/api/configurations/export", get(export_configurations))
        .route(
            "/api/configurations/:id",
            get(get_configuration).delete(delete_configuration),
        )
        // Flow sessions
        .route("/api/sessions", post(start_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/answer", post(answer_session))
        .route("/api/sessions/:id/reset", post(reset_session))
        .route("/version", get(get_version))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        connections: state.relay.connection_count(),
    })
}

// ============================================================
// Configurations
// ============================================================

async fn list_configurations(State(state): State<AppState>) -> Json<ConfigurationListResponse> {
    let configurations = state
        .catalog
        .list()
        .await
        .iter()
        .map(|c| c.as_ref().clone())
        .collect();
    Json(ConfigurationListResponse { configurations })
}

/// Bare list in the format `import_configurations` accepts
async fn export_configurations(State(state): State<AppState>) -> Json<Vec<BotConfiguration>> {
    Json(
        state
            .catalog
            .list()
            .await
            .iter()
            .map(|c| c.as_ref().clone())
            .collect(),
    )
}

async fn get_configuration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConfigurationResponse>, AppError> {
    let config = state
        .catalog
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Configuration not found: {id}")))?;

    Ok(Json(ConfigurationResponse {
        configuration: config.as_ref().clone(),
    }))
}

/// Body is one configuration or a list of them, as exported
async fn import_configurations(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportResponse>, AppError> {
    let imported = state.catalog.import_document(&body).await?;

    Ok(Json(ImportResponse {
        imported: imported
            .into_iter()
            .map(|(outcome, config)| ImportedConfiguration {
                id: config.id.clone(),
                outcome,
            })
            .collect(),
    }))
}

async fn delete_configuration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.catalog.remove(&id).await {
        return Err(AppError::NotFound(format!("Configuration not found: {id}")));
    }
    tracing::info!(config_id = %id, "Configuration deleted");
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Sessions
// ============================================================

/// An empty body starts the default configuration
async fn start_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SessionResponse>, AppError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        StartSessionRequest::default()
    } else {
        serde_json::from_slice::<StartSessionRequest>(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid session request: {e}")))?
    };

    let config = match request.configuration_id {
        Some(id) => state
            .catalog
            .get(&id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Configuration not found: {id}")))?,
        None => state
            .catalog
            .default_config()
            .await
            .ok_or_else(|| AppError::NotFound("No configurations available".to_string()))?,
    };

    let record = state.sessions.start(&config).await;
    Ok(Json(session_response(Some(&*config), record, None)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let record = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| SessionError::NotFound(id.clone()))?;
    let config = state.catalog.get(&record.session.configuration_id).await;

    Ok(Json(session_response(config.as_deref(), record, None)))
}

async fn answer_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let record = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| SessionError::NotFound(id.clone()))?;

    let Some(config) = state.catalog.get(&record.session.configuration_id).await else {
        let was_open = !record.session.terminated;
        let record = state.sessions.terminate(&id).await?;
        return Ok(Json(session_response(None, record, Some(was_open))));
    };

    let outcome = state
        .sessions
        .answer(&id, &config, &req.question_id, &req.answer)
        .await?;
    Ok(Json(session_response(
        Some(&*config),
        outcome.record,
        Some(outcome.terminated),
    )))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let record = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| SessionError::NotFound(id.clone()))?;
    let config_id = &record.session.configuration_id;
    let config = state
        .catalog
        .get(config_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Configuration not found: {config_id}")))?;

    let record = state.sessions.reset(&id, &config).await?;
    Ok(Json(session_response(Some(&*config), record, None)))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.sessions.discard(&id).await {
        return Err(SessionError::NotFound(id).into());
    }
    Ok(Json(SuccessResponse { success: true }))
}

fn session_response(
    config: Option<&BotConfiguration>,
    record: SessionRecord,
    terminated: Option<bool>,
) -> SessionResponse {
    let current_question: Option<QuestionNode> = config.and_then(|config| {
        record
            .session
            .current_node
            .as_deref()
            .and_then(|id| config.node(id))
            .cloned()
    });

    SessionResponse {
        session: record,
        current_question,
        terminated,
    }
}

async fn get_version() -> &'static str {
    concat!("flowrelay ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    NotFound(String),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => AppError::NotFound(e.to_string()),
            SessionError::StaleQuestion { .. } | SessionError::Rejected(_) => {
                AppError::BadRequest(e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
