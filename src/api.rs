//! HTTP and WebSocket API

mod handlers;
mod socket;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::flow::ConfigCatalog;
use crate::relay::ProductionRelay;
use crate::sessions::SessionManager;
use axum::http::HeaderValue;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ProductionRelay>,
    pub catalog: Arc<ConfigCatalog>,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(relay: ProductionRelay, catalog: ConfigCatalog) -> Self {
        Self {
            relay: Arc::new(relay),
            catalog: Arc::new(catalog),
            sessions: Arc::new(SessionManager::new()),
        }
    }
}

/// CORS for the configured origins; no origins means any origin
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}
