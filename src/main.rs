//! flowrelay server
//!
//! Serves the flow session API and the conversation relay WebSocket.

use flowrelay::api::{cors_layer, create_router, AppState};
use flowrelay::flow::ConfigCatalog;
use flowrelay::relay::{InMemoryRegistry, Relay, TokenAllowList};
use flowrelay::settings::Settings;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowrelay=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let settings = Settings::from_env()?;

    let catalog = match &settings.config_dir {
        Some(dir) => {
            tracing::info!(path = %dir.display(), "Loading configurations");
            ConfigCatalog::load_dir(dir)?
        }
        None => ConfigCatalog::with_samples()?,
    };
    tracing::info!(count = catalog.len().await, "Configuration catalog ready");

    let verifier = TokenAllowList::new(settings.tokens.iter().cloned());
    if verifier.is_open() {
        tracing::warn!("No FLOWRELAY_TOKENS configured; any non-empty token is accepted");
    }
    let relay = Relay::new(InMemoryRegistry::new(), verifier);

    let state = AppState::new(relay, catalog);
    let app = create_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&settings.allowed_origins)),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!("flowrelay server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
