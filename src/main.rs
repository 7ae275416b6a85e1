//! Intake Chat - symptom-intake chat backend
//!
//! A Rust backend serving a browser chat widget that forwards user messages
//! to a generative-language API (or a local intent webhook) and reformats
//! finished conversations into FHIR-shaped summary documents.

mod api;
mod extract;
mod llm;
mod session;
mod summary;
mod system_prompt;

use api::{create_router, AppState};
use llm::{ProviderConfig, ProviderRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intake_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let port: u16 = std::env::var("INTAKE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    // Initialize provider registry
    let config = ProviderConfig::from_env();
    let registry = Arc::new(ProviderRegistry::new(&config));

    if registry.has_providers() {
        tracing::info!(
            providers = ?registry.available_providers(),
            default = %registry.default_provider_id(),
            "Provider registry initialized"
        );
    } else {
        tracing::warn!(
            "No chat providers configured. Set GEMINI_API_KEY or RASA_WEBHOOK_URL; \
             chat calls will fail until one is set."
        );
    }

    // Create application state
    let state = AppState::new(registry);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Intake chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
