//! GenomeGPT Gateway - health chat relay and prediction service relay.
//!
//! This crate provides the HTTP service behind the GenomeGPT UI:
//! - Per-session chat history with a bounded window
//! - A topical gatekeeper in front of the completion call
//! - OpenAI-compatible completion providers (Groq by default)
//! - Validated relays to the cancer-risk and biomarker services
//!
//! ## Architecture
//!
//! ```text
//! Client → Gateway → Gatekeeper (classify) → Session (lock, append) → Provider
//!             ↓
//!          Relay → cancer-risk / BioSync services
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod chat;
pub mod gatekeeper;
pub mod provider;
pub mod relay;
pub mod routes;
pub mod session;

pub use chat::{ChatService, ConverseOutcome};
pub use gatekeeper::Gatekeeper;
pub use provider::{
    create_provider, ChatRequest, ChatResponse, CompatibleProvider, Message, Provider,
    ProviderError, TokenUsage,
};
pub use relay::{RelayClient, RelayError};
pub use routes::{build_routes, AppState};
pub use session::{Role, Session, SessionStore, Turn};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use genome_common::config::Config;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Apply the gateway-wide middleware to a router.
pub fn with_middleware(router: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
}

/// Build the gateway router with all routes and middleware.
pub fn build_router(config: &Config) -> anyhow::Result<Router> {
    Ok(with_middleware(routes::build_all_routes(config)?))
}

/// Start the gateway server.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from((
        config.network.bind.parse::<std::net::IpAddr>()?,
        config.network.port,
    ));

    let router = build_router(config)?;

    tracing::info!("Starting GenomeGPT Gateway on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
