//! Route definitions for the GenomeGPT gateway.
//!
//! Provides HTTP endpoints for chat sessions, the prediction relay, and
//! health checks.

use crate::chat::{session_id_or_default, ChatService};
use crate::provider::{create_provider, Provider};
use crate::relay::{
    BiomarkerReading, CancerRiskInput, InterventionReport, RelayClient, RelayError,
    RiskAssessment, ServiceStatus,
};
use crate::session::Turn;
use axum::{
    extract::{rejection::JsonRejection, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use genome_common::config::Config;
use genome_common::logging::RequestContext;
use genome_common::request_span;
use genome_common::util::sanitize_for_log;
use genome_common::Error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;

/// Service name reported by health checks and trace spans.
pub const SERVICE_NAME: &str = "genome-gateway";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub relay: RelayClient,
}

impl AppState {
    pub fn new(config: &Config, provider: Arc<dyn Provider>) -> Self {
        Self {
            chat: Arc::new(ChatService::new(config, provider)),
            relay: RelayClient::new(&config.relay),
        }
    }
}

/// Chat request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `?sessionId=` query parameter.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Chat reply.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    pub session_id: String,
    pub conversation_length: usize,
    pub filtered: bool,
}

/// Session history.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub messages: Vec<Turn>,
    pub conversation_length: usize,
    pub session_id: String,
}

/// Session cleared.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub message: String,
    pub session_id: String,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub code: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
    pub sessions: usize,
}

/// BioSync reachability.
#[derive(Debug, Serialize, Deserialize)]
pub struct BiosyncStatusResponse {
    pub status: ServiceStatus,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Build the complete router with all routes.
pub fn build_all_routes(config: &Config) -> anyhow::Result<Router> {
    let provider = create_provider(config)?;
    Ok(build_routes(AppState::new(config, provider)))
}

/// Build the router over an existing state. Tests inject scripted providers here.
pub fn build_routes(state: AppState) -> Router {
    let chat = get(history_handler)
        .post(chat_handler)
        .delete(clear_handler);

    Router::new()
        .route("/chat", chat.clone())
        .route("/api/chat", chat)
        .route("/api/predict/cancer", post(predict_cancer_handler))
        .route("/api/biomarkers/process", post(process_biomarkers_handler))
        .route("/api/biomarkers/status", get(biosync_status_handler))
        .route("/api/biomarkers/dashboard", get(dashboard_handler))
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
        .layer(middleware::from_fn(trace_middleware))
        .with_state(state)
}

/// Attach a trace span to every request and echo the trace id back.
async fn trace_middleware(request: Request, next: Next) -> Response {
    let ctx = RequestContext::from_headers(request.headers(), SERVICE_NAME);
    let span = request_span!(
        "http_request",
        ctx.trace_id,
        method = %request.method(),
        path = %request.uri().path()
    );

    let mut response = next.run(request).instrument(span).await;
    ctx.to_headers(response.headers_mut());
    response
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat Handlers
// ─────────────────────────────────────────────────────────────────────────────

fn chat_error(err: Error) -> ApiError {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let detail = sanitize_for_log(&err.to_string());

    let body = match err {
        Error::InvalidInput(message) => ErrorResponse {
            error: message,
            details: None,
            code: "INVALID_REQUEST".into(),
        },
        Error::Timeout(_) => ErrorResponse {
            error: "Failed to get AI response".into(),
            details: Some(detail),
            code: "UPSTREAM_TIMEOUT".into(),
        },
        Error::Upstream(_) => ErrorResponse {
            error: "Failed to get AI response".into(),
            details: Some(detail),
            code: "UPSTREAM_ERROR".into(),
        },
        other => {
            tracing::error!(error = %other, "Unexpected chat error");
            ErrorResponse {
                error: "Internal error".into(),
                details: None,
                code: "INTERNAL_ERROR".into(),
            }
        }
    };

    (status, Json(body))
}

/// Run one chat exchange.
async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected chat body");
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Message is required".into(),
                details: Some(rejection.body_text()),
                code: "INVALID_REQUEST".into(),
            }),
        )
    })?;

    let session_id = session_id_or_default(payload.session_id.as_deref());
    let outcome = state
        .chat
        .converse(&session_id, payload.message.as_deref())
        .await
        .map_err(chat_error)?;

    Ok(Json(ChatReply {
        response: outcome.reply,
        session_id,
        conversation_length: outcome.conversation_length,
        filtered: outcome.filtered,
    }))
}

/// Return a session's history without the system turn.
async fn history_handler(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<HistoryResponse> {
    let session_id = session_id_or_default(query.session_id.as_deref());
    let messages = state.chat.fetch_history(&session_id).await;

    Json(HistoryResponse {
        conversation_length: messages.len(),
        messages,
        session_id,
    })
}

/// Drop a session. Clearing an unknown id is not an error.
async fn clear_handler(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<ClearResponse> {
    let session_id = session_id_or_default(query.session_id.as_deref());
    state.chat.clear(&session_id).await;

    Json(ClearResponse {
        message: "Conversation cleared successfully".into(),
        session_id,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Relay Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn predict_cancer_handler(
    State(state): State<AppState>,
    payload: Result<Json<CancerRiskInput>, JsonRejection>,
) -> Result<Json<RiskAssessment>, RelayError> {
    let Json(input) = payload.map_err(|r| RelayError::Validation(r.body_text()))?;
    state.relay.predict_cancer(&input).await.map(Json)
}

async fn process_biomarkers_handler(
    State(state): State<AppState>,
    payload: Result<Json<BiomarkerReading>, JsonRejection>,
) -> Result<Json<InterventionReport>, RelayError> {
    let Json(reading) = payload.map_err(|r| RelayError::Validation(r.body_text()))?;
    state.relay.process_biomarkers(&reading).await.map(Json)
}

async fn biosync_status_handler(State(state): State<AppState>) -> Json<BiosyncStatusResponse> {
    Json(BiosyncStatusResponse {
        status: state.relay.biosync_status().await,
    })
}

async fn dashboard_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, RelayError> {
    state.relay.dashboard().await.map(Json)
}

// ─────────────────────────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        service: SERVICE_NAME.into(),
        sessions: state.chat.session_count().await,
    })
}
