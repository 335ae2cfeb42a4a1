//! Chat-completion provider abstraction.
//!
//! The gateway talks to a single OpenAI-compatible completion API (Groq by
//! default). The [`Provider`] trait is the seam the chat service and the
//! gatekeeper depend on, so tests can swap in scripted providers.

mod compatible;

pub use compatible::CompatibleProvider;

use async_trait::async_trait;
use genome_common::config::Config;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Provider Trait
// ============================================================================

/// Unified interface for LLM providers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Send a chat completion request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Error from a provider.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub provider: String,
    pub model: String,
    pub message: String,
    pub status_code: Option<u16>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.provider, self.model, self.message)
    }
}

impl std::error::Error for ProviderError {}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Unified chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model to use
    pub model: String,
    /// Messages in the conversation, oldest first
    pub messages: Vec<Message>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Unified chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Provider name
    pub provider: String,
    /// Model used
    pub model: String,
    /// Content of the first choice; `None` when the upstream returned no
    /// choice or a choice without content
    pub content: Option<String>,
    /// Token usage
    pub usage: TokenUsage,
    /// Finish reason
    pub finish_reason: Option<String>,
    /// Response latency in milliseconds
    pub latency_ms: u64,
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

// ============================================================================
// Construction
// ============================================================================

/// Build the configured completion provider.
pub fn create_provider(config: &Config) -> anyhow::Result<Arc<dyn Provider>> {
    let llm = &config.llm;
    let timeout = Duration::from_secs(llm.timeout_secs);
    let name = llm.provider.to_lowercase();
    let api_key = config.get_api_key(&name);

    if api_key.is_none() {
        tracing::warn!(
            provider = %name,
            "No API key configured; completion calls will fail until one is set"
        );
    }

    let provider = match name.as_str() {
        "groq" => CompatibleProvider::groq(api_key.as_deref()),
        "openai" => CompatibleProvider::openai(api_key.as_deref()),
        "custom" => {
            let base_url = llm
                .base_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("llm.base_url is required for the custom provider"))?;
            CompatibleProvider::custom("custom", base_url, api_key.as_deref())
        }
        other => anyhow::bail!("Unknown LLM provider: {other}"),
    };

    let provider = match (&llm.base_url, name.as_str()) {
        (Some(url), "groq" | "openai") => provider.with_base_url(url),
        _ => provider,
    };

    tracing::info!(
        provider = %provider.name(),
        model = %llm.model,
        timeout_secs = llm.timeout_secs,
        "Completion provider configured"
    );

    Ok(Arc::new(provider.with_timeout(timeout)))
}
