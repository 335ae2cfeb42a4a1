//! Configuration management for GenomeGPT services.
//!
//! Services share a configuration directory at `~/.genomegpt/`, holding
//! `config.json` and an optional `secrets.json` (see [`crate::config_loader`]).
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `GENOME_PORT` → network.port
//! - `GENOME_BIND_ADDRESS` → network.bind
//! - `GENOME_LOG_LEVEL` → observability.log_level
//! - `GENOME_LLM_MODEL` → llm.model
//! - `GENOME_CANCER_API` → relay.cancer_endpoint
//! - `GENOME_BIOSYNC_API` → relay.biosync_endpoint
//! - `GROQ_API_KEY` → secrets.llm.groq
//! - `OPENAI_API_KEY` → secrets.llm.openai

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".genomegpt"),
        |dirs| dirs.home_dir().join(".genomegpt"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Listener configuration.
///
/// Default bind is `127.0.0.1` (local only). Set to `0.0.0.0` to allow
/// remote access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    4480
}

// ============================================================================
// Secrets
// ============================================================================

/// Grouped secrets. Usually lives in `secrets.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default)]
    pub llm: LlmSecretsConfig,
}

/// LLM provider API keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmSecretsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groq: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<String>,

    /// Key for a custom OpenAI-compatible endpoint (`llm.provider = "custom"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
}

// ============================================================================
// LLM Configuration
// ============================================================================

/// Upstream chat-completion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: "groq" | "openai" | "custom"
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Base URL override. Required when `provider` is "custom".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model used for the primary completion call
    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_temperature")]
    pub temperature: f64,

    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: i64,

    /// Upper bound on a single upstream call, in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: None,
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_provider() -> String {
    "groq".into()
}

fn default_llm_model() -> String {
    "meta-llama/llama-4-scout-17b-16e-instruct".into()
}

fn default_llm_temperature() -> f64 {
    0.7
}

fn default_llm_max_tokens() -> i64 {
    1000
}

fn default_llm_timeout() -> u64 {
    60
}

// ============================================================================
// Chat Configuration
// ============================================================================

/// What the gatekeeper does when the classification call itself fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierErrorPolicy {
    /// Fail open: treat the message as in-domain.
    #[default]
    Allow,
    /// Fail closed: refuse the message.
    Deny,
}

/// What happens to the user turn when the completion call fails after it
/// was appended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamFailurePolicy {
    /// Restore the history to its state before the call.
    #[default]
    Rollback,
    /// Leave the unanswered user turn in the history.
    KeepOrphan,
}

/// Topical pre-filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Classification model; falls back to `llm.model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_gatekeeper_temperature")]
    pub temperature: f64,

    #[serde(default = "default_gatekeeper_max_tokens")]
    pub max_tokens: i64,

    #[serde(default)]
    pub on_error: ClassifierErrorPolicy,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: None,
            temperature: default_gatekeeper_temperature(),
            max_tokens: default_gatekeeper_max_tokens(),
            on_error: ClassifierErrorPolicy::default(),
        }
    }
}

fn default_gatekeeper_temperature() -> f64 {
    0.1
}

fn default_gatekeeper_max_tokens() -> i64 {
    10
}

/// Conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Maximum turns kept per session, system turn included
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Reply sent when the gatekeeper rejects a message
    #[serde(default = "default_refusal_message")]
    pub refusal_message: String,

    /// Stored as the assistant turn when the upstream reply has no content
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,

    #[serde(default)]
    pub on_upstream_failure: UpstreamFailurePolicy,

    #[serde(default)]
    pub gatekeeper: GatekeeperConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            system_prompt: default_system_prompt(),
            refusal_message: default_refusal_message(),
            fallback_reply: default_fallback_reply(),
            on_upstream_failure: UpstreamFailurePolicy::default(),
            gatekeeper: GatekeeperConfig::default(),
        }
    }
}

fn default_max_history() -> usize {
    20
}

fn default_system_prompt() -> String {
    "You are a helpful AI health assistant. You specialize in providing information about \
     health, medical topics, wellness, fitness, nutrition, mental health, and healthcare. \
     Be concise, friendly, and informative in your responses. Always remind users to consult \
     healthcare professionals for serious medical concerns and that your advice should not \
     replace professional medical consultation."
        .into()
}

fn default_refusal_message() -> String {
    "I'm sorry, but I can only assist with health-related questions. Please ask me something \
     about health, medical topics, wellness, fitness, nutrition, mental health, or healthcare."
        .into()
}

fn default_fallback_reply() -> String {
    "Sorry, I could not generate a response.".into()
}

// ============================================================================
// Prediction Relay Configuration
// ============================================================================

/// External prediction microservices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Cancer-risk prediction service base URL
    #[serde(default = "default_cancer_endpoint")]
    pub cancer_endpoint: String,

    /// Biomarker (BioSync) service base URL
    #[serde(default = "default_biosync_endpoint")]
    pub biosync_endpoint: String,

    #[serde(default = "default_relay_timeout")]
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            cancer_endpoint: default_cancer_endpoint(),
            biosync_endpoint: default_biosync_endpoint(),
            timeout_secs: default_relay_timeout(),
        }
    }
}

fn default_cancer_endpoint() -> String {
    "https://bio-ai-platform-2.onrender.com".into()
}

fn default_biosync_endpoint() -> String {
    "https://biomark-be.onrender.com".into()
}

fn default_relay_timeout() -> u64 {
    30
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to hold at `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default directory, merging `secrets.json`.
    pub fn load() -> Result<Self> {
        let dir = config_dir();
        if !dir.join("config.json").exists() && !dir.join("secrets.json").exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        let merged = crate::config_loader::load_modular_config(Some(dir.clone()))?;
        serde_json::from_value(merged)
            .with_context(|| format!("Failed to parse config from {}", dir.display()))
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("GENOME_PORT") {
            if let Ok(p) = port.parse() {
                self.network.port = p;
            } else {
                tracing::warn!(value = %port, "Ignoring invalid GENOME_PORT");
            }
        }
        if let Some(bind) = lookup("GENOME_BIND_ADDRESS") {
            self.network.bind = bind;
        }
        if let Some(level) = lookup("GENOME_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(model) = lookup("GENOME_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("GENOME_CANCER_API") {
            self.relay.cancer_endpoint = url;
        }
        if let Some(url) = lookup("GENOME_BIOSYNC_API") {
            self.relay.biosync_endpoint = url;
        }
        if let Some(key) = lookup("GROQ_API_KEY") {
            self.secrets.llm.groq = Some(key);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.secrets.llm.openai = Some(key);
        }
    }

    /// Get the effective `host:port` listen address.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.network.bind, self.network.port)
    }

    /// Get the API key for a provider. Empty keys count as unset.
    pub fn get_api_key(&self, provider_name: &str) -> Option<String> {
        let key = match provider_name.to_lowercase().as_str() {
            "groq" => self.secrets.llm.groq.as_ref(),
            "openai" => self.secrets.llm.openai.as_ref(),
            "custom" => self.secrets.llm.custom.as_ref(),
            _ => None,
        };
        key.filter(|k| !k.is_empty()).cloned()
    }

    /// Model used by the gatekeeper classification call.
    pub fn classifier_model(&self) -> &str {
        self.chat
            .gatekeeper
            .model
            .as_deref()
            .unwrap_or(&self.llm.model)
    }
}
