//! Configuration validation.
//!
//! Checks that required values are present and within valid ranges before a
//! service starts serving traffic.

use thiserror::Error;

use crate::config::{ChatConfig, Config, LlmConfig, ObservabilityConfig, RelayConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.llm.validate() {
            errors.push(e);
        }

        if let Err(e) = self.chat.validate() {
            errors.push(e);
        }

        if let Err(e) = self.relay.validate() {
            errors.push(e);
        }

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if self.network.port == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "network.port".into(),
                reason: "must be between 1 and 65535".into(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load, apply environment overrides, and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

fn validate_http_url(field: &str, value: &str) -> ValidationResult<()> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        Ok(parsed) => Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        }),
        Err(e) => Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: e.to_string(),
        }),
    }
}

impl Validate for LlmConfig {
    fn validate(&self) -> ValidationResult<()> {
        let known = ["groq", "openai", "custom"];
        if !known.contains(&self.provider.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "llm.provider".into(),
                reason: format!("must be one of: {}", known.join(", ")),
            });
        }

        match self.base_url.as_deref() {
            Some(url) => validate_http_url("llm.base_url", url)?,
            None if self.provider.eq_ignore_ascii_case("custom") => {
                return Err(ValidationError::MissingField {
                    field: "llm.base_url (required for custom provider)".into(),
                });
            }
            None => {}
        }

        if self.model.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "llm.model".into(),
            });
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::InvalidValue {
                field: "llm.temperature".into(),
                reason: "must be between 0.0 and 2.0".into(),
            });
        }

        if self.max_tokens <= 0 {
            return Err(ValidationError::InvalidValue {
                field: "llm.max_tokens".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "llm.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for ChatConfig {
    fn validate(&self) -> ValidationResult<()> {
        // One slot for the system turn plus at least one conversational turn.
        if self.max_history < 2 {
            return Err(ValidationError::InvalidValue {
                field: "chat.max_history".into(),
                reason: "must be at least 2".into(),
            });
        }

        for (field, value) in [
            ("chat.system_prompt", &self.system_prompt),
            ("chat.refusal_message", &self.refusal_message),
            ("chat.fallback_reply", &self.fallback_reply),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField {
                    field: field.into(),
                });
            }
        }

        if self.gatekeeper.max_tokens <= 0 {
            return Err(ValidationError::InvalidValue {
                field: "chat.gatekeeper.max_tokens".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for RelayConfig {
    fn validate(&self) -> ValidationResult<()> {
        validate_http_url("relay.cancer_endpoint", &self.cancer_endpoint)?;
        validate_http_url("relay.biosync_endpoint", &self.biosync_endpoint)?;

        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "relay.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}
