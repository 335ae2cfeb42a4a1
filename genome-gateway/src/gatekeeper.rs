//! Topical pre-filter for chat messages.
//!
//! Before a message is allowed to spend a full completion call, a cheap
//! classification call asks the model for a strict YES/NO answer on whether
//! the message is health-related. What happens when that call itself fails
//! is governed by [`ClassifierErrorPolicy`].

use crate::provider::{ChatRequest, Message, Provider, ProviderError};
use genome_common::config::{ClassifierErrorPolicy, Config};
use std::sync::Arc;
use std::time::Duration;

/// Affirmative token the classifier must return for a message to pass.
const AFFIRMATIVE: &str = "yes";

/// Why a classification attempt produced no verdict.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("classifier call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("classifier call timed out after {0}s")]
    Timeout(u64),
}

/// Classifier in front of the completion call.
pub struct Gatekeeper {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
    max_tokens: i64,
    timeout_secs: u64,
    on_error: ClassifierErrorPolicy,
}

impl Gatekeeper {
    /// Build a gatekeeper from config, or `None` when the stage is disabled.
    pub fn from_config(config: &Config, provider: Arc<dyn Provider>) -> Option<Self> {
        let gk = &config.chat.gatekeeper;
        if !gk.enabled {
            return None;
        }
        Some(Self {
            provider,
            model: config.classifier_model().to_string(),
            temperature: gk.temperature,
            max_tokens: gk.max_tokens,
            timeout_secs: config.llm.timeout_secs,
            on_error: gk.on_error,
        })
    }

    pub fn policy(&self) -> ClassifierErrorPolicy {
        self.on_error
    }

    /// Ask the classifier whether `message` is in-domain.
    ///
    /// Any answer other than the affirmative token, including an empty one,
    /// is a rejection. Errors are returned untouched; see [`Self::admit`].
    pub async fn classify(&self, message: &str) -> Result<bool, ClassifyError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::user(classification_prompt(message))],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        };

        let response = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.provider.chat(request),
        )
        .await
        .map_err(|_| ClassifyError::Timeout(self.timeout_secs))??;

        Ok(is_affirmative(response.content.as_deref()))
    }

    /// Decide whether `message` may proceed, applying the error policy.
    pub async fn admit(&self, message: &str) -> bool {
        match self.classify(message).await {
            Ok(verdict) => {
                tracing::debug!(in_domain = verdict, "Message classified");
                verdict
            }
            Err(e) => {
                let allowed = self.on_error == ClassifierErrorPolicy::Allow;
                tracing::warn!(
                    error = %e,
                    allowed,
                    "Classifier failed; applying error policy"
                );
                allowed
            }
        }
    }
}

/// Interpret a raw classifier answer.
pub fn is_affirmative(answer: Option<&str>) -> bool {
    answer.is_some_and(|a| a.trim().to_lowercase() == AFFIRMATIVE)
}

/// Build the classification prompt for a user message.
pub fn classification_prompt(message: &str) -> String {
    format!(
        r#"You are a content filter. Your job is to determine if a user's message is related to health, medical topics, wellness, fitness, nutrition, mental health, or healthcare.

Analyze this message and respond with only "YES" if it's health-related, or "NO" if it's not health-related.

Health-related topics include but are not limited to:
- Medical conditions, symptoms, diseases
- Medications and treatments
- Mental health and psychology
- Fitness and exercise
- Nutrition and diet
- Healthcare systems
- Preventive care
- Wellness and self-care
- Medical procedures
- Health advice or tips

User message: "{message}"

Response (YES or NO only):"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatResponse, TokenUsage};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Scripted {
        answer: Result<Option<&'static str>, &'static str>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl Scripted {
        fn new(answer: Result<Option<&'static str>, &'static str>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Provider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
            let model = request.model.clone();
            self.seen.lock().unwrap().push(request);
            match self.answer {
                Ok(content) => Ok(ChatResponse {
                    provider: "scripted".into(),
                    model,
                    content: content.map(String::from),
                    usage: TokenUsage::default(),
                    finish_reason: Some("stop".into()),
                    latency_ms: 0,
                }),
                Err(msg) => Err(ProviderError {
                    provider: "scripted".into(),
                    model,
                    message: msg.into(),
                    status_code: None,
                }),
            }
        }
    }

    fn gatekeeper(provider: Arc<Scripted>, on_error: ClassifierErrorPolicy) -> Gatekeeper {
        let mut config = Config::default();
        config.chat.gatekeeper.on_error = on_error;
        Gatekeeper::from_config(&config, provider).unwrap()
    }

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative(Some("YES")));
        assert!(is_affirmative(Some("  yes\n")));
        assert!(!is_affirmative(Some("yes.")));
        assert!(!is_affirmative(Some("no")));
        assert!(!is_affirmative(Some("")));
        assert!(!is_affirmative(None));
    }

    #[test]
    fn test_prompt_embeds_message() {
        let prompt = classification_prompt("is coffee bad for sleep?");
        assert!(prompt.contains("User message: \"is coffee bad for sleep?\""));
        assert!(prompt.ends_with("Response (YES or NO only):"));
    }

    #[test]
    fn test_disabled_gatekeeper_is_none() {
        let mut config = Config::default();
        config.chat.gatekeeper.enabled = false;
        assert!(Gatekeeper::from_config(&config, Scripted::new(Ok(None))).is_none());
    }

    #[tokio::test]
    async fn test_classify_sends_low_temperature_request() {
        let provider = Scripted::new(Ok(Some("YES")));
        let gk = gatekeeper(Arc::clone(&provider), ClassifierErrorPolicy::Allow);

        assert!(gk.classify("I have a headache").await.unwrap());

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].temperature, Some(0.1));
        assert_eq!(seen[0].max_tokens, Some(10));
        assert_eq!(seen[0].messages[0].role, "user");
        assert!(seen[0].messages[0].content.contains("I have a headache"));
    }

    #[tokio::test]
    async fn test_admit_rejects_off_topic() {
        let gk = gatekeeper(Scripted::new(Ok(Some("NO"))), ClassifierErrorPolicy::Allow);
        assert!(!gk.admit("who won the match?").await);
    }

    #[tokio::test]
    async fn test_missing_answer_rejects() {
        let gk = gatekeeper(Scripted::new(Ok(None)), ClassifierErrorPolicy::Allow);
        assert!(!gk.admit("hello").await);
    }

    #[tokio::test]
    async fn test_error_fails_open_by_default() {
        let gk = gatekeeper(Scripted::new(Err("connection refused")), ClassifierErrorPolicy::Allow);
        assert!(gk.classify("hello").await.is_err());
        assert!(gk.admit("hello").await);
    }

    #[tokio::test]
    async fn test_error_fails_closed_when_denying() {
        let gk = gatekeeper(Scripted::new(Err("connection refused")), ClassifierErrorPolicy::Deny);
        assert_eq!(gk.policy(), ClassifierErrorPolicy::Deny);
        assert!(!gk.admit("hello").await);
    }
}
