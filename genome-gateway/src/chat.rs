//! Chat exchanges over bounded per-session history.
//!
//! [`ChatService::converse`] is the single entry point that mutates sessions:
//! optional classification, user turn, completion call, assistant turn. The
//! session lock is held from the user append until the assistant append, so
//! concurrent exchanges on the same id never interleave.

use crate::gatekeeper::Gatekeeper;
use crate::provider::{ChatRequest, Message, Provider};
use crate::session::{SessionStore, Turn};
use genome_common::config::{Config, UpstreamFailurePolicy};
use genome_common::util::{sanitize_for_log, truncate_with_ellipsis};
use genome_common::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Session id used when a client does not supply one.
pub const DEFAULT_SESSION_ID: &str = "default";

/// Resolve a client-supplied session id, falling back to [`DEFAULT_SESSION_ID`]
/// when it is absent or empty. Ids are opaque and kept exactly as sent.
pub fn session_id_or_default(raw: Option<&str>) -> String {
    match raw {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => DEFAULT_SESSION_ID.to_string(),
    }
}

/// Result of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverseOutcome {
    pub reply: String,
    /// Non-system turns after the exchange; 0 when the message was filtered
    pub conversation_length: usize,
    /// Whether the gatekeeper refused the message
    pub filtered: bool,
}

/// Owns the session store and mediates every exchange with the provider.
pub struct ChatService {
    store: SessionStore,
    provider: Arc<dyn Provider>,
    gatekeeper: Option<Gatekeeper>,
    model: String,
    temperature: f64,
    max_tokens: i64,
    timeout_secs: u64,
    refusal_message: String,
    fallback_reply: String,
    on_upstream_failure: UpstreamFailurePolicy,
}

impl ChatService {
    pub fn new(config: &Config, provider: Arc<dyn Provider>) -> Self {
        let chat = &config.chat;
        Self {
            store: SessionStore::new(chat.max_history, chat.system_prompt.clone()),
            gatekeeper: Gatekeeper::from_config(config, Arc::clone(&provider)),
            provider,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            timeout_secs: config.llm.timeout_secs,
            refusal_message: chat.refusal_message.clone(),
            fallback_reply: chat.fallback_reply.clone(),
            on_upstream_failure: chat.on_upstream_failure,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn has_gatekeeper(&self) -> bool {
        self.gatekeeper.is_some()
    }

    /// Run one exchange on `session_id`.
    ///
    /// A missing or blank message is rejected before any session is touched.
    /// A filtered message gets the refusal reply and leaves the store as it was.
    pub async fn converse(&self, session_id: &str, message: Option<&str>) -> Result<ConverseOutcome> {
        let message = match message {
            Some(m) if !m.trim().is_empty() => m,
            _ => return Err(Error::InvalidInput("Message is required".into())),
        };

        if let Some(gatekeeper) = &self.gatekeeper {
            if !gatekeeper.admit(message).await {
                tracing::info!(
                    session_id = %session_id,
                    preview = %truncate_with_ellipsis(message, 60),
                    "Message filtered as off-topic"
                );
                return Ok(ConverseOutcome {
                    reply: self.refusal_message.clone(),
                    conversation_length: 0,
                    filtered: true,
                });
            }
        }

        let handle = self.store.get_or_create(session_id).await;
        let mut session = handle.lock().await;
        let cap = self.store.max_history();
        let idle_secs = (chrono::Utc::now() - session.updated_at()).num_seconds();

        let checkpoint = match self.on_upstream_failure {
            UpstreamFailurePolicy::Rollback => Some(session.turns().to_vec()),
            UpstreamFailurePolicy::KeepOrphan => None,
        };

        session.append(Turn::user(message), cap);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: session.turns().iter().map(Message::from).collect(),
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        };

        let start = Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.provider.chat(request),
        )
        .await;

        let content = match outcome {
            Ok(Ok(response)) => response.content,
            Ok(Err(e)) => {
                let detail = sanitize_for_log(&e.to_string());
                tracing::error!(session_id = %session_id, error = %detail, "Completion call failed");
                if let Some(turns) = checkpoint {
                    session.restore(turns);
                }
                return Err(Error::Upstream(detail));
            }
            Err(_) => {
                tracing::error!(
                    session_id = %session_id,
                    timeout_secs = self.timeout_secs,
                    "Completion call timed out"
                );
                if let Some(turns) = checkpoint {
                    session.restore(turns);
                }
                return Err(Error::Timeout(self.timeout_secs));
            }
        };

        let reply = content
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| {
                tracing::warn!(session_id = %session_id, "Completion returned no content; using fallback");
                self.fallback_reply.clone()
            });

        session.append(Turn::assistant(reply.clone()), cap);

        tracing::info!(
            session_id = %session.id(),
            conversation_length = session.conversation_len(),
            session_age_secs = (chrono::Utc::now() - session.created_at()).num_seconds(),
            idle_secs,
            latency_ms = start.elapsed().as_millis() as u64,
            "Chat exchange completed"
        );

        Ok(ConverseOutcome {
            reply,
            conversation_length: session.conversation_len(),
            filtered: false,
        })
    }

    /// Non-system turns for `session_id`; empty when the session does not exist.
    ///
    /// Returns the last committed history without waiting for an exchange in
    /// flight on the same id.
    pub async fn fetch_history(&self, session_id: &str) -> Vec<Turn> {
        self.store.history(session_id).await
    }

    /// Drop a session. Returns whether one existed.
    ///
    /// An exchange already in flight on the cleared id finishes against the
    /// detached session; its reply is not visible to later requests.
    pub async fn clear(&self, session_id: &str) -> bool {
        let existed = self.store.clear(session_id).await;
        tracing::info!(session_id = %session_id, existed, "Session cleared");
        existed
    }

    pub async fn session_count(&self) -> usize {
        self.store.len().await
    }
}
