//! In-memory conversation sessions.
//!
//! A [`SessionStore`] maps session ids to bounded, role-tagged histories.
//! Every session starts with the system turn, which is never evicted. Each
//! session sits behind its own async mutex so that exchanges on one id are
//! serialized while other ids proceed independently. Readers see the history
//! committed when the last exchange released the session, so they never wait
//! on an upstream call. Nothing is persisted: history lives as long as the
//! process.

use crate::provider::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, MutexGuard, RwLock};

/// Role of a turn in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One role-tagged message in a session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Turn> for Message {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        }
    }
}

/// Drop the oldest non-system turns until `turns.len() <= cap`.
///
/// Keeps turn 0 plus the most recent `cap - 1` turns. `cap` must be at least 2.
pub fn truncate_turns(turns: &mut Vec<Turn>, cap: usize) {
    debug_assert!(cap >= 2, "history cap must leave room for the system turn");
    if turns.len() <= cap {
        return;
    }
    let excess = turns.len() - cap;
    turns.drain(1..1 + excess);
}

/// A single conversation.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    turns: Vec<Turn>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a session seeded with the system turn.
    pub fn new(id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turns: vec![Turn::system(system_prompt)],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// All turns, system turn first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Append a turn, then enforce the history cap.
    pub fn append(&mut self, turn: Turn, cap: usize) {
        self.turns.push(turn);
        truncate_turns(&mut self.turns, cap);
        self.updated_at = Utc::now();
    }

    /// Turns visible to clients (everything after the system turn).
    pub fn history(&self) -> Vec<Turn> {
        self.turns.iter().skip(1).cloned().collect()
    }

    /// Number of non-system turns.
    pub fn conversation_len(&self) -> usize {
        self.turns.len().saturating_sub(1)
    }

    /// Replace the turns with a snapshot taken earlier from this session.
    pub(crate) fn restore(&mut self, turns: Vec<Turn>) {
        self.turns = turns;
        self.updated_at = Utc::now();
    }
}

/// A session plus the history readers see while it is locked.
#[derive(Debug)]
pub struct SessionSlot {
    session: Mutex<Session>,
    committed: watch::Sender<Vec<Turn>>,
}

impl SessionSlot {
    fn new(session: Session) -> Self {
        let (committed, _) = watch::channel(session.history());
        Self {
            session: Mutex::new(session),
            committed,
        }
    }

    /// Exclusive access for one exchange. The committed history is refreshed
    /// when the guard is dropped.
    pub async fn lock(&self) -> SessionGuard<'_> {
        SessionGuard {
            session: self.session.lock().await,
            committed: &self.committed,
        }
    }

    /// History as of the last released guard.
    pub fn committed_history(&self) -> Vec<Turn> {
        self.committed.borrow().clone()
    }
}

/// Locked session; publishes its history on drop.
pub struct SessionGuard<'a> {
    session: MutexGuard<'a, Session>,
    committed: &'a watch::Sender<Vec<Turn>>,
}

impl Deref for SessionGuard<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.committed.send_replace(self.session.history());
    }
}

/// Shared handle to one session; lock it for the duration of an exchange.
pub type SessionHandle = Arc<SessionSlot>;

/// Process-scoped map from session id to session.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    max_history: usize,
    system_prompt: String,
}

impl SessionStore {
    /// Create an empty store. `max_history` below 2 is raised to 2.
    pub fn new(max_history: usize, system_prompt: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history: max_history.max(2),
            system_prompt: system_prompt.into(),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Return the session for `id`, creating it with the system turn if absent.
    pub async fn get_or_create(&self, id: &str) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(id) {
            return Arc::clone(handle);
        }

        let mut sessions = self.sessions.write().await;
        let handle = sessions.entry(id.to_string()).or_insert_with(|| {
            tracing::debug!(session_id = %id, "Creating session");
            Arc::new(SessionSlot::new(Session::new(id, self.system_prompt.clone())))
        });
        Arc::clone(handle)
    }

    /// Return the session for `id` without creating it.
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Committed turns after the system turn, or empty if the session does
    /// not exist. Does not wait for an exchange holding the session.
    pub async fn history(&self, id: &str) -> Vec<Turn> {
        match self.get(id).await {
            Some(handle) => handle.committed_history(),
            None => Vec::new(),
        }
    }

    /// Remove a session. Returns whether one existed.
    pub async fn clear(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
