//! Per-user conversation sessions with bounded history.
//!
//! Every session starts with exactly one system turn, which is never
//! evicted. Truncation keeps that turn plus the most recent
//! `max_turns - 1` entries.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Role of a turn in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Persona instruction, always first
    System,
    /// End user input
    User,
    /// Completion output
    Assistant,
}

impl Role {
    /// Wire name of the role.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message in a conversation.
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

/// Session error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a session holds exactly one system turn")]
    SystemTurnRejected,
}

/// Conversation state for one user.
#[derive(Debug, Clone)]
pub struct Session {
    user_id: String,
    turns: Vec<Turn>,
    max_turns: usize,
}

impl Session {
    /// Create a session seeded with the system turn.
    pub fn new(user_id: impl Into<String>, system_prompt: impl Into<String>, max_turns: usize) -> Self {
        Self {
            user_id: user_id.into(),
            turns: vec![Turn::system(system_prompt)],
            max_turns: max_turns.max(1),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Append a turn without truncating.
    pub fn append(&mut self, turn: Turn) -> Result<(), SessionError> {
        if turn.role == Role::System {
            return Err(SessionError::SystemTurnRejected);
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Append a turn, then truncate to `max_turns`.
    pub fn append_and_truncate(&mut self, turn: Turn) -> Result<(), SessionError> {
        self.append(turn)?;
        self.truncate();
        Ok(())
    }

    /// Keep the system turn plus the most recent `max_turns - 1` turns.
    pub fn truncate(&mut self) {
        if self.turns.len() <= self.max_turns {
            return;
        }

        let keep = self.max_turns - 1;
        let tail_start = self.turns.len() - keep;
        self.turns.drain(1..tail_start);
    }
}

// ============================================================================
// Session Store
// ============================================================================

/// How concurrent messages from one user share their session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionLocking {
    /// Hold the session lock for the whole exchange, completion call included.
    ///
    /// Exchanges never overlap. Messages racing for the lock are served in
    /// the order they acquire it, which need not match arrival order.
    #[default]
    PerUser,
    /// Lock only around each history update; turns of overlapping
    /// exchanges from one user may interleave.
    Unsynchronized,
}

impl SessionLocking {
    /// Map the config flag to a locking mode.
    pub const fn from_serialize_flag(serialize_per_user: bool) -> Self {
        if serialize_per_user {
            Self::PerUser
        } else {
            Self::Unsynchronized
        }
    }
}

/// Shared handle to one user's session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Process-wide map from user id to session.
pub struct SessionStore {
    sessions: DashMap<String, SessionHandle>,
    system_prompt: String,
    max_turns: usize,
    locking: SessionLocking,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new(system_prompt: impl Into<String>, max_turns: usize, locking: SessionLocking) -> Self {
        Self {
            sessions: DashMap::new(),
            system_prompt: system_prompt.into(),
            max_turns,
            locking,
        }
    }

    pub fn locking(&self) -> SessionLocking {
        self.locking
    }

    /// Return the user's session, creating a seeded one on first use.
    pub fn get_or_create(&self, user_id: &str) -> SessionHandle {
        if let Some(existing) = self.sessions.get(user_id) {
            return existing.value().clone();
        }

        self.sessions
            .entry(user_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(user_id = %user_id, "Creating session");
                Arc::new(Mutex::new(Session::new(
                    user_id,
                    self.system_prompt.clone(),
                    self.max_turns,
                )))
            })
            .value()
            .clone()
    }

    /// Copy of the user's turns, if a session exists.
    pub async fn snapshot(&self, user_id: &str) -> Option<Vec<Turn>> {
        let handle = self.sessions.get(user_id).map(|s| s.value().clone())?;
        let session = handle.lock().await;
        Some(session.turns().to_vec())
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.sessions.len())
            .field("max_turns", &self.max_turns)
            .field("locking", &self.locking)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_history(prior: usize) -> Session {
        let mut session = Session::new("42", "persona", 8);
        for i in 0..prior {
            let turn = if i % 2 == 0 {
                Turn::user(format!("turn {i}"))
            } else {
                Turn::assistant(format!("turn {i}"))
            };
            session.append(turn).unwrap();
        }
        session
    }

    #[test]
    fn new_session_has_only_system_turn() {
        let session = Session::new("42", "persona", 8);
        assert_eq!(session.turns(), &[Turn::system("persona")]);
        assert_eq!(session.user_id(), "42");
    }

    #[test]
    fn truncation_keeps_system_and_recent_turns() {
        let mut session = session_with_history(10);
        assert_eq!(session.turns().len(), 11);

        session.append_and_truncate(Turn::user("newest")).unwrap();

        assert_eq!(session.turns().len(), 8);
        assert_eq!(session.turns()[0], Turn::system("persona"));
        let contents: Vec<&str> = session.turns()[1..]
            .iter()
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(
            contents,
            vec!["turn 4", "turn 5", "turn 6", "turn 7", "turn 8", "turn 9", "newest"]
        );
    }

    #[test]
    fn no_truncation_below_limit() {
        let mut session = session_with_history(5);
        session.append_and_truncate(Turn::user("x")).unwrap();
        assert_eq!(session.turns().len(), 7);
    }

    #[test]
    fn plain_append_can_exceed_limit() {
        let mut session = session_with_history(6);
        session.append_and_truncate(Turn::user("question")).unwrap();
        assert_eq!(session.turns().len(), 8);
        session.append(Turn::assistant("answer")).unwrap();
        assert_eq!(session.turns().len(), 9);
    }

    #[test]
    fn second_system_turn_rejected() {
        let mut session = Session::new("42", "persona", 8);
        assert_eq!(
            session.append(Turn::system("other")),
            Err(SessionError::SystemTurnRejected)
        );
        assert_eq!(session.turns().len(), 1);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Turn::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
        assert_eq!(Role::User.as_str(), "user");
    }

    #[tokio::test]
    async fn store_creates_lazily_and_reuses() {
        let store = SessionStore::new("persona", 8, SessionLocking::PerUser);
        assert!(store.snapshot("1").await.is_none());

        let a = store.get_or_create("1");
        let b = store.get_or_create("1");
        assert!(Arc::ptr_eq(&a, &b));

        a.lock().await.append(Turn::user("hi")).unwrap();
        assert_eq!(store.snapshot("1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn store_isolates_users() {
        let store = SessionStore::new("persona", 8, SessionLocking::PerUser);
        store
            .get_or_create("1")
            .lock()
            .await
            .append(Turn::user("from one"))
            .unwrap();
        store.get_or_create("2");

        assert_eq!(store.snapshot("1").await.unwrap().len(), 2);
        assert_eq!(store.snapshot("2").await.unwrap(), vec![Turn::system("persona")]);
    }

    #[test]
    fn locking_from_flag() {
        assert_eq!(SessionLocking::from_serialize_flag(true), SessionLocking::PerUser);
        assert_eq!(
            SessionLocking::from_serialize_flag(false),
            SessionLocking::Unsynchronized
        );
    }
}
