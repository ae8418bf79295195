//! In-memory session store for conversation history.
//!
//! Sessions are keyed by an opaque token carried in a cookie. Each session
//! holds the ordered conversation turns and a last-seen timestamp used for
//! TTL-based expiry. Nothing is persisted; a process restart loses all
//! sessions.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One message in a conversation history. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
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

#[derive(Debug)]
struct Session {
    turns: Vec<Turn>,
    last_seen: Instant,
}

impl Session {
    fn new(now: Instant) -> Self {
        Self {
            turns: Vec::new(),
            last_seen: now,
        }
    }
}

/// In-memory mapping from session identifier to conversation history.
///
/// Constructed once at process start and shared behind an `Arc`. All
/// mutations go through the write lock, which serializes concurrent appends
/// under the same identifier; locks are never held across an await point.
#[derive(Debug)]
pub struct SessionStore {
    inner: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    /// Create a store whose sessions expire after `ttl` of inactivity.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Resolve a session identifier.
    ///
    /// A provided identifier is kept as-is whether or not a session exists
    /// for it yet; an absent identifier yields a freshly generated token.
    /// Returns the identifier and whether it was newly generated.
    pub fn resolve(&self, provided: Option<String>) -> (String, bool) {
        match provided {
            Some(id) if !id.is_empty() => (id, false),
            _ => (uuid::Uuid::new_v4().to_string(), true),
        }
    }

    /// Record current time as last-seen, creating an empty session if absent.
    pub fn touch(&self, id: &str) {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner
            .entry(id.to_string())
            .or_insert_with(|| Session::new(now))
            .last_seen = now;
    }

    /// Snapshot of the stored turns for an identifier, oldest first.
    /// Unknown identifiers yield an empty history.
    pub fn history(&self, id: &str) -> Vec<Turn> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.get(id).map(|s| s.turns.clone()).unwrap_or_default()
    }

    /// Append turns to a session's history, creating the session if absent,
    /// and refresh its last-seen timestamp.
    pub fn append(&self, id: &str, turns: Vec<Turn>) {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let session = inner
            .entry(id.to_string())
            .or_insert_with(|| Session::new(now));
        session.turns.extend(turns);
        session.last_seen = now;
    }

    /// Remove a session and its last-seen record entirely.
    pub fn clear(&self, id: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.remove(id);
    }

    /// Remove every session idle longer than the TTL. Returns the number of
    /// sessions removed.
    pub fn sweep(&self) -> usize {
        self.sweep_from(Instant::now())
    }

    /// Sweep relative to an explicit clock reading. Split out so expiry is
    /// testable without sleeping through the TTL.
    pub fn sweep_from(&self, now: Instant) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let before = inner.len();
        inner.retain(|_, session| now.duration_since(session.last_seen) < self.ttl);
        before - inner.len()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.len()
    }

    /// Whether the store holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
