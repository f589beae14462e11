//! Server-side sessions.
//!
//! A [`SessionStore`] creates, finds, and deletes whole [`Session`]s. It
//! never validates or persists what application code does to a session's
//! data afterwards: the `Arc<Session>` handed out *is* the stored record.
//!
//! Each session's data sits behind its own lock, so two requests racing on
//! the same session id cannot corrupt the map. They can still overwrite each
//! other's writes; ordering those is the application's concern.
//!
//! Expired sessions are not removed on lookup. [`SessionMiddleware`] simply
//! ignores them, and [`SessionStore::reap_expired`] reclaims them when the
//! application decides to.
//!
//! [`SessionMiddleware`]: crate::middleware::SessionMiddleware

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::store::MemoryStore;

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session_id";

/// Absolute lifetime of a session unless configured otherwise.
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(30 * 60);

// Longer lifetimes are clamped so the deadline stays representable.
const MAX_SESSION_LIFETIME: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// One client's session: an opaque id, a fixed deadline, and an open
/// property bag.
#[derive(Debug)]
pub struct Session {
    id: String,
    expires_at: Instant,
    data: RwLock<Map<String, Value>>,
}

impl Session {
    fn new(lifetime: Duration) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            expires_at: Instant::now() + lifetime.min(MAX_SESSION_LIFETIME),
            data: RwLock::new(Map::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// A session is live strictly before its deadline.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.read().get(key).cloned()
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.data.write().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.data.write().remove(key)
    }

    /// Runs `f` with shared access to the whole map.
    pub fn read<R>(&self, f: impl FnOnce(&Map<String, Value>) -> R) -> R {
        f(&self.data.read())
    }

    /// Runs `f` with exclusive access to the whole map, for multi-key updates
    /// that must not interleave with another request's.
    pub fn write<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        f(&mut self.data.write())
    }
}

/// In-memory session registry.
#[derive(Debug)]
pub struct SessionStore {
    sessions: MemoryStore<Arc<Session>>,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_lifetime(DEFAULT_SESSION_LIFETIME)
    }

    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self { sessions: MemoryStore::new(), lifetime }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_lifetime(config.session_ttl)
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Allocates and registers a new session with a random id.
    pub fn create_session(&self) -> Arc<Session> {
        let session = Arc::new(Session::new(self.lifetime));
        // Zero store-level TTL: the store must not drop a session on read.
        self.sessions.insert(session.id.clone(), Arc::clone(&session), Duration::ZERO);
        debug!(session_id = %session.id, "session created");
        session
    }

    /// Looks a session up by id, expired or not. Callers check
    /// [`Session::is_expired`].
    pub fn get_session(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id)
    }

    /// Removes a session. Unknown ids are ignored.
    pub fn delete_session(&self, id: &str) {
        if self.sessions.remove(id).is_some() {
            debug!(session_id = %id, "session deleted");
        }
    }

    /// Removes every expired session and returns how many were dropped.
    pub fn reap_expired(&self) -> usize {
        let reaped = self.sessions.retain(|_, session| !session.is_expired());
        if reaped > 0 {
            debug!(reaped, "expired sessions reaped");
        }
        reaped
    }

    /// Registered sessions, including expired ones not yet reaped.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self { Self::new() }
}

/// `Set-Cookie` value that hands `session` to the client.
pub fn session_cookie(session: &Session) -> String {
    cookie::Cookie::build((SESSION_COOKIE, session.id()))
        .path("/")
        .http_only(true)
        .build()
        .to_string()
}
