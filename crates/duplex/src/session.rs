use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identifies one open streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tracks in-flight sessions so a draining server can report what it is
/// still waiting on.
///
/// Sessions never share state with each other; the registry only records
/// which RPC method each open session belongs to. Opening a session returns
/// a guard that removes the entry when dropped.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, &'static str, ahash::RandomState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::default(),
        }
    }

    /// Register a new session for `method`.
    pub fn open(self: &Arc<Self>, method: &'static str) -> SessionGuard {
        let id = SessionId::new();
        self.sessions.insert(id, method);
        SessionGuard {
            id,
            method,
            registry: Arc::clone(self),
        }
    }

    /// Check if a session is still open.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of open sessions for one method.
    pub fn count(&self, method: &str) -> usize {
        self.sessions
            .iter()
            .filter(|entry| *entry.value() == method)
            .count()
    }

    fn remove(&self, id: &SessionId) {
        self.sessions.remove(id);
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a session registered. When dropped, the session is removed.
pub struct SessionGuard {
    id: SessionId,
    method: &'static str,
    registry: Arc<SessionRegistry>,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn method(&self) -> &'static str {
        self.method
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("id", &self.id)
            .field("method", &self.method)
            .finish()
    }
}
