//! In-memory registry of editing sessions.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use retouch_core::{EditorSession, SessionConfig};
use retouch_raster::PixelSurface;
use uuid::Uuid;

use crate::metrics;

/// A session shared between handlers. The async mutex may be released
/// while a transform is in flight; the session itself guards against
/// interleaved mutations.
pub type SharedSession = Arc<tokio::sync::Mutex<EditorSession<PixelSurface>>>;

/// Thread-safe store of live sessions keyed by id.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
    config: SessionConfig,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionStore {
    /// Create an empty store. New sessions use `config`.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Settings applied to new sessions.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a session on a blank canvas and return its id.
    pub fn create(&self) -> Uuid {
        let surface = PixelSurface::blank(self.config.canvas_width, self.config.canvas_height);
        let session = EditorSession::new(surface, self.config);
        let id = Uuid::new_v4();

        let count = {
            let mut sessions = self
                .sessions
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            sessions.insert(id, Arc::new(tokio::sync::Mutex::new(session)));
            sessions.len()
        };
        metrics::set_sessions(count);
        tracing::info!(session = %id, "Session created");
        id
    }

    /// Look up a session.
    #[must_use]
    pub fn get(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Remove a session from the store, returning it.
    pub fn remove(&self, id: &Uuid) -> Option<SharedSession> {
        let (removed, count) = {
            let mut sessions = self
                .sessions
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let removed = sessions.remove(id);
            (removed, sessions.len())
        };
        if removed.is_some() {
            metrics::set_sessions(count);
            tracing::info!(session = %id, "Session removed");
        }
        removed
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no sessions are open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the store's lock can be taken.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.sessions.read().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = SessionStore::new(SessionConfig {
            canvas_width: 40,
            canvas_height: 30,
            ..SessionConfig::default()
        });
        let id = store.create();

        let session = store.get(&id).expect("session exists");
        let session = session.lock().await;
        assert_eq!(session.dimensions(), (40, 30));
        assert!(session.history().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sessions_are_independent() {
        let store = SessionStore::default();
        let a = store.create();
        let b = store.create();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_remove() {
        let store = SessionStore::default();
        let id = store.create();

        assert!(store.remove(&id).is_some());
        assert!(store.get(&id).is_none());
        assert!(store.remove(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_id() {
        let store = SessionStore::default();
        assert!(store.get(&Uuid::new_v4()).is_none());
        assert!(store.is_healthy());
    }

    #[test]
    fn test_history_limit_is_applied() {
        let store = SessionStore::new(SessionConfig {
            history_limit: Some(2),
            ..SessionConfig::default()
        });
        let id = store.create();
        let session = store.get(&id).unwrap();
        let session = session.try_lock().unwrap();
        assert_eq!(session.history().capacity_limit(), Some(2));
    }
}
