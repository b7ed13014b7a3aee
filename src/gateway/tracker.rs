//! Running sessions addressable by client-chosen key.

use crate::engine::{SessionObserver, SessionSnapshot};
use crate::error::GatewayError;
use futures::future::{AbortHandle, AbortRegistration};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::info;

struct Entry {
    abort: AbortHandle,
    snapshot: Option<SessionSnapshot>,
}

#[derive(Default)]
pub struct SessionTracker {
    sessions: Mutex<HashMap<String, Entry>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for a new session. The key is released when the returned
    /// guard drops.
    pub fn track(&self, key: &str) -> Result<(TrackedSession<'_>, AbortRegistration), GatewayError> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(key) {
            return Err(GatewayError::InvalidRequest(format!(
                "session_key '{}' is already in use",
                key
            )));
        }
        let (abort, registration) = AbortHandle::new_pair();
        sessions.insert(
            key.to_string(),
            Entry {
                abort,
                snapshot: None,
            },
        );
        Ok((
            TrackedSession {
                tracker: self,
                key: key.to_string(),
            },
            registration,
        ))
    }

    pub fn status(&self, key: &str) -> Option<SessionSnapshot> {
        self.sessions
            .lock()
            .get(key)
            .and_then(|entry| entry.snapshot.clone())
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.sessions.lock().contains_key(key)
    }

    /// Cancel the session under `key`. Returns false when no such session runs.
    pub fn stop(&self, key: &str) -> bool {
        match self.sessions.lock().get(key) {
            Some(entry) => {
                info!(session_key = key, "Stopping session");
                entry.abort.abort();
                true
            }
            None => false,
        }
    }

    fn update(&self, key: &str, snapshot: &SessionSnapshot) {
        if let Some(entry) = self.sessions.lock().get_mut(key) {
            entry.snapshot = Some(snapshot.clone());
        }
    }

    fn release(&self, key: &str) {
        self.sessions.lock().remove(key);
    }
}

/// Guard for a tracked session; also its observer.
pub struct TrackedSession<'a> {
    tracker: &'a SessionTracker,
    key: String,
}

impl SessionObserver for TrackedSession<'_> {
    fn on_transition(&self, snapshot: &SessionSnapshot) {
        self.tracker.update(&self.key, snapshot);
    }
}

impl Drop for TrackedSession<'_> {
    fn drop(&mut self) {
        self.tracker.release(&self.key);
    }
}
