//! Registry of reachable live sessions, keyed by viewer identity

use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::session::LiveSession;

/// Maps an identity to its current live session.
///
/// At most one session is kept per identity. Every operation touches a
/// single map entry under its shard lock, so concurrent register/unregister
/// calls for the same identity never interleave half-way.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: DashMap<String, LiveSession>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` for `identity`, replacing any existing entry.
    ///
    /// The superseded session is asked to close and is returned.
    pub fn register(&self, identity: impl Into<String>, session: LiveSession) -> Option<LiveSession> {
        let identity = identity.into();
        let session_id = session.id();
        let previous = self.sessions.insert(identity.clone(), session);

        if let Some(stale) = &previous {
            // The stale writer may already be gone; nothing to do then.
            let _ = stale.close();
            info!(
                identity = %identity,
                session_id = %session_id,
                superseded = %stale.id(),
                superseded_since = %stale.connected_at(),
                "Live session replaced"
            );
        } else {
            debug!(identity = %identity, session_id = %session_id, "Live session registered");
        }

        self.record_gauge();
        previous
    }

    /// Remove whatever session is registered for `identity`
    pub fn unregister(&self, identity: &str) -> Option<LiveSession> {
        let removed = self.sessions.remove(identity).map(|(_, session)| session);
        if removed.is_some() {
            debug!(identity = %identity, "Live session unregistered");
            self.record_gauge();
        }
        removed
    }

    /// Remove the entry for `identity` only if it is still `session_id`.
    ///
    /// Used on connection teardown so a newer connection for the same
    /// identity keeps its registration.
    pub fn release(&self, identity: &str, session_id: Uuid) -> bool {
        let removed = self
            .sessions
            .remove_if(identity, |_, session| session.id() == session_id)
            .is_some();

        if removed {
            debug!(identity = %identity, session_id = %session_id, "Live session released");
            self.record_gauge();
        }
        removed
    }

    /// Current session for `identity`.
    ///
    /// The handle may already be dead by the time it is written to.
    pub fn lookup(&self, identity: &str) -> Option<LiveSession> {
        self.sessions.get(identity).map(|entry| entry.value().clone())
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are registered
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Queue a ping on every session; returns how many accepted it
    pub fn ping_all(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().ping().is_ok())
            .count()
    }

    /// Close every session and clear the registry
    pub fn close_all(&self) -> usize {
        let mut count = 0;
        self.sessions.retain(|_, session| {
            let _ = session.close();
            count += 1;
            false
        });
        info!(count, "Closed all live sessions");
        self.record_gauge();
        count
    }

    fn record_gauge(&self) {
        metrics::gauge!("cardiowatch_live_sessions").set(self.sessions.len() as f64);
    }
}
