//! In-memory session storage for the HTTP host.
//!
//! Sessions are keyed by an opaque id carried in the `lti_session` cookie.
//! Each session sits behind its own mutex, held by one request at a time from
//! load to commit. Idle sessions are dropped by a background cleanup task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::session::LtiSession;

/// Idle time after which a session is dropped.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(3600);

/// Cleanup interval for stale sessions.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

type Slot = Arc<Mutex<SessionEntry>>;

#[derive(Debug)]
struct SessionEntry {
    session: LtiSession,
    last_active: Instant,
}

impl SessionEntry {
    fn new(session: LtiSession) -> Self {
        Self {
            session,
            last_active: Instant::now(),
        }
    }

    fn slot(session: LtiSession) -> Slot {
        Arc::new(Mutex::new(Self::new(session)))
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Remove `id` only if it still maps to `slot`.
fn detach(sessions: &mut HashMap<String, Slot>, id: &str, slot: &Slot) -> bool {
    let owned = sessions.get(id).is_some_and(|stored| Arc::ptr_eq(stored, slot));
    if owned {
        sessions.remove(id);
    }
    owned
}

/// Shared session store.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Slot>>>,
    timeout: Duration,
}

impl SessionStore {
    /// Create a store with the default idle timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(SESSION_TIMEOUT)
    }

    /// Create a store with a custom idle timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            timeout,
        }
    }

    /// Take exclusive hold of the session for `id`.
    ///
    /// Waits while another request holds the same session. Unknown ids get a
    /// detached empty session that is only stored if it authenticates. An
    /// expired session is handed out purged.
    pub async fn lock(&self, id: Option<&str>) -> LockedSession {
        let existing = match id {
            Some(id) => {
                let sessions = self.sessions.read().await;
                sessions.get(id).map(|slot| (id.to_string(), Arc::clone(slot)))
            }
            None => None,
        };
        let (id, slot) =
            existing.unwrap_or_else(|| (new_session_id(), SessionEntry::slot(LtiSession::new())));

        let mut entry = Arc::clone(&slot).lock_owned().await;
        if entry.last_active.elapsed() > self.timeout {
            tracing::info!(session_id = %id, "Session expired");
            entry.session.purge();
        }

        LockedSession {
            id,
            slot,
            entry,
            store: self.clone(),
        }
    }

    /// Drop sessions idle for longer than the timeout.
    ///
    /// Sessions held by a request are in use and are kept.
    pub async fn cleanup_stale_sessions(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, slot| {
            let keep = match slot.try_lock() {
                Ok(entry) => entry.last_active.elapsed() <= self.timeout,
                Err(_) => true,
            };
            if !keep {
                tracing::info!(session_id = %id, "Cleaned up stale session");
            }
            keep
        });
        before - sessions.len()
    }

    /// Number of stored sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Start background cleanup task.
    pub fn start_cleanup_task(&self) {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                let cleaned = store.cleanup_stale_sessions().await;
                if cleaned > 0 {
                    tracing::debug!(count = cleaned, "Session cleanup completed");
                }
            }
        });
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").field("timeout", &self.timeout).finish()
    }
}

/// A session held by one request until [`commit`](Self::commit).
#[derive(Debug)]
pub struct LockedSession {
    id: String,
    slot: Slot,
    entry: OwnedMutexGuard<SessionEntry>,
    store: SessionStore,
}

impl LockedSession {
    /// Current session contents.
    #[must_use]
    pub fn session(&self) -> &LtiSession {
        &self.entry.session
    }

    /// Mutable session contents.
    pub fn session_mut(&mut self) -> &mut LtiSession {
        &mut self.entry.session
    }

    /// Persist the outcome and release the session.
    ///
    /// An unauthenticated session is removed from the store. An authenticated
    /// one is kept; with `rotate` it moves to a fresh id and the old id stops
    /// resolving. Returns the id the client should present next, if any.
    pub async fn commit(mut self, rotate: bool) -> Option<String> {
        let mut sessions = self.store.sessions.write().await;

        if !self.entry.session.is_authenticated() {
            if detach(&mut sessions, &self.id, &self.slot) {
                tracing::info!(session_id = %self.id, "Removed session");
            }
            return None;
        }

        self.entry.last_active = Instant::now();
        if !rotate {
            return Some(self.id.clone());
        }

        // Requests still waiting on the old slot find it empty.
        let session = std::mem::take(&mut self.entry.session);
        detach(&mut sessions, &self.id, &self.slot);

        let id = new_session_id();
        sessions.insert(id.clone(), SessionEntry::slot(session));
        tracing::info!(session_id = %id, "Issued session id");
        Some(id)
    }
}
