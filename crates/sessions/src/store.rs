use std::sync::{Arc, Mutex};

use {dashmap::DashMap, tracing::debug, voxrelay_common::UserId};

use crate::session::Session;

/// In-memory session store.
///
/// Records live in a sharded map so unrelated users never contend on one
/// lock; each record carries its own mutex. There is no removal and no
/// capacity bound.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<UserId, SessionHandle>>,
}

/// Shared reference to one user's [`Session`].
///
/// All clones point at the same record. The lock is a `std::sync::Mutex`
/// because every mutation is synchronous; it is never held across `.await`.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<Session>>,
}

impl SessionHandle {
    fn new(user_id: UserId) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Session::new(user_id))),
        }
    }

    /// Run `f` with exclusive access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.with(|s| s.clone())
    }

    /// Whether two handles refer to the same record.
    #[must_use]
    pub fn same_record(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the user's session, creating a default one on first use.
    pub fn get_or_create(&self, user_id: UserId) -> SessionHandle {
        if let Some(existing) = self.sessions.get(&user_id) {
            return existing.clone();
        }
        self.sessions
            .entry(user_id)
            .or_insert_with(|| {
                debug!(%user_id, "creating session");
                SessionHandle::new(user_id)
            })
            .clone()
    }

    /// Return the user's session without creating one.
    #[must_use]
    pub fn get(&self, user_id: UserId) -> Option<SessionHandle> {
        self.sessions.get(&user_id).map(|h| h.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
