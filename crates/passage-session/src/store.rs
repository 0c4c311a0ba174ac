//! Session Store
//!
//! Owns the single shared [`Session`]. Every successful mutation is persisted
//! as one JSON snapshot before it becomes visible to readers.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;

use passage_storage::SnapshotStorage;

use crate::account::Account;
use crate::error::SessionError;
use crate::login::Login;
use crate::reconcile;
use crate::session::Session;
use crate::Result;

/// Storage key of the session snapshot
pub const DEFAULT_SESSION_KEY: &str = "passage.session";

const EVENT_CAPACITY: usize = 16;

/// Something holding data derived from the session that must be dropped
/// when the session is destroyed
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self);
}

/// Changes of the selected account, for UI watchers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// An account became selected, or the selection moved to another account
    LoggedIn(Session),
    /// The selection was cleared
    LoggedOut,
}

pub struct SessionStore {
    /// The shared session
    session: Arc<RwLock<Session>>,
    /// Snapshot persistence
    storage: Arc<dyn SnapshotStorage>,
    /// Snapshot key
    key: Arc<str>,
    /// Caches to drop on destroy
    caches: Arc<RwLock<Vec<Arc<dyn CacheInvalidator>>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SnapshotStorage>) -> Self {
        Self::with_key(storage, DEFAULT_SESSION_KEY)
    }

    pub fn with_key(storage: Arc<dyn SnapshotStorage>, key: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let key: String = key.into();

        Self {
            session: Arc::new(RwLock::new(Session::new())),
            storage,
            key: Arc::from(key),
            caches: Arc::new(RwLock::new(Vec::new())),
            events,
        }
    }

    pub fn add_cache_invalidator(&self, cache: Arc<dyn CacheInvalidator>) {
        self.caches.write().push(cache);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the shared session
    pub fn current(&self) -> Session {
        self.session.read().clone()
    }

    pub fn current_account(&self) -> Option<Account> {
        self.session.read().account().cloned()
    }

    /// Merge a verified login and persist the result.
    ///
    /// The update is computed on a copy; if persisting fails the shared
    /// session is left as it was.
    pub fn save(&self, login: Login, accounts: Vec<Account>) -> Result<Session> {
        let mut guard = self.session.write();
        let mut next = guard.clone();
        reconcile::update_session(&mut next, login, accounts, crate::now());

        self.persist(&next)?;
        let previous = std::mem::replace(&mut *guard, next.clone());
        drop(guard);

        tracing::info!(
            logins = next.logins.len(),
            accounts = next.accounts.len(),
            account_id = ?next.account_id,
            "Saved session"
        );

        self.notify(&previous, &next);
        Ok(next)
    }

    /// Explicitly select the current account and persist the result
    pub fn select_account(&self, account_id: &str) -> Result<Session> {
        let mut guard = self.session.write();
        let mut next = guard.clone();
        reconcile::select_account(&mut next, account_id)?;

        self.persist(&next)?;
        let previous = std::mem::replace(&mut *guard, next.clone());
        drop(guard);

        tracing::info!(account_id = %account_id, "Selected account");

        self.notify(&previous, &next);
        Ok(next)
    }

    /// Return the in-memory session if it holds a token, otherwise adopt the
    /// persisted snapshot.
    pub fn restore(&self) -> Result<Session> {
        let mut guard = self.session.write();

        // Already live; returning it untouched emits no change event
        if guard.token.is_some() {
            return Ok(guard.clone());
        }

        let stored = match self.storage.load(&self.key)? {
            Some(raw) => serde_json::from_str::<Session>(&raw)?,
            None => Session::new(),
        };

        if stored.token.is_none() {
            return Err(SessionError::NoSession);
        }

        let previous = std::mem::replace(&mut *guard, stored.clone());
        drop(guard);

        tracing::info!(
            logins = stored.logins.len(),
            account_id = ?stored.account_id,
            "Restored session"
        );

        self.notify(&previous, &stored);
        Ok(stored)
    }

    /// Clear the session, its snapshot and every dependent cache.
    ///
    /// Without an active token this is a no-op. If the snapshot cannot be
    /// removed the session stays live.
    pub fn destroy(&self) -> Result<Session> {
        let mut guard = self.session.write();

        if guard.token.is_none() {
            return Ok(guard.clone());
        }

        self.storage.remove(&self.key)?;
        let previous = std::mem::take(&mut *guard);
        drop(guard);

        self.notify(&previous, &Session::new());

        for cache in self.caches.read().iter() {
            cache.invalidate();
        }

        tracing::info!("Destroyed session");

        Ok(Session::new())
    }

    fn persist(&self, session: &Session) -> Result<()> {
        let snapshot = serde_json::to_string(session)?;
        self.storage.store(&self.key, &snapshot)?;
        Ok(())
    }

    fn notify(&self, previous: &Session, current: &Session) {
        let event = match (&previous.account_id, &current.account_id) {
            (old, Some(new)) if old.as_ref() != Some(new) => {
                SessionEvent::LoggedIn(current.clone())
            }
            (Some(_), None) => SessionEvent::LoggedOut,
            _ => return,
        };

        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

impl Clone for SessionStore {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            storage: Arc::clone(&self.storage),
            key: Arc::clone(&self.key),
            caches: Arc::clone(&self.caches),
            events: self.events.clone(),
        }
    }
}
