//! Process-wide authentication state.
//!
//! `SessionStore` holds the single `Session` value routing decisions are
//! made from. Clones share the same state. Only the orchestrator publishes;
//! everyone else reads, watches or subscribes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

/// The client's belief about authentication state.
///
/// `logged_in` carries no meaning while `auth_checked` is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub logged_in: bool,
    pub auth_checked: bool,
}

impl Session {
    pub const UNCHECKED: Session = Session {
        logged_in: false,
        auth_checked: false,
    };

    /// A checked session with the given verdict.
    pub fn checked(logged_in: bool) -> Self {
        Self {
            logged_in,
            auth_checked: true,
        }
    }

    /// True only once checked and logged in.
    pub fn is_authenticated(&self) -> bool {
        self.auth_checked && self.logged_in
    }
}

type Listener = Arc<dyn Fn(Session) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Inner {
    tx: watch::Sender<Session>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create a store holding `{logged_in: false, auth_checked: false}`.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::UNCHECKED);
        Self {
            inner: Arc::new(Inner {
                tx,
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn read(&self) -> Session {
        *self.inner.tx.borrow()
    }

    /// Receiver for async consumers that want to await changes.
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.inner.tx.subscribe()
    }

    /// Wait until the first check has completed and return that session.
    pub async fn checked(&self) -> Session {
        let mut rx = self.watch();
        let session = match rx.wait_for(|s| s.auth_checked).await {
            Ok(session) => *session,
            // The sender lives in `inner`, which `self` keeps alive.
            Err(_) => self.read(),
        };
        session
    }

    /// Register a listener called synchronously on every publish.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(Session) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Replace the stored session and notify every listener before returning.
    ///
    /// `auth_checked` never goes back to false once set.
    pub(crate) fn publish(&self, next: Session) {
        let mut next = next;
        let current = self.read();
        if current.auth_checked && !next.auth_checked {
            warn!("Refusing to clear auth_checked on an already checked session");
            next.auth_checked = true;
        }

        self.inner.tx.send_replace(next);
        info!(logged_in = next.logged_in, auth_checked = next.auth_checked, "Session published");

        // Snapshot so listeners may subscribe or unsubscribe from inside the callback
        let listeners: Vec<Listener> = self.listeners().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(next);
        }
    }

    fn listeners(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
