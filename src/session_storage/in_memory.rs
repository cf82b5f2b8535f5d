use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::StoreError;
use crate::session_storage::{expiry_from_now, SessionStore};

/// Process-local session store.
///
/// Lookups are plain membership checks: an expired id stays valid until the
/// next [`sweep`](Self::sweep), so the sweep interval bounds the staleness
/// window. `strict_expiry` closes that window by also comparing the stored
/// expiry on lookup.
#[derive(Debug, Clone)]
pub struct LocalSessionStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    sessions: RwLock<HashMap<String, i64>>,
    lifetime: Duration,
    strict_expiry: bool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl LocalSessionStore {
    pub fn new(lifetime: Duration) -> Self {
        Self::with_strict_expiry(lifetime, false)
    }

    pub fn with_strict_expiry(lifetime: Duration, strict_expiry: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: RwLock::new(HashMap::new()),
                lifetime,
                strict_expiry,
                sweeper: Mutex::new(None),
            }),
        }
    }

    /// Remove every record whose expiry has passed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.inner.sweep_at(chrono::Utc::now().timestamp_millis())
    }

    /// Start the periodic sweep on the current tokio runtime.
    ///
    /// Returns `false` when a sweeper is already running; a store never runs two.
    /// The task holds only a weak reference and ends once the store is dropped.
    pub fn start_sweeper(&self, interval: Duration) -> bool {
        let mut slot = self.inner.sweeper.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.sweep_at(chrono::Utc::now().timestamp_millis());
            }
        }));
        tracing::debug!("session sweeper started with interval {:?}", interval);
        true
    }

    /// Stop the periodic sweep. Safe to call when none is running.
    pub fn stop_sweeper(&self) {
        if let Some(handle) = self.inner.sweeper.lock().take() {
            handle.abort();
            tracing::debug!("session sweeper stopped");
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.inner
            .sweeper
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn sweep_at(&self, now_millis: i64) -> usize {
        self.inner.sweep_at(now_millis)
    }

    #[cfg(test)]
    pub(crate) fn expiry_of(&self, sid: &str) -> Option<i64> {
        self.inner.sessions.read().get(sid).copied()
    }
}

impl Inner {
    fn sweep_at(&self, now_millis: i64) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, expires_at| *expires_at > now_millis);
        let expired = before - sessions.len();
        if expired > 0 {
            tracing::debug!("expired {} session id(s)", expired);
        }
        expired
    }
}

#[async_trait]
impl SessionStore for LocalSessionStore {
    async fn is_valid(&self, sid: &str) -> Result<bool, StoreError> {
        let sessions = self.inner.sessions.read();
        Ok(match sessions.get(sid) {
            Some(expires_at) if self.inner.strict_expiry => {
                *expires_at > chrono::Utc::now().timestamp_millis()
            }
            Some(_) => true,
            None => false,
        })
    }

    async fn put(&self, sid: &str) -> Result<(), StoreError> {
        let expires_at = expiry_from_now(self.inner.lifetime);
        self.inner
            .sessions
            .write()
            .insert(sid.to_string(), expires_at);
        Ok(())
    }

    async fn remove(&self, sid: &str) -> Result<(), StoreError> {
        self.inner.sessions.write().remove(sid);
        Ok(())
    }
}
