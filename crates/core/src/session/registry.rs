//! # Session Registry
//!
//! Process-wide map from session id to session. The map lock is held only
//! for insert/lookup/evict; every session carries its own lock, so
//! mutations of unrelated sessions never serialize on each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::pipeline::LifecycleEvent;
use crate::progress::{EventJournal, ProgressEvent};

use super::state::{SessionSnapshot, SessionState, Transition};

struct SessionInner {
    state: SessionState,
    journal: EventJournal,
}

/// One session run: state, its event journal, and a revision counter
/// that wakes subscribers on every mutation.
pub struct SessionHandle {
    session_id: String,
    inner: Mutex<SessionInner>,
    revision: watch::Sender<u64>,
}

impl SessionHandle {
    fn new(state: SessionState) -> Self {
        let mut journal = EventJournal::new();
        for worker in state.workers() {
            journal.record(worker.progress_event());
        }
        if let Some(terminal) = state.terminal_event() {
            journal.record(terminal);
        }
        let (revision, _) = watch::channel(0);
        Self {
            session_id: state.session_id().to_string(),
            inner: Mutex::new(SessionInner { state, journal }),
            revision,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Apply a lifecycle event under the session lock.
    ///
    /// The completion check and the journal append happen inside the same
    /// critical section, so readers never see a half-applied event.
    pub async fn apply(&self, event: &LifecycleEvent) -> Transition {
        let transition = {
            let mut inner = self.inner.lock().await;
            let SessionInner { state, journal } = &mut *inner;
            let transition = state.apply(event);
            if let Some(index) = transition.worker {
                journal.record(state.workers()[index].progress_event());
            }
            if transition.terminal {
                if let Some(terminal) = state.terminal_event() {
                    journal.record(terminal);
                }
            }
            transition
        };

        if transition.changed() {
            self.revision.send_modify(|rev| *rev += 1);
        }
        if transition.terminal {
            tracing::info!(session_id = %self.session_id, "Session reached terminal state");
        }
        transition
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.state.snapshot()
    }

    pub async fn journal_since(&self, cursor: usize) -> Vec<ProgressEvent> {
        self.inner.lock().await.journal.since(cursor)
    }

    /// Receiver that changes on every mutation
    pub fn revisions(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    async fn terminal_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().await.state.terminal_at()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// Injectable, cloneable session store
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<SessionHandle>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session, replacing any previous one with the same id.
    ///
    /// A replaced run keeps its own handle; it can no longer reach the map.
    pub async fn create(&self, state: SessionState) -> Arc<SessionHandle> {
        let handle = Arc::new(SessionHandle::new(state));
        let replaced = self
            .sessions
            .write()
            .await
            .insert(handle.session_id().to_string(), handle.clone());
        if replaced.is_some() {
            tracing::info!(session_id = %handle.session_id(), "Session re-submitted, previous state replaced");
        }
        handle
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn snapshot(&self, session_id: &str) -> Option<SessionSnapshot> {
        let handle = self.get(session_id).await?;
        Some(handle.snapshot().await)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions that reached a terminal state more than `retention` ago.
    /// Sessions still processing are kept. Returns how many were evicted.
    pub async fn evict_expired(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let retention = chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));
        let handles: Vec<_> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();

        let mut expired = Vec::new();
        for (id, handle) in handles {
            if let Some(at) = handle.terminal_at().await {
                if now.signed_duration_since(at) >= retention {
                    expired.push((id, handle));
                }
            }
        }

        if expired.is_empty() {
            return 0;
        }
        let mut sessions = self.sessions.write().await;
        let mut evicted = 0;
        for (id, handle) in expired {
            // Skip entries re-submitted since the scan.
            if sessions.get(&id).is_some_and(|current| Arc::ptr_eq(current, &handle)) {
                sessions.remove(&id);
                evicted += 1;
            }
        }
        evicted
    }

    /// Background task that evicts expired sessions every `interval`
    pub fn spawn_sweeper(&self, retention: Duration, interval: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = registry.evict_expired(Utc::now(), retention).await;
                if evicted > 0 {
                    tracing::debug!(evicted, "Evicted expired sessions");
                }
            }
        })
    }
}
