//! # Session State
//!
//! The per-session state machine. Pure: no locking, no I/O. The registry
//! wraps it in a per-session lock and feeds it lifecycle events.
//!
//! ```text
//! overall:  processing ──all workers completed──▶ completed
//!               │
//!               └──worker failure / abort──────▶ failed   (sticky)
//!
//! worker:   idle ──start──▶ processing ──output──▶ completed
//!                               └──failure──▶ idle
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::{LifecycleEvent, WorkUnit, WorkUnitId, WorkerOutcome};
use crate::progress::ProgressEvent;
use crate::workers::WorkerSet;

/// Result text recorded when a worker succeeds with nothing to say
pub const NO_OUTPUT: &str = "No output";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Processing,
    Completed,
    Failed,
}

impl OverallStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OverallStatus::Processing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Processing,
    Completed,
}

/// One worker's sub-state inside a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerState {
    pub name: String,
    pub role: String,
    pub status: WorkerStatus,
    pub working_note: String,
    pub thinking_note: String,
    pub result: String,
    /// Absent when the submission was rejected before units were built
    pub work_unit_id: Option<WorkUnitId>,
}

impl WorkerState {
    fn idle(name: &str, role: &str, work_unit_id: Option<WorkUnitId>) -> Self {
        Self {
            name: name.to_string(),
            role: role.to_string(),
            status: WorkerStatus::Idle,
            working_note: String::new(),
            thinking_note: String::new(),
            result: String::new(),
            work_unit_id,
        }
    }

    pub fn progress_event(&self) -> ProgressEvent {
        ProgressEvent::Worker {
            worker: self.name.clone(),
            status: self.status,
            work_unit_id: self.work_unit_id,
            thinking_note: self.thinking_note.clone(),
            result: self.result.clone(),
        }
    }
}

/// What a lifecycle event changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    /// Index of the worker whose state changed
    pub worker: Option<usize>,
    /// Overall status moved into a terminal state
    pub terminal: bool,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.worker.is_some() || self.terminal
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    session_id: String,
    category: String,
    query: String,
    status: OverallStatus,
    error: Option<String>,
    workers: Vec<WorkerState>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    terminal_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Fresh session for accepted work units: all idle, processing
    pub fn new(session_id: &str, category: &str, query: &str, units: &[WorkUnit]) -> Self {
        let workers = units
            .iter()
            .map(|u| WorkerState::idle(&u.worker, &u.role, Some(u.id)))
            .collect();
        Self::with_workers(session_id, category, query, workers)
    }

    /// Fresh session with newly generated unit ids for every worker
    pub fn for_workers(session_id: &str, category: &str, query: &str, set: &WorkerSet) -> Self {
        let workers = set
            .iter()
            .map(|w| WorkerState::idle(&w.name, &w.role, Some(WorkUnitId::new())))
            .collect();
        Self::with_workers(session_id, category, query, workers)
    }

    /// Session that failed validation: no work units, already failed
    pub fn rejected(
        session_id: &str,
        category: &str,
        query: &str,
        set: &WorkerSet,
        reason: impl Into<String>,
    ) -> Self {
        let workers = set
            .iter()
            .map(|w| WorkerState::idle(&w.name, &w.role, None))
            .collect();
        let mut state = Self::with_workers(session_id, category, query, workers);
        state.fail(reason.into());
        state
    }

    fn with_workers(session_id: &str, category: &str, query: &str, workers: Vec<WorkerState>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            category: category.to_string(),
            query: query.to_string(),
            status: OverallStatus::Processing,
            error: None,
            workers,
            created_at: now,
            updated_at: now,
            terminal_at: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn status(&self) -> OverallStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn workers(&self) -> &[WorkerState] {
        &self.workers
    }

    pub fn worker(&self, name: &str) -> Option<&WorkerState> {
        self.workers.iter().find(|w| w.name == name)
    }

    pub fn terminal_at(&self) -> Option<DateTime<Utc>> {
        self.terminal_at
    }

    /// Apply one lifecycle event and report what changed
    pub fn apply(&mut self, event: &LifecycleEvent) -> Transition {
        let mut transition = Transition::default();

        match event {
            LifecycleEvent::Started {
                worker,
                description,
            } => {
                if let Some((index, state)) = self.find_mut(worker) {
                    if state.status != WorkerStatus::Completed {
                        state.status = WorkerStatus::Processing;
                        state.working_note = description.clone();
                        state.thinking_note.clear();
                        transition.worker = Some(index);
                    }
                }
            }
            LifecycleEvent::Progress { worker, note } => {
                if let Some((index, state)) = self.find_mut(worker) {
                    if state.status == WorkerStatus::Processing && state.thinking_note != *note {
                        state.thinking_note = note.clone();
                        transition.worker = Some(index);
                    }
                }
            }
            LifecycleEvent::Completed { worker, outcome } => {
                let Some((index, state)) = self.find_mut(worker) else {
                    tracing::warn!(%worker, "Completion for unknown worker ignored");
                    return transition;
                };
                if state.status == WorkerStatus::Completed {
                    return transition;
                }
                match outcome {
                    WorkerOutcome::Output(text) => {
                        state.status = WorkerStatus::Completed;
                        state.result = if text.trim().is_empty() {
                            NO_OUTPUT.to_string()
                        } else {
                            text.clone()
                        };
                        state.working_note.clear();
                        state.thinking_note.clear();
                        transition.worker = Some(index);
                        if self.all_completed() {
                            transition.terminal = self.complete();
                        }
                    }
                    WorkerOutcome::Failed(reason) => {
                        let was_busy = state.status != WorkerStatus::Idle
                            || !state.working_note.is_empty()
                            || !state.thinking_note.is_empty();
                        if was_busy {
                            state.status = WorkerStatus::Idle;
                            state.working_note.clear();
                            state.thinking_note.clear();
                            transition.worker = Some(index);
                        }
                        transition.terminal = self.fail(format!("{}: {}", worker, reason));
                    }
                }
            }
            LifecycleEvent::Aborted { reason } => {
                transition.terminal = self.fail(reason.clone());
            }
        }

        if transition.changed() {
            self.updated_at = Utc::now();
        }
        transition
    }

    fn find_mut(&mut self, worker: &str) -> Option<(usize, &mut WorkerState)> {
        self.workers
            .iter_mut()
            .enumerate()
            .find(|(_, w)| w.name == worker)
    }

    fn all_completed(&self) -> bool {
        self.workers.iter().all(|w| w.status == WorkerStatus::Completed)
    }

    fn complete(&mut self) -> bool {
        if self.status != OverallStatus::Processing {
            return false;
        }
        self.status = OverallStatus::Completed;
        self.terminal_at = Some(Utc::now());
        true
    }

    /// First failure wins; terminal states never change
    fn fail(&mut self, reason: String) -> bool {
        if self.status != OverallStatus::Processing {
            return false;
        }
        self.status = OverallStatus::Failed;
        self.error = Some(reason);
        self.terminal_at = Some(Utc::now());
        true
    }

    pub fn terminal_event(&self) -> Option<ProgressEvent> {
        self.status.is_terminal().then(|| ProgressEvent::Terminal {
            status: self.status,
            error: self.error.clone(),
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let results = self
            .workers
            .iter()
            .filter(|w| w.status == WorkerStatus::Completed)
            .map(|w| (w.name.clone(), w.result.clone()))
            .collect();
        SessionSnapshot {
            session_id: self.session_id.clone(),
            category: self.category.clone(),
            query: self.query.clone(),
            status: self.status,
            error: self.error.clone(),
            workers: self.workers.clone(),
            results,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// One message of the composite response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub text: String,
}

/// Point-in-time copy of a session, safe to hand to readers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub category: String,
    pub query: String,
    pub status: OverallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub workers: Vec<WorkerState>,
    /// Completed workers only, keyed by worker name
    pub results: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn worker(&self, name: &str) -> Option<&WorkerState> {
        self.workers.iter().find(|w| w.name == name)
    }

    /// Composite response in pipeline order
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.workers
            .iter()
            .filter(|w| w.status == WorkerStatus::Completed)
            .map(|w| ChatMessage {
                sender: w.name.clone(),
                text: w.result.clone(),
            })
            .collect()
    }
}
