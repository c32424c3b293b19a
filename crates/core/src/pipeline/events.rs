//! # Lifecycle Events
//!
//! Typed worker-lifecycle messages. Worker tasks send them into a
//! per-session channel; a single writer task applies them to the session.
//!
//! ```text
//! worker task ──Started──▶ ┐
//! worker task ──Progress─▶ ├─ mpsc ─▶ session writer ─▶ SessionHandle
//! worker task ──Completed▶ ┘
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// How a worker's reasoning call ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum WorkerOutcome {
    Output(String),
    Failed(String),
}

/// A single worker-lifecycle transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Worker picked up its unit
    Started { worker: String, description: String },
    /// Intermediate reasoning note (last write wins)
    Progress { worker: String, note: String },
    /// Worker finished, with output or a failure reason
    Completed {
        worker: String,
        outcome: WorkerOutcome,
    },
    /// Execution ended without a usable result and without any worker failure
    Aborted { reason: String },
}

impl LifecycleEvent {
    pub fn worker(&self) -> Option<&str> {
        match self {
            LifecycleEvent::Started { worker, .. }
            | LifecycleEvent::Progress { worker, .. }
            | LifecycleEvent::Completed { worker, .. } => Some(worker),
            LifecycleEvent::Aborted { .. } => None,
        }
    }
}

/// Handed to the reasoning engine so it can publish thinking notes
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    worker: String,
    tx: mpsc::Sender<LifecycleEvent>,
}

impl ProgressReporter {
    pub fn new(worker: impl Into<String>, tx: mpsc::Sender<LifecycleEvent>) -> Self {
        Self {
            worker: worker.into(),
            tx,
        }
    }

    pub fn worker(&self) -> &str {
        &self.worker
    }

    /// Publish a thinking note. A closed channel is ignored.
    pub async fn note(&self, note: impl Into<String>) {
        let _ = self
            .tx
            .send(LifecycleEvent::Progress {
                worker: self.worker.clone(),
                note: note.into(),
            })
            .await;
    }
}
