//! # Progress Events
//!
//! Translates session mutations into an ordered, deduplicated sequence of
//! events that any number of subscribers can replay.
//!
//! - `journal` - Append-only, per-run event log owned by the session
//! - `stream` - Subscriber that replays the journal and waits for more

pub mod journal;
pub mod stream;

pub use journal::EventJournal;
pub use stream::subscribe;

use serde::{Deserialize, Serialize};

use crate::pipeline::WorkUnitId;
use crate::session::{OverallStatus, WorkerStatus};

/// Identity of a worker event for deduplication
pub type DedupKey = (String, WorkerStatus, String);

/// One observable change delivered to stream subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A worker's status or thinking note changed
    Worker {
        worker: String,
        status: WorkerStatus,
        work_unit_id: Option<WorkUnitId>,
        thinking_note: String,
        result: String,
    },
    /// The session reached `completed` or `failed`; always the last event
    Terminal {
        status: OverallStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// The session did not exist at subscribe time
    Error { error: String },
}

impl ProgressEvent {
    pub fn not_found(session_id: &str) -> Self {
        ProgressEvent::Error {
            error: format!("Session not found: {}", session_id),
        }
    }

    /// SSE event name
    pub fn event_name(&self) -> &'static str {
        match self {
            ProgressEvent::Worker { .. } => "worker",
            ProgressEvent::Terminal { .. } => "terminal",
            ProgressEvent::Error { .. } => "error",
        }
    }

    /// Nothing follows a final event
    pub fn is_final(&self) -> bool {
        !matches!(self, ProgressEvent::Worker { .. })
    }

    pub fn dedup_key(&self) -> Option<DedupKey> {
        match self {
            ProgressEvent::Worker {
                worker,
                status,
                thinking_note,
                ..
            } => Some((worker.clone(), *status, thinking_note.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let event = ProgressEvent::Terminal {
            status: OverallStatus::Completed,
            error: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "terminal");
        assert_eq!(json["status"], "completed");
        assert!(json.get("error").is_none());

        let worker = ProgressEvent::Worker {
            worker: "planner".to_string(),
            status: WorkerStatus::Processing,
            work_unit_id: None,
            thinking_note: "mapping routes".to_string(),
            result: String::new(),
        };
        let json = serde_json::to_value(&worker).unwrap();
        assert_eq!(json["type"], "worker");
        assert_eq!(json["status"], "processing");
    }

    #[test]
    fn test_finality() {
        assert!(ProgressEvent::not_found("nope").is_final());
        assert!(ProgressEvent::Terminal {
            status: OverallStatus::Failed,
            error: Some("boom".to_string())
        }
        .is_final());
        assert_eq!(ProgressEvent::not_found("nope").event_name(), "error");
    }
}
