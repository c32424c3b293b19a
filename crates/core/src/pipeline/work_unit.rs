//! # Work Units
//!
//! The immutable instruction built for one worker within one session.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::workers::WorkerDescriptor;

/// Opaque identifier assigned to a work unit at submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkUnitId(Uuid);

impl WorkUnitId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkUnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One worker's resolved instruction for one session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkUnit {
    pub id: WorkUnitId,
    pub session_id: String,
    pub worker: String,
    pub role: String,
    pub category: String,
    pub query: String,
    /// Dataset payload, only for workers that need situational context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl WorkUnit {
    pub fn build(
        session_id: &str,
        descriptor: &WorkerDescriptor,
        category: &str,
        query: &str,
        dataset_entry: &Value,
    ) -> Self {
        Self {
            id: WorkUnitId::new(),
            session_id: session_id.to_string(),
            worker: descriptor.name.clone(),
            role: descriptor.role.clone(),
            category: category.to_string(),
            query: query.to_string(),
            context: descriptor.needs_context.then(|| dataset_entry.clone()),
        }
    }

    /// Human-readable working note shown while the unit runs
    pub fn describe(&self) -> String {
        format!("{} for {}: {}", self.role, self.category, self.query)
    }
}
