//! # Beacon Workers
//!
//! The ordered set of named workers and the seam to the reasoning engine.
//!
//! ## Architecture
//!
//! ```text
//! WorkerSet (ordered)
//!   └── WorkerDescriptor (role, goal, brief)
//!         └── ReasoningEngine::generate(request, progress) -> text
//! ```
//!
//! Descriptors carry no state. Everything that varies per request lives in
//! the `WorkUnit` and the `GenerationRequest` rendered from it.

pub mod definitions;
pub mod engine;
pub mod llm_helpers;
pub mod prompts;
pub mod scripted;

pub use definitions::{communicator, default_workers, logistics, planner, researcher};
pub use engine::{GenerationRequest, RadkitEngine, ReasoningEngine, ReasoningError, UpstreamResult};
pub use scripted::ScriptedEngine;

use serde::Serialize;

use crate::models::ModelConfig;
use crate::pipeline::{ProgressReporter, WorkUnit};

/// A named capability that turns (context, query) into text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerDescriptor {
    pub name: String,
    pub role: String,
    pub goal: String,
    #[serde(skip)]
    pub backstory: String,
    #[serde(skip)]
    pub task: String,
    #[serde(skip)]
    pub expected_output: String,
    /// Receives the dataset entry for the session's category
    pub needs_context: bool,
}

impl WorkerDescriptor {
    pub fn from_brief(name: &str, brief: prompts::Brief, needs_context: bool) -> Self {
        Self {
            name: name.to_string(),
            role: brief.role.to_string(),
            goal: brief.goal.to_string(),
            backstory: brief.backstory.to_string(),
            task: brief.task.to_string(),
            expected_output: brief.expected_output.to_string(),
            needs_context,
        }
    }

    /// Build the engine request for one of this worker's units
    pub fn request_for(
        &self,
        unit: &WorkUnit,
        upstream: &[UpstreamResult],
        model: ModelConfig,
    ) -> GenerationRequest {
        GenerationRequest {
            worker: self.name.clone(),
            role: self.role.clone(),
            goal: self.goal.clone(),
            backstory: self.backstory.clone(),
            task: self.task.clone(),
            expected_output: self.expected_output.clone(),
            category: unit.category.clone(),
            query: unit.query.clone(),
            context: unit.context.clone(),
            upstream: upstream.to_vec(),
            model,
        }
    }

    /// Run one unit through the engine. Single attempt, no retry.
    pub async fn generate(
        &self,
        engine: &dyn ReasoningEngine,
        unit: &WorkUnit,
        upstream: &[UpstreamResult],
        model: ModelConfig,
        progress: &ProgressReporter,
    ) -> Result<String, ReasoningError> {
        let request = self.request_for(unit, upstream, model);
        engine.generate(&request, progress).await
    }
}

/// Ordered collection of workers; order is pipeline order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WorkerSet {
    workers: Vec<WorkerDescriptor>,
}

impl WorkerSet {
    pub fn new(workers: Vec<WorkerDescriptor>) -> Self {
        Self { workers }
    }

    /// Keep only the named workers, in this set's order
    pub fn subset(&self, names: &[&str]) -> Self {
        Self {
            workers: self
                .workers
                .iter()
                .filter(|w| names.contains(&w.name.as_str()))
                .cloned()
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&WorkerDescriptor> {
        self.workers.iter().find(|w| w.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerDescriptor> {
        self.workers.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let workers = default_workers();
        assert_eq!(
            workers.names(),
            vec!["planner", "researcher", "logistics", "communicator"]
        );
    }

    #[test]
    fn test_subset_keeps_set_order() {
        let workers = default_workers().subset(&["communicator", "planner"]);
        assert_eq!(workers.names(), vec!["planner", "communicator"]);
        assert!(workers.get("researcher").is_none());
    }

    #[test]
    fn test_listing_hides_prompt_material() {
        let json = serde_json::to_value(default_workers()).unwrap();
        assert_eq!(json[0]["name"], "planner");
        assert_eq!(json[0]["role"], "Disaster Response Planner");
        assert!(json[0].get("backstory").is_none());
    }
}
