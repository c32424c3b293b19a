//! # Worker Definitions
//!
//! Composes the Beacon workers from their bundled briefs.

use super::prompts;
use super::{WorkerDescriptor, WorkerSet};

/// The Planner
///
/// Designs the step-by-step response strategy.
pub fn planner() -> WorkerDescriptor {
    WorkerDescriptor::from_brief("planner", prompts::PLANNER, false)
}

/// The Researcher
///
/// The only worker that reads the situational dataset.
pub fn researcher() -> WorkerDescriptor {
    WorkerDescriptor::from_brief("researcher", prompts::RESEARCHER, true)
}

/// The Logistics Coordinator
pub fn logistics() -> WorkerDescriptor {
    WorkerDescriptor::from_brief("logistics", prompts::LOGISTICS, false)
}

/// The Public Communicator
pub fn communicator() -> WorkerDescriptor {
    WorkerDescriptor::from_brief("communicator", prompts::COMMUNICATOR, false)
}

/// Create the full worker set
///
/// Returns workers in pipeline order:
/// 1. Planner → 2. Researcher → 3. Logistics → 4. Communicator
pub fn default_workers() -> WorkerSet {
    WorkerSet::new(vec![planner(), researcher(), logistics(), communicator()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_researcher_needs_context() {
        let needing: Vec<_> = default_workers()
            .iter()
            .filter(|w| w.needs_context)
            .map(|w| w.name.clone())
            .collect();
        assert_eq!(needing, vec!["researcher".to_string()]);
    }
}
