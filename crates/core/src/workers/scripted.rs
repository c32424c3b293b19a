//! # Scripted Engine
//!
//! A deterministic, offline `ReasoningEngine`. Backs `beacon run --offline`
//! and the pipeline tests: canned replies, optional per-worker delays,
//! failures and empty outputs.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;

use crate::pipeline::ProgressReporter;

use super::engine::{GenerationRequest, ReasoningEngine, ReasoningError};

#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    notes: Vec<String>,
    delay: Duration,
    delays: HashMap<String, Duration>,
    failures: HashMap<String, String>,
    empty: HashSet<String>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Thinking notes every worker emits, in order, before replying
    pub fn with_notes<I, S>(mut self, notes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.notes = notes.into_iter().map(Into::into).collect();
        self
    }

    /// Delay applied to every worker without its own delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_worker_delay(mut self, worker: &str, delay: Duration) -> Self {
        self.delays.insert(worker.to_string(), delay);
        self
    }

    /// Make a worker's call fail with `reason`
    pub fn failing(mut self, worker: &str, reason: &str) -> Self {
        self.failures.insert(worker.to_string(), reason.to_string());
        self
    }

    /// Make a worker return an empty reply
    pub fn silent(mut self, worker: &str) -> Self {
        self.empty.insert(worker.to_string());
        self
    }

    fn delay_for(&self, worker: &str) -> Duration {
        self.delays.get(worker).copied().unwrap_or(self.delay)
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn generate(
        &self,
        request: &GenerationRequest,
        progress: &ProgressReporter,
    ) -> Result<String, ReasoningError> {
        for note in &self.notes {
            progress.note(note.clone()).await;
        }

        let delay = self.delay_for(&request.worker);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(reason) = self.failures.get(&request.worker) {
            return Err(ReasoningError::Upstream(reason.clone()));
        }
        if self.empty.contains(&request.worker) {
            return Ok(String::new());
        }

        let mut reply = format!(
            "{} report for {}: {}",
            request.role, request.category, request.query
        );
        if !request.upstream.is_empty() {
            let sources: Vec<_> = request.upstream.iter().map(|u| u.worker.as_str()).collect();
            reply.push_str(&format!(" (building on {})", sources.join(", ")));
        }
        Ok(reply)
    }
}
