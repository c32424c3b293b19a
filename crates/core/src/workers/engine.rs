//! # Reasoning Engine
//!
//! The opaque external call that turns a worker's request into text.
//! The pipeline treats it as a single attempt: it returns text or fails,
//! and any retry policy belongs inside an implementation, not the coordinator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::ModelConfig;
use crate::pipeline::ProgressReporter;

use super::llm_helpers::{self, WorkerReply};

/// Failures of a single reasoning call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReasoningError {
    /// Quota, transport, or malformed-response failure from the provider
    #[error("reasoning call failed: {0}")]
    Upstream(String),
    #[error("worker '{worker}' timed out after {secs}s")]
    Timeout { worker: String, secs: u64 },
    #[error("missing credentials: {0}")]
    Credentials(String),
}

/// Output of an earlier worker, fed forward in sequential mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamResult {
    pub worker: String,
    pub text: String,
}

/// Everything the engine needs for one call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub worker: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub task: String,
    pub expected_output: String,
    pub category: String,
    pub query: String,
    pub context: Option<Value>,
    pub upstream: Vec<UpstreamResult>,
    pub model: ModelConfig,
}

impl GenerationRequest {
    /// System instructions: persona and goal
    pub fn system_prompt(&self) -> String {
        format!(
            "You are the {}. {}\n\nYour goal: {}",
            self.role, self.backstory, self.goal
        )
    }

    /// User input rendered from the structured fields
    pub fn render(&self) -> String {
        let mut prompt = format!(
            "Disaster type: {}\nUser request: {}\n\nTask: {}\nExpected output: {}\n",
            self.category, self.query, self.task, self.expected_output
        );

        if let Some(context) = &self.context {
            let data = serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string());
            prompt.push_str("\nSituational data:\n");
            prompt.push_str(&data);
            prompt.push('\n');
        }

        let upstream: Vec<_> = self.upstream.iter().filter(|u| !u.text.is_empty()).collect();
        if !upstream.is_empty() {
            prompt.push_str("\nResults from earlier workers:\n");
            for result in upstream {
                prompt.push_str(&format!("\n## {}\n{}\n", result.worker, result.text));
            }
        }

        prompt
    }
}

/// External reasoning collaborator
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Produce text for one request. Thinking notes go through `progress`.
    async fn generate(
        &self,
        request: &GenerationRequest,
        progress: &ProgressReporter,
    ) -> Result<String, ReasoningError>;
}

/// Production engine backed by radkit LLM providers
#[derive(Debug, Clone, Copy, Default)]
pub struct RadkitEngine;

impl RadkitEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReasoningEngine for RadkitEngine {
    async fn generate(
        &self,
        request: &GenerationRequest,
        progress: &ProgressReporter,
    ) -> Result<String, ReasoningError> {
        progress
            .note(format!(
                "Consulting {} ({}) as {}",
                request.model.model,
                request.model.provider.display_name(),
                request.role
            ))
            .await;

        let reply: WorkerReply =
            llm_helpers::ask(&request.model, &request.system_prompt(), request.render())
                .await
                .map_err(|e| ReasoningError::Upstream(e.to_string()))?;

        tracing::debug!(
            worker = %request.worker,
            chars = reply.text.len(),
            "Reasoning call returned"
        );
        progress
            .note(format!("Drafted {} characters, handing back", reply.text.len()))
            .await;

        Ok(reply.text)
    }
}
