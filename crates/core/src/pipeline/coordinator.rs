//! # Pipeline Coordinator
//!
//! Accepts requests, builds one work unit per worker and runs them in the
//! background. All session mutation goes through a single writer task per
//! run that drains a typed `LifecycleEvent` channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::dataset::Dataset;
use crate::models::{LlmProvider, ModelConfig};
use crate::progress::{self, ProgressEvent};
use crate::session::{SessionHandle, SessionRegistry, SessionSnapshot, SessionState};
use crate::workers::{ReasoningEngine, ReasoningError, UpstreamResult, WorkerDescriptor, WorkerSet};

use super::events::{LifecycleEvent, ProgressReporter, WorkerOutcome};
use super::work_unit::WorkUnit;

/// Failure reported when execution ends without a verdict
pub const NO_RESULT: &str = "pipeline execution returned no result";

const EVENT_BUFFER: usize = 64;

/// How a session's work units are scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Every unit runs concurrently; no unit sees another's output
    #[default]
    Parallel,
    /// Units run in worker order, each receiving its predecessors' results
    Sequential,
}

/// Configuration for the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub execution_mode: ExecutionMode,
    /// Bound on a single reasoning call
    pub worker_timeout_secs: u64,
    /// Upper bound between stream checks when nothing wakes the subscriber
    pub stream_poll_interval_ms: u64,
    /// How long terminal sessions stay readable
    pub session_retention_secs: u64,
    pub sweep_interval_secs: u64,
    /// Global provider and model
    pub model: ModelConfig,
    /// Per-worker model overrides (worker name -> model name)
    pub per_worker_models: HashMap<String, String>,
    /// Per-worker provider overrides (worker name -> provider)
    pub per_worker_providers: HashMap<String, LlmProvider>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::Parallel,
            worker_timeout_secs: 120,
            stream_poll_interval_ms: 1000,
            session_retention_secs: 1800,
            sweep_interval_secs: 60,
            model: ModelConfig::default(),
            per_worker_models: HashMap::new(),
            per_worker_providers: HashMap::new(),
        }
    }
}

impl CoordinatorConfig {
    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.stream_poll_interval_ms.max(1))
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.session_retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Model for one worker: per-worker override, then global
    pub fn model_config_for(&self, worker: &str) -> ModelConfig {
        let provider = self
            .per_worker_providers
            .get(worker)
            .copied()
            .unwrap_or(self.model.provider);

        let model = match self.per_worker_models.get(worker) {
            Some(model) => model.clone(),
            None if provider == self.model.provider => self.model.model.clone(),
            None => provider.default_model().to_string(),
        };

        let base_url = if provider.supports_base_url() {
            self.model.base_url.clone()
        } else {
            None
        };

        ModelConfig {
            provider,
            model,
            base_url,
        }
    }
}

/// Errors returned synchronously by `submit`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("invalid category '{0}'")]
    InvalidCategory(String),
    #[error("session id must not be empty")]
    MissingSessionId,
}

/// An accepted request; the run continues in the background
#[derive(Debug)]
pub struct Submission {
    pub session_id: String,
    pub work_units: Vec<WorkUnit>,
    handle: JoinHandle<()>,
}

impl Submission {
    /// Wait for the background run to finish
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(session_id = %self.session_id, "Pipeline task ended abnormally: {}", e);
        }
    }
}

/// Runs requests against the worker set and records progress in the registry
#[derive(Clone)]
pub struct Coordinator {
    config: Arc<CoordinatorConfig>,
    workers: Arc<WorkerSet>,
    dataset: Arc<Dataset>,
    engine: Arc<dyn ReasoningEngine>,
    registry: SessionRegistry,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        workers: WorkerSet,
        dataset: Dataset,
        engine: Arc<dyn ReasoningEngine>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            workers: Arc::new(workers),
            dataset: Arc::new(dataset),
            engine,
            registry: SessionRegistry::new(),
        }
    }

    /// Use an existing registry instead of a private one
    pub fn with_registry(mut self, registry: SessionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn workers(&self) -> &WorkerSet {
        &self.workers
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub async fn get_status(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.registry.snapshot(session_id).await
    }

    pub fn subscribe(&self, session_id: &str) -> BoxStream<'static, ProgressEvent> {
        progress::subscribe(self.registry.clone(), session_id, self.config.poll_interval())
    }

    /// Accept a request and start it in the background.
    ///
    /// The session exists in the registry before this returns. An unknown
    /// category is recorded as a failed session and also reported here.
    #[tracing::instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn submit(
        &self,
        session_id: &str,
        category: &str,
        query: &str,
    ) -> Result<Submission, SubmitError> {
        if session_id.trim().is_empty() {
            return Err(SubmitError::MissingSessionId);
        }

        let category = Dataset::normalize(category);
        let Some(entry) = self.dataset.lookup(&category) else {
            let error = SubmitError::InvalidCategory(category.clone());
            tracing::warn!(%session_id, %category, "Rejected request with unknown category");
            let state = SessionState::rejected(session_id, &category, query, &self.workers, error.to_string());
            self.registry.create(state).await;
            return Err(error);
        };

        let units: Vec<WorkUnit> = self
            .workers
            .iter()
            .map(|w| WorkUnit::build(session_id, w, &category, query, entry))
            .collect();

        let state = SessionState::new(session_id, &category, query, &units);
        let handle = self.registry.create(state).await;
        tracing::info!(%session_id, %category, units = units.len(), mode = ?self.config.execution_mode, "Session accepted");

        let run = self.clone();
        let run_units = units.clone();
        let task = tokio::spawn(async move { run.execute(handle, run_units).await });

        Ok(Submission {
            session_id: session_id.to_string(),
            work_units: units,
            handle: task,
        })
    }

    async fn execute(self, handle: Arc<SessionHandle>, units: Vec<WorkUnit>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let writer = tokio::spawn(session_writer(handle.clone(), rx));

        let expected = units.len();
        let tally = match self.config.execution_mode {
            ExecutionMode::Parallel => self.run_parallel(units, &tx).await,
            ExecutionMode::Sequential => self.run_sequential(units, &tx).await,
        };

        if tally.failed == 0 && tally.completed < expected {
            tracing::error!(
                session_id = %handle.session_id(),
                completed = tally.completed,
                expected,
                "Execution ended without a result"
            );
            let _ = tx
                .send(LifecycleEvent::Aborted {
                    reason: NO_RESULT.to_string(),
                })
                .await;
        }

        drop(tx);
        if let Err(e) = writer.await {
            tracing::error!(session_id = %handle.session_id(), "Session writer failed: {}", e);
        }
    }

    async fn run_parallel(&self, units: Vec<WorkUnit>, tx: &mpsc::Sender<LifecycleEvent>) -> Tally {
        let mut join_set = JoinSet::new();
        for unit in units {
            let Some(job) = self.job_for(unit, Vec::new(), tx) else {
                continue;
            };
            join_set.spawn(job.run());
        }

        let mut tally = Tally::default();
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(_)) => tally.completed += 1,
                Ok(Err(_)) => tally.failed += 1,
                Err(e) => tracing::error!("Worker task panicked: {}", e),
            }
        }
        tally
    }

    async fn run_sequential(&self, units: Vec<WorkUnit>, tx: &mpsc::Sender<LifecycleEvent>) -> Tally {
        let mut tally = Tally::default();
        let mut upstream: Vec<UpstreamResult> = Vec::new();

        for unit in units {
            let worker = unit.worker.clone();
            let Some(job) = self.job_for(unit, upstream.clone(), tx) else {
                break;
            };
            // Spawned so a panicking engine surfaces as a JoinError.
            match tokio::spawn(job.run()).await {
                Ok(Ok(text)) => {
                    tally.completed += 1;
                    upstream.push(UpstreamResult { worker, text });
                }
                Ok(Err(_)) => {
                    tally.failed += 1;
                    break;
                }
                Err(e) => {
                    tracing::error!(%worker, "Worker task panicked: {}", e);
                    break;
                }
            }
        }
        tally
    }

    fn job_for(
        &self,
        unit: WorkUnit,
        upstream: Vec<UpstreamResult>,
        tx: &mpsc::Sender<LifecycleEvent>,
    ) -> Option<UnitJob> {
        let Some(descriptor) = self.workers.get(&unit.worker) else {
            tracing::warn!(worker = %unit.worker, "No descriptor for work unit");
            return None;
        };
        Some(UnitJob {
            engine: self.engine.clone(),
            descriptor: descriptor.clone(),
            model: self.config.model_config_for(&unit.worker),
            timeout: self.config.worker_timeout(),
            unit,
            upstream,
            tx: tx.clone(),
        })
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .field("workers", &self.workers.names())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct Tally {
    completed: usize,
    failed: usize,
}

/// Everything one work unit needs, owned so it can move into a task
struct UnitJob {
    engine: Arc<dyn ReasoningEngine>,
    descriptor: WorkerDescriptor,
    model: ModelConfig,
    timeout: Duration,
    unit: WorkUnit,
    upstream: Vec<UpstreamResult>,
    tx: mpsc::Sender<LifecycleEvent>,
}

impl UnitJob {
    async fn run(self) -> Result<String, ReasoningError> {
        let worker = self.unit.worker.clone();
        let _ = self
            .tx
            .send(LifecycleEvent::Started {
                worker: worker.clone(),
                description: self.unit.describe(),
            })
            .await;

        let progress = ProgressReporter::new(worker.clone(), self.tx.clone());
        let call = self.descriptor.generate(
            self.engine.as_ref(),
            &self.unit,
            &self.upstream,
            self.model,
            &progress,
        );
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ReasoningError::Timeout {
                worker: worker.clone(),
                secs: self.timeout.as_secs(),
            }),
        };

        let outcome = match &result {
            Ok(text) => WorkerOutcome::Output(text.clone()),
            Err(e) => {
                tracing::warn!(%worker, session_id = %self.unit.session_id, "Worker failed: {}", e);
                WorkerOutcome::Failed(e.to_string())
            }
        };
        let _ = self
            .tx
            .send(LifecycleEvent::Completed { worker, outcome })
            .await;
        result
    }
}

/// Single writer for one session run
async fn session_writer(handle: Arc<SessionHandle>, mut rx: mpsc::Receiver<LifecycleEvent>) {
    while let Some(event) = rx.recv().await {
        tracing::debug!(session_id = %handle.session_id(), ?event, "Lifecycle event");
        handle.apply(&event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{OverallStatus, WorkerStatus, NO_OUTPUT};
    use crate::workers::{default_workers, GenerationRequest, ScriptedEngine};
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::json;

    fn dataset() -> Dataset {
        Dataset::from_entries([
            ("flood", json!({ "shelters": ["Riverside High"] })),
            ("earthquake", json!({ "shelters": ["Civic Arena"] })),
        ])
    }

    fn fast_config() -> CoordinatorConfig {
        CoordinatorConfig {
            stream_poll_interval_ms: 20,
            ..CoordinatorConfig::default()
        }
    }

    fn coordinator(engine: impl ReasoningEngine + 'static) -> Coordinator {
        Coordinator::new(fast_config(), default_workers(), dataset(), Arc::new(engine))
    }

    struct PanickingEngine;

    #[async_trait]
    impl ReasoningEngine for PanickingEngine {
        async fn generate(
            &self,
            _request: &GenerationRequest,
            _progress: &ProgressReporter,
        ) -> Result<String, ReasoningError> {
            panic!("engine exploded")
        }
    }

    #[tokio::test]
    async fn test_flood_run_completes_with_every_result() {
        let coordinator = coordinator(ScriptedEngine::new());
        let submission = coordinator
            .submit("s1", "flood", "evacuate riverside")
            .await
            .unwrap();
        assert_eq!(submission.work_units.len(), 4);
        submission.wait().await;

        let snapshot = coordinator.get_status("s1").await.unwrap();
        assert_eq!(snapshot.status, OverallStatus::Completed);
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.results.len(), 4);
        assert!(snapshot.workers.iter().all(|w| w.status == WorkerStatus::Completed));
        assert_eq!(snapshot.messages().len(), 4);
    }

    #[tokio::test]
    async fn test_submit_returns_before_workers_finish() {
        let engine = ScriptedEngine::new().with_delay(Duration::from_millis(300));
        let coordinator = coordinator(engine);
        let submission = coordinator.submit("s1", "flood", "help").await.unwrap();

        let snapshot = coordinator.get_status("s1").await.unwrap();
        assert_eq!(snapshot.status, OverallStatus::Processing);
        assert!(snapshot.results.is_empty());
        assert!(snapshot.workers.iter().all(|w| w.work_unit_id.is_some()));
        submission.wait().await;
    }

    #[tokio::test]
    async fn test_invalid_category_is_recorded_and_reported() {
        let coordinator = coordinator(ScriptedEngine::new());
        let err = coordinator
            .submit("s2", "hurricane-x", "help")
            .await
            .unwrap_err();
        assert_eq!(err, SubmitError::InvalidCategory("hurricane-x".to_string()));

        let snapshot = coordinator.get_status("s2").await.unwrap();
        assert_eq!(snapshot.status, OverallStatus::Failed);
        assert!(snapshot.error.as_deref().unwrap().contains("invalid category"));
        assert!(snapshot.workers.iter().all(|w| w.work_unit_id.is_none()));
    }

    #[tokio::test]
    async fn test_category_is_case_insensitive() {
        let coordinator = coordinator(ScriptedEngine::new());
        let submission = coordinator.submit("s1", "FLOOD", "help").await.unwrap();
        assert!(submission.work_units.iter().all(|u| u.category == "flood"));
        submission.wait().await;
    }

    #[tokio::test]
    async fn test_blank_session_id_is_rejected() {
        let coordinator = coordinator(ScriptedEngine::new());
        let err = coordinator.submit("  ", "flood", "help").await.unwrap_err();
        assert_eq!(err, SubmitError::MissingSessionId);
        assert!(coordinator.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_resubmission_mid_flight_detaches_old_run() {
        let registry = SessionRegistry::new();
        let with_delay = |millis| {
            let engine = ScriptedEngine::new().with_delay(Duration::from_millis(millis));
            Coordinator::new(fast_config(), default_workers(), dataset(), Arc::new(engine))
                .with_registry(registry.clone())
        };
        let first = with_delay(200);
        let second = with_delay(600);

        let old_run = first.submit("s1", "flood", "first").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let before = first.get_status("s1").await.unwrap();
        assert_eq!(before.status, OverallStatus::Processing);
        assert!(before.workers.iter().all(|w| w.status == WorkerStatus::Processing));

        let new_run = second.submit("s1", "flood", "second").await.unwrap();
        let fresh = second.get_status("s1").await.unwrap();
        assert!(fresh.workers.iter().all(|w| w.status == WorkerStatus::Idle));

        // The superseded run finishes while the new one is still working.
        old_run.wait().await;
        let snapshot = second.get_status("s1").await.unwrap();
        assert_eq!(snapshot.status, OverallStatus::Processing);
        assert_eq!(snapshot.query, "second");
        assert!(snapshot.results.is_empty());
        for (new, old) in snapshot.workers.iter().zip(&before.workers) {
            assert_ne!(new.work_unit_id, old.work_unit_id);
        }

        new_run.wait().await;
        let done = second.get_status("s1").await.unwrap();
        assert_eq!(done.status, OverallStatus::Completed);
        assert!(done.results.values().all(|text| text.ends_with("second")));
    }

    #[tokio::test]
    async fn test_failure_is_sticky_while_others_finish() {
        let engine = ScriptedEngine::new()
            .failing("planner", "quota exceeded")
            .with_delay(Duration::from_millis(50))
            .with_worker_delay("planner", Duration::from_millis(5));
        let coordinator = coordinator(engine);
        coordinator.submit("s3", "flood", "help").await.unwrap().wait().await;

        let snapshot = coordinator.get_status("s3").await.unwrap();
        assert_eq!(snapshot.status, OverallStatus::Failed);
        assert!(snapshot.error.as_deref().unwrap().contains("quota exceeded"));
        assert_eq!(snapshot.results.len(), 3);
        assert_eq!(snapshot.worker("planner").unwrap().status, WorkerStatus::Idle);
    }

    #[tokio::test]
    async fn test_worker_timeout_fails_session() {
        let engine = ScriptedEngine::new().with_worker_delay("logistics", Duration::from_secs(5));
        let config = CoordinatorConfig {
            worker_timeout_secs: 1,
            ..fast_config()
        };
        let coordinator = Coordinator::new(config, default_workers(), dataset(), Arc::new(engine));
        coordinator.submit("s4", "flood", "help").await.unwrap().wait().await;

        let snapshot = coordinator.get_status("s4").await.unwrap();
        assert_eq!(snapshot.status, OverallStatus::Failed);
        assert!(snapshot
            .error
            .as_deref()
            .unwrap()
            .contains("worker 'logistics' timed out after 1s"));
    }

    #[tokio::test]
    async fn test_empty_output_uses_sentinel() {
        let coordinator = coordinator(ScriptedEngine::new().silent("communicator"));
        coordinator.submit("s5", "flood", "help").await.unwrap().wait().await;

        let snapshot = coordinator.get_status("s5").await.unwrap();
        assert_eq!(snapshot.status, OverallStatus::Completed);
        assert_eq!(snapshot.results["communicator"], NO_OUTPUT);
    }

    #[tokio::test]
    async fn test_sequential_mode_passes_results_forward() {
        let config = CoordinatorConfig {
            execution_mode: ExecutionMode::Sequential,
            ..fast_config()
        };
        let coordinator =
            Coordinator::new(config, default_workers(), dataset(), Arc::new(ScriptedEngine::new()));
        coordinator.submit("s6", "flood", "help").await.unwrap().wait().await;

        let snapshot = coordinator.get_status("s6").await.unwrap();
        assert_eq!(snapshot.status, OverallStatus::Completed);
        assert!(!snapshot.results["planner"].contains("building on"));
        assert!(snapshot.results["communicator"].contains("building on planner, researcher, logistics"));
    }

    #[tokio::test]
    async fn test_sequential_failure_leaves_later_workers_idle() {
        let config = CoordinatorConfig {
            execution_mode: ExecutionMode::Sequential,
            ..fast_config()
        };
        let engine = ScriptedEngine::new().failing("researcher", "no data");
        let coordinator = Coordinator::new(config, default_workers(), dataset(), Arc::new(engine));
        coordinator.submit("s7", "flood", "help").await.unwrap().wait().await;

        let snapshot = coordinator.get_status("s7").await.unwrap();
        assert_eq!(snapshot.status, OverallStatus::Failed);
        assert_eq!(snapshot.results.len(), 1);
        assert_eq!(snapshot.worker("logistics").unwrap().status, WorkerStatus::Idle);
        assert_eq!(snapshot.worker("communicator").unwrap().status, WorkerStatus::Idle);
    }

    #[tokio::test]
    async fn test_panicking_engine_reports_no_result() {
        let coordinator = coordinator(PanickingEngine);
        coordinator.submit("s8", "flood", "help").await.unwrap().wait().await;

        let snapshot = coordinator.get_status("s8").await.unwrap();
        assert_eq!(snapshot.status, OverallStatus::Failed);
        assert_eq!(snapshot.error.as_deref(), Some(NO_RESULT));
    }

    #[tokio::test]
    async fn test_stream_orders_processing_before_completed() {
        let engine = ScriptedEngine::new()
            .with_notes(["reading situation", "drafting"])
            .with_delay(Duration::from_millis(30));
        let coordinator = coordinator(engine);
        let submission = coordinator.submit("s9", "flood", "help").await.unwrap();
        let events: Vec<_> = coordinator.subscribe("s9").collect().await;
        submission.wait().await;

        for worker in coordinator.workers().names() {
            let statuses: Vec<_> = events
                .iter()
                .filter_map(|e| match e {
                    ProgressEvent::Worker { worker: w, status, .. } if w == worker => Some(*status),
                    _ => None,
                })
                .collect();
            let processing = statuses.iter().position(|s| *s == WorkerStatus::Processing);
            let completed = statuses.iter().position(|s| *s == WorkerStatus::Completed);
            assert!(processing.is_some(), "{} never processing", worker);
            assert!(processing < completed, "{} out of order", worker);
        }

        assert_eq!(events.iter().filter(|e| e.is_final()).count(), 1);
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::Terminal {
                status: OverallStatus::Completed,
                error: None
            })
        );
    }

    #[tokio::test]
    async fn test_polling_is_idempotent() {
        let coordinator = coordinator(ScriptedEngine::new());
        coordinator.submit("s10", "flood", "help").await.unwrap().wait().await;

        let first = coordinator.get_status("s10").await.unwrap();
        let second = coordinator.get_status("s10").await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_model_config_overrides() {
        let mut config = CoordinatorConfig::default();
        config
            .per_worker_providers
            .insert("planner".to_string(), LlmProvider::Anthropic);
        config
            .per_worker_models
            .insert("researcher".to_string(), "gpt-4o-mini".to_string());

        let planner = config.model_config_for("planner");
        assert_eq!(planner.provider, LlmProvider::Anthropic);
        assert_eq!(planner.model, LlmProvider::Anthropic.default_model());
        assert!(planner.base_url.is_none());

        assert_eq!(config.model_config_for("researcher").model, "gpt-4o-mini");
        assert_eq!(config.model_config_for("logistics"), config.model);
    }

    #[test]
    fn test_config_deserializes_partial_json() {
        let config: CoordinatorConfig =
            serde_json::from_str(r#"{ "execution_mode": "sequential", "worker_timeout_secs": 30 }"#).unwrap();
        assert_eq!(config.execution_mode, ExecutionMode::Sequential);
        assert_eq!(config.worker_timeout(), Duration::from_secs(30));
        assert_eq!(config.session_retention_secs, 1800);
    }
}
