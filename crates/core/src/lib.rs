//! # Beacon Core
//!
//! The pipeline engine behind Beacon, the disaster-response coordinator.
//! A fixed set of workers (planner, researcher, logistics, communicator)
//! answer a single request together while clients watch progress live.
//!
//! ## Architecture
//!
//! - `workers/` - Worker descriptors and the reasoning engine seam
//! - `models` - LLM provider configuration
//! - `dataset` - Category lookup that feeds worker context
//! - `session/` - Per-session state machine and the in-memory registry
//! - `pipeline/` - Work units, lifecycle events and the coordinator
//! - `progress/` - Event journal and the streaming subscriber
//!
//! ## Usage
//!
//! ```rust,ignore
//! use beacon_core::pipeline::{Coordinator, CoordinatorConfig};
//!
//! let coordinator = Coordinator::new(config, workers, dataset, engine);
//! coordinator.submit("s1", "flood", "evacuate riverside district").await?;
//! let snapshot = coordinator.get_status("s1").await;
//! ```

pub mod dataset;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod workers;

pub use dataset::Dataset;
pub use pipeline::{Coordinator, CoordinatorConfig, ExecutionMode, SubmitError, Submission};
pub use progress::ProgressEvent;
pub use session::{OverallStatus, SessionRegistry, SessionSnapshot, WorkerStatus};
pub use workers::{ReasoningEngine, WorkerSet};
