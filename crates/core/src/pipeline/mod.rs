//! # Pipeline Module
//!
//! Turns one request into work units, runs them against the reasoning
//! engine and feeds lifecycle events back into the session registry.
//!
//! ## Flow
//!
//! ```text
//! submit ──► WorkUnit per worker ──► engine.generate (parallel | sequential)
//!                                          │
//!                        LifecycleEvent ───┘──► session writer ──► registry
//! ```

pub mod coordinator;
pub mod events;
pub mod work_unit;

pub use coordinator::{Coordinator, CoordinatorConfig, ExecutionMode, SubmitError, Submission};
pub use events::{LifecycleEvent, ProgressReporter, WorkerOutcome};
pub use work_unit::{WorkUnit, WorkUnitId};
