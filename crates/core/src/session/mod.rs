//! # Sessions
//!
//! Per-session state machine and the registry that owns every live session.

pub mod registry;
pub mod state;

pub use registry::{SessionHandle, SessionRegistry};
pub use state::{
    ChatMessage, OverallStatus, SessionSnapshot, SessionState, Transition, WorkerState,
    WorkerStatus, NO_OUTPUT,
};
