//! Stepgate - gated navigation for linear workflows
//!
//! The core is the `workflow` module: a pure engine that derives a status for
//! every step from a context snapshot, and a navigation controller that owns
//! the session (current step, manual completions, rate limiting, deferred
//! advance). The remaining modules load workflow definitions and host
//! interactive sessions on top of it.

pub mod config;
pub mod definition;
pub mod logging;
pub mod runner;
pub mod workflow;

// Re-export commonly used types
pub use definition::{Condition, WorkflowDefinition};
pub use workflow::{
    compute, NavigationController, NavigationObserver, Predicate, StatusReport, Step, StepStatus,
};
