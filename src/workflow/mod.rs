//! Gated workflow navigation
//!
//! `engine` derives per-step statuses from a context snapshot; `controller`
//! owns the navigation session built on top of it.

pub mod clock;
pub mod controller;
pub mod engine;
pub mod error;
pub mod observer;
pub mod status;
pub mod step;


// Property-based tests (compiled only in test builds)
#[cfg(test)]
mod property_tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{NavigationController, NavigationSession, DEFAULT_NAVIGATION_COOLDOWN};
pub use engine::compute;
pub use error::{DefinitionError, EvaluationError};
pub use observer::{ContextUpdates, EventQueue, NavigationEvent, NavigationObserver};
pub use status::{StatusReport, StepStatus};
pub use step::{validate_layout, Predicate, Step, SubItem};
