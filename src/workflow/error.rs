//! Error types for step evaluation and workflow layout

use thiserror::Error;

/// Failure raised by a step predicate.
///
/// The engine never propagates these; a failing predicate counts as `false`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("context value at '{key}' is {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("predicate panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

/// Structural problems in a list of steps
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("workflow name must not be empty")]
    EmptyName,

    #[error("step at position {0} has an empty id")]
    EmptyStepId(usize),

    #[error("step id '{0}' is used more than once")]
    DuplicateStepId(String),

    #[error("step '{step}' declares sub-item '{sub_item}' more than once")]
    DuplicateSubItemId { step: String, sub_item: String },
}
