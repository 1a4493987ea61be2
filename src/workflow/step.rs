//! Step definitions and the predicate capability used to gate them

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::error::{DefinitionError, EvaluationError};

type PredicateFn<C> = dyn Fn(&C) -> Result<bool, EvaluationError> + Send + Sync;

/// A gating predicate evaluated against the external context.
///
/// Evaluation never unwinds: a panic inside the wrapped closure is turned into
/// [`EvaluationError::Panicked`].
pub struct Predicate<C> {
    inner: Arc<PredicateFn<C>>,
}

impl<C> Predicate<C> {
    /// Wrap a fallible closure
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&C) -> Result<bool, EvaluationError> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Wrap an infallible closure
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        Self::new(move |context| Ok(f(context)))
    }

    /// A predicate that ignores the context
    pub fn constant(value: bool) -> Self {
        Self::new(move |_| Ok(value))
    }

    pub fn evaluate(&self, context: &C) -> Result<bool, EvaluationError> {
        panic::catch_unwind(AssertUnwindSafe(|| (self.inner)(context))).unwrap_or_else(
            |payload| Err(EvaluationError::Panicked(panic_message(payload.as_ref()))),
        )
    }
}

impl<C> Clone for Predicate<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for Predicate<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// Extract a readable message from a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// An optional sub-choice offered inside a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubItem {
    /// Sub-item identifier, unique within its step
    pub id: String,
    /// Display label
    pub title: String,
    /// Longer help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SubItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One node of the linear workflow
pub struct Step<C> {
    /// Unique identifier, also the ordering key
    pub id: String,
    /// Display label
    pub title: String,
    /// Unlocks the step when true. Absent means the step can only be completed manually.
    pub validate: Option<Predicate<C>>,
    /// Marks the frontier step as loading when true
    pub is_loading: Option<Predicate<C>>,
    pub sub_items: Vec<SubItem>,
}

impl<C> Step<C> {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            validate: None,
            is_loading: None,
            sub_items: Vec::new(),
        }
    }

    pub fn with_validator(mut self, predicate: Predicate<C>) -> Self {
        self.validate = Some(predicate);
        self
    }

    pub fn with_loading(mut self, predicate: Predicate<C>) -> Self {
        self.is_loading = Some(predicate);
        self
    }

    pub fn with_sub_items(mut self, sub_items: Vec<SubItem>) -> Self {
        self.sub_items = sub_items;
        self
    }

    /// Look up a sub-item by id
    pub fn sub_item(&self, sub_item_id: &str) -> Option<&SubItem> {
        self.sub_items.iter().find(|item| item.id == sub_item_id)
    }
}

impl<C> Clone for Step<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            title: self.title.clone(),
            validate: self.validate.clone(),
            is_loading: self.is_loading.clone(),
            sub_items: self.sub_items.clone(),
        }
    }
}

impl<C> fmt::Debug for Step<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("validate", &self.validate.is_some())
            .field("is_loading", &self.is_loading.is_some())
            .field("sub_items", &self.sub_items)
            .finish()
    }
}

/// Check step and sub-item identifiers for emptiness and duplicates.
///
/// Takes `(step_id, sub_items)` pairs so both runtime steps and parsed
/// definitions share the same rules.
pub fn validate_layout<'a, I>(steps: I) -> Result<(), DefinitionError>
where
    I: IntoIterator<Item = (&'a str, &'a [SubItem])>,
{
    let mut seen = HashSet::new();
    for (index, (id, sub_items)) in steps.into_iter().enumerate() {
        if id.trim().is_empty() {
            return Err(DefinitionError::EmptyStepId(index));
        }
        if !seen.insert(id) {
            return Err(DefinitionError::DuplicateStepId(id.to_string()));
        }

        let mut seen_items = HashSet::new();
        for item in sub_items {
            if !seen_items.insert(item.id.as_str()) {
                return Err(DefinitionError::DuplicateSubItemId {
                    step: id.to_string(),
                    sub_item: item.id.clone(),
                });
            }
        }
    }
    Ok(())
}
