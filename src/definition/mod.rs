//! Workflow definition files
//!
//! A definition is a TOML or JSON document listing the steps of one workflow.
//! Step gates are [`Condition`] expressions evaluated against a JSON context.

use std::path::Path;

use anyhow::{Context, Result};
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workflow::{validate_layout, DefinitionError, Predicate, Step, SubItem};

pub mod condition;

pub use condition::Condition;

/// A complete workflow: a name and its ordered steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowDefinition {
    /// Workflow name
    pub name: String,
    /// Optional summary shown by `stepgate check`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Steps in navigation order
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

/// One step in a definition file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepDefinition {
    /// Unique step identifier
    pub id: String,
    /// Display label
    pub title: String,
    /// Gate that unlocks the step. Without one, the step only unlocks when completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<Condition>,
    /// Marks the step as loading while it is the frontier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading: Option<Condition>,
    /// Optional sub-choices
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_items: Vec<SubItem>,
}

impl WorkflowDefinition {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse workflow definition TOML")
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse workflow definition JSON")
    }

    /// Load a definition file, choosing the format by extension (TOML unless `.json`)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow definition {}", path.display()))?;

        let definition = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_toml(&content),
        }
        .with_context(|| format!("Invalid workflow definition {}", path.display()))?;

        definition.validate()?;
        Ok(definition)
    }

    /// Check the name and the step layout
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        validate_layout(
            self.steps
                .iter()
                .map(|step| (step.id.as_str(), step.sub_items.as_slice())),
        )
    }

    /// Build runtime steps whose predicates evaluate the conditions
    pub fn into_steps(self) -> Vec<Step<Value>> {
        self.steps
            .into_iter()
            .map(StepDefinition::into_step)
            .collect()
    }

    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.id.as_str()).collect()
    }

    /// JSON Schema describing definition files
    pub fn json_schema() -> Value {
        serde_json::to_value(schema_for!(WorkflowDefinition)).unwrap_or(Value::Null)
    }
}

impl StepDefinition {
    pub fn into_step(self) -> Step<Value> {
        let mut step = Step::new(self.id, self.title).with_sub_items(self.sub_items);
        step.validate = self.validate.map(condition_predicate);
        step.is_loading = self.loading.map(condition_predicate);
        step
    }
}

fn condition_predicate(condition: Condition) -> Predicate<Value> {
    Predicate::new(move |context: &Value| condition.evaluate(context))
}
