//! Step status values and the computed status report

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a single step at one evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Behind the frontier; cannot be navigated to
    #[default]
    Locked,
    /// The frontier step, waiting for its gate to pass
    Next,
    /// The frontier step while its loading predicate holds
    Loading,
    /// Unlocked and not yet passed
    Available,
    /// The current step
    Active,
    /// Unlocked and before the current step
    Completed,
}

impl StepStatus {
    pub fn all() -> &'static [StepStatus] {
        &[
            StepStatus::Locked,
            StepStatus::Next,
            StepStatus::Loading,
            StepStatus::Available,
            StepStatus::Active,
            StepStatus::Completed,
        ]
    }

    pub fn is_locked(self) -> bool {
        self == StepStatus::Locked
    }

    pub fn label(self) -> &'static str {
        match self {
            StepStatus::Locked => "locked",
            StepStatus::Next => "next",
            StepStatus::Loading => "loading",
            StepStatus::Available => "available",
            StepStatus::Active => "active",
            StepStatus::Completed => "completed",
        }
    }

    /// Short marker used in plain-text listings
    pub fn marker(self) -> &'static str {
        match self {
            StepStatus::Locked => "[-]",
            StepStatus::Next => "[*]",
            StepStatus::Loading => "[~]",
            StepStatus::Available => "[ ]",
            StepStatus::Active => "[>]",
            StepStatus::Completed => "[x]",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Output of one engine evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusReport {
    /// One entry per configured step
    pub statuses: HashMap<String, StepStatus>,
    /// `(completed + 0.5 if the current step is active) / total * 100`
    pub progress_percent: f64,
}

impl StatusReport {
    /// Report for a workflow with no steps
    pub fn empty() -> Self {
        Self::default()
    }

    /// Status of a step, `Locked` when the id has no entry
    pub fn status(&self, step_id: &str) -> StepStatus {
        self.get(step_id).unwrap_or_default()
    }

    pub fn get(&self, step_id: &str) -> Option<StepStatus> {
        self.statuses.get(step_id).copied()
    }

    /// Number of steps carrying the given status
    pub fn count(&self, status: StepStatus) -> usize {
        self.statuses.values().filter(|s| **s == status).count()
    }

    /// Id of the step marked active, if any
    pub fn active_step(&self) -> Option<&str> {
        self.statuses
            .iter()
            .find(|(_, status)| **status == StepStatus::Active)
            .map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}
