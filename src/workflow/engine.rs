//! Status computation for a linear, gated workflow
//!
//! A pure function of the step list, the context snapshot, the manually
//! completed set and the current step. Nothing here is retained between calls.
//!
//! The first step that is neither valid nor manually completed is the frontier:
//! it shows as `next` (or `loading`) and everything after it is `locked`.
//! Unlocked steps before the current step show as `completed`, the current step
//! as `active`.

use std::collections::{HashMap, HashSet};

use tracing::{trace, warn};

use super::status::{StatusReport, StepStatus};
use super::step::{Predicate, Step};

/// Predicate results for one step
#[derive(Debug, Clone, Copy)]
struct Gate {
    available: bool,
    loading: bool,
}

/// Derive a status for every step plus the overall progress percentage.
///
/// Predicates that fail are logged and count as `false`, so a broken validator
/// keeps its step blocked.
pub fn compute<C>(
    steps: &[Step<C>],
    context: &C,
    manually_completed: &HashSet<String>,
    current_step_id: Option<&str>,
) -> StatusReport {
    if steps.is_empty() {
        return StatusReport::empty();
    }

    let gates: Vec<Gate> = steps
        .iter()
        .map(|step| {
            let valid = evaluate(step, step.validate.as_ref(), "validate", context);
            let loading = evaluate(step, step.is_loading.as_ref(), "is_loading", context);
            Gate {
                available: valid || manually_completed.contains(&step.id),
                loading,
            }
        })
        .collect();

    let frontier = gates.iter().position(|gate| !gate.available);

    let mut statuses: Vec<StepStatus> = gates
        .iter()
        .enumerate()
        .map(|(index, gate)| match frontier {
            Some(f) if index == f && gate.loading => StepStatus::Loading,
            Some(f) if index == f => StepStatus::Next,
            Some(f) if index > f => StepStatus::Locked,
            _ => StepStatus::Available,
        })
        .collect();

    let current_index =
        current_step_id.and_then(|id| steps.iter().position(|step| step.id == id));

    if let Some(current) = current_index {
        // Only unlocked steps become completed; a regressed step keeps its real status
        for status in &mut statuses[..current] {
            if *status == StepStatus::Available {
                *status = StepStatus::Completed;
            }
        }

        if !statuses[current].is_locked() {
            statuses[current] = StepStatus::Active;
        }
    } else if let Some(id) = current_step_id {
        trace!(step = id, "Current step is not configured, reporting it as locked");
    }

    let completed = statuses
        .iter()
        .filter(|s| **s == StepStatus::Completed)
        .count();
    let active_bonus = match current_index.map(|i| statuses[i]) {
        Some(StepStatus::Active | StepStatus::Loading) => 0.5,
        _ => 0.0,
    };
    let progress_percent = (completed as f64 + active_bonus) / steps.len() as f64 * 100.0;

    let statuses: HashMap<String, StepStatus> = steps
        .iter()
        .zip(statuses)
        .map(|(step, status)| (step.id.clone(), status))
        .collect();

    StatusReport {
        statuses,
        progress_percent,
    }
}

fn evaluate<C>(step: &Step<C>, predicate: Option<&Predicate<C>>, kind: &str, context: &C) -> bool {
    let Some(predicate) = predicate else {
        return false;
    };

    match predicate.evaluate(context) {
        Ok(value) => value,
        Err(err) => {
            warn!(
                step = %step.id,
                predicate = kind,
                error = %err,
                "Step predicate failed, treating as false"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::error::EvaluationError;

    fn steps_abc() -> Vec<Step<()>> {
        vec![
            Step::new("A", "First").with_validator(Predicate::constant(true)),
            Step::new("B", "Second")
                .with_validator(Predicate::constant(false))
                .with_loading(Predicate::constant(false)),
            Step::new("C", "Third").with_validator(Predicate::constant(false)),
        ]
    }

    fn completed(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_initial_state() {
        let report = compute(&steps_abc(), &(), &HashSet::new(), Some("A"));

        assert_eq!(report.status("A"), StepStatus::Active);
        assert_eq!(report.status("B"), StepStatus::Next);
        assert_eq!(report.status("C"), StepStatus::Locked);
        assert!((report.progress_percent - 50.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_entry_per_step() {
        let report = compute(&steps_abc(), &(), &HashSet::new(), Some("A"));
        assert_eq!(report.len(), 3);
    }

    #[test]
    fn test_manual_completion_moves_frontier() {
        let report = compute(&steps_abc(), &(), &completed(&["A", "B"]), Some("B"));

        assert_eq!(report.status("A"), StepStatus::Completed);
        assert_eq!(report.status("B"), StepStatus::Active);
        assert_eq!(report.status("C"), StepStatus::Next);
        assert!((report.progress_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_available_has_no_frontier() {
        let steps: Vec<Step<()>> = vec![
            Step::new("A", "A").with_validator(Predicate::constant(true)),
            Step::new("B", "B").with_validator(Predicate::constant(true)),
        ];
        let report = compute(&steps, &(), &HashSet::new(), Some("B"));

        assert_eq!(report.status("A"), StepStatus::Completed);
        assert_eq!(report.status("B"), StepStatus::Active);
        assert!((report.progress_percent - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_loading_frontier() {
        let steps: Vec<Step<()>> = vec![
            Step::new("A", "A").with_validator(Predicate::constant(true)),
            Step::new("B", "B").with_loading(Predicate::constant(true)),
            Step::new("C", "C").with_loading(Predicate::constant(true)),
        ];
        let report = compute(&steps, &(), &HashSet::new(), Some("A"));

        assert_eq!(report.status("B"), StepStatus::Loading);
        // Loading only matters at the frontier
        assert_eq!(report.status("C"), StepStatus::Locked);
    }

    #[test]
    fn test_available_after_frontier_is_locked() {
        let steps: Vec<Step<()>> = vec![
            Step::new("A", "A"),
            Step::new("B", "B").with_validator(Predicate::constant(true)),
        ];
        let report = compute(&steps, &(), &HashSet::new(), Some("A"));

        assert_eq!(report.status("A"), StepStatus::Active);
        assert_eq!(report.status("B"), StepStatus::Locked);
    }

    #[test]
    fn test_current_step_at_frontier_is_active() {
        let report = compute(&steps_abc(), &(), &HashSet::new(), Some("B"));

        assert_eq!(report.status("A"), StepStatus::Completed);
        assert_eq!(report.status("B"), StepStatus::Active);
        assert_eq!(report.status("C"), StepStatus::Locked);
    }

    #[test]
    fn test_locked_current_step_stays_locked() {
        let report = compute(&steps_abc(), &(), &HashSet::new(), Some("C"));

        assert_eq!(report.status("C"), StepStatus::Locked);
        assert_eq!(report.active_step(), None);
        // A is before the current index and unlocked; B is the frontier and keeps its status
        assert_eq!(report.status("A"), StepStatus::Completed);
        assert_eq!(report.status("B"), StepStatus::Next);
        assert!((report.progress_percent - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_regressed_step_is_not_completed() {
        // B was completed before, then its validator started failing again
        let steps: Vec<Step<()>> = vec![
            Step::new("A", "A").with_validator(Predicate::constant(true)),
            Step::new("B", "B").with_validator(Predicate::constant(false)),
            Step::new("C", "C").with_validator(Predicate::constant(true)),
        ];
        let report = compute(&steps, &(), &HashSet::new(), Some("C"));

        assert_eq!(report.status("A"), StepStatus::Completed);
        assert_eq!(report.status("B"), StepStatus::Next);
        assert_eq!(report.status("C"), StepStatus::Locked);
    }

    #[test]
    fn test_unknown_current_step() {
        let report = compute(&steps_abc(), &(), &HashSet::new(), Some("Z"));

        assert_eq!(report.status("Z"), StepStatus::Locked);
        assert_eq!(report.get("Z"), None);
        assert_eq!(report.status("A"), StepStatus::Available);
        assert_eq!(report.progress_percent, 0.0);
    }

    #[test]
    fn test_no_current_step() {
        let report = compute(&steps_abc(), &(), &HashSet::new(), None);
        assert_eq!(report.status("A"), StepStatus::Available);
        assert_eq!(report.active_step(), None);
    }

    #[test]
    fn test_empty_step_list() {
        let steps: Vec<Step<()>> = Vec::new();
        let report = compute(&steps, &(), &HashSet::new(), None);
        assert!(report.is_empty());
        assert_eq!(report.progress_percent, 0.0);
    }

    #[test]
    fn test_failing_validator_is_fail_closed() {
        let steps: Vec<Step<()>> = vec![
            Step::new("A", "A").with_validator(Predicate::constant(true)),
            Step::new("B", "B").with_validator(Predicate::new(|_| {
                Err(EvaluationError::Failed("backend unavailable".to_string()))
            })),
            Step::new("C", "C").with_validator(Predicate::constant(true)),
        ];
        let report = compute(&steps, &(), &HashSet::new(), Some("A"));

        assert_eq!(report.status("B"), StepStatus::Next);
        assert_eq!(report.status("C"), StepStatus::Locked);
    }

    #[test]
    fn test_failing_loader_is_not_loading() {
        let steps: Vec<Step<()>> = vec![
            Step::new("A", "A").with_validator(Predicate::constant(true)),
            Step::new("B", "B").with_loading(Predicate::from_fn(|_| panic!("loader bug"))),
        ];
        let report = compute(&steps, &(), &HashSet::new(), Some("A"));
        assert_eq!(report.status("B"), StepStatus::Next);
    }

    #[test]
    fn test_context_drives_validation() {
        let steps: Vec<Step<u32>> = vec![
            Step::new("A", "A").with_validator(Predicate::from_fn(|n: &u32| *n >= 1)),
            Step::new("B", "B").with_validator(Predicate::from_fn(|n: &u32| *n >= 2)),
        ];

        let both = compute(&steps, &2, &HashSet::new(), Some("A"));
        assert_eq!(both.status("B"), StepStatus::Available);

        let one = compute(&steps, &1, &HashSet::new(), Some("A"));
        assert_eq!(one.status("B"), StepStatus::Next);

        let none = compute(&steps, &0, &HashSet::new(), Some("A"));
        assert_eq!(none.status("A"), StepStatus::Active);
        assert_eq!(none.status("B"), StepStatus::Locked);
    }
}
