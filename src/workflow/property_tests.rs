//! Property-based tests for status computation
//!
//! These tests use proptest to check the engine's invariants across random
//! step layouts, manual completions and current positions.

use std::collections::HashSet;

use proptest::prelude::*;

use super::engine::compute;
use super::error::EvaluationError;
use super::status::StepStatus;
use super::step::{Predicate, Step};

/// How a generated predicate behaves
#[derive(Debug, Clone, Copy, PartialEq)]
enum Outcome {
    Absent,
    True,
    False,
    Fails,
}

impl Outcome {
    fn predicate(self) -> Option<Predicate<()>> {
        match self {
            Outcome::Absent => None,
            Outcome::True => Some(Predicate::constant(true)),
            Outcome::False => Some(Predicate::constant(false)),
            Outcome::Fails => Some(Predicate::new(|_| {
                Err(EvaluationError::Failed("generated failure".to_string()))
            })),
        }
    }

    /// The outcome the engine should treat this one as
    fn fail_closed(self) -> Outcome {
        match self {
            Outcome::Fails => Outcome::False,
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
struct Layout {
    gates: Vec<(Outcome, Outcome)>,
    manual: Vec<bool>,
    current: Option<usize>,
}

impl Layout {
    fn steps(&self) -> Vec<Step<()>> {
        self.steps_with(|outcome| outcome)
    }

    fn steps_with(&self, map: impl Fn(Outcome) -> Outcome) -> Vec<Step<()>> {
        self.gates
            .iter()
            .enumerate()
            .map(|(i, (valid, loading))| {
                let mut step = Step::new(format!("s{i}"), format!("Step {i}"));
                step.validate = map(*valid).predicate();
                step.is_loading = map(*loading).predicate();
                step
            })
            .collect()
    }

    fn manually_completed(&self) -> HashSet<String> {
        self.manual
            .iter()
            .enumerate()
            .filter(|(_, done)| **done)
            .map(|(i, _)| format!("s{i}"))
            .collect()
    }

    fn current_id(&self) -> Option<String> {
        self.current.map(|i| format!("s{i}"))
    }
}

fn any_outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Absent),
        Just(Outcome::True),
        Just(Outcome::False),
        Just(Outcome::Fails),
    ]
}

fn any_layout() -> impl Strategy<Value = Layout> {
    (1usize..8).prop_flat_map(|len| {
        (
            prop::collection::vec((any_outcome(), any_outcome()), len),
            prop::collection::vec(any::<bool>(), len),
            // Allows one out-of-range position to cover unknown ids
            prop::option::of(0..=len),
        )
            .prop_map(|(gates, manual, current)| Layout {
                gates,
                manual,
                current,
            })
    })
}

proptest! {
    /// Property: at most one step is active, and only the current one
    #[test]
    fn test_single_active(layout in any_layout()) {
        let current = layout.current_id();
        let report = compute(&layout.steps(), &(), &layout.manually_completed(), current.as_deref());

        prop_assert!(report.count(StepStatus::Active) <= 1);
        if let Some(active) = report.active_step() {
            prop_assert_eq!(Some(active), current.as_deref());
        }
        if let Some(id) = current.as_deref() {
            let status = report.status(id);
            prop_assert!(status == StepStatus::Active || status == StepStatus::Locked);
        }
    }

    /// Property: once a step is locked, every later step is locked
    #[test]
    fn test_frontier_monotonic(layout in any_layout()) {
        let steps = layout.steps();
        let current = layout.current_id();
        let report = compute(&steps, &(), &layout.manually_completed(), current.as_deref());

        let mut seen_locked = false;
        for step in &steps {
            let locked = report.status(&step.id).is_locked();
            prop_assert!(!seen_locked || locked, "step {} unlocked after a locked step", step.id);
            seen_locked |= locked;
        }
    }

    /// Property: the report has exactly one entry per step and sane progress
    #[test]
    fn test_report_shape(layout in any_layout()) {
        let steps = layout.steps();
        let report = compute(&steps, &(), &layout.manually_completed(), layout.current_id().as_deref());

        prop_assert_eq!(report.len(), steps.len());
        for step in &steps {
            prop_assert!(report.get(&step.id).is_some());
        }
        prop_assert!((0.0..=100.0).contains(&report.progress_percent));
    }

    /// Property: a manually completed step is never the blocking frontier
    #[test]
    fn test_manual_override(layout in any_layout(), pick in any::<prop::sample::Index>()) {
        let mut layout = layout;
        let index = pick.index(layout.manual.len());
        layout.manual[index] = true;
        // Even a validator that always says no
        layout.gates[index].0 = Outcome::False;

        let report = compute(&layout.steps(), &(), &layout.manually_completed(), layout.current_id().as_deref());
        let status = report.status(&format!("s{index}"));
        prop_assert!(status != StepStatus::Next && status != StepStatus::Loading);
    }

    /// Property: failing predicates produce the same statuses as `false`
    #[test]
    fn test_fail_closed(layout in any_layout()) {
        let current = layout.current_id();
        let completed = layout.manually_completed();

        let failing = compute(&layout.steps(), &(), &completed, current.as_deref());
        let closed = compute(&layout.steps_with(Outcome::fail_closed), &(), &completed, current.as_deref());

        prop_assert_eq!(failing, closed);
    }
}
