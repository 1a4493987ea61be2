//! Navigation controller: owns the session and moves through the workflow
//!
//! Completing a step is two-phase. `complete_step` records the completion and
//! flags a pending advance; the host then calls `settle` once the context has
//! caught up, and the advance is resolved against freshly computed statuses.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::engine;
use super::error::DefinitionError;
use super::observer::{ContextUpdates, NavigationObserver};
use super::status::{StatusReport, StepStatus};
use super::step::{panic_message, validate_layout, Step};

/// Navigations closer together than this are dropped
pub const DEFAULT_NAVIGATION_COOLDOWN: Duration = Duration::from_millis(250);

/// Mutable navigation state, owned by the controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationSession {
    /// Step currently in view. `None` only when there are no steps.
    pub current_step_id: Option<String>,
    /// Steps completed explicitly, regardless of their validators
    pub manually_completed: HashSet<String>,
    /// Time of the last accepted navigation
    pub last_navigation: Option<DateTime<Utc>>,
    /// Set by `complete_step`, consumed by `settle`
    pub pending_advance: bool,
}

pub struct NavigationController<C, O> {
    steps: Vec<Step<C>>,
    session: NavigationSession,
    report: StatusReport,
    observer: O,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
}

impl<C, O: NavigationObserver> NavigationController<C, O> {
    /// Create a controller positioned on the first step, with statuses
    /// computed against the initial `context`.
    ///
    /// Step ids must be non-empty and unique.
    pub fn new(steps: Vec<Step<C>>, context: &C, observer: O) -> Result<Self, DefinitionError> {
        validate_layout(
            steps
                .iter()
                .map(|step| (step.id.as_str(), step.sub_items.as_slice())),
        )?;

        let session = NavigationSession {
            current_step_id: steps.first().map(|step| step.id.clone()),
            ..NavigationSession::default()
        };

        let mut controller = Self {
            steps,
            session,
            report: StatusReport::empty(),
            observer,
            clock: Arc::new(SystemClock),
            cooldown: DEFAULT_NAVIGATION_COOLDOWN,
        };
        controller.evaluate(context);
        Ok(controller)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    // ─── Evaluation ─────────────────────────────────────────────────────────────

    /// Recompute the status map against `context` without advancing
    pub fn evaluate(&mut self, context: &C) -> &StatusReport {
        self.report = if self.steps.is_empty() {
            StatusReport::empty()
        } else {
            engine::compute(
                &self.steps,
                context,
                &self.session.manually_completed,
                self.session.current_step_id.as_deref(),
            )
        };
        &self.report
    }

    /// Recompute statuses and resolve a pending advance, if any.
    ///
    /// Hosts call this once per update cycle, after applying any context
    /// updates the controller requested.
    pub fn settle(&mut self, context: &C) -> &StatusReport {
        self.evaluate(context);
        if self.session.pending_advance {
            self.resolve_pending_advance();
            self.evaluate(context);
        }
        &self.report
    }

    fn resolve_pending_advance(&mut self) {
        let start = self.current_index().map_or(0, |index| index + 1);
        let target = self.steps[start.min(self.steps.len())..]
            .iter()
            .find(|step| {
                self.report
                    .get(&step.id)
                    .is_some_and(|status| !status.is_locked())
            })
            .map(|step| step.id.clone());

        match target {
            Some(step_id) => {
                self.session.last_navigation = Some(self.clock.now());
                self.session.current_step_id = Some(step_id.clone());
                info!(step = %step_id, "Advanced to next step");
                self.notify_step_changed(&step_id);
            }
            None => debug!("No unlocked step after the current one, staying put"),
        }

        self.session.pending_advance = false;
    }

    // ─── Navigation ─────────────────────────────────────────────────────────────

    /// Jump to a step. Returns whether the navigation was accepted.
    ///
    /// Locked and unknown steps are ignored, as is any request inside the
    /// cooldown window after the last accepted navigation.
    pub fn click(&mut self, context: &C, step_id: &str) -> bool {
        if self.evaluate(context).status(step_id).is_locked() {
            debug!(step = step_id, "Ignoring navigation to locked step");
            return false;
        }

        let now = self.clock.now();
        if self.within_cooldown(now) {
            debug!(step = step_id, "Ignoring navigation inside cooldown window");
            return false;
        }

        self.session.current_step_id = Some(step_id.to_string());
        self.session.last_navigation = Some(now);
        info!(step = step_id, "Navigated to step");
        self.notify_step_changed(step_id);
        self.evaluate(context);
        true
    }

    /// Alias for [`click`](Self::click)
    pub fn navigate_to(&mut self, context: &C, step_id: &str) -> bool {
        self.click(context, step_id)
    }

    fn within_cooldown(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.session.last_navigation else {
            return false;
        };
        // A clock that went backwards does not block navigation
        match now.signed_duration_since(last).to_std() {
            Ok(elapsed) => elapsed < self.cooldown,
            Err(_) => false,
        }
    }

    /// Mark the current step as done and request an advance on the next `settle`.
    ///
    /// `data` is forwarded to the observer as a context update. Completing the
    /// final step also reports that step as changed right away, since there is
    /// nothing to advance to.
    pub fn complete_step(&mut self, data: Option<ContextUpdates>) {
        let Some(current) = self.session.current_step_id.clone() else {
            debug!("No current step to complete");
            return;
        };

        self.session.manually_completed.insert(current.clone());
        info!(step = %current, "Step completed");

        if let Some(updates) = data {
            self.forward_context_updates(&updates);
        }

        self.session.pending_advance = true;

        if self.is_last_step(&current) {
            self.notify_step_changed(&current);
        }
    }

    /// Roll back to `step_id`, forgetting manual completions from it onwards,
    /// and recompute statuses against `context`. Returns `false` for an
    /// unknown step.
    pub fn reset_to_step(&mut self, context: &C, step_id: &str) -> bool {
        let Some(index) = self.index_of(step_id) else {
            debug!(step = step_id, "Ignoring reset to unknown step");
            return false;
        };

        for step in &self.steps[index..] {
            self.session.manually_completed.remove(&step.id);
        }
        self.session.current_step_id = Some(step_id.to_string());
        info!(step = step_id, "Reset to step");
        self.notify_step_changed(step_id);
        self.evaluate(context);
        true
    }

    /// Forward data to the context owner
    pub fn update_context(&mut self, updates: ContextUpdates) {
        self.forward_context_updates(&updates);
    }

    /// Report a sub-choice pick. No gating applies; unknown ids are ignored.
    pub fn select_sub_item(&mut self, step_id: &str, sub_item_id: &str) -> bool {
        let known = self
            .step(step_id)
            .is_some_and(|step| step.sub_item(sub_item_id).is_some());
        if !known {
            debug!(step = step_id, sub_item = sub_item_id, "Ignoring unknown sub-item");
            return false;
        }

        self.notify("sub_item_selected", |observer| {
            observer.sub_item_selected(step_id, sub_item_id)
        });
        true
    }

    // ─── Notifications ──────────────────────────────────────────────────────────

    fn notify_step_changed(&mut self, step_id: &str) {
        self.notify("step_changed", |observer| observer.step_changed(step_id));
    }

    fn forward_context_updates(&mut self, updates: &ContextUpdates) {
        self.notify("context_update_requested", |observer| {
            observer.context_update_requested(updates)
        });
    }

    /// Run an observer callback, logging and swallowing any failure
    fn notify<F>(&mut self, callback: &'static str, f: F)
    where
        F: FnOnce(&mut O) -> anyhow::Result<()>,
    {
        let observer = &mut self.observer;
        match panic::catch_unwind(AssertUnwindSafe(|| f(observer))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(callback, error = %format!("{err:#}"), "Observer callback failed"),
            Err(payload) => warn!(
                callback,
                panic = %panic_message(payload.as_ref()),
                "Observer callback panicked"
            ),
        }
    }

    // ─── Queries ────────────────────────────────────────────────────────────────

    /// Status from the latest evaluation, `Locked` if absent
    pub fn status(&self, step_id: &str) -> StepStatus {
        self.report.status(step_id)
    }

    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    pub fn statuses(&self) -> &std::collections::HashMap<String, StepStatus> {
        &self.report.statuses
    }

    pub fn progress_percent(&self) -> f64 {
        self.report.progress_percent
    }

    /// Steps paired with their latest status, in workflow order
    pub fn ordered_statuses(&self) -> Vec<(&Step<C>, StepStatus)> {
        self.steps
            .iter()
            .map(|step| (step, self.report.status(&step.id)))
            .collect()
    }

    pub fn current_step_id(&self) -> Option<&str> {
        self.session.current_step_id.as_deref()
    }

    pub fn current_step(&self) -> Option<&Step<C>> {
        self.current_step_id().and_then(|id| self.step(id))
    }

    pub fn step(&self, step_id: &str) -> Option<&Step<C>> {
        self.steps.iter().find(|step| step.id == step_id)
    }

    pub fn steps(&self) -> &[Step<C>] {
        &self.steps
    }

    pub fn manually_completed(&self) -> &HashSet<String> {
        &self.session.manually_completed
    }

    pub fn has_pending_advance(&self) -> bool {
        self.session.pending_advance
    }

    pub fn session(&self) -> &NavigationSession {
        &self.session
    }

    /// True when the workflow was configured without steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    fn index_of(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.id == step_id)
    }

    fn current_index(&self) -> Option<usize> {
        self.current_step_id().and_then(|id| self.index_of(id))
    }

    fn is_last_step(&self, step_id: &str) -> bool {
        self.steps.last().is_some_and(|step| step.id == step_id)
    }
}
