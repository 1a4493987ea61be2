//! Outbound notifications from the navigation controller

use serde_json::{Map, Value};

/// Key/value data forwarded to whoever owns the context
pub type ContextUpdates = Map<String, Value>;

/// Receives navigation notifications.
///
/// Errors returned here are logged by the controller and otherwise ignored;
/// a failing observer never interrupts navigation.
pub trait NavigationObserver {
    /// The current step changed (or the final step was completed)
    fn step_changed(&mut self, step_id: &str) -> anyhow::Result<()>;

    /// A sub-choice inside a step was picked
    fn sub_item_selected(&mut self, _step_id: &str, _sub_item_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// The controller wants these values merged into the context
    fn context_update_requested(&mut self, _updates: &ContextUpdates) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A notification captured by [`EventQueue`]
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationEvent {
    StepChanged(String),
    SubItemSelected { step_id: String, sub_item_id: String },
    ContextUpdateRequested(ContextUpdates),
}

/// Observer that buffers every notification until the host drains it
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<NavigationEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all buffered events, oldest first
    pub fn drain(&mut self) -> Vec<NavigationEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[NavigationEvent] {
        &self.events
    }

    /// Ids passed to `step_changed`, in order
    pub fn step_changes(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                NavigationEvent::StepChanged(id) => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl NavigationObserver for EventQueue {
    fn step_changed(&mut self, step_id: &str) -> anyhow::Result<()> {
        self.events
            .push(NavigationEvent::StepChanged(step_id.to_string()));
        Ok(())
    }

    fn sub_item_selected(&mut self, step_id: &str, sub_item_id: &str) -> anyhow::Result<()> {
        self.events.push(NavigationEvent::SubItemSelected {
            step_id: step_id.to_string(),
            sub_item_id: sub_item_id.to_string(),
        });
        Ok(())
    }

    fn context_update_requested(&mut self, updates: &ContextUpdates) -> anyhow::Result<()> {
        self.events
            .push(NavigationEvent::ContextUpdateRequested(updates.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_queue_records_in_order() {
        let mut queue = EventQueue::new();
        queue.step_changed("a").unwrap();
        queue.sub_item_selected("a", "pro").unwrap();
        queue.step_changed("b").unwrap();

        assert_eq!(queue.step_changes(), vec!["a", "b"]);
        assert_eq!(queue.events().len(), 3);
    }

    #[test]
    fn test_drain_empties_queue() {
        let mut queue = EventQueue::new();
        let mut updates = ContextUpdates::new();
        updates.insert("name".to_string(), Value::from("Ada"));
        queue.context_update_requested(&updates).unwrap();

        let drained = queue.drain();
        assert_eq!(drained, vec![NavigationEvent::ContextUpdateRequested(updates)]);
        assert!(queue.is_empty());
    }
}
