//! Line-oriented host for a workflow session
//!
//! The runner plays the part of the context provider: it owns the JSON
//! context, feeds commands to the navigation controller, applies any context
//! updates the controller requests, and settles the controller once per
//! command so deferred advances resolve against the updated context.

use std::io::{BufRead, Write};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::NavigationConfig;
use crate::definition::WorkflowDefinition;
use crate::workflow::{
    Clock, ContextUpdates, EventQueue, NavigationController, NavigationEvent, StepStatus,
};

pub const HELP: &str = "\
Commands:
  click <step>            navigate to an unlocked step
  complete [json-object]  complete the current step, optionally with data
  reset <step>            roll back to a step
  set <key>=<json>        update a context value (dot-separated key)
  select <step> <item>    pick a sub-item of a step
  status                  show step statuses
  help                    show this help
  quit                    end the session";

/// Errors from parsing a session command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("'{command}' needs a {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("completion data must be a JSON object")]
    NotAnObject,

    #[error("expected <key>=<json>, got '{0}'")]
    InvalidAssignment(String),
}

/// One line of session input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Click(String),
    Complete(Option<ContextUpdates>),
    Reset(String),
    Set { key: String, value: Value },
    Select { step_id: String, sub_item_id: String },
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb {
            "" => Err(CommandError::Empty),
            "click" | "go" => required(rest, "click", "step id").map(Command::Click),
            "complete" | "done" => {
                if rest.is_empty() {
                    return Ok(Command::Complete(None));
                }
                match parse_json(rest)? {
                    Value::Object(map) => Ok(Command::Complete(Some(map))),
                    _ => Err(CommandError::NotAnObject),
                }
            }
            "reset" => required(rest, "reset", "step id").map(Command::Reset),
            "set" => {
                let (key, value) = rest
                    .split_once('=')
                    .ok_or_else(|| CommandError::InvalidAssignment(rest.to_string()))?;
                let key = key.trim();
                if key.is_empty() {
                    return Err(CommandError::InvalidAssignment(rest.to_string()));
                }
                Ok(Command::Set {
                    key: key.to_string(),
                    value: parse_json(value.trim())?,
                })
            }
            "select" => {
                let mut parts = rest.split_whitespace();
                let step_id = parts.next().ok_or(CommandError::MissingArgument {
                    command: "select",
                    argument: "step id",
                })?;
                let sub_item_id = parts.next().ok_or(CommandError::MissingArgument {
                    command: "select",
                    argument: "sub-item id",
                })?;
                Ok(Command::Select {
                    step_id: step_id.to_string(),
                    sub_item_id: sub_item_id.to_string(),
                })
            }
            "status" | "ls" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn required(rest: &str, command: &'static str, argument: &'static str) -> Result<String, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument { command, argument })
    } else {
        Ok(rest.to_string())
    }
}

fn parse_json(text: &str) -> Result<Value, CommandError> {
    serde_json::from_str(text).map_err(|e| CommandError::InvalidJson(e.to_string()))
}

/// Write `value` at a dot-separated path, creating objects along the way.
///
/// Non-object values in the way are replaced.
pub fn set_path(context: &mut Value, key: &str, value: Value) {
    let mut target = context;
    let mut segments = key.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !target.is_object() {
            *target = Value::Object(Map::new());
        }
        let Some(map) = target.as_object_mut() else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        target = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Drives one workflow session for a host that speaks text commands
pub struct SessionRunner {
    name: String,
    controller: NavigationController<Value, EventQueue>,
    context: Value,
}

impl SessionRunner {
    pub fn new(
        definition: WorkflowDefinition,
        context: Value,
        navigation: &NavigationConfig,
    ) -> Result<Self> {
        definition.validate()?;
        let name = definition.name.clone();

        let context = match context {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => context,
            _ => anyhow::bail!("Workflow context must be a JSON object"),
        };

        let controller =
            NavigationController::new(definition.into_steps(), &context, EventQueue::new())?
                .with_cooldown(navigation.cooldown());

        let mut runner = Self {
            name,
            controller,
            context,
        };
        runner.controller.settle(&runner.context);
        Ok(runner)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.controller = self.controller.with_clock(clock);
        self
    }

    pub fn context(&self) -> &Value {
        &self.context
    }

    pub fn controller(&self) -> &NavigationController<Value, EventQueue> {
        &self.controller
    }

    /// Run one command through a full update cycle. Returns the lines to show.
    pub fn execute(&mut self, command: Command) -> Vec<String> {
        let mut lines = Vec::new();

        match command {
            Command::Click(step_id) => {
                if !self.controller.click(&self.context, &step_id) {
                    if self.controller.status(&step_id).is_locked() {
                        lines.push(format!("'{}' is locked", step_id));
                    } else {
                        lines.push(format!("ignored '{}': too soon after last navigation", step_id));
                    }
                }
            }
            Command::Complete(data) => self.controller.complete_step(data),
            Command::Reset(step_id) => {
                if !self.controller.reset_to_step(&self.context, &step_id) {
                    lines.push(format!("unknown step '{}'", step_id));
                }
            }
            Command::Set { key, value } => {
                let mut updates = ContextUpdates::new();
                updates.insert(key, value);
                self.controller.update_context(updates);
            }
            Command::Select {
                step_id,
                sub_item_id,
            } => {
                if !self.controller.select_sub_item(&step_id, &sub_item_id) {
                    lines.push(format!("unknown sub-item '{}' in '{}'", sub_item_id, step_id));
                }
            }
            Command::Status => {}
            Command::Help => {
                lines.push(HELP.to_string());
                return lines;
            }
            Command::Quit => return lines,
        }

        lines.extend(self.apply_events());
        self.controller.settle(&self.context);
        lines.extend(self.apply_events());

        lines.extend(self.render_status());
        lines
    }

    /// Apply buffered controller events to the context and describe them
    fn apply_events(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        for event in self.controller.observer_mut().drain() {
            match event {
                NavigationEvent::StepChanged(step_id) => {
                    lines.push(format!("-> {}", step_id));
                }
                NavigationEvent::SubItemSelected {
                    step_id,
                    sub_item_id,
                } => {
                    lines.push(format!("selected {} in {}", sub_item_id, step_id));
                }
                NavigationEvent::ContextUpdateRequested(updates) => {
                    for (key, value) in updates {
                        debug!(key = %key, "Applying context update");
                        set_path(&mut self.context, &key, value);
                    }
                }
            }
        }
        lines
    }

    /// Plain-text listing of every step and the overall progress
    pub fn render_status(&self) -> Vec<String> {
        if self.controller.is_empty() {
            return vec![format!("{}: no steps configured", self.name)];
        }

        let mut lines: Vec<String> = self
            .controller
            .ordered_statuses()
            .into_iter()
            .map(|(step, status)| {
                let mut line = format!("{} {:<12} {}", status.marker(), step.id, step.title);
                if status != StepStatus::Active || step.sub_items.is_empty() {
                    return line;
                }
                let items: Vec<&str> = step.sub_items.iter().map(|i| i.id.as_str()).collect();
                line.push_str(&format!(" ({})", items.join(", ")));
                line
            })
            .collect();
        lines.push(format!(
            "{}: {:.0}% complete",
            self.name,
            self.controller.progress_percent()
        ));
        lines
    }

    /// Read commands until `quit` or end of input, writing responses to `output`
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<()> {
        for line in self.render_status() {
            writeln!(output, "{}", line)?;
        }

        for line in input.lines() {
            let line = line.context("Failed to read command")?;
            if line.trim().is_empty() {
                continue;
            }

            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(err) => {
                    writeln!(output, "error: {}", err)?;
                    continue;
                }
            };
            let quit = command == Command::Quit;

            for response in self.execute(command) {
                writeln!(output, "{}", response)?;
            }
            output.flush()?;

            if quit {
                break;
            }
        }
        Ok(())
    }
}
