use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use stepgate::config::Config;
use stepgate::definition::WorkflowDefinition;
use stepgate::logging;
use stepgate::runner::{SessionRunner, HELP};
use stepgate::workflow::{self, StepStatus};

#[derive(Parser)]
#[command(name = "stepgate")]
#[command(about = "Gated workflow navigation: step statuses, progress and navigation")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a workflow definition and list its steps
    Check {
        /// Workflow definition (TOML, or JSON by extension)
        file: PathBuf,
    },

    /// Compute step statuses once for a given context
    Status {
        /// Workflow definition (TOML, or JSON by extension)
        file: PathBuf,

        /// JSON file holding the context object
        #[arg(long)]
        context: Option<PathBuf>,

        /// Current step (default: first step)
        #[arg(long)]
        current: Option<String>,

        /// Steps to treat as manually completed (repeatable)
        #[arg(long)]
        completed: Vec<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive session reading commands from stdin
    Run {
        /// Workflow definition (TOML, or JSON by extension)
        file: PathBuf,

        /// JSON file holding the initial context object
        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Print the JSON Schema for workflow definition files
    Schema,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;

    let is_interactive = matches!(cli.command, Commands::Run { .. });
    let logging_handle = logging::init_logging(&config, is_interactive, cli.debug)?;

    match cli.command {
        Commands::Check { file } => cmd_check(&file)?,
        Commands::Status {
            file,
            context,
            current,
            completed,
            json,
        } => cmd_status(&file, context.as_deref(), current, completed, json)?,
        Commands::Run { file, context } => cmd_run(&config, &file, context.as_deref())?,
        Commands::Schema => cmd_schema()?,
    }

    // Print log file path on exit if logs were written
    if let Some(log_path) = logging_handle.log_file_path {
        if let Ok(metadata) = log_path.metadata() {
            if metadata.len() > 0 {
                eprintln!("Session log: {}", log_path.display());
            }
        }
    }

    Ok(())
}

fn load_context(path: Option<&Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Object(serde_json::Map::new()));
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Context file {} is not valid JSON", path.display()))
}

fn cmd_check(file: &Path) -> Result<()> {
    let definition = WorkflowDefinition::load(file)?;

    println!("{} ({} steps)", definition.name, definition.steps.len());
    if let Some(description) = &definition.description {
        println!("{}", description);
    }
    println!("{}", "─".repeat(60));

    for (index, step) in definition.steps.iter().enumerate() {
        let gate = if step.validate.is_some() {
            "gated"
        } else {
            "manual"
        };
        println!("{:>2}. {:<16} {:<32} {}", index + 1, step.id, step.title, gate);
        for item in &step.sub_items {
            println!("      - {} {}", item.id, item.title);
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct StatusRow<'a> {
    id: &'a str,
    title: &'a str,
    status: StepStatus,
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    workflow: &'a str,
    current: Option<&'a str>,
    progress_percent: f64,
    steps: Vec<StatusRow<'a>>,
}

fn cmd_status(
    file: &Path,
    context: Option<&Path>,
    current: Option<String>,
    completed: Vec<String>,
    json: bool,
) -> Result<()> {
    let definition = WorkflowDefinition::load(file)?;
    let name = definition.name.clone();
    let context = load_context(context)?;
    let steps = definition.into_steps();

    let current = current.or_else(|| steps.first().map(|step| step.id.clone()));
    let completed: HashSet<String> = completed.into_iter().collect();
    let report = workflow::compute(&steps, &context, &completed, current.as_deref());

    let output = StatusOutput {
        workflow: &name,
        current: current.as_deref(),
        progress_percent: report.progress_percent,
        steps: steps
            .iter()
            .map(|step| StatusRow {
                id: &step.id,
                title: &step.title,
                status: report.status(&step.id),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if output.steps.is_empty() {
        println!("{}: no steps configured", name);
        return Ok(());
    }

    for row in &output.steps {
        println!("{} {:<16} {:<32} {}", row.status.marker(), row.id, row.title, row.status);
    }
    println!("{}", "─".repeat(60));
    println!("Progress: {:.1}%", output.progress_percent);

    Ok(())
}

fn cmd_run(config: &Config, file: &Path, context: Option<&Path>) -> Result<()> {
    let definition = WorkflowDefinition::load(file)?;
    let context = load_context(context)?;
    let mut runner = SessionRunner::new(definition, context, &config.navigation)?;

    eprintln!("Type 'help' for commands.");
    tracing::debug!("{}", HELP);

    let stdin = io::stdin();
    runner.run(stdin.lock(), io::stdout().lock())
}

fn cmd_schema() -> Result<()> {
    let schema = WorkflowDefinition::json_schema();
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
