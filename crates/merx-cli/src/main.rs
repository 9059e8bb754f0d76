use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use merx_core::{Constraints, Intent, MerxConfig, Platform};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "merx", version, about = "Plan and execute commerce actions")]
struct Cli {
    /// Configuration file (YAML). Falls back to ./merx.yaml, then to defaults.
    #[arg(long, global = true, env = "MERX_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a prompt into a validated plan and print the plan response.
    Plan {
        #[command(flatten)]
        intent: IntentArgs,
    },

    /// Re-validate a plan file through the validator and policy gates.
    Validate {
        /// Path to a plan JSON file (a bare plan or an object with a `plan` field)
        file: PathBuf,

        #[command(flatten)]
        constraints: ConstraintArgs,
    },

    /// Execute a plan file through the configured connectors.
    Execute {
        /// Path to a plan JSON file (a bare plan or an object with a `plan` field)
        file: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Plan a prompt and execute the resulting plan in one step.
    Run {
        #[command(flatten)]
        intent: IntentArgs,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Show registered connectors with their metadata and health.
    Connectors,

    /// Print platforms, action types and parameter schemas.
    Vocabulary,

    /// Load the configuration and report problems.
    CheckConfig,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConstraintArgs {
    /// Maximum number of actions the plan may contain
    #[arg(long = "max-actions")]
    pub max_actions: Option<usize>,

    /// Platform the plan may target (repeatable)
    #[arg(long = "allow")]
    pub allow: Vec<Platform>,
}

impl ConstraintArgs {
    pub fn constraints(&self) -> Constraints {
        let mut constraints = Constraints::unconstrained();
        if let Some(max) = self.max_actions {
            constraints = constraints.with_max_actions(max);
        }
        if !self.allow.is_empty() {
            constraints = constraints.with_allowed_platforms(self.allow.iter().copied());
        }
        constraints
    }
}

#[derive(Args, Debug, Clone)]
pub struct IntentArgs {
    /// Natural-language request, e.g. "list the last 10 payments"
    pub prompt: String,

    /// Platform hint for actions that do not name one
    #[arg(long)]
    pub platform: Option<Platform>,

    /// Extra context as key=value (repeatable), e.g. --context customer_id=cus_123
    #[arg(long = "context", value_parser = parse_key_value)]
    pub context: Vec<(String, String)>,

    #[command(flatten)]
    pub constraints: ConstraintArgs,
}

impl IntentArgs {
    pub fn intent(&self) -> Intent {
        let mut intent = Intent::new(self.prompt.clone());
        if let Some(platform) = self.platform {
            intent = intent.with_platform(platform);
        }
        for (key, value) in &self.context {
            intent = intent.with_context_value(key.clone(), value.clone());
        }
        let constraints = self.constraints.constraints();
        if constraints != Constraints::unconstrained() {
            intent = intent.with_constraints(constraints);
        }
        intent
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// Dispatch platform groups concurrently instead of one after another
    #[arg(long, default_value_t = false)]
    pub concurrent: bool,

    /// Overall execution budget in milliseconds (overrides the config)
    #[arg(long = "timeout-ms")]
    pub timeout_ms: Option<u64>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<MerxConfig> {
    commands::load_config(cli.config.as_deref())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr; stdout carries the JSON output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let ok = match &cli.cmd {
        Command::CheckConfig => commands::check::run(cli.config.as_deref())?,
        Command::Vocabulary => commands::inspect::vocabulary()?,
        Command::Plan { intent } => {
            let config = load_config(&cli)?;
            commands::plan::plan(&config, intent).await?
        }
        Command::Validate { file, constraints } => {
            let config = load_config(&cli)?;
            commands::plan::validate(&config, file, &constraints.constraints())?
        }
        Command::Execute { file, engine } => {
            let config = load_config(&cli)?;
            commands::execute::execute(&config, file, engine).await?
        }
        Command::Run { intent, engine } => {
            let config = load_config(&cli)?;
            commands::execute::run(&config, intent, engine).await?
        }
        Command::Connectors => {
            let config = load_config(&cli)?;
            commands::inspect::connectors(&config).await?
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
