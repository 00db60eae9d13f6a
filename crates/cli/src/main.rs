mod commands;
mod config;
mod logging;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use orderflow_core::{ActorRole, Stage};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Order lifecycle workflow engine.
#[derive(Parser)]
#[command(name = "orderflow", version, about = "Order lifecycle workflow engine")]
struct Cli {
    /// Path to the TOML configuration file (default: ./orderflow.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the transition table and the terminal stages
    Table,

    /// List the stages reachable from a stage
    Next {
        /// Current stage, e.g. READY_FOR_PICKUP
        stage: Stage,
        /// Only transitions available to this role
        #[arg(long)]
        role: Option<ActorRole>,
    },

    /// Replay-verify an exported order history
    Verify {
        /// JSON file with `order` and `records`
        history: PathBuf,
    },

    /// Run a scripted request stream against an in-memory engine
    Simulate {
        /// JSON script with a `steps` list
        script: PathBuf,
        /// Exit with status 1 if any step is rejected
        #[arg(long)]
        strict: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            report_error(&e.to_string(), cli.output, cli.quiet);
            process::exit(1);
        }
    };
    if let Err(msg) = logging::init_logging(&config.logging) {
        report_error(&msg, cli.output, cli.quiet);
        process::exit(1);
    }
    let table = match config.transition_table() {
        Ok(t) => t,
        Err(e) => {
            report_error(&e.to_string(), cli.output, cli.quiet);
            process::exit(1);
        }
    };
    tracing::debug!(
        transitions = table.transitions().len(),
        custom = !config.transitions.is_empty(),
        "transition table loaded"
    );

    match cli.command {
        Commands::Table => commands::cmd_table(&table, cli.output),
        Commands::Next { stage, role } => commands::cmd_next(&table, stage, role, cli.output),
        Commands::Verify { history } => {
            commands::cmd_verify(&table, &history, cli.output, cli.quiet);
        }
        Commands::Simulate { script, strict } => {
            commands::cmd_simulate(
                table,
                config.engine_options(),
                &script,
                strict,
                cli.output,
                cli.quiet,
            );
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
