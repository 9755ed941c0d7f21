//! CLI argument parsing (`clap` derive).

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `cadence`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cadence",
    version,
    about = "Recurring task scheduling over a JSON task dump.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level. Overrides `CADENCE_LOG` when given.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create successors for recurring tasks completed within the sweep window.
    Sweep {
        /// JSON array of tasks.
        #[arg(long, value_name = "PATH")]
        tasks: PathBuf,

        /// Engine config (JSON). Missing fields use defaults.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Pretend the current time is this instant (RFC 3339).
        #[arg(long, value_name = "TIME")]
        now: Option<DateTime<Utc>>,

        /// Write the updated task list back to `--tasks`.
        #[arg(long)]
        write: bool,
    },

    /// Print the next due date of every recurring task, or of one rule.
    Next {
        /// JSON array of tasks.
        #[arg(long, value_name = "PATH", required_unless_present = "rule")]
        tasks: Option<PathBuf>,

        /// A rule in `R/P<n><D|W|M>` form, evaluated against `--from`.
        #[arg(long, value_name = "RULE", conflicts_with = "tasks", requires = "from")]
        rule: Option<String>,

        /// Anchor date for `--rule` (RFC 3339).
        #[arg(long, value_name = "TIME")]
        from: Option<DateTime<Utc>>,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
