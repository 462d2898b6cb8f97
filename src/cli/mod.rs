//! CLI module for Agora
//!
//! Provides command-line interface parsing for the `agora` binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use crate::types::{AppError, Decision, Result};
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// Agora - multi-analyst research orchestrator
///
/// Drafts a panel of analyst personas for a topic, interviews an expert once
/// per analyst, and writes a cited report.
#[derive(Parser, Debug)]
#[command(
    name = "agora",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "Agora - multi-analyst research orchestrator",
    long_about = "Drafts a panel of analyst personas for a topic, optionally waits for you to\n\
                  approve it, interviews an expert once per analyst in parallel and writes a\n\
                  cited report. Runs are checkpointed, so a parked run can be decided later.",
    after_help = "EXAMPLES:\n    \
                  agora run --topic \"grid-scale batteries\"          # Draft a panel and wait for approval\n    \
                  agora run --topic \"grid-scale batteries\" --yes    # Run end to end without a review\n    \
                  agora decide <RUN_ID> --approve                  # Approve a parked run and finish it\n    \
                  agora decide <RUN_ID> --reject --feedback \"...\"   # Redraft the panel\n    \
                  agora report <RUN_ID>                            # Print a finalized report\n    \
                  agora serve                                      # Start the HTTP API"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "agora.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a research run
    ///
    /// With approval enabled the run stops after drafting the panel and
    /// prints the run id to use with `decide`.
    Run {
        /// Research topic
        #[arg(short, long)]
        topic: String,

        /// Number of analysts (defaults to research.analyst_count)
        #[arg(short, long)]
        analysts: Option<usize>,

        /// Question/answer turns per interview (defaults to research.turn_budget)
        #[arg(long)]
        turns: Option<usize>,

        /// Skip the approval step
        #[arg(short, long)]
        yes: bool,
    },

    /// Approve or reject the panel of a parked run
    #[command(group(ArgGroup::new("verdict").required(true).args(["approve", "reject"])))]
    Decide {
        /// Run identifier
        run_id: String,

        /// Approve the panel and run the interviews
        #[arg(long)]
        approve: bool,

        /// Reject the panel and redraft it
        #[arg(long, requires = "feedback")]
        reject: bool,

        /// Reviewer feedback for the redraft
        #[arg(short, long)]
        feedback: Option<String>,
    },

    /// Show a run, or list all runs
    Status {
        /// Run identifier (omit to list runs)
        run_id: Option<String>,
    },

    /// Print the report of a finalized run
    Report {
        /// Run identifier
        run_id: String,

        /// Print the raw JSON report
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API server
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,

        /// Override server.port
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Turn the `decide` flags into a decision.
///
/// `--reject` always yields a rejection, whatever the feedback says; blank
/// feedback is refused.
pub fn decision_from_flags(approve: bool, reject: bool, feedback: Option<&str>) -> Result<Decision> {
    match (approve, reject) {
        (true, false) => Ok(Decision::Approve),
        (false, true) => Decision::reject(feedback.unwrap_or_default()),
        _ => Err(AppError::InvalidInput(
            "Pass exactly one of --approve or --reject".to_string(),
        )),
    }
}
