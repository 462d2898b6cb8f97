//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the Agora CLI.

use crate::research::RunSnapshot;
use crate::types::{AnalystSpec, FinalReport, RunPhase, RunSummary, TranscriptStatus};
use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the server banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n   {} {}\n",
                "agora".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!("\n   agora v{}\n", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a subheader
    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print a table header row
    pub fn table_header(&self, columns: &[&str]) {
        let header = pad_columns(columns);
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(columns.len() * 21).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(columns.len() * 21));
        }
    }

    /// Print a table row
    pub fn table_row(&self, values: &[&str]) {
        println!("    {}", pad_columns(values));
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }

    // ============= Research views =============

    pub fn panel(&self, analysts: &[AnalystSpec]) {
        self.subheader("Analyst panel");
        for (i, analyst) in analysts.iter().enumerate() {
            let title = format!("{}. {}", i + 1, analyst.short_description());
            if self.colored {
                println!("    {}", title.bright_white().bold());
            } else {
                println!("    {}", title);
            }
            self.kv("focus", &analyst.description);
        }
    }

    pub fn phase(&self, phase: RunPhase) -> String {
        if !self.colored {
            return phase.to_string();
        }
        match phase {
            RunPhase::Finalized => phase.green().to_string(),
            RunPhase::Aborted => phase.red().to_string(),
            RunPhase::AwaitingApproval => phase.yellow().to_string(),
            _ => phase.cyan().to_string(),
        }
    }

    pub fn snapshot(&self, snapshot: &RunSnapshot) {
        self.header(&format!("Run {}", snapshot.run_id));
        self.kv("topic", &snapshot.topic);
        self.kv("phase", &self.phase(snapshot.phase));
        self.kv(
            "plan",
            &format!(
                "{} analysts, {} turns each",
                snapshot.analyst_count, snapshot.turn_budget
            ),
        );
        self.kv("updated", &snapshot.updated_at.to_rfc3339());
        if let Some(feedback) = &snapshot.feedback {
            self.kv("feedback", feedback);
        }
        if let Some(reason) = &snapshot.abort_reason {
            self.kv("aborted", &reason.to_string());
        }

        if !snapshot.panel.is_empty() {
            self.panel(&snapshot.panel);
        }

        if !snapshot.interviews.is_empty() {
            self.subheader("Interviews");
            for outcome in &snapshot.interviews {
                let line = match &outcome.note {
                    Some(note) => format!(
                        "{}: {} after {} turns ({})",
                        outcome.analyst, outcome.status, outcome.turns, note
                    ),
                    None => format!("{}: {} after {} turns", outcome.analyst, outcome.status, outcome.turns),
                };
                match outcome.status {
                    TranscriptStatus::Completed => self.list_item(&line),
                    _ => self.warning(&line),
                }
            }
        }

        if snapshot.pending_decision {
            self.newline();
            self.info("Waiting for a decision:");
            self.command(&format!("agora decide {} --approve", snapshot.run_id));
            self.command(&format!(
                "agora decide {} --reject --feedback \"...\"",
                snapshot.run_id
            ));
        }
    }

    pub fn runs(&self, runs: &[RunSummary]) {
        if runs.is_empty() {
            self.info("No runs yet");
            return;
        }
        self.table_header(&["RUN", "PHASE", "UPDATED", "TOPIC"]);
        for run in runs {
            let updated = run.updated_at.format("%Y-%m-%d %H:%M").to_string();
            self.table_row(&[&run.run_id[..8.min(run.run_id.len())], run.phase.as_str(), &updated, &run.topic]);
        }
    }

    /// Print a finalized report as markdown.
    pub fn report(&self, report: &FinalReport) {
        println!("# {}\n", report.topic);
        println!("## Introduction\n\n{}\n", report.introduction.trim());
        for section in &report.sections {
            println!("## {}\n\n{}\n", section.title, section.body.trim());
        }
        println!("## Conclusion\n\n{}\n", report.conclusion.trim());
        if !report.citations.is_empty() {
            println!("## Sources\n");
            for (i, source) in report.citations.iter().enumerate() {
                println!("[{}] {}", i + 1, source);
            }
            println!();
        }
        if !report.omitted_analysts.is_empty() {
            self.warning(&format!(
                "No section from: {}",
                report.omitted_analysts.join(", ")
            ));
        }
    }
}

fn pad_columns(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| format!("{:<20}", v))
        .collect::<Vec<_>>()
        .join(" ")
}
