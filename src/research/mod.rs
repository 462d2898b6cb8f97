//! Multi-analyst research workflow
//!
//! A run drafts a panel of analyst personas, optionally waits for a human to
//! approve it, interviews an expert once per analyst in parallel, and turns
//! the transcripts into a cited report.
//!
//! # Architecture
//!
//! - [`orchestrator::ResearchOrchestrator`] - drives a run through its phases
//!   and checkpoints it after every transition
//! - [`supervisor::InterviewSupervisor`] - runs one interview with timeout and
//!   cancellation, always yielding a transcript
//! - [`interview::InterviewMachine`] - ask / gather evidence / answer / route
//! - [`writer::SectionWriter`] - per-analyst sections, introduction, conclusion
//!
//! # Usage
//!
//! ```ignore
//! use agora::research::{OrchestratorSettings, ResearchOrchestrator};
//! use agora::types::Decision;
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = ResearchOrchestrator::new(llm, lookups, store, OrchestratorSettings::default());
//!
//! let run = orchestrator.start_run("open source licensing", 3, 2, CancellationToken::new()).await?;
//! let run = orchestrator
//!     .submit_decision(&run.id, Decision::Approve, CancellationToken::new())
//!     .await?;
//!
//! if let Some(report) = run.report {
//!     for source in report.citations {
//!         println!("- {}", source);
//!     }
//! }
//! ```

/// Panel drafting and validation.
pub mod analysts;
/// Close-out detection for interview turns.
pub mod classifier;
/// Per-analyst interview state machine.
pub mod interview;
/// Phase driver, fan-out, checkpointing.
pub mod orchestrator;
/// Prompt templates.
pub mod prompts;
/// Bounded retries with backoff.
pub mod retry;
/// Run aggregate and snapshots.
pub mod run;
/// Timeout and failure containment for a single interview.
pub mod supervisor;
/// Section, introduction and conclusion writers.
pub mod writer;

pub use analysts::AnalystPanelGenerator;
pub use classifier::{CloseOutClassifier, RouteSignal, SentinelPhraseClassifier};
pub use interview::{InterviewError, InterviewMachine};
pub use orchestrator::{OrchestratorSettings, ResearchOrchestrator, RunClaim};
pub use retry::RetryPolicy;
pub use run::{InterviewOutcome, ResearchRun, RunSnapshot};
pub use supervisor::InterviewSupervisor;
pub use writer::{SectionWriter, assemble_report};
