//! # Agora - multi-analyst research orchestrator
//!
//! Agora turns a research topic into a cited report by simulating a panel of
//! analysts. Each analyst interviews an expert who answers from live lookups
//! (web search, Wikipedia); one section is written per interview and the
//! sections are stitched together with an introduction and a conclusion.
//!
//! ## Overview
//!
//! Agora can be used in two ways:
//!
//! 1. **As a standalone tool** - the `agora` binary (CLI and HTTP API)
//! 2. **As a library** - embed [`ResearchOrchestrator`] in your own service
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use agora::{CheckpointProvider, OrchestratorSettings, Provider, ResearchOrchestrator};
//! use agora::tools::{Lookup, search::WebSearchLookup};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let llm = Provider::Ollama {
//!     base_url: "http://localhost:11434".to_string(),
//!     model: "llama3.2".to_string(),
//!     temperature: 0.0,
//! }
//! .create_client()?;
//! let lookups: Vec<Arc<dyn Lookup>> = vec![Arc::new(WebSearchLookup::new())];
//! let store = CheckpointProvider::Memory.create_store().await?;
//!
//! let settings = OrchestratorSettings { require_approval: false, ..Default::default() };
//! let orchestrator = ResearchOrchestrator::new(llm, lookups, store, settings);
//! let run = orchestrator.start_run("heat pumps", 3, 2, CancellationToken::new()).await?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI-compatible chat completions |
//!
//! ## Modules
//!
//! - [`research`] - Run lifecycle, interviews, writers
//! - [`llm`] - Text generation clients and throttling
//! - [`tools`] - Evidence lookups and caching
//! - [`db`] - Run checkpoints (in-memory, libSQL)
//! - [`api`] - HTTP handlers and routes
//! - [`cli`] - Command-line parsing and output
//! - [`types`] - Shared types and errors

#![cfg_attr(docsrs, feature(doc_cfg))]

/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// Run checkpoint storage.
pub mod db;
/// LLM provider clients and abstractions.
pub mod llm;
/// Research workflow.
pub mod research;
/// Evidence lookups.
pub mod tools;
/// Core types and errors.
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use api::RunTokens;
pub use db::{CheckpointProvider, CheckpointStore};
pub use llm::{LLMClient, Provider, ThrottledClient};
pub use research::{OrchestratorSettings, ResearchOrchestrator, ResearchRun, RunSnapshot};
pub use types::{AppError, Decision, FinalReport, Result};
pub use utils::toml_config::AgoraConfig;

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Parsed agora.toml
    pub config: Arc<AgoraConfig>,
    /// Drives runs and owns checkpointing
    pub orchestrator: Arc<ResearchOrchestrator>,
    /// Cancellation tokens of runs executing in this process
    pub tokens: Arc<RunTokens>,
}
