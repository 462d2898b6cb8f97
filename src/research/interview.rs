//! Per-analyst interview loop
//!
//! ```text
//! ask -> gather_evidence -> answer -> route --(continue)--> ask
//!                                        \--(stop)-------> save
//! ```
//!
//! The turn budget is checked before every `ask`, so a budget of zero goes
//! straight to `save` without touching any capability.

use crate::llm::LLMClient;
use crate::llm::client::TEXT_GENERATION;
use crate::research::classifier::{CloseOutClassifier, RouteSignal};
use crate::research::prompts;
use crate::research::retry::RetryPolicy;
use crate::tools::Lookup;
use crate::types::{AnalystSpec, CapabilityError, Message, Snippet, Turn};
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// An interview step failed after retries.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{stage} failed on turn {turn}: {source}")]
pub struct InterviewError {
    pub stage: &'static str,
    /// 1-based turn that was in progress
    pub turn: usize,
    #[source]
    pub source: CapabilityError,
}

enum InterviewState {
    Ask,
    GatherEvidence { question: String },
    Answer { question: String, evidence: Vec<Snippet> },
    Route,
    Save,
}

pub struct InterviewMachine {
    llm: Arc<dyn LLMClient>,
    lookups: Vec<Arc<dyn Lookup>>,
    classifier: Arc<dyn CloseOutClassifier>,
    retry: RetryPolicy,
    topic: String,
    turn_budget: usize,
    max_snippets: usize,
}

impl InterviewMachine {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        lookups: Vec<Arc<dyn Lookup>>,
        classifier: Arc<dyn CloseOutClassifier>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            llm,
            lookups,
            classifier,
            retry,
            topic: String::new(),
            turn_budget: 0,
            max_snippets: 3,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_turn_budget(mut self, turn_budget: usize) -> Self {
        self.turn_budget = turn_budget;
        self
    }

    pub fn with_max_snippets(mut self, max_snippets: usize) -> Self {
        self.max_snippets = max_snippets;
        self
    }

    pub fn turn_budget(&self) -> usize {
        self.turn_budget
    }

    /// Drive the loop to `save`, appending each finished turn to `turns`.
    ///
    /// Turns are pushed as they complete so the caller keeps them even if
    /// this future is dropped or returns an error.
    pub async fn run(
        &self,
        analyst: &AnalystSpec,
        turns: &mut Vec<Turn>,
        cancel: &CancellationToken,
    ) -> Result<(), InterviewError> {
        let mut state = InterviewState::Ask;

        loop {
            state = match state {
                InterviewState::Ask => {
                    if turns.len() >= self.turn_budget {
                        InterviewState::Save
                    } else {
                        let question = self.ask(analyst, turns, cancel).await?;
                        InterviewState::GatherEvidence { question }
                    }
                }
                InterviewState::GatherEvidence { question } => {
                    let evidence = self.gather_evidence(&question, cancel).await;
                    tracing::debug!(
                        analyst = %analyst.name,
                        turn = turns.len() + 1,
                        snippets = evidence.len(),
                        "Evidence gathered"
                    );
                    InterviewState::Answer { question, evidence }
                }
                InterviewState::Answer { question, evidence } => {
                    let answer = self
                        .answer(analyst, turns, &question, &evidence, cancel)
                        .await?;
                    turns.push(Turn {
                        question,
                        evidence,
                        answer,
                    });
                    InterviewState::Route
                }
                InterviewState::Route => {
                    // Budget wins over the close-out signal on the same turn
                    if turns.len() >= self.turn_budget {
                        InterviewState::Save
                    } else {
                        let signal = match turns.last() {
                            Some(last) => self.classifier.classify(last).await,
                            None => RouteSignal::Continue,
                        };
                        if signal == RouteSignal::CloseOut {
                            tracing::debug!(analyst = %analyst.name, turn = turns.len(), "Close-out signal");
                            InterviewState::Save
                        } else {
                            InterviewState::Ask
                        }
                    }
                }
                InterviewState::Save => return Ok(()),
            };
        }
    }

    async fn ask(
        &self,
        analyst: &AnalystSpec,
        turns: &[Turn],
        cancel: &CancellationToken,
    ) -> Result<String, InterviewError> {
        let mut messages = vec![
            Message::system(prompts::question_instructions(analyst)),
            Message::user(prompts::interview_opening(&self.topic)),
        ];
        for turn in turns {
            messages.push(Message::assistant(turn.question.clone()));
            messages.push(Message::user(turn.answer.clone()));
        }

        self.retry
            .run(TEXT_GENERATION, cancel, || self.llm.generate(&messages))
            .await
            .map(|q| q.trim().to_string())
            .map_err(|source| InterviewError {
                stage: "ask",
                turn: turns.len() + 1,
                source,
            })
    }

    /// Query every lookup concurrently. Failed lookups are logged and skipped.
    ///
    /// Results are merged in configured lookup order, so completion order
    /// never affects the transcript.
    async fn gather_evidence(&self, question: &str, cancel: &CancellationToken) -> Vec<Snippet> {
        let searches = self.lookups.iter().map(|lookup| {
            let lookup: &dyn Lookup = lookup.as_ref();
            async move {
                let result = self
                    .retry
                    .run(lookup.name(), cancel, || lookup.search(question, self.max_snippets))
                    .await;
                (lookup.name(), result)
            }
        });

        let mut evidence = Vec::new();
        for (name, result) in join_all(searches).await {
            match result {
                Ok(snippets) => evidence.extend(snippets),
                Err(e) => tracing::warn!(lookup = name, error = %e, "Lookup failed, continuing without it"),
            }
        }
        evidence
    }

    async fn answer(
        &self,
        analyst: &AnalystSpec,
        turns: &[Turn],
        question: &str,
        evidence: &[Snippet],
        cancel: &CancellationToken,
    ) -> Result<String, InterviewError> {
        let mut messages = vec![
            Message::system(prompts::answer_instructions(analyst, evidence)),
            Message::assistant(prompts::interview_opening(&self.topic)),
        ];
        for turn in turns {
            messages.push(Message::user(turn.question.clone()));
            messages.push(Message::assistant(turn.answer.clone()));
        }
        messages.push(Message::user(question.to_string()));

        self.retry
            .run(TEXT_GENERATION, cancel, || self.llm.generate(&messages))
            .await
            .map(|a| a.trim().to_string())
            .map_err(|source| InterviewError {
                stage: "answer",
                turn: turns.len() + 1,
                source,
            })
    }
}
