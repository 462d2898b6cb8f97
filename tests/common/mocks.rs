//! Mock implementations for testing.
//!
//! [`ScriptedLLM`] recognises which prompt it was given (panel drafting,
//! question, answer, section, introduction, conclusion) from the first system
//! message and produces a deterministic reply for it, so whole runs can be
//! driven without a model. [`MockLookup`] returns fixed sources.

use agora::db::MemoryCheckpointStore;
use agora::llm::LLMClient;
use agora::research::{OrchestratorSettings, ResearchOrchestrator, RetryPolicy};
use agora::tools::Lookup;
use agora::types::{AnalystSpec, CapabilityError, CapabilityResult, Message, Snippet};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const PANEL: &str = "panel";
pub const QUESTION: &str = "question";
pub const ANSWER: &str = "answer";
pub const SECTION: &str = "section";
pub const INTRODUCTION: &str = "introduction";
pub const CONCLUSION: &str = "conclusion";

pub fn analyst(name: &str) -> AnalystSpec {
    AnalystSpec {
        name: name.to_string(),
        role: format!("{} role", name),
        affiliation: "Test Institute".to_string(),
        description: format!("Focus of {}", name),
    }
}

fn classify_prompt(messages: &[Message]) -> &'static str {
    let system = messages.first().map(|m| m.content.as_str()).unwrap_or_default();
    if system.starts_with("You are tasked with creating a set of AI analyst personas") {
        PANEL
    } else if system.starts_with("You are an analyst tasked with interviewing") {
        QUESTION
    } else if system.starts_with("You are an expert being interviewed") {
        ANSWER
    } else if system.starts_with("You are an expert technical writer") {
        SECTION
    } else if system.contains("Write the report introduction.") {
        INTRODUCTION
    } else {
        CONCLUSION
    }
}

/// Value following `prefix` on the first line that starts with it.
fn line_value<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    text.lines()
        .find_map(|line| line.trim().strip_prefix(prefix))
        .map(str::trim)
}

/// Scripted text-generation mock.
///
/// Panels are `count` analysts named `Analyst {draft}-{i}`, so a redraft
/// always yields new names. Questions and answers embed the analyst name and
/// turn number; sections are titled after the analyst.
#[derive(Default)]
pub struct ScriptedLLM {
    panel_size: Option<usize>,
    fixed_panel: Option<Vec<AnalystSpec>>,
    fail_questions_for: Option<(String, usize)>,
    fail_sections_for: Option<String>,
    fail_synthesis: bool,
    close_out_at_turn: Option<usize>,
    transient_failures: AtomicUsize,
    delay_ms: Option<(u64, u64)>,
    panel_delay_ms: Option<u64>,
    drafts: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    calls: Mutex<HashMap<&'static str, usize>>,
    feedback_seen: Mutex<Vec<String>>,
}

impl ScriptedLLM {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always return this many analysts, whatever was requested.
    pub fn with_panel_size(mut self, size: usize) -> Self {
        self.panel_size = Some(size);
        self
    }

    /// Always return this panel.
    pub fn with_panel(mut self, panel: Vec<AnalystSpec>) -> Self {
        self.fixed_panel = Some(panel);
        self
    }

    /// Questions for this analyst fail permanently.
    pub fn failing_questions_for(self, name: &str) -> Self {
        self.failing_questions_from(name, 1)
    }

    /// Questions for this analyst fail permanently from `turn` (1-based) on.
    pub fn failing_questions_from(mut self, name: &str, turn: usize) -> Self {
        self.fail_questions_for = Some((name.to_string(), turn));
        self
    }

    /// Section writing for this analyst fails permanently.
    pub fn failing_sections_for(mut self, name: &str) -> Self {
        self.fail_sections_for = Some(name.to_string());
        self
    }

    /// Introduction and conclusion fail permanently.
    pub fn failing_synthesis(mut self) -> Self {
        self.fail_synthesis = true;
        self
    }

    /// Answers on this (1-based) turn contain the close-out phrase.
    pub fn closing_out_at(mut self, turn: usize) -> Self {
        self.close_out_at_turn = Some(turn);
        self
    }

    /// The first `n` calls fail with a transient error.
    pub fn with_transient_failures(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Sleep a random time in `[min_ms, max_ms]` before interview replies.
    pub fn with_random_delay(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.delay_ms = Some((min_ms, max_ms));
        self
    }

    /// Sleep this long before every panel draft.
    pub fn with_panel_delay(mut self, ms: u64) -> Self {
        self.panel_delay_ms = Some(ms);
        self
    }

    /// Most interview replies (questions and answers) ever in flight at once.
    ///
    /// Each interview makes one call at a time, so this is also the peak
    /// number of interviews running together. Only delayed calls are counted.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self, kind: &str) -> usize {
        self.calls.lock().get(kind).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub fn feedback_seen(&self) -> Vec<String> {
        self.feedback_seen.lock().clone()
    }

    fn panel_reply(&self, system: &str) -> String {
        if let Some(feedback) = system
            .split("Editorial feedback to incorporate:\n")
            .nth(1)
            .and_then(|s| s.lines().next())
        {
            self.feedback_seen.lock().push(feedback.to_string());
        }

        let draft = self.drafts.fetch_add(1, Ordering::SeqCst) + 1;
        let panel = match &self.fixed_panel {
            Some(panel) => panel.clone(),
            None => {
                let requested = line_value(system, "Return exactly")
                    .and_then(|s| s.split_whitespace().next())
                    .and_then(|n| n.parse::<usize>().ok())
                    .unwrap_or(1);
                let size = self.panel_size.unwrap_or(requested);
                (1..=size)
                    .map(|i| analyst(&format!("Analyst {}-{}", draft, i)))
                    .collect()
            }
        };

        serde_json::json!({ "analysts": panel }).to_string()
    }
}

#[async_trait]
impl LLMClient for ScriptedLLM {
    async fn generate(&self, messages: &[Message]) -> CapabilityResult<String> {
        let kind = classify_prompt(messages);
        *self.calls.lock().entry(kind).or_default() += 1;

        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(CapabilityError::transient("text_generation", "rate limited"));
        }

        if matches!(kind, QUESTION | ANSWER)
            && let Some((min, max)) = self.delay_ms
        {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            let ms = rand::rng().random_range(min..=max);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        if kind == PANEL
            && let Some(ms) = self.panel_delay_ms
        {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        let system = messages.first().map(|m| m.content.as_str()).unwrap_or_default();
        match kind {
            PANEL => Ok(self.panel_reply(system)),
            QUESTION => {
                let name = line_value(system, "Name:").unwrap_or("unknown");
                let turn = (messages.len() - 2) / 2 + 1;
                if let Some((failing, from)) = &self.fail_questions_for
                    && failing == name
                    && turn >= *from
                {
                    return Err(CapabilityError::permanent("text_generation", "model refused"));
                }
                Ok(format!("Question {} from {}?", turn, name))
            }
            ANSWER => {
                let turn = (messages.len() - 3) / 2 + 1;
                let question = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
                let mut answer = format!("Answer {} to \"{}\"", turn, question);
                if self.close_out_at_turn == Some(turn) {
                    answer.push_str(". Thank you so much for your help!");
                }
                Ok(answer)
            }
            SECTION => {
                let name = system
                    .split("Focus of ")
                    .nth(1)
                    .and_then(|s| s.lines().next())
                    .unwrap_or("unknown")
                    .to_string();
                if self.fail_sections_for.as_deref() == Some(name.as_str()) {
                    return Err(CapabilityError::permanent("text_generation", "context too long"));
                }
                Ok(format!("## Perspective of {}\n\nWhat {} learned.", name, name))
            }
            INTRODUCTION | CONCLUSION if self.fail_synthesis => {
                Err(CapabilityError::permanent("text_generation", "synthesis refused"))
            }
            INTRODUCTION => Ok("# Report\n\nThis report covers the panel.".to_string()),
            _ => Ok("In conclusion, the panel agreed.".to_string()),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Lookup returning one snippet per configured source.
pub struct MockLookup {
    name: String,
    sources: Vec<String>,
    failure: Option<CapabilityError>,
    delay_ms: Option<(u64, u64)>,
    calls: AtomicUsize,
}

impl MockLookup {
    pub fn new(name: &str, sources: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            failure: None,
            delay_ms: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every search fails with `error`.
    pub fn failing(name: &str, error: CapabilityError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(name, &[])
        }
    }

    pub fn with_random_delay(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.delay_ms = Some((min_ms, max_ms));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Lookup for MockLookup {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str, max_results: usize) -> CapabilityResult<Vec<Snippet>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some((min, max)) = self.delay_ms {
            let ms = rand::rng().random_range(min..=max);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        Ok(self
            .sources
            .iter()
            .take(max_results)
            .map(|source| Snippet {
                source_id: source.clone(),
                text: format!("{} says something about: {}", source, query),
                lookup: self.name.clone(),
            })
            .collect())
    }
}

pub fn test_settings(require_approval: bool) -> OrchestratorSettings {
    OrchestratorSettings {
        require_approval,
        max_parallel_interviews: 4,
        interview_timeout: Some(Duration::from_secs(10)),
        max_snippets: 3,
        retry: RetryPolicy::immediate(3),
    }
}

/// Orchestrator over the given mocks with an in-memory checkpoint store.
pub fn orchestrator(
    llm: Arc<ScriptedLLM>,
    lookups: Vec<Arc<dyn Lookup>>,
    settings: OrchestratorSettings,
) -> (ResearchOrchestrator, Arc<MemoryCheckpointStore>) {
    let store = Arc::new(MemoryCheckpointStore::new());
    let orchestrator = ResearchOrchestrator::new(llm, lookups, store.clone(), settings);
    (orchestrator, store)
}

pub fn default_lookups() -> Vec<Arc<dyn Lookup>> {
    vec![
        Arc::new(MockLookup::new(
            "web",
            &["https://example.com/a", "https://example.com/b"],
        )),
        Arc::new(MockLookup::new("wikipedia", &["https://en.wikipedia.org/wiki/X"])),
    ]
}
