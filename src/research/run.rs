//! The research run aggregate and its persisted snapshot.
//!
//! Phase changes go through [`ResearchRun::advance`], which only allows forward
//! moves (plus abort). The single backward move is
//! [`ResearchRun::regenerate`], taken when a reviewer rejects the panel.

use crate::types::{
    AbortReason, AnalystSpec, AppError, FinalReport, InterviewTranscript, ReportSection, Result,
    RunPhase, RunSummary, TranscriptStatus,
};
use crate::utils::toml_config::{MAX_ANALYSTS, MAX_TURNS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ResearchRun {
    pub id: String,
    pub topic: String,
    pub analyst_count: usize,
    pub turn_budget: usize,
    /// Reviewer feedback from the latest rejection
    pub feedback: Option<String>,
    pub panel: Vec<AnalystSpec>,
    /// Keyed by analyst name
    pub transcripts: HashMap<String, InterviewTranscript>,
    /// Keyed by analyst name
    pub sections: HashMap<String, ReportSection>,
    pub report: Option<FinalReport>,
    pub abort_reason: Option<AbortReason>,
    phase: RunPhase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-interview outcome kept in snapshots (turn content is not persisted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewOutcome {
    pub analyst: String,
    pub status: TranscriptStatus,
    pub turns: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Durable view of a run, written at every phase change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: String,
    pub topic: String,
    pub analyst_count: usize,
    pub turn_budget: usize,
    pub phase: RunPhase,
    pub panel: Vec<AnalystSpec>,
    #[serde(default)]
    pub feedback: Option<String>,
    /// True while a human decision is outstanding
    pub pending_decision: bool,
    #[serde(default)]
    pub interviews: Vec<InterviewOutcome>,
    #[serde(default)]
    pub abort_reason: Option<AbortReason>,
    #[serde(default)]
    pub report: Option<FinalReport>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunSnapshot {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            topic: self.topic.clone(),
            phase: self.phase,
            updated_at: self.updated_at,
        }
    }
}

impl ResearchRun {
    /// Create a run in `drafting_analysts`, validating the request.
    pub fn new(topic: &str, analyst_count: usize, turn_budget: usize) -> Result<Self> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(AppError::InvalidInput("Topic must not be empty".to_string()));
        }
        if analyst_count == 0 || analyst_count > MAX_ANALYSTS {
            return Err(AppError::InvalidInput(format!(
                "analyst_count must be between 1 and {}, got {}",
                MAX_ANALYSTS, analyst_count
            )));
        }
        if turn_budget > MAX_TURNS {
            return Err(AppError::InvalidInput(format!(
                "turn_budget must be at most {}, got {}",
                MAX_TURNS, turn_budget
            )));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            topic: topic.to_string(),
            analyst_count,
            turn_budget,
            feedback: None,
            panel: Vec::new(),
            transcripts: HashMap::new(),
            sections: HashMap::new(),
            report: None,
            abort_reason: None,
            phase: RunPhase::DraftingAnalysts,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn require_phase(&self, expected: RunPhase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(AppError::Phase {
                run_id: self.id.clone(),
                expected,
                actual: self.phase,
            })
        }
    }

    pub fn advance(&mut self, next: RunPhase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(AppError::Internal(format!(
                "Illegal phase transition {} -> {} for run {}",
                self.phase, next, self.id
            )));
        }
        tracing::info!(run_id = %self.id, from = %self.phase, to = %next, "Run phase change");
        self.phase = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Install a freshly drafted panel. Only valid while drafting.
    pub fn set_panel(&mut self, panel: Vec<AnalystSpec>) -> Result<()> {
        self.require_phase(RunPhase::DraftingAnalysts)?;
        self.panel = panel;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Reject the current panel: discard it (and anything derived from it)
    /// and go back to drafting with the reviewer's feedback.
    pub fn regenerate(&mut self, feedback: String) -> Result<()> {
        self.require_phase(RunPhase::AwaitingApproval)?;
        self.panel.clear();
        self.transcripts.clear();
        self.sections.clear();
        self.report = None;
        self.feedback = Some(feedback);
        tracing::info!(run_id = %self.id, "Panel rejected, regenerating");
        self.phase = RunPhase::DraftingAnalysts;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn record_transcripts(&mut self, transcripts: Vec<InterviewTranscript>) {
        for transcript in transcripts {
            self.transcripts
                .insert(transcript.analyst.name.clone(), transcript);
        }
        self.updated_at = Utc::now();
    }

    /// Completed transcripts in panel order.
    pub fn completed_transcripts(&self) -> Vec<&InterviewTranscript> {
        self.panel
            .iter()
            .filter_map(|a| self.transcripts.get(&a.name))
            .filter(|t| t.is_completed())
            .collect()
    }

    pub fn failed_interviews(&self) -> usize {
        self.transcripts.values().filter(|t| !t.is_completed()).count()
    }

    pub fn abort(&mut self, reason: AbortReason) -> Result<()> {
        self.advance(RunPhase::Aborted)?;
        tracing::warn!(run_id = %self.id, reason = %reason, "Run aborted");
        self.abort_reason = Some(reason);
        Ok(())
    }

    pub fn finalize(&mut self, report: FinalReport) -> Result<()> {
        self.advance(RunPhase::Finalized)?;
        self.report = Some(report);
        Ok(())
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let interviews = self
            .panel
            .iter()
            .filter_map(|a| self.transcripts.get(&a.name))
            .map(|t| InterviewOutcome {
                analyst: t.analyst.name.clone(),
                status: t.status,
                turns: t.turns.len(),
                note: t.note.clone(),
            })
            .collect();

        RunSnapshot {
            run_id: self.id.clone(),
            topic: self.topic.clone(),
            analyst_count: self.analyst_count,
            turn_budget: self.turn_budget,
            phase: self.phase,
            panel: self.panel.clone(),
            feedback: self.feedback.clone(),
            pending_decision: self.phase == RunPhase::AwaitingApproval,
            interviews,
            abort_reason: self.abort_reason.clone(),
            report: self.report.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Rebuild a run from its checkpoint. Transcripts and sections are not
    /// part of the snapshot; resumption only happens before interviews start.
    pub fn from_snapshot(snapshot: RunSnapshot) -> Self {
        Self {
            id: snapshot.run_id,
            topic: snapshot.topic,
            analyst_count: snapshot.analyst_count,
            turn_budget: snapshot.turn_budget,
            feedback: snapshot.feedback,
            panel: snapshot.panel,
            transcripts: HashMap::new(),
            sections: HashMap::new(),
            report: snapshot.report,
            abort_reason: snapshot.abort_reason,
            phase: snapshot.phase,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        }
    }
}
