use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ============= Conversation Types =============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// ============= Research Types =============

/// One member of the analyst panel.
///
/// The `name` is the analyst's identity within a panel and must be unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AnalystSpec {
    /// Name of the analyst
    pub name: String,
    /// Role of the analyst in the context of the topic
    pub role: String,
    /// Primary affiliation of the analyst
    pub affiliation: String,
    /// Focus, concerns and motives of the analyst
    pub description: String,
}

impl AnalystSpec {
    /// Persona block handed to the text-generation capability.
    pub fn persona(&self) -> String {
        format!(
            "Name: {}\nRole: {}\nAffiliation: {}\nDescription: {}",
            self.name, self.role, self.affiliation, self.description
        )
    }

    pub fn short_description(&self) -> String {
        format!("{} ({} at {})", self.name, self.role, self.affiliation)
    }
}

/// A piece of evidence returned by a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// Stable identifier of the source (usually a URL)
    pub source_id: String,
    pub text: String,
    /// Name of the lookup that produced this snippet
    pub lookup: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub evidence: Vec<Snippet>,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    Completed,
    Failed,
    Truncated,
}

impl fmt::Display for TranscriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TranscriptStatus::Completed => "completed",
            TranscriptStatus::Failed => "failed",
            TranscriptStatus::Truncated => "truncated",
        };
        f.write_str(s)
    }
}

/// The terminal record of one analyst's interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewTranscript {
    pub analyst: AnalystSpec,
    pub turns: Vec<Turn>,
    pub status: TranscriptStatus,
    /// Set for failed and truncated transcripts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl InterviewTranscript {
    pub fn completed(analyst: AnalystSpec, turns: Vec<Turn>) -> Self {
        Self {
            analyst,
            turns,
            status: TranscriptStatus::Completed,
            note: None,
        }
    }

    pub fn failed(analyst: AnalystSpec, turns: Vec<Turn>, note: impl Into<String>) -> Self {
        Self {
            analyst,
            turns,
            status: TranscriptStatus::Failed,
            note: Some(note.into()),
        }
    }

    pub fn truncated(analyst: AnalystSpec, turns: Vec<Turn>, note: impl Into<String>) -> Self {
        Self {
            analyst,
            turns,
            status: TranscriptStatus::Truncated,
            note: Some(note.into()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TranscriptStatus::Completed
    }

    /// Source ids referenced across all turns, first occurrence wins.
    pub fn citations(&self) -> Vec<String> {
        dedup_sources(
            self.turns
                .iter()
                .flat_map(|turn| turn.evidence.iter().map(|s| s.source_id.as_str())),
        )
    }
}

/// Collapse repeated source ids while keeping first-seen order.
pub fn dedup_sources<'a, I>(sources: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    /// Identity of the analyst this section was written from
    pub analyst: String,
    pub title: String,
    pub body: String,
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalReport {
    pub topic: String,
    pub introduction: String,
    /// Ordered like the approved panel
    pub sections: Vec<ReportSection>,
    pub conclusion: String,
    pub citations: Vec<String>,
    /// Analysts whose interview or section did not make it into the report
    #[serde(default)]
    pub omitted_analysts: Vec<String>,
}

// ============= Run Lifecycle =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    DraftingAnalysts,
    AwaitingApproval,
    Interviewing,
    Writing,
    Finalized,
    Aborted,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::DraftingAnalysts => "drafting_analysts",
            RunPhase::AwaitingApproval => "awaiting_approval",
            RunPhase::Interviewing => "interviewing",
            RunPhase::Writing => "writing",
            RunPhase::Finalized => "finalized",
            RunPhase::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Finalized | RunPhase::Aborted)
    }

    /// Forward transitions only. Regeneration is handled separately.
    pub fn can_advance_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        match (self, next) {
            (from, Aborted) => !from.is_terminal(),
            (DraftingAnalysts, AwaitingApproval) => true,
            (DraftingAnalysts, Interviewing) => true,
            (AwaitingApproval, Interviewing) => true,
            (Interviewing, Writing) => true,
            (Writing, Finalized) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunPhase {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "drafting_analysts" => Ok(RunPhase::DraftingAnalysts),
            "awaiting_approval" => Ok(RunPhase::AwaitingApproval),
            "interviewing" => Ok(RunPhase::Interviewing),
            "writing" => Ok(RunPhase::Writing),
            "finalized" => Ok(RunPhase::Finalized),
            "aborted" => Ok(RunPhase::Aborted),
            other => Err(AppError::InvalidInput(format!("Unknown run phase '{}'", other))),
        }
    }
}

/// Why a run ended in `aborted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum AbortReason {
    PanelGeneration {
        expected: usize,
        actual: usize,
        message: String,
    },
    AllInterviewsFailed {
        failed: usize,
    },
    /// Interviews completed but no section could be written
    SectionsFailed {
        failed: usize,
    },
    SynthesisFailed {
        message: String,
    },
    Cancelled,
    /// Storage or bookkeeping failure after the run left `awaiting_approval`
    Internal {
        message: String,
    },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::PanelGeneration {
                expected,
                actual,
                message,
            } => write!(
                f,
                "panel generation failed (expected {}, got {}): {}",
                expected, actual, message
            ),
            AbortReason::AllInterviewsFailed { failed } => {
                write!(f, "no interview completed ({} failed)", failed)
            }
            AbortReason::SectionsFailed { failed } => {
                write!(f, "no section written ({} writers failed)", failed)
            }
            AbortReason::SynthesisFailed { message } => write!(f, "synthesis failed: {}", message),
            AbortReason::Cancelled => f.write_str("cancelled"),
            AbortReason::Internal { message } => write!(f, "internal error: {}", message),
        }
    }
}

/// The human decision submitted while a run awaits approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject { feedback: String },
}

impl Decision {
    /// A rejection; the feedback drives the redraft and must not be blank.
    pub fn reject(feedback: &str) -> Result<Self> {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(AppError::InvalidInput(
                "Rejection feedback cannot be empty".to_string(),
            ));
        }
        Ok(Decision::Reject {
            feedback: feedback.to_string(),
        })
    }

    /// Check a decision received over the wire.
    pub fn validate(&self) -> Result<()> {
        match self {
            Decision::Approve => Ok(()),
            Decision::Reject { feedback } => Decision::reject(feedback).map(|_| ()),
        }
    }
}

/// Lightweight listing entry for stored runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub topic: String,
    pub phase: RunPhase,
    pub updated_at: DateTime<Utc>,
}

// ============= Error Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityErrorKind {
    /// Rate limiting, timeouts, connection drops, 5xx
    Transient,
    Permanent,
}

/// Failure reported by an external capability (text generation or lookup).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{capability} failed ({kind:?}): {message}")]
pub struct CapabilityError {
    pub kind: CapabilityErrorKind,
    pub capability: String,
    pub message: String,
}

impl CapabilityError {
    pub fn transient(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: CapabilityErrorKind::Transient,
            capability: capability.into(),
            message: message.into(),
        }
    }

    pub fn permanent(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: CapabilityErrorKind::Permanent,
            capability: capability.into(),
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == CapabilityErrorKind::Transient
    }
}

pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Panel generation error: expected {expected} analysts, got {actual}: {message}")]
    PanelGeneration {
        expected: usize,
        actual: usize,
        message: String,
    },

    #[error("Run {run_id} is in phase '{actual}', expected '{expected}'")]
    Phase {
        run_id: String,
        expected: RunPhase,
        actual: RunPhase,
    },

    #[error("Nothing to aggregate; {failed} failed")]
    AggregationEmpty { failed: usize },

    #[error("Run cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Capability(_) => StatusCode::BAD_GATEWAY,
            AppError::PanelGeneration { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Phase { .. } => StatusCode::CONFLICT,
            AppError::AggregationEmpty { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Cancelled(_) => StatusCode::CONFLICT,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet(id: &str) -> Snippet {
        Snippet {
            source_id: id.to_string(),
            text: format!("text from {}", id),
            lookup: "web".to_string(),
        }
    }

    fn analyst() -> AnalystSpec {
        AnalystSpec {
            name: "Ada".to_string(),
            role: "Historian".to_string(),
            affiliation: "Analytical Society".to_string(),
            description: "Early computing".to_string(),
        }
    }

    #[test]
    fn test_citations_deduplicate_across_turns() {
        let transcript = InterviewTranscript::completed(
            analyst(),
            vec![
                Turn {
                    question: "q1".to_string(),
                    evidence: vec![snippet("https://a"), snippet("https://b")],
                    answer: "a1".to_string(),
                },
                Turn {
                    question: "q2".to_string(),
                    evidence: vec![snippet("https://b"), snippet("https://a"), snippet("https://c")],
                    answer: "a2".to_string(),
                },
            ],
        );

        assert_eq!(
            transcript.citations(),
            vec!["https://a", "https://b", "https://c"]
        );
    }

    #[test]
    fn test_persona_format() {
        let persona = analyst().persona();
        assert!(persona.starts_with("Name: Ada\nRole: Historian"));
        assert!(persona.ends_with("Description: Early computing"));
    }

    #[test]
    fn test_phase_transitions() {
        use RunPhase::*;
        assert!(DraftingAnalysts.can_advance_to(AwaitingApproval));
        assert!(AwaitingApproval.can_advance_to(Interviewing));
        assert!(Writing.can_advance_to(Finalized));
        assert!(Interviewing.can_advance_to(Aborted));
        assert!(!Interviewing.can_advance_to(AwaitingApproval));
        assert!(!Finalized.can_advance_to(Aborted));
        assert!(!Aborted.can_advance_to(Interviewing));
    }

    #[test]
    fn test_phase_round_trips_through_str() {
        for phase in [
            RunPhase::DraftingAnalysts,
            RunPhase::AwaitingApproval,
            RunPhase::Interviewing,
            RunPhase::Writing,
            RunPhase::Finalized,
            RunPhase::Aborted,
        ] {
            assert_eq!(phase.as_str().parse::<RunPhase>().unwrap(), phase);
        }
    }

    #[test]
    fn test_reject_keeps_feedback_verbatim() {
        assert_eq!(
            Decision::reject("  approve ").unwrap(),
            Decision::Reject {
                feedback: "approve".to_string()
            }
        );
        assert!(matches!(
            Decision::reject("   "),
            Err(AppError::InvalidInput(_))
        ));
        assert!(
            Decision::Reject {
                feedback: "\n".to_string()
            }
            .validate()
            .is_err()
        );
        assert!(Decision::Approve.validate().is_ok());
    }

    #[test]
    fn test_error_status_codes() {
        use axum::http::StatusCode;
        let phase = AppError::Phase {
            run_id: "r".to_string(),
            expected: RunPhase::AwaitingApproval,
            actual: RunPhase::Interviewing,
        };
        assert_eq!(phase.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::NotFound("x".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        let cap: AppError = CapabilityError::transient("llm", "timeout").into();
        assert_eq!(cap.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_abort_reason_is_tagged() {
        let json = serde_json::to_value(AbortReason::AllInterviewsFailed { failed: 2 }).unwrap();
        assert_eq!(json["code"], "all_interviews_failed");
        assert_eq!(json["failed"], 2);
    }
}
