//! Single-interview lifecycle
//!
//! The supervisor is the failure boundary around one [`InterviewMachine`]:
//! whatever happens inside, it hands back an [`InterviewTranscript`], never an
//! error. Finished turns survive failures, timeouts and cancellation.

use crate::research::interview::{InterviewError, InterviewMachine};
use crate::types::{AnalystSpec, InterviewTranscript};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

enum Outcome {
    Finished,
    Failed(InterviewError),
    TimedOut(Duration),
    Cancelled,
}

pub struct InterviewSupervisor {
    machine: InterviewMachine,
    timeout: Option<Duration>,
}

impl InterviewSupervisor {
    pub fn new(machine: InterviewMachine, timeout: Option<Duration>) -> Self {
        Self { machine, timeout }
    }

    pub async fn run(&self, analyst: AnalystSpec, cancel: CancellationToken) -> InterviewTranscript {
        tracing::info!(
            analyst = %analyst.name,
            budget = self.machine.turn_budget(),
            "Interview started"
        );

        let mut turns = Vec::new();
        let outcome = {
            let interview = self.machine.run(&analyst, &mut turns, &cancel);
            let bounded = async {
                match self.timeout {
                    Some(limit) => tokio::time::timeout(limit, interview)
                        .await
                        .map_err(|_| limit),
                    None => Ok(interview.await),
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => Outcome::Cancelled,
                result = bounded => match result {
                    Ok(Ok(())) => Outcome::Finished,
                    Ok(Err(e)) => Outcome::Failed(e),
                    Err(limit) => Outcome::TimedOut(limit),
                },
            }
        };

        let transcript = match outcome {
            Outcome::Finished => InterviewTranscript::completed(analyst, turns),
            Outcome::Failed(e) => {
                tracing::warn!(analyst = %analyst.name, turns = turns.len(), error = %e, "Interview failed");
                InterviewTranscript::failed(analyst, turns, e.to_string())
            }
            Outcome::TimedOut(limit) => {
                tracing::warn!(analyst = %analyst.name, turns = turns.len(), "Interview timed out");
                InterviewTranscript::truncated(
                    analyst,
                    turns,
                    format!("interview exceeded {}s", limit.as_secs()),
                )
            }
            Outcome::Cancelled => {
                tracing::info!(analyst = %analyst.name, turns = turns.len(), "Interview cancelled");
                InterviewTranscript::truncated(analyst, turns, "cancelled")
            }
        };

        tracing::info!(
            analyst = %transcript.analyst.name,
            status = %transcript.status,
            turns = transcript.turns.len(),
            "Interview finished"
        );
        transcript
    }
}
