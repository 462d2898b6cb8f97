//! Top-level research workflow
//!
//! ```text
//! drafting_analysts -> [awaiting_approval] -> interviewing -> writing -> finalized
//!          ^                  |
//!          +---- reject ------+            (any non-terminal phase) -> aborted
//! ```
//!
//! The orchestrator is the only writer of phase transitions and checkpoints
//! the run after each one. Interviews fan out into a `JoinSet` bounded by a
//! semaphore; writers start only after every interview has returned.

use crate::db::CheckpointStore;
use crate::llm::LLMClient;
use crate::research::analysts::AnalystPanelGenerator;
use crate::research::classifier::{CloseOutClassifier, SentinelPhraseClassifier};
use crate::research::interview::InterviewMachine;
use crate::research::retry::RetryPolicy;
use crate::research::run::{ResearchRun, RunSnapshot};
use crate::research::supervisor::InterviewSupervisor;
use crate::research::writer::{SectionWriter, assemble_report};
use crate::tools::Lookup;
use crate::types::{
    AbortReason, AppError, Decision, FinalReport, InterviewTranscript, ReportSection, Result,
    RunPhase, RunSummary,
};
use crate::utils::toml_config::AgoraConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Park new runs at `awaiting_approval` (default: true)
    pub require_approval: bool,
    /// Interviews running at once (default: 4)
    pub max_parallel_interviews: usize,
    pub interview_timeout: Option<Duration>,
    /// Snippets requested from each lookup per question (default: 3)
    pub max_snippets: usize,
    pub retry: RetryPolicy,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            require_approval: true,
            max_parallel_interviews: 4,
            interview_timeout: Some(Duration::from_secs(600)),
            max_snippets: 3,
            retry: RetryPolicy::default(),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &AgoraConfig) -> Self {
        Self {
            require_approval: config.research.require_approval,
            max_parallel_interviews: config.research.max_parallel_interviews,
            interview_timeout: match config.research.interview_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            max_snippets: config.search.max_results,
            retry: config.retry_policy(),
        }
    }
}

/// Marks a run as being driven by this process; released on drop.
pub struct RunClaim {
    run_id: String,
    claims: Arc<Mutex<HashMap<String, RunPhase>>>,
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        self.claims.lock().remove(&self.run_id);
    }
}

pub struct ResearchOrchestrator {
    llm: Arc<dyn LLMClient>,
    lookups: Vec<Arc<dyn Lookup>>,
    classifier: Arc<dyn CloseOutClassifier>,
    store: Arc<dyn CheckpointStore>,
    settings: OrchestratorSettings,
    /// run id -> phase the claimant is moving the run into
    claims: Arc<Mutex<HashMap<String, RunPhase>>>,
}

impl ResearchOrchestrator {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        lookups: Vec<Arc<dyn Lookup>>,
        store: Arc<dyn CheckpointStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            llm,
            lookups,
            classifier: Arc::new(SentinelPhraseClassifier::default()),
            store,
            settings,
            claims: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn CloseOutClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    // ============= Commands =============

    /// Create a run and draft its panel.
    ///
    /// With approval required the run is returned parked at
    /// `awaiting_approval`; otherwise it is driven to completion.
    pub async fn start_run(
        &self,
        topic: &str,
        analyst_count: usize,
        turn_budget: usize,
        cancel: CancellationToken,
    ) -> Result<ResearchRun> {
        let (run, claim) = self.create_run(topic, analyst_count, turn_budget).await?;
        self.proceed(run, claim, cancel).await
    }

    /// Validate the request and checkpoint a new run in `drafting_analysts`.
    pub async fn create_run(
        &self,
        topic: &str,
        analyst_count: usize,
        turn_budget: usize,
    ) -> Result<(ResearchRun, RunClaim)> {
        let run = ResearchRun::new(topic, analyst_count, turn_budget)?;
        let claim = self.claim(&run.id, RunPhase::DraftingAnalysts)?;
        tracing::info!(run_id = %run.id, topic = %run.topic, analyst_count, turn_budget, "Run created");
        self.checkpoint(&run).await?;
        Ok((run, claim))
    }

    /// Draft the panel of a freshly created run, then park it or execute it.
    pub async fn proceed(
        &self,
        mut run: ResearchRun,
        _claim: RunClaim,
        cancel: CancellationToken,
    ) -> Result<ResearchRun> {
        run.require_phase(RunPhase::DraftingAnalysts)?;
        let outcome = self.draft_and_route(&mut run, &cancel).await;
        self.settle(&mut run, outcome).await?;
        Ok(run)
    }

    /// Apply a human decision and, on approval, drive the run to completion.
    pub async fn submit_decision(
        &self,
        run_id: &str,
        decision: Decision,
        cancel: CancellationToken,
    ) -> Result<ResearchRun> {
        let (run, claim) = self.accept_decision(run_id, decision, &cancel).await?;
        if run.phase() == RunPhase::Interviewing {
            return self.resume(run, claim, cancel).await;
        }
        Ok(run)
    }

    /// Validate and apply a decision without running interviews.
    ///
    /// Valid only while the run awaits approval. Approval checkpoints the run
    /// as `interviewing` before returning, so a repeated approval fails with
    /// a phase error. Rejection regenerates the panel and parks the run again.
    /// The move out of `awaiting_approval` is a conditional write, so only one
    /// decision wins even across processes sharing a store.
    pub async fn accept_decision(
        &self,
        run_id: &str,
        decision: Decision,
        cancel: &CancellationToken,
    ) -> Result<(ResearchRun, RunClaim)> {
        let target = match decision {
            Decision::Approve => RunPhase::Interviewing,
            Decision::Reject { .. } => RunPhase::DraftingAnalysts,
        };
        decision.validate()?;
        let claim = self.claim(run_id, target)?;

        let mut run = ResearchRun::from_snapshot(self.store.load(run_id).await?);
        run.require_phase(RunPhase::AwaitingApproval)?;

        match decision {
            Decision::Approve => {
                run.advance(RunPhase::Interviewing)?;
                self.leave_approval(&run).await?;
                tracing::info!(run_id, "Panel approved");
            }
            Decision::Reject { feedback } => {
                run.regenerate(feedback)?;
                self.leave_approval(&run).await?;
                tracing::info!(run_id, "Panel rejected, redrafting");
                let outcome = self.redraft(&mut run, cancel).await;
                self.settle(&mut run, outcome).await?;
            }
        }

        Ok((run, claim))
    }

    /// Drive an approved run from `interviewing` to a terminal phase.
    pub async fn resume(
        &self,
        mut run: ResearchRun,
        _claim: RunClaim,
        cancel: CancellationToken,
    ) -> Result<ResearchRun> {
        run.require_phase(RunPhase::Interviewing)?;
        let outcome = self.execute(&mut run, &cancel).await;
        self.settle(&mut run, outcome).await?;
        Ok(run)
    }

    pub async fn get_status(&self, run_id: &str) -> Result<RunSnapshot> {
        self.store.load(run_id).await
    }

    pub async fn get_report(&self, run_id: &str) -> Result<FinalReport> {
        let snapshot = self.store.load(run_id).await?;
        if snapshot.phase != RunPhase::Finalized {
            return Err(AppError::Phase {
                run_id: run_id.to_string(),
                expected: RunPhase::Finalized,
                actual: snapshot.phase,
            });
        }
        snapshot
            .report
            .ok_or_else(|| AppError::Internal(format!("Run {} is finalized without a report", run_id)))
    }

    pub async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        self.store.list().await
    }

    // ============= Stages =============

    async fn draft_and_route(&self, run: &mut ResearchRun, cancel: &CancellationToken) -> Result<()> {
        self.create_analysts(run, cancel).await?;

        if self.settings.require_approval {
            run.advance(RunPhase::AwaitingApproval)?;
            return self.checkpoint(run).await;
        }

        run.advance(RunPhase::Interviewing)?;
        self.checkpoint(run).await?;
        self.execute(run, cancel).await
    }

    async fn redraft(&self, run: &mut ResearchRun, cancel: &CancellationToken) -> Result<()> {
        self.create_analysts(run, cancel).await?;
        run.advance(RunPhase::AwaitingApproval)?;
        self.checkpoint(run).await
    }

    async fn create_analysts(&self, run: &mut ResearchRun, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return self.abort_cancelled(run).await;
        }

        let generator = AnalystPanelGenerator::new(self.llm.clone(), self.settings.retry.clone());
        let drafted = generator
            .generate(&run.topic, run.analyst_count, run.feedback.as_deref(), cancel)
            .await;
        if cancel.is_cancelled() {
            return self.abort_cancelled(run).await;
        }
        match drafted {
            Ok(panel) => {
                tracing::info!(
                    run_id = %run.id,
                    analysts = ?panel.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
                    "Panel drafted"
                );
                run.set_panel(panel)
            }
            Err(AppError::PanelGeneration {
                expected,
                actual,
                message,
            }) => {
                let reason = AbortReason::PanelGeneration {
                    expected,
                    actual,
                    message: message.clone(),
                };
                let err = AppError::PanelGeneration {
                    expected,
                    actual,
                    message,
                };
                self.abort(run, reason, err).await
            }
            Err(e) => Err(e),
        }
    }

    async fn execute(&self, run: &mut ResearchRun, cancel: &CancellationToken) -> Result<()> {
        let transcripts = self.fan_out_interviews(run, cancel).await;
        run.record_transcripts(transcripts);

        if cancel.is_cancelled() {
            return self.abort_cancelled(run).await;
        }

        let failed = run.failed_interviews();
        if run.completed_transcripts().is_empty() {
            return self
                .abort(
                    run,
                    AbortReason::AllInterviewsFailed { failed },
                    AppError::AggregationEmpty { failed },
                )
                .await;
        }

        run.advance(RunPhase::Writing)?;
        self.checkpoint(run).await?;

        let writer = Arc::new(SectionWriter::new(self.llm.clone(), self.settings.retry.clone()));
        run.sections = self.fan_out_writers(run, &writer, cancel).await;

        if cancel.is_cancelled() {
            return self.abort_cancelled(run).await;
        }
        if run.sections.is_empty() {
            let failed = run.completed_transcripts().len();
            return self
                .abort(
                    run,
                    AbortReason::SectionsFailed { failed },
                    AppError::AggregationEmpty { failed },
                )
                .await;
        }

        let ordered: Vec<ReportSection> = run
            .panel
            .iter()
            .filter_map(|a| run.sections.get(&a.name).cloned())
            .collect();

        let (introduction, conclusion) = tokio::join!(
            writer.write_introduction(&run.topic, &ordered, cancel),
            writer.write_conclusion(&run.topic, &ordered, cancel),
        );

        if cancel.is_cancelled() {
            return self.abort_cancelled(run).await;
        }

        let (introduction, conclusion) = match (introduction, conclusion) {
            (Ok(intro), Ok(outro)) => (intro, outro),
            (Err(e), _) | (_, Err(e)) => {
                let reason = AbortReason::SynthesisFailed {
                    message: e.to_string(),
                };
                return self.abort(run, reason, AppError::Capability(e)).await;
            }
        };

        let report = assemble_report(
            &run.topic,
            &run.panel,
            run.sections.clone(),
            introduction,
            conclusion,
        );
        tracing::info!(
            run_id = %run.id,
            sections = report.sections.len(),
            citations = report.citations.len(),
            omitted = report.omitted_analysts.len(),
            "Report assembled"
        );

        run.finalize(report)?;
        self.checkpoint(run).await
    }

    async fn fan_out_interviews(
        &self,
        run: &ResearchRun,
        cancel: &CancellationToken,
    ) -> Vec<InterviewTranscript> {
        let machine = InterviewMachine::new(
            self.llm.clone(),
            self.lookups.clone(),
            self.classifier.clone(),
            self.settings.retry.clone(),
        )
        .with_topic(run.topic.clone())
        .with_turn_budget(run.turn_budget)
        .with_max_snippets(self.settings.max_snippets);
        let supervisor = Arc::new(InterviewSupervisor::new(
            machine,
            self.settings.interview_timeout,
        ));
        let semaphore = Arc::new(Semaphore::new(self.settings.max_parallel_interviews.max(1)));

        tracing::info!(
            run_id = %run.id,
            interviews = run.panel.len(),
            parallelism = self.settings.max_parallel_interviews,
            "Fanning out interviews"
        );

        let mut set = JoinSet::new();
        for analyst in run.panel.iter().cloned() {
            let supervisor = supervisor.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.child_token();

            set.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                match permit {
                    Some(_permit) => supervisor.run(analyst, cancel).await,
                    None => InterviewTranscript::truncated(analyst, Vec::new(), "cancelled before start"),
                }
            });
        }

        let mut transcripts = Vec::with_capacity(run.panel.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(transcript) => transcripts.push(transcript),
                Err(e) => tracing::error!(run_id = %run.id, error = %e, "Interview task panicked"),
            }
        }

        // A panicked task leaves no transcript behind
        for analyst in &run.panel {
            if !transcripts.iter().any(|t| t.analyst.name == analyst.name) {
                transcripts.push(InterviewTranscript::failed(
                    analyst.clone(),
                    Vec::new(),
                    "interview task aborted",
                ));
            }
        }

        transcripts
    }

    async fn fan_out_writers(
        &self,
        run: &ResearchRun,
        writer: &Arc<SectionWriter>,
        cancel: &CancellationToken,
    ) -> HashMap<String, ReportSection> {
        let mut set = JoinSet::new();
        for transcript in run.completed_transcripts() {
            let transcript = transcript.clone();
            let writer = writer.clone();
            let topic = run.topic.clone();
            let cancel = cancel.clone();

            set.spawn(async move {
                let section = writer.write_section(&topic, &transcript, &cancel).await;
                (transcript.analyst.name, section)
            });
        }

        for skipped in run.transcripts.values().filter(|t| !t.is_completed()) {
            tracing::warn!(
                run_id = %run.id,
                analyst = %skipped.analyst.name,
                status = %skipped.status,
                "Skipping section for unfinished interview"
            );
        }

        let mut sections = HashMap::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    set.abort_all();
                    break;
                }
                joined = set.join_next() => match joined {
                    None => break,
                    Some(Ok((analyst, Ok(section)))) => {
                        sections.insert(analyst, section);
                    }
                    Some(Ok((analyst, Err(e)))) => {
                        tracing::warn!(run_id = %run.id, analyst = %analyst, error = %e, "Section writer failed");
                    }
                    Some(Err(e)) => {
                        tracing::error!(run_id = %run.id, error = %e, "Section writer task panicked");
                    }
                },
            }
        }

        sections
    }

    // ============= Helpers =============

    fn claim(&self, run_id: &str, target: RunPhase) -> Result<RunClaim> {
        let mut claims = self.claims.lock();
        if let Some(active) = claims.get(run_id) {
            return Err(AppError::Phase {
                run_id: run_id.to_string(),
                expected: RunPhase::AwaitingApproval,
                actual: *active,
            });
        }
        claims.insert(run_id.to_string(), target);
        Ok(RunClaim {
            run_id: run_id.to_string(),
            claims: self.claims.clone(),
        })
    }

    async fn checkpoint(&self, run: &ResearchRun) -> Result<()> {
        self.store.save(&run.snapshot()).await
    }

    /// Persist the first move out of `awaiting_approval`.
    ///
    /// Fails with a phase error, leaving the stored run alone, when another
    /// decision already moved it.
    async fn leave_approval(&self, run: &ResearchRun) -> Result<()> {
        let snapshot = run.snapshot();
        if self
            .store
            .save_if_phase(&snapshot, RunPhase::AwaitingApproval)
            .await?
        {
            return Ok(());
        }

        let stored = self.store.load(&run.id).await?;
        Err(AppError::Phase {
            run_id: run.id.clone(),
            expected: RunPhase::AwaitingApproval,
            actual: stored.phase,
        })
    }

    /// Close out a drive that ended in an error.
    ///
    /// A run that failed outside the stage-level aborts (a lost checkpoint,
    /// a rejected transition) is aborted here, and the terminal snapshot is
    /// written again so the stored run never stays in a working phase.
    async fn settle(&self, run: &mut ResearchRun, outcome: Result<()>) -> Result<()> {
        let Err(err) = outcome else {
            return Ok(());
        };

        if !run.phase().is_terminal() {
            tracing::error!(run_id = %run.id, phase = %run.phase(), error = %err, "Run failed, aborting");
            run.abort(AbortReason::Internal {
                message: err.to_string(),
            })?;
        }
        if let Err(save_err) = self.checkpoint(run).await {
            tracing::error!(run_id = %run.id, error = %save_err, "Failed to persist terminal checkpoint");
        }

        Err(err)
    }

    async fn abort_cancelled(&self, run: &mut ResearchRun) -> Result<()> {
        let err = AppError::Cancelled(run.id.clone());
        self.abort(run, AbortReason::Cancelled, err).await
    }

    /// Move the run to `aborted`, persist it, and surface `err`.
    async fn abort(&self, run: &mut ResearchRun, reason: AbortReason, err: AppError) -> Result<()> {
        run.abort(reason)?;
        self.checkpoint(run).await?;
        Err(err)
    }
}
