//! Research run handlers
//!
//! Long-running work (panel drafting, interviews, writing) happens in a
//! spawned task; handlers return the checkpointed snapshot right away and
//! clients poll `GET /runs/{run_id}`.

use crate::{
    AppState,
    research::{ResearchRun, RunClaim, RunSnapshot},
    types::{AppError, Decision, FinalReport, Result, RunPhase, RunSummary},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRunRequest {
    pub topic: String,
    /// Defaults to `research.analyst_count`
    #[serde(default)]
    pub analyst_count: Option<usize>,
    /// Defaults to `research.turn_budget`
    #[serde(default)]
    pub turn_budget: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub run_id: String,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<RunPhase>,
}

/// Start a research run
///
/// The run is checkpointed in `drafting_analysts` before this returns; the
/// panel is drafted in the background.
pub async fn start_run(
    State(state): State<AppState>,
    Json(payload): Json<StartRunRequest>,
) -> Result<(StatusCode, Json<RunSnapshot>)> {
    let research = &state.config.research;
    let (run, claim) = state
        .orchestrator
        .create_run(
            &payload.topic,
            payload.analyst_count.unwrap_or(research.analyst_count),
            payload.turn_budget.unwrap_or(research.turn_budget),
        )
        .await?;

    let snapshot = run.snapshot();
    let token = CancellationToken::new();
    state.tokens.insert(&run.id, token.clone());
    spawn_drive(state, run, claim, token, Drive::Proceed);

    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

pub async fn list_runs(State(state): State<AppState>) -> Result<Json<Vec<RunSummary>>> {
    Ok(Json(state.orchestrator.list_runs().await?))
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunSnapshot>> {
    Ok(Json(state.orchestrator.get_status(&run_id).await?))
}

/// Approve or reject the drafted panel
///
/// Body: `{"decision": "approve"}` or
/// `{"decision": "reject", "feedback": "..."}`. Approval answers 202 with the
/// run in `interviewing`; rejection answers 200 once the new panel is parked.
/// The redraft after a rejection runs inside the request and can be cancelled
/// through `POST /runs/{run_id}/cancel` like background work.
pub async fn submit_decision(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(decision): Json<Decision>,
) -> Result<(StatusCode, Json<RunSnapshot>)> {
    let cancel = CancellationToken::new();
    if !state.tokens.insert(&run_id, cancel.clone()) {
        // Work for this run is still in flight in this process
        let snapshot = state.orchestrator.get_status(&run_id).await?;
        return Err(AppError::Phase {
            run_id,
            expected: RunPhase::AwaitingApproval,
            actual: snapshot.phase,
        });
    }

    let accepted = state
        .orchestrator
        .accept_decision(&run_id, decision, &cancel)
        .await;
    let (run, claim) = match accepted {
        Ok(accepted) => accepted,
        Err(e) => {
            state.tokens.release(&run_id);
            return Err(e);
        }
    };
    let snapshot = run.snapshot();

    if run.phase() == RunPhase::Interviewing {
        spawn_drive(state, run, claim, cancel, Drive::Resume);
        return Ok((StatusCode::ACCEPTED, Json(snapshot)));
    }

    state.tokens.release(&run_id);
    Ok((StatusCode::OK, Json(snapshot)))
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<FinalReport>> {
    Ok(Json(state.orchestrator.get_report(&run_id).await?))
}

/// Cancel a run executing in this process
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<(StatusCode, Json<CancelResponse>)> {
    if state.tokens.cancel(&run_id) {
        tracing::info!(run_id = %run_id, "Cancellation requested");
        return Ok((
            StatusCode::ACCEPTED,
            Json(CancelResponse {
                run_id,
                cancelled: true,
                phase: None,
            }),
        ));
    }

    let snapshot = state.orchestrator.get_status(&run_id).await?;
    Ok((
        StatusCode::OK,
        Json(CancelResponse {
            run_id,
            cancelled: false,
            phase: Some(snapshot.phase),
        }),
    ))
}

enum Drive {
    Proceed,
    Resume,
}

/// Drive `run` in the background under `token`, which the caller has
/// registered in `state.tokens`; the token is released when the task ends.
fn spawn_drive(state: AppState, run: ResearchRun, claim: RunClaim, token: CancellationToken, drive: Drive) {
    tokio::spawn(async move {
        let run_id = run.id.clone();
        let result = match drive {
            Drive::Proceed => state.orchestrator.proceed(run, claim, token).await,
            Drive::Resume => state.orchestrator.resume(run, claim, token).await,
        };

        match result {
            Ok(run) => tracing::info!(run_id = %run_id, phase = %run.phase(), "Run settled"),
            Err(e) => tracing::warn!(run_id = %run_id, error = %e, "Run stopped"),
        }
        state.tokens.release(&run_id);
    });
}
