//! HTTP API tests using axum-test.

mod common;

use agora::api::routes;
use agora::research::RunSnapshot;
use agora::types::{FinalReport, RunPhase, RunSummary};
use agora::{AgoraConfig, AppState, RunTokens};
use axum::http::StatusCode;
use axum_test::TestServer;
use common::mocks::{ScriptedLLM, default_lookups, orchestrator, test_settings};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

fn server_with(llm: ScriptedLLM) -> TestServer {
    let (orchestrator, _) = orchestrator(Arc::new(llm), default_lookups(), test_settings(true));
    let state = AppState {
        config: Arc::new(AgoraConfig::default()),
        orchestrator: Arc::new(orchestrator),
        tokens: Arc::new(RunTokens::new()),
    };
    TestServer::new(routes::app(state)).unwrap()
}

fn server() -> TestServer {
    server_with(ScriptedLLM::new())
}

/// Poll a run until it reaches `phase`.
async fn wait_for(server: &TestServer, run_id: &str, phase: RunPhase) -> RunSnapshot {
    for _ in 0..200 {
        let snapshot: RunSnapshot = server.get(&format!("/runs/{}", run_id)).await.json();
        if snapshot.phase == phase {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {} never reached {}", run_id, phase);
}

async fn parked_run(server: &TestServer) -> String {
    let response = server
        .post("/runs")
        .json(&json!({ "topic": "X", "analyst_count": 2, "turn_budget": 1 }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);

    let snapshot: RunSnapshot = response.json();
    assert_eq!(snapshot.phase, RunPhase::DraftingAnalysts);
    wait_for(server, &snapshot.run_id, RunPhase::AwaitingApproval).await;
    snapshot.run_id
}

#[tokio::test]
async fn test_health() {
    let server = server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn test_full_run_over_http() {
    let server = server();
    let run_id = parked_run(&server).await;

    let response = server
        .post(&format!("/runs/{}/decision", run_id))
        .json(&json!({ "decision": "approve" }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    assert_eq!(response.json::<RunSnapshot>().phase, RunPhase::Interviewing);

    wait_for(&server, &run_id, RunPhase::Finalized).await;

    let report: FinalReport = server.get(&format!("/runs/{}/report", run_id)).await.json();
    assert_eq!(report.topic, "X");
    assert_eq!(report.sections.len(), 2);

    let runs: Vec<RunSummary> = server.get("/runs").await.json();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].phase, RunPhase::Finalized);
}

#[tokio::test]
async fn test_second_decision_conflicts() {
    let server = server();
    let run_id = parked_run(&server).await;

    server
        .post(&format!("/runs/{}/decision", run_id))
        .json(&json!({ "decision": "approve" }))
        .await
        .assert_status(StatusCode::ACCEPTED);

    let response = server
        .post(&format!("/runs/{}/decision", run_id))
        .json(&json!({ "decision": "approve" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn test_reject_returns_new_panel() {
    let server = server();
    let run_id = parked_run(&server).await;

    let response = server
        .post(&format!("/runs/{}/decision", run_id))
        .json(&json!({ "decision": "reject", "feedback": "more economists" }))
        .await;
    response.assert_status_ok();

    let snapshot: RunSnapshot = response.json();
    assert_eq!(snapshot.phase, RunPhase::AwaitingApproval);
    assert_eq!(snapshot.feedback.as_deref(), Some("more economists"));
    assert!(snapshot.panel.iter().all(|a| a.name.starts_with("Analyst 2-")));
}

#[tokio::test]
async fn test_report_before_finalize_conflicts() {
    let server = server();
    let run_id = parked_run(&server).await;

    server
        .get(&format!("/runs/{}/report", run_id))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_errors_map_to_status_codes() {
    let server = server();

    server.get("/runs/missing").await.assert_status_not_found();
    server
        .post("/runs")
        .json(&json!({ "topic": "  " }))
        .await
        .assert_status_bad_request();
    server
        .post("/runs/missing/cancel")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_short_panel_aborts_in_background() {
    let server = server_with(ScriptedLLM::new().with_panel_size(1));

    let response = server
        .post("/runs")
        .json(&json!({ "topic": "X", "analyst_count": 2 }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let run_id = response.json::<RunSnapshot>().run_id;

    let snapshot = wait_for(&server, &run_id, RunPhase::Aborted).await;
    assert!(snapshot.abort_reason.is_some());
}

#[tokio::test]
async fn test_cancel_in_flight_run() {
    let server = server_with(ScriptedLLM::new().with_random_delay(200, 200));
    let run_id = parked_run(&server).await;

    server
        .post(&format!("/runs/{}/decision", run_id))
        .json(&json!({ "decision": "approve" }))
        .await
        .assert_status(StatusCode::ACCEPTED);

    let response = server.post(&format!("/runs/{}/cancel", run_id)).await;
    response.assert_status(StatusCode::ACCEPTED);
    assert_eq!(response.json::<Value>()["cancelled"], true);

    let snapshot = wait_for(&server, &run_id, RunPhase::Aborted).await;
    assert_eq!(
        snapshot.abort_reason,
        Some(agora::types::AbortReason::Cancelled)
    );
    // the background task releases its token right after the final checkpoint
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = server.post(&format!("/runs/{}/cancel", run_id)).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["cancelled"], false);
}

#[tokio::test]
async fn test_cancel_during_redraft() {
    let server = server_with(ScriptedLLM::new().with_panel_delay(300));
    let run_id = parked_run(&server).await;

    let reject = server
        .post(&format!("/runs/{}/decision", run_id))
        .json(&json!({ "decision": "reject", "feedback": "add a regulator" }));
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        server.post(&format!("/runs/{}/cancel", run_id)).await
    };
    let (rejected, cancelled) = tokio::join!(reject, cancel);

    cancelled.assert_status(StatusCode::ACCEPTED);
    assert_eq!(cancelled.json::<Value>()["cancelled"], true);
    rejected.assert_status(StatusCode::CONFLICT);

    let snapshot = wait_for(&server, &run_id, RunPhase::Aborted).await;
    assert_eq!(
        snapshot.abort_reason,
        Some(agora::types::AbortReason::Cancelled)
    );
}
