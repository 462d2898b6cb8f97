use crate::AppState;
use crate::api::handlers::{health, runs};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/runs", post(runs::start_run).get(runs::list_runs))
        .route("/runs/{run_id}", get(runs::get_run))
        .route("/runs/{run_id}/decision", post(runs::submit_decision))
        .route("/runs/{run_id}/report", get(runs::get_report))
        .route("/runs/{run_id}/cancel", post(runs::cancel_run))
}

/// Router with state and the HTTP middleware stack applied.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
