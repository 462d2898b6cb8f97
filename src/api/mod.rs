//! HTTP API Handlers and Routes
//!
//! This module provides the REST API layer for Agora, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Runs (`/runs`)
//! - `POST /runs` - Start a run; drafting continues in the background (202)
//! - `GET /runs` - List runs, most recently updated first
//! - `GET /runs/{run_id}` - Latest snapshot of a run
//! - `POST /runs/{run_id}/decision` - Approve (202) or reject (200) the panel
//! - `GET /runs/{run_id}/report` - Final report of a finalized run
//! - `POST /runs/{run_id}/cancel` - Cancel a run executing in this process
//!
//! ## Health
//! - `GET /health` - Health check endpoint
//!
//! Errors are returned as `{"error": "..."}` with a status derived from
//! [`AppError`](crate::types::AppError).

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio_util::sync::CancellationToken;

/// Cancellation tokens for runs with a background task in this process.
#[derive(Default)]
pub struct RunTokens {
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl RunTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track the token of a run whose work is starting.
    ///
    /// Returns false, keeping the existing token, when the run already has
    /// work in flight.
    pub fn insert(&self, run_id: &str, token: CancellationToken) -> bool {
        match self.tokens.lock().entry(run_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(token);
                true
            }
        }
    }

    /// Cancel a registered run. Returns false when nothing is in flight.
    pub fn cancel(&self, run_id: &str) -> bool {
        match self.tokens.lock().get(run_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn release(&self, run_id: &str) {
        self.tokens.lock().remove(run_id);
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_reaches_inserted_token() {
        let tokens = RunTokens::new();
        let token = CancellationToken::new();
        tokens.insert("r1", token.clone());

        assert!(tokens.cancel("r1"));
        assert!(token.is_cancelled());
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn test_cancel_unknown_run() {
        let tokens = RunTokens::new();
        assert!(!tokens.cancel("missing"));

        tokens.insert("r1", CancellationToken::new());
        tokens.release("r1");
        assert!(tokens.is_empty());
        assert!(!tokens.cancel("r1"));
    }

    #[test]
    fn test_insert_keeps_in_flight_token() {
        let tokens = RunTokens::new();
        let running = CancellationToken::new();
        assert!(tokens.insert("r1", running.clone()));
        assert!(!tokens.insert("r1", CancellationToken::new()));

        tokens.cancel("r1");
        assert!(running.is_cancelled());
    }
}
