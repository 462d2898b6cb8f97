//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Liveness check.
pub mod health;
/// Research run lifecycle handlers.
pub mod runs;
