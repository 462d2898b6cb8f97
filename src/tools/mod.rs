//! Evidence lookups
//!
//! A lookup turns a query into ranked [`Snippet`]s. Interviews fan a question
//! out to every configured lookup at once, so implementations must be cheap to
//! share (`Arc<dyn Lookup>`) and safe to call concurrently.
//!
//! # Module Structure
//!
//! - [`search`](crate::tools::search) - Web search via DuckDuckGo (daedra)
//! - [`wikipedia`](crate::tools::wikipedia) - Wikipedia full-text search
//! - [`cache`](crate::tools::cache) - TTL/LRU cache wrapper for any lookup

/// TTL + LRU result cache.
pub mod cache;
/// Web search lookup using DuckDuckGo.
pub mod search;
/// Wikipedia search lookup.
pub mod wikipedia;

use crate::types::{CapabilityResult, Snippet};
use crate::utils::toml_config::SearchConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait Lookup: Send + Sync {
    /// Name used for source attribution and error reports
    fn name(&self) -> &str;

    /// Ranked snippets for `query`. An empty list is a valid result.
    async fn search(&self, query: &str, max_results: usize) -> CapabilityResult<Vec<Snippet>>;
}

/// Build the lookups enabled in the config, each wrapped in a result cache.
pub fn lookups_from_config(config: &SearchConfig) -> Vec<Arc<dyn Lookup>> {
    let ttl = Duration::from_secs(config.cache_ttl_secs);
    let mut lookups: Vec<Arc<dyn Lookup>> = Vec::new();

    if config.web {
        lookups.push(Arc::new(cache::CachedLookup::new(
            search::WebSearchLookup::new(),
            config.cache_capacity,
            ttl,
        )));
    }
    if config.wikipedia {
        lookups.push(Arc::new(cache::CachedLookup::new(
            wikipedia::WikipediaLookup::new(),
            config.cache_capacity,
            ttl,
        )));
    }

    lookups
}
