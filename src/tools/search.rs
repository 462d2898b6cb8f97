//! Web search lookup using daedra
//!
//! daedra queries DuckDuckGo, so no API key is needed.

use crate::tools::Lookup;
use crate::types::{CapabilityError, CapabilityResult, Snippet};
use async_trait::async_trait;

pub const WEB_SEARCH: &str = "web_search";

/// Web search lookup powered by daedra
pub struct WebSearchLookup;

impl WebSearchLookup {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WebSearchLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Lookup for WebSearchLookup {
    fn name(&self) -> &str {
        WEB_SEARCH
    }

    async fn search(&self, query: &str, max_results: usize) -> CapabilityResult<Vec<Snippet>> {
        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: max_results,
                ..Default::default()
            }),
        };

        // DuckDuckGo failures are almost always throttling or network trouble
        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| CapabilityError::transient(WEB_SEARCH, format!("Search failed: {}", e)))?;

        Ok(response
            .data
            .iter()
            .take(max_results)
            .map(|r| Snippet {
                source_id: r.url.clone(),
                text: format!("{}\n{}", r.title, r.description),
                lookup: WEB_SEARCH.to_string(),
            })
            .collect())
    }
}
