//! Wikipedia lookup via the MediaWiki full-text search API
//!
//! Search snippets come back as HTML fragments (`<span class="searchmatch">`),
//! so they are flattened to plain text with scraper before use.

use crate::llm::client::classify_transport;
use crate::tools::Lookup;
use crate::types::{CapabilityError, CapabilityResult, Snippet};
use async_trait::async_trait;
use scraper::Html;
use serde::Deserialize;
use std::time::Duration;

pub const WIKIPEDIA: &str = "wikipedia";

const DEFAULT_BASE_URL: &str = "https://en.wikipedia.org";

pub struct WikipediaLookup {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    #[serde(default)]
    snippet: String,
}

impl WikipediaLookup {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the lookup at another MediaWiki installation
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("agora/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn article_url(&self, title: &str) -> String {
        format!("{}/wiki/{}", self.base_url, title.replace(' ', "_"))
    }
}

impl Default for WikipediaLookup {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten a MediaWiki HTML snippet into plain text.
fn strip_markup(fragment: &str) -> String {
    let html = Html::parse_fragment(fragment);
    let text: String = html.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Lookup for WikipediaLookup {
    fn name(&self) -> &str {
        WIKIPEDIA
    }

    async fn search(&self, query: &str, max_results: usize) -> CapabilityResult<Vec<Snippet>> {
        let limit = max_results.to_string();
        let response = self
            .http
            .get(format!("{}/w/api.php", self.base_url))
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("format", "json"),
                ("utf8", "1"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| classify_transport(WIKIPEDIA, &e))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("HTTP {}", status.as_u16());
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                CapabilityError::transient(WIKIPEDIA, message)
            } else {
                CapabilityError::permanent(WIKIPEDIA, message)
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::permanent(WIKIPEDIA, e.to_string()))?;

        Ok(parsed
            .query
            .map(|q| q.search)
            .unwrap_or_default()
            .into_iter()
            .take(max_results)
            .map(|hit| Snippet {
                source_id: self.article_url(&hit.title),
                text: format!("{}\n{}", hit.title, strip_markup(&hit.snippet)),
                lookup: WIKIPEDIA.to_string(),
            })
            .collect())
    }
}
