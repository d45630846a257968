// SPDX-License-Identifier: MIT

use super::{RawSearchResult, SearchDepth, SearchProvider};
use crate::drafter::error::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::time::Duration;

const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";

/// Brave caps `count` at 20
const MAX_COUNT: u32 = 20;

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl From<BraveResult> for RawSearchResult {
    fn from(r: BraveResult) -> Self {
        RawSearchResult {
            url: r.url,
            title: r.title,
            content: r.description,
            ..Default::default()
        }
    }
}

pub struct BraveSearch {
    client: Client,
    api_key: String,
}

impl BraveSearch {
    /// Requires `BRAVE_API_KEY` to be set.
    pub fn new(timeout: Option<Duration>) -> Result<Self, SearchError> {
        let api_key = env::var("BRAVE_API_KEY")
            .map_err(|_| SearchError::ApiKeyMissing("brave".to_string()))?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_key,
        })
    }

    fn parse_results(body: Value) -> Result<Vec<RawSearchResult>, SearchError> {
        let results_json = body
            .get("web")
            .and_then(|w| w.get("results"))
            .cloned()
            // Brave omits `web` entirely when nothing matched.
            .unwrap_or_else(|| Value::Array(vec![]));

        let results: Vec<BraveResult> = serde_json::from_value(results_json).map_err(|e| {
            SearchError::InvalidResponse(format!("malformed web.results: {}", e))
        })?;

        Ok(results.into_iter().map(RawSearchResult::from).collect())
    }
}

#[async_trait]
impl SearchProvider for BraveSearch {
    fn name(&self) -> &str {
        "brave"
    }

    async fn search(
        &self,
        query: &str,
        max_results: u32,
        _depth: SearchDepth,
    ) -> Result<Vec<RawSearchResult>, SearchError> {
        let count = max_results.clamp(1, MAX_COUNT);

        let mut url = reqwest::Url::parse(BRAVE_SEARCH_URL)
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("count", &count.to_string());

        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(SearchError::Api {
                provider: "brave".to_string(),
                status: status.as_u16(),
                message: text,
            });
        }

        let body: Value = resp.json().await?;
        let mut results = Self::parse_results(body)?;
        results.truncate(max_results as usize);
        Ok(results)
    }
}
