// SPDX-License-Identifier: MIT

use super::{RawSearchResult, SearchDepth, SearchProvider};
use crate::drafter::error::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::env;
use std::time::Duration;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<RawSearchResult>,
}

pub struct TavilySearch {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl TavilySearch {
    /// Requires `TAVILY_API_KEY` to be set.
    pub fn new(timeout: Option<Duration>) -> Result<Self, SearchError> {
        let api_key = env::var("TAVILY_API_KEY")
            .map_err(|_| SearchError::ApiKeyMissing("tavily".to_string()))?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_key,
            endpoint: TAVILY_SEARCH_URL.to_string(),
        })
    }

    fn request_body(query: &str, max_results: u32, depth: SearchDepth) -> serde_json::Value {
        json!({
            "query": query,
            "max_results": max_results,
            "search_depth": depth.as_str()
        })
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(
        &self,
        query: &str,
        max_results: u32,
        depth: SearchDepth,
    ) -> Result<Vec<RawSearchResult>, SearchError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&Self::request_body(query, max_results, depth))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(SearchError::Api {
                provider: "tavily".to_string(),
                status: status.as_u16(),
                message: text,
            });
        }

        let body: TavilyResponse = resp.json().await?;
        log::debug!("Tavily returned {} results for '{}'", body.results.len(), query);

        let mut results = body.results;
        results.truncate(max_results as usize);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body() {
        let body = TavilySearch::request_body("rust async", 2, SearchDepth::Advanced);
        assert_eq!(body["query"], "rust async");
        assert_eq!(body["max_results"], 2);
        assert_eq!(body["search_depth"], "advanced");
    }

    #[test]
    fn test_parse_response() {
        let body: TavilyResponse = serde_json::from_value(json!({
            "query": "q",
            "results": [
                {"title": "A", "url": "https://a", "content": "alpha", "score": 0.8},
                {"title": "B", "url": "https://b", "content": "beta", "score": 0.5}
            ]
        }))
        .unwrap();
        assert_eq!(body.results.len(), 2);
        assert_eq!(body.results[1].clone().normalize().content, "beta");
    }

    #[test]
    fn test_parse_response_without_results() {
        let body: TavilyResponse = serde_json::from_value(json!({"query": "q"})).unwrap();
        assert!(body.results.is_empty());
    }
}
