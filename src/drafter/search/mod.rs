// SPDX-License-Identifier: MIT

//! Web search collaborator
//!
//! Providers return loosely shaped results; [`RawSearchResult::normalize`]
//! reconciles their field names into a [`Source`].

mod brave;
mod tavily;

pub use brave::BraveSearch;
pub use tavily::TavilySearch;

use crate::drafter::error::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_SOURCE: &str = "Unknown Source";
pub const UNTITLED: &str = "Untitled";

/// How hard the provider should look
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}

/// One retrieved document with reconciled field names
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    pub title: String,
    pub content: String,
}

/// A search hit as providers report it
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawSearchResult {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl RawSearchResult {
    /// Reconcile field names: `url` falls back to `link`, `title` to
    /// `heading` then `name`, `content` to `text`
    pub fn normalize(self) -> Source {
        Source {
            url: self
                .url
                .or(self.link)
                .unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
            title: self
                .title
                .or(self.heading)
                .or(self.name)
                .unwrap_or_else(|| UNTITLED.to_string()),
            content: self.content.or(self.text).unwrap_or_default(),
        }
    }
}

/// Trait for web search providers
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Run `query`, returning at most `max_results` hits
    async fn search(
        &self,
        query: &str,
        max_results: u32,
        depth: SearchDepth,
    ) -> Result<Vec<RawSearchResult>, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_fallback_fields() {
        let raw: RawSearchResult = serde_json::from_value(json!({
            "link": "http://x",
            "heading": "H",
            "text": "body"
        }))
        .unwrap();
        assert_eq!(
            raw.normalize(),
            Source {
                url: "http://x".to_string(),
                title: "H".to_string(),
                content: "body".to_string(),
            }
        );
    }

    #[test]
    fn test_normalize_missing_fields_use_sentinels() {
        let raw: RawSearchResult = serde_json::from_value(json!({})).unwrap();
        assert_eq!(
            raw.normalize(),
            Source {
                url: "Unknown Source".to_string(),
                title: "Untitled".to_string(),
                content: String::new(),
            }
        );
    }

    #[test]
    fn test_normalize_prefers_primary_fields() {
        let raw = RawSearchResult {
            url: Some("u".into()),
            link: Some("l".into()),
            title: None,
            heading: None,
            name: Some("n".into()),
            content: Some("c".into()),
            text: Some("t".into()),
        };
        let source = raw.normalize();
        assert_eq!(source.url, "u");
        assert_eq!(source.title, "n");
        assert_eq!(source.content, "c");
    }

    #[test]
    fn test_raw_result_ignores_unknown_fields() {
        let raw: RawSearchResult =
            serde_json::from_value(json!({"url": "u", "score": 0.9, "raw_content": null})).unwrap();
        assert_eq!(raw.url.as_deref(), Some("u"));
    }

    #[test]
    fn test_search_depth_serde() {
        let depth: SearchDepth = serde_yaml::from_str("advanced").unwrap();
        assert_eq!(depth, SearchDepth::Advanced);
        assert_eq!(SearchDepth::default().as_str(), "basic");
    }
}
