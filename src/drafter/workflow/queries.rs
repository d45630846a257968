// SPDX-License-Identifier: MIT

//! Structured search-query generation output

use crate::adk::model::ResponseSchema;
use crate::drafter::error::MalformedStructuredOutput;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Shape the model must answer with when asked for search queries
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Queries {
    pub queries: Vec<String>,
}

static QUERIES_SCHEMA: Lazy<ResponseSchema> = Lazy::new(|| {
    let mut schema = serde_json::to_value(schemars::schema_for!(Queries)).unwrap_or_else(|_| {
        json!({
            "type": "object",
            "properties": {"queries": {"type": "array", "items": {"type": "string"}}},
            "required": ["queries"],
            "additionalProperties": false
        })
    });
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
    }
    ResponseSchema {
        name: "queries".to_string(),
        schema,
    }
});

/// Response schema for query generation
pub fn queries_schema() -> ResponseSchema {
    QUERIES_SCHEMA.clone()
}

/// Drop a surrounding Markdown code fence, if any
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (e.g. "json") on the opening line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse the model's structured reply into at most `max` queries
///
/// Anything that is not `{"queries": [string, ...]}` is an error; an empty
/// list is not.
pub fn parse_queries(text: &str, max: usize) -> Result<Vec<String>, MalformedStructuredOutput> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(MalformedStructuredOutput::new("empty output", text));
    }

    let parsed: Queries = serde_json::from_str(body)
        .map_err(|e| MalformedStructuredOutput::new(format!("schema mismatch: {}", e), text))?;

    let mut queries: Vec<String> = parsed
        .queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();

    if queries.len() > max {
        log::warn!(
            "Model returned {} queries, keeping the first {}",
            queries.len(),
            max
        );
        queries.truncate(max);
    }

    Ok(queries)
}
