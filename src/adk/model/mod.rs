// SPDX-License-Identifier: MIT

//! Model module - defines the LLM model trait and shared types
//!
//! This module provides the core Model trait and message types.
//! Model implementations are in their own submodules:
//! - [openai] - OpenAI-compatible chat completions API

pub mod openai;

use crate::adk::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// JSON schema the model must answer with (structured output)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseSchema {
    /// Schema name reported to the provider
    pub name: String,
    /// JSON Schema document
    pub schema: serde_json::Value,
}

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
    /// When set, the model is asked to reply with JSON matching this schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<ResponseSchema>,
}

impl GenerationConfig {
    /// Copy of this config requesting structured output
    pub fn with_response_schema(&self, schema: ResponseSchema) -> Self {
        Self {
            response_schema: Some(schema),
            ..self.clone()
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

/// Parts of a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Part {
    /// Regular text output from the model
    Text(String),
    /// The model declined to answer (structured output refusals)
    Refusal(String),
}

impl Content {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Concatenated text parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Refusal(_) => None,
            })
            .collect()
    }

    /// First refusal part, if the model declined
    pub fn refusal(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            Part::Refusal(r) => Some(r.as_str()),
            Part::Text(_) => None,
        })
    }
}

/// Core trait for LLM model implementations
#[async_trait]
pub trait Model: Send + Sync {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, ModelError>;
}

/// Run one model call and return its text
pub async fn invoke(
    model: &dyn Model,
    history: &[Content],
    config: Option<&GenerationConfig>,
) -> Result<String, ModelError> {
    let response = model.generate_content(history, config).await?;
    if let Some(refusal) = response.refusal() {
        return Err(ModelError::InvalidResponse(format!(
            "model refused: {}",
            refusal
        )));
    }
    Ok(response.text())
}
