// SPDX-License-Identifier: MIT

//! System prompts for each node, overridable from config

use serde::{Deserialize, Serialize};

/// Placeholder in the writer prompt replaced by the research context
pub const CONTENT_PLACEHOLDER: &str = "{content}";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Prompts {
    pub plan: String,
    /// May contain `{content}`
    pub writer: String,
    pub reflection: String,
    pub research_plan: String,
    pub research_critique: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            plan: "You are an expert essay planner. \
                   Create a clear, structured outline for the topic."
                .to_string(),
            writer: "You are an expert essay writer. \
                     Write or improve the essay below based on the topic and plan. \
                     Use this context: {content}"
                .to_string(),
            reflection: "You are a professor. Provide detailed critique on the essay.".to_string(),
            research_plan: "Generate up to 3 web search queries \
                            to gather relevant facts for writing this essay."
                .to_string(),
            research_critique: "Generate up to 3 search queries \
                                to find information for improving the essay after feedback."
                .to_string(),
        }
    }
}

impl Prompts {
    /// Writer system prompt with the context filled in
    pub fn writer_with_context(&self, context: &str) -> String {
        self.writer.replace(CONTENT_PLACEHOLDER, context)
    }
}
