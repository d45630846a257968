// SPDX-License-Identifier: MIT

//! The five node functions of the drafting graph
//!
//! Each takes the current state by reference and returns only the fields it
//! changed. Collaborator failures are returned as-is.

use super::prompts::Prompts;
use super::queries::{parse_queries, queries_schema};
use super::state::{StateUpdate, WorkflowState};
use crate::adk::model::{invoke, Content, GenerationConfig, Model};
use crate::drafter::error::{DrafterError, MalformedStructuredOutput};
use crate::drafter::search::{SearchDepth, SearchProvider};
use std::sync::Arc;

/// Tunables shared by all steps
#[derive(Debug, Clone)]
pub struct StepSettings {
    pub prompts: Prompts,
    pub generation: GenerationConfig,
    /// Upper bound on queries per research step
    pub max_queries: usize,
    pub results_per_query: u32,
    pub search_depth: SearchDepth,
    /// Joins `content` items into the writer's context
    pub context_separator: String,
    /// Caps the context sent to the writer; the state keeps everything
    pub max_context_chars: Option<usize>,
}

impl Default for StepSettings {
    fn default() -> Self {
        Self {
            prompts: Prompts::default(),
            generation: GenerationConfig {
                temperature: Some(0.0),
                ..Default::default()
            },
            max_queries: 3,
            results_per_query: 2,
            search_depth: SearchDepth::Basic,
            context_separator: "\n\n".to_string(),
            max_context_chars: None,
        }
    }
}

/// Collaborators and settings handed to every step
#[derive(Clone)]
pub struct StepContext {
    pub model: Arc<dyn Model>,
    pub search: Arc<dyn SearchProvider>,
    pub settings: StepSettings,
}

impl StepContext {
    pub fn new(model: Arc<dyn Model>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            model,
            search,
            settings: StepSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: StepSettings) -> Self {
        self.settings = settings;
        self
    }

    async fn complete(&self, system: String, user: String) -> Result<String, DrafterError> {
        let history = [Content::system(system), Content::user(user)];
        Ok(invoke(self.model.as_ref(), &history, Some(&self.settings.generation)).await?)
    }
}

/// Outline the task
pub async fn plan(ctx: &StepContext, state: &WorkflowState) -> Result<StateUpdate, DrafterError> {
    let plan = ctx
        .complete(ctx.settings.prompts.plan.clone(), state.task.clone())
        .await?;
    Ok(StateUpdate {
        plan: Some(plan),
        ..Default::default()
    })
}

/// Search for material on the task
pub async fn research_plan(
    ctx: &StepContext,
    state: &WorkflowState,
) -> Result<StateUpdate, DrafterError> {
    research(ctx, &ctx.settings.prompts.research_plan, &state.task).await
}

/// Write a new draft from task, plan and all gathered content
pub async fn generate(
    ctx: &StepContext,
    state: &WorkflowState,
) -> Result<StateUpdate, DrafterError> {
    let context = build_context(
        &state.content,
        &ctx.settings.context_separator,
        ctx.settings.max_context_chars,
    );
    let draft = ctx
        .complete(
            ctx.settings.prompts.writer_with_context(&context),
            format!("Topic: {}\n\nPlan: {}", state.task, state.plan),
        )
        .await?;

    Ok(StateUpdate {
        draft: Some(draft),
        revision_number: Some(state.revision_number.saturating_add(1)),
        ..Default::default()
    })
}

/// Critique the current draft
pub async fn reflect(
    ctx: &StepContext,
    state: &WorkflowState,
) -> Result<StateUpdate, DrafterError> {
    let critique = ctx
        .complete(ctx.settings.prompts.reflection.clone(), state.draft.clone())
        .await?;
    Ok(StateUpdate {
        critique: Some(critique),
        ..Default::default()
    })
}

/// Search for material that addresses the critique
pub async fn research_critique(
    ctx: &StepContext,
    state: &WorkflowState,
) -> Result<StateUpdate, DrafterError> {
    research(ctx, &ctx.settings.prompts.research_critique, &state.critique).await
}

async fn research(
    ctx: &StepContext,
    instruction: &str,
    input: &str,
) -> Result<StateUpdate, DrafterError> {
    let queries = generate_queries(ctx, instruction, input).await?;
    let mut update = StateUpdate::default();

    for query in &queries {
        let results = ctx
            .search
            .search(
                query,
                ctx.settings.results_per_query,
                ctx.settings.search_depth,
            )
            .await?;
        log::info!(
            "Search '{}' via {} returned {} results",
            query,
            ctx.search.name(),
            results.len()
        );

        for raw in results {
            let source = raw.normalize();
            update.content.push(source.content.clone());
            update.sources.push(source);
        }
    }

    Ok(update)
}

async fn generate_queries(
    ctx: &StepContext,
    instruction: &str,
    input: &str,
) -> Result<Vec<String>, DrafterError> {
    let history = [Content::system(instruction), Content::user(input)];
    let config = ctx.settings.generation.with_response_schema(queries_schema());
    let response = ctx.model.generate_content(&history, Some(&config)).await?;

    if let Some(refusal) = response.refusal() {
        return Err(MalformedStructuredOutput::new("model refused", refusal).into());
    }
    Ok(parse_queries(&response.text(), ctx.settings.max_queries)?)
}

/// Join content into one context blob, optionally capped in characters
pub fn build_context(content: &[String], separator: &str, max_chars: Option<usize>) -> String {
    let mut context = content.join(separator);
    if let Some(max_chars) = max_chars {
        if let Some((cut, _)) = context.char_indices().nth(max_chars) {
            log::debug!(
                "Context capped at {} chars (of {} bytes)",
                max_chars,
                context.len()
            );
            context.truncate(cut);
        }
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::ModelError;
    use crate::adk::model::Part;
    use crate::drafter::error::SearchError;
    use crate::drafter::search::RawSearchResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with `structured` when a schema is requested, else `text`
    struct ScriptedModel {
        text: String,
        structured: String,
        refuse_structured: bool,
        calls: Mutex<Vec<Vec<Content>>>,
    }

    impl ScriptedModel {
        fn new(text: &str, structured: &str) -> Self {
            Self {
                text: text.to_string(),
                structured: structured.to_string(),
                refuse_structured: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Sends `structured` back as a refusal instead of text
        fn refusing(reason: &str) -> Self {
            Self {
                refuse_structured: true,
                ..Self::new("", reason)
            }
        }
    }

    #[async_trait]
    impl Model for ScriptedModel {
        async fn generate_content(
            &self,
            history: &[Content],
            config: Option<&GenerationConfig>,
        ) -> Result<Content, ModelError> {
            self.calls.lock().unwrap().push(history.to_vec());
            let structured = config.is_some_and(|c| c.response_schema.is_some());
            if structured && self.refuse_structured {
                return Ok(Content {
                    role: "model".to_string(),
                    parts: vec![Part::Refusal(self.structured.clone())],
                });
            }
            Ok(Content::model(if structured {
                &self.structured
            } else {
                &self.text
            }))
        }
    }

    /// Returns `per_query` hits per query, named after the query
    struct StaticSearch {
        queries: Mutex<Vec<(String, u32)>>,
        fail: bool,
    }

    impl StaticSearch {
        fn new() -> Self {
            Self {
                queries: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl SearchProvider for StaticSearch {
        fn name(&self) -> &str {
            "static"
        }

        async fn search(
            &self,
            query: &str,
            max_results: u32,
            _depth: SearchDepth,
        ) -> Result<Vec<RawSearchResult>, SearchError> {
            if self.fail {
                return Err(SearchError::InvalidResponse("down".to_string()));
            }
            self.queries
                .lock()
                .unwrap()
                .push((query.to_string(), max_results));
            Ok((0..max_results)
                .map(|i| RawSearchResult {
                    link: Some(format!("https://{}/{}", query, i)),
                    text: Some(format!("{} #{}", query, i)),
                    ..Default::default()
                })
                .collect())
        }
    }

    fn context(
        model: ScriptedModel,
        search: StaticSearch,
    ) -> (StepContext, Arc<ScriptedModel>, Arc<StaticSearch>) {
        let model = Arc::new(model);
        let search = Arc::new(search);
        (
            StepContext::new(model.clone(), search.clone()),
            model,
            search,
        )
    }

    #[tokio::test]
    async fn test_plan_sets_plan_only() {
        let (ctx, model, _) = context(ScriptedModel::new("OUTLINE", ""), StaticSearch::new());
        let state = WorkflowState::new("AI in education", 2);

        let update = plan(&ctx, &state).await.unwrap();

        assert_eq!(update.plan.as_deref(), Some("OUTLINE"));
        assert!(update.content.is_empty());
        assert_eq!(update.revision_number, None);
        let calls = model.calls.lock().unwrap();
        assert_eq!(calls[0][1].text(), "AI in education");
    }

    #[tokio::test]
    async fn test_research_plan_appends_normalized_results() {
        let (ctx, _, search) = context(
            ScriptedModel::new("", r#"{"queries": ["a", "b", "c", "d"]}"#),
            StaticSearch::new(),
        );
        let state = WorkflowState::new("T", 1);

        let update = research_plan(&ctx, &state).await.unwrap();

        let searched = search.queries.lock().unwrap().clone();
        assert_eq!(
            searched,
            vec![("a".to_string(), 2), ("b".to_string(), 2), ("c".to_string(), 2)]
        );
        assert_eq!(update.content.len(), 6);
        assert_eq!(update.sources.len(), 6);
        assert_eq!(update.content[0], "a #0");
        assert_eq!(update.sources[0].url, "https://a/0");
        assert_eq!(update.sources[0].title, "Untitled");
    }

    #[tokio::test]
    async fn test_research_critique_queries_from_critique_and_returns_new_items() {
        let (ctx, model, _) = context(
            ScriptedModel::new("", r#"{"queries": ["fix"]}"#),
            StaticSearch::new(),
        );
        let mut state = WorkflowState::new("T", 1);
        state.critique = "cite more studies".to_string();
        state.content = vec!["old".to_string()];

        let update = research_critique(&ctx, &state).await.unwrap();

        assert_eq!(update.content, vec!["fix #0", "fix #1"]);
        assert_eq!(state.content, vec!["old"]);
        let calls = model.calls.lock().unwrap();
        assert_eq!(calls[0][1].text(), "cite more studies");
    }

    #[tokio::test]
    async fn test_malformed_queries_are_fatal() {
        let (ctx, _, search) = context(
            ScriptedModel::new("", "I think you should search for things"),
            StaticSearch::new(),
        );
        let err = research_plan(&ctx, &WorkflowState::new("T", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, DrafterError::MalformedOutput(_)));
        assert!(search.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refused_queries_are_fatal() {
        let (ctx, model, search) = context(
            ScriptedModel::refusing("I can't help with that."),
            StaticSearch::new(),
        );
        let mut state = WorkflowState::new("T", 1);
        state.critique = "needs sources".to_string();

        let err = research_critique(&ctx, &state).await.unwrap_err();

        match err {
            DrafterError::MalformedOutput(e) => assert!(e.raw.contains("can't help")),
            other => panic!("expected malformed output, got {:?}", other),
        }
        assert!(search.queries.lock().unwrap().is_empty());
        assert_eq!(model.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_error_propagates() {
        let mut search = StaticSearch::new();
        search.fail = true;
        let (ctx, _, _) = context(ScriptedModel::new("", r#"{"queries": ["a"]}"#), search);

        let err = research_plan(&ctx, &WorkflowState::new("T", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DrafterError::Search(_)));
    }

    #[tokio::test]
    async fn test_generate_bumps_revision_and_uses_context() {
        let (ctx, model, _) = context(ScriptedModel::new("DRAFT", ""), StaticSearch::new());
        let mut state = WorkflowState::new("T", 3).with_revision_number(2);
        state.plan = "P".to_string();
        state.content = vec!["fact one".to_string(), "fact two".to_string()];

        let update = generate(&ctx, &state).await.unwrap();

        assert_eq!(update.draft.as_deref(), Some("DRAFT"));
        assert_eq!(update.revision_number, Some(3));
        assert_eq!(state.revision_number, 2);

        let calls = model.calls.lock().unwrap();
        assert!(calls[0][0].text().ends_with("fact one\n\nfact two"));
        assert_eq!(calls[0][1].text(), "Topic: T\n\nPlan: P");
    }

    #[tokio::test]
    async fn test_reflect_reads_draft() {
        let (ctx, model, _) = context(ScriptedModel::new("CRITIQUE", ""), StaticSearch::new());
        let mut state = WorkflowState::new("T", 1);
        state.draft = "my essay".to_string();

        let update = reflect(&ctx, &state).await.unwrap();

        assert_eq!(update.critique.as_deref(), Some("CRITIQUE"));
        assert_eq!(model.calls.lock().unwrap()[0][1].text(), "my essay");
    }

    #[test]
    fn test_build_context() {
        let content = vec!["ab".to_string(), "cd".to_string()];
        assert_eq!(build_context(&content, "\n\n", None), "ab\n\ncd");
        assert_eq!(build_context(&content, "|", Some(4)), "ab|c");
        assert_eq!(build_context(&content, "|", Some(50)), "ab|cd");
        assert_eq!(build_context(&[], "|", None), "");
    }

    #[test]
    fn test_build_context_cap_respects_char_boundaries() {
        let content = vec!["héllo".to_string()];
        assert_eq!(build_context(&content, "", Some(2)), "hé");
    }
}
