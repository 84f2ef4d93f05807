use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Map, Value};

use replog_core::domain::draft::{InteractionDraft, InteractionPatch};

use crate::extractor::FieldExtractor;
use crate::llm::{
    ChatMessage, CompletionOutcome, Role, ToolInvocation, ToolSchema, UnderstandingClient,
    UnderstandingError, TOOL_EDIT_INTERACTION, TOOL_LOG_INTERACTION, TOOL_SEARCH_HCP,
    TOOL_SET_USER_NAME,
};
use crate::router::{decide, ActionRequest};

/// Deterministic understanding client for development and tests. Runs the
/// field extractor and the router's decision rules locally and emits the
/// same closed tool calls a hosted model would. Context it cannot see (the
/// caller's last-interaction id) is left for the pipeline's deterministic
/// fallback: those messages come back as a plain assistant turn.
#[derive(Clone, Debug, Default)]
pub struct RuleBasedClient {
    extractor: FieldExtractor,
    reference_date: Option<NaiveDate>,
}

impl RuleBasedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the reference date instead of using the wall clock.
    pub fn with_reference_date(reference_date: NaiveDate) -> Self {
        Self { extractor: FieldExtractor::new(), reference_date: Some(reference_date) }
    }

    fn today(&self) -> NaiveDate {
        self.reference_date.unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[async_trait]
impl UnderstandingClient for RuleBasedClient {
    async fn complete(
        &self,
        history: &[ChatMessage],
        _tools: &[ToolSchema],
    ) -> Result<CompletionOutcome, UnderstandingError> {
        let last_human = history
            .iter()
            .rev()
            .find(|message| message.role == Role::Human)
            .ok_or_else(|| {
                UnderstandingError::Malformed("history carries no user message".to_string())
            })?;

        let today = self.today();
        let extraction = self.extractor.extract(history, today);
        let action = decide(
            &last_human.content,
            &extraction.draft,
            extraction.user_name.as_deref(),
            None,
        );

        let outcome = match action {
            ActionRequest::CreateInteraction { draft } => {
                CompletionOutcome::ToolCalls(vec![ToolInvocation {
                    name: TOOL_LOG_INTERACTION.to_string(),
                    arguments: draft_arguments(&draft),
                }])
            }
            ActionRequest::EditInteraction { id, updates } => {
                let mut arguments = patch_arguments(&updates);
                arguments.insert("interaction_id".to_string(), json!(id.0));
                CompletionOutcome::ToolCalls(vec![ToolInvocation {
                    name: TOOL_EDIT_INTERACTION.to_string(),
                    arguments: Value::Object(arguments),
                }])
            }
            ActionRequest::SearchHcp { query } => {
                CompletionOutcome::ToolCalls(vec![ToolInvocation {
                    name: TOOL_SEARCH_HCP.to_string(),
                    arguments: json!({ "query": query }),
                }])
            }
            ActionRequest::SetUserName { name } => {
                CompletionOutcome::ToolCalls(vec![ToolInvocation {
                    name: TOOL_SET_USER_NAME.to_string(),
                    arguments: json!({ "name": name }),
                }])
            }
            // Anaphora or nothing actionable: defer to the pipeline's own
            // decision, which sees the caller's context.
            ActionRequest::NoAction => CompletionOutcome::Assistant(String::new()),
        };

        Ok(outcome)
    }
}

fn draft_arguments(draft: &InteractionDraft) -> Value {
    let mut arguments = Map::new();
    insert_string(&mut arguments, "hcp_name", draft.hcp_name.as_deref());
    insert_string(&mut arguments, "attendees", draft.attendees.as_deref());
    if let Some(date) = draft.date {
        arguments.insert("date".to_string(), json!(date.format("%Y-%m-%d").to_string()));
    }
    insert_string(&mut arguments, "time", draft.time.as_deref());
    if let Some(kind) = draft.interaction_type {
        arguments.insert("interaction_type".to_string(), json!(kind.as_str()));
    }
    insert_string(&mut arguments, "topics", draft.topics.as_deref());
    insert_string(&mut arguments, "materials_distributed", draft.materials_distributed.as_deref());
    if let Some(outcome) = draft.outcome {
        arguments.insert("outcomes".to_string(), json!(outcome.as_str()));
    }
    insert_string(&mut arguments, "follow_up", draft.follow_up.as_deref());
    insert_string(&mut arguments, "summary", draft.summary.as_deref());
    Value::Object(arguments)
}

fn patch_arguments(patch: &InteractionPatch) -> Map<String, Value> {
    let mut arguments = Map::new();
    insert_string(&mut arguments, "hcp_name", patch.hcp_name.as_deref());
    insert_string(&mut arguments, "attendees", patch.attendees.as_deref());
    if let Some(date) = patch.date {
        arguments.insert("date".to_string(), json!(date.format("%Y-%m-%d").to_string()));
    }
    insert_string(&mut arguments, "time", patch.time.as_deref());
    if let Some(kind) = patch.interaction_type {
        arguments.insert("interaction_type".to_string(), json!(kind.as_str()));
    }
    insert_string(&mut arguments, "topics", patch.topics.as_deref());
    insert_string(&mut arguments, "materials_distributed", patch.materials_distributed.as_deref());
    if let Some(outcome) = patch.outcome {
        arguments.insert("outcomes".to_string(), json!(outcome.as_str()));
    }
    insert_string(&mut arguments, "follow_up", patch.follow_up.as_deref());
    insert_string(&mut arguments, "summary", patch.summary.as_deref());
    arguments
}

fn insert_string(arguments: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        arguments.insert(key.to_string(), json!(value));
    }
}
