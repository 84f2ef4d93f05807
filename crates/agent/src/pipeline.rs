use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::debug;

use replog_core::compliance::{check_topics, ComplianceVerdict};
use replog_core::domain::draft::InteractionDraft;
use replog_core::domain::interaction::InteractionId;
use replog_core::errors::ApplicationError;
use replog_core::gateway::InteractionGateway;
use replog_core::pipeline::{next_state, PipelineState};
use replog_core::summary;

use crate::extractor::FieldExtractor;
use crate::llm::{
    interaction_tool_schemas, ChatMessage, CompletionOutcome, UnderstandingClient,
};
use crate::router::{
    decide, parse_invocation, references_last_record, ActionRequest, ActionRouter, RouteError,
    RoutedReply,
};

/// One inbound chat turn. Cross-turn context (`user_name`,
/// `last_interaction_id`) is supplied by the caller; the pipeline itself
/// keeps no state between requests.
#[derive(Clone, Debug, Default)]
pub struct ChatRequest {
    pub message: String,
    pub user_name: Option<String>,
    pub last_interaction_id: Option<InteractionId>,
}

/// Reply plus the structured payload the caller can render or retry with.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatOutcome {
    pub reply: String,
    pub extracted_data: Value,
    pub persisted_id: Option<InteractionId>,
}

/// Per-run conversation context. Created fresh for each incoming message,
/// mutated by the pipeline stages, discarded once the reply is produced.
#[derive(Clone, Debug)]
pub struct ConversationState {
    pub messages: Vec<ChatMessage>,
    pub draft: InteractionDraft,
    /// Extraction result before summary generation, used for partial-update
    /// semantics: an edit must carry only the fields the user mentioned.
    pub extracted: InteractionDraft,
    pub raw_user_input: String,
    pub last_interaction_id: Option<InteractionId>,
    pub user_name: Option<String>,
    detected_name: Option<String>,
}

impl ConversationState {
    fn new(request: &ChatRequest) -> Self {
        Self {
            messages: vec![ChatMessage::human(request.message.clone())],
            draft: InteractionDraft::default(),
            extracted: InteractionDraft::default(),
            raw_user_input: request.message.clone(),
            last_interaction_id: request.last_interaction_id,
            user_name: request.user_name.clone(),
            detected_name: None,
        }
    }
}

/// Single-pass orchestrator: extract, summarize when needed, check
/// compliance, route to exactly one action, reply.
pub struct ChatPipeline {
    extractor: FieldExtractor,
    client: Arc<dyn UnderstandingClient>,
    gateway: Arc<dyn InteractionGateway>,
    router: ActionRouter,
}

impl ChatPipeline {
    pub fn new(
        client: Arc<dyn UnderstandingClient>,
        gateway: Arc<dyn InteractionGateway>,
    ) -> Self {
        Self {
            extractor: FieldExtractor::new(),
            client,
            gateway: gateway.clone(),
            router: ActionRouter::new(gateway),
        }
    }

    pub async fn handle(&self, request: ChatRequest) -> Result<ChatOutcome, ApplicationError> {
        self.handle_at(request, Utc::now().date_naive()).await
    }

    /// Run the pipeline against an explicit reference date. Stage order is
    /// owned by the pure state machine; this runtime only executes stages.
    pub async fn handle_at(
        &self,
        request: ChatRequest,
        today: NaiveDate,
    ) -> Result<ChatOutcome, ApplicationError> {
        let mut state = ConversationState::new(&request);

        let mut stage = next_state(PipelineState::Start, &state.draft);
        debug!(stage = ?stage, "pipeline stage entered");
        self.run_extract(&mut state, today);

        stage = next_state(stage, &state.draft);
        if stage == PipelineState::Summarize {
            debug!(stage = ?stage, "pipeline stage entered");
            summary::ensure_summary(&mut state.draft, &state.raw_user_input);
            stage = next_state(stage, &state.draft);
        }

        debug!(stage = ?stage, "pipeline stage entered");
        state.draft.compliance = Some(check_topics(state.draft.topics.as_deref()));

        stage = next_state(stage, &state.draft);
        debug!(stage = ?stage, "pipeline stage entered");
        let routed = self.route(&mut state, today).await?;

        stage = next_state(stage, &state.draft);
        debug_assert!(stage.is_terminal());

        state.messages.push(ChatMessage::assistant(routed.reply.clone()));

        Ok(ChatOutcome {
            reply: routed.reply,
            extracted_data: routed.extracted_data,
            persisted_id: routed.persisted_id,
        })
    }

    fn run_extract(&self, state: &mut ConversationState, today: NaiveDate) {
        let extraction = self.extractor.extract(&state.messages, today);
        state.extracted = extraction.draft.clone();
        state.draft.merge(extraction.draft);
        state.detected_name = extraction.user_name.clone();
        if state.user_name.is_none() {
            state.user_name = extraction.user_name;
        }
    }

    /// The single understanding-service call happens here, inside the route
    /// stage. Its tool invocation is parsed through a closed action set; a
    /// plain assistant turn falls back to the deterministic decision rules.
    async fn route(
        &self,
        state: &mut ConversationState,
        today: NaiveDate,
    ) -> Result<RoutedReply, ApplicationError> {
        // Anaphora like "the last one" resolves against the caller-supplied
        // id when present, otherwise against a point-in-time snapshot of the
        // most recent stored record.
        if state.last_interaction_id.is_none()
            && references_last_record(&state.raw_user_input.to_ascii_lowercase())
        {
            state.last_interaction_id = self
                .gateway
                .most_recent()
                .await
                .map_err(|error| ApplicationError::Persistence(error.to_string()))?
                .map(|record| record.id);
        }

        let outcome = self
            .client
            .complete(&state.messages, &interaction_tool_schemas())
            .await
            .map_err(|error| ApplicationError::Understanding(error.to_string()))?;

        let (action, assistant_text) = match outcome {
            CompletionOutcome::ToolCalls(calls) => {
                let Some(invocation) = calls.into_iter().next() else {
                    return Err(ApplicationError::Understanding(
                        "completion returned an empty tool call list".to_string(),
                    ));
                };

                match parse_invocation(&invocation, state.last_interaction_id, today) {
                    Ok(action) => (action, None),
                    Err(RouteError::Invalid(error)) => {
                        return Ok(self.router.recover_validation(&error, &state.draft));
                    }
                    Err(error) => {
                        return Err(ApplicationError::Understanding(error.to_string()));
                    }
                }
            }
            CompletionOutcome::Assistant(text) => {
                let action = decide(
                    &state.raw_user_input,
                    &state.extracted,
                    state.detected_name.as_deref(),
                    state.last_interaction_id,
                );
                (action, Some(text))
            }
        };

        // Fold model-extracted fields into the working draft so the generated
        // summary and compliance verdict travel with the record.
        let action = match action {
            ActionRequest::CreateInteraction { draft } => {
                state.draft.merge(draft);
                state.draft.compliance = Some(check_topics(state.draft.topics.as_deref()));
                ActionRequest::CreateInteraction { draft: state.draft.clone() }
            }
            other => other,
        };

        let verdict = state.draft.compliance.unwrap_or(ComplianceVerdict::Clear);
        let routed = self
            .router
            .execute(action, verdict, &state.draft, today, assistant_text.as_deref())
            .await?;

        state.messages.push(ChatMessage::tool(routed.extracted_data.to_string()));
        Ok(routed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::json;

    use replog_core::domain::draft::NewInteraction;
    use replog_core::domain::interaction::{InteractionType, Outcome};
    use replog_core::errors::ApplicationError;
    use replog_core::gateway::InteractionGateway;
    use replog_db::repositories::InMemoryInteractionRepository;

    use super::{ChatPipeline, ChatRequest};
    use crate::llm::{
        ChatMessage, CompletionOutcome, ToolInvocation, ToolSchema, UnderstandingClient,
        UnderstandingError,
    };
    use crate::rules::RuleBasedClient;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 6).expect("valid date")
    }

    fn pipeline_with_gateway() -> (ChatPipeline, Arc<InMemoryInteractionRepository>) {
        let gateway = Arc::new(InMemoryInteractionRepository::default());
        let client = Arc::new(RuleBasedClient::with_reference_date(today()));
        (ChatPipeline::new(client, gateway.clone()), gateway)
    }

    fn request(message: &str) -> ChatRequest {
        ChatRequest { message: message.to_string(), ..ChatRequest::default() }
    }

    fn seed_record(hcp_name: &str) -> NewInteraction {
        NewInteraction {
            hcp_name: hcp_name.to_string(),
            attendees: None,
            date: today(),
            time: None,
            interaction_type: InteractionType::Meeting,
            topics: Some("introductions".to_string()),
            materials_distributed: None,
            outcome: Outcome::Neutral,
            follow_up: None,
            summary: Some("intro meeting".to_string()),
        }
    }

    #[tokio::test]
    async fn rich_report_is_extracted_summarized_and_saved() {
        let (pipeline, gateway) = pipeline_with_gateway();

        let outcome = pipeline
            .handle_at(request("Met Dr. Patel today about product efficacy, went well"), today())
            .await
            .expect("pipeline run");

        assert!(outcome.reply.contains("saved"), "reply confirms save: {}", outcome.reply);
        assert_eq!(outcome.extracted_data["hcp_name"], "Dr. Patel");
        assert_eq!(outcome.extracted_data["date"], "2026-08-06");
        assert_eq!(outcome.extracted_data["outcomes"], "Positive");
        assert!(outcome.extracted_data["topics"].as_str().is_some_and(|t| t.contains("efficacy")));

        let saved = gateway.most_recent().await.expect("query").expect("record saved");
        assert_eq!(saved.hcp_name, "Dr. Patel");
        assert_eq!(saved.date, today());
        assert_eq!(saved.interaction_type, InteractionType::Meeting);
        assert_eq!(saved.outcome, Outcome::Positive);
        assert!(saved.summary.as_deref().is_some_and(|s| !s.is_empty()), "summary generated");
        assert_eq!(outcome.persisted_id, Some(saved.id));
    }

    #[tokio::test]
    async fn restricted_topics_prefix_the_reply_with_a_warning() {
        let (pipeline, _gateway) = pipeline_with_gateway();

        let outcome = pipeline
            .handle_at(request("Discussed off-label use of the drug with Dr. Shah"), today())
            .await
            .expect("pipeline run");

        assert!(
            outcome.reply.starts_with("Compliance WARNING: Review with QA before logging."),
            "warning must prefix the reply: {}",
            outcome.reply
        );
    }

    #[tokio::test]
    async fn anaphoric_edit_applies_a_partial_update() {
        let (pipeline, gateway) = pipeline_with_gateway();
        let created = gateway.create(seed_record("Dr. Patel")).await.expect("seed");

        let outcome = pipeline
            .handle_at(
                ChatRequest {
                    message: "Edit the last one, set outcome to negative".to_string(),
                    user_name: None,
                    last_interaction_id: Some(created.id),
                },
                today(),
            )
            .await
            .expect("pipeline run");

        assert!(outcome.reply.contains("updated"), "reply: {}", outcome.reply);

        let updated =
            gateway.find_by_id(created.id).await.expect("query").expect("record exists");
        assert_eq!(updated.outcome, Outcome::Negative);
        // Partial-update law: untouched fields keep their stored values.
        assert_eq!(updated.hcp_name, created.hcp_name);
        assert_eq!(updated.topics, created.topics);
        assert_eq!(updated.summary, created.summary);
        assert_eq!(updated.date, created.date);
    }

    #[tokio::test]
    async fn anaphoric_edit_without_caller_context_resolves_via_most_recent() {
        let (pipeline, gateway) = pipeline_with_gateway();
        let older = gateway.create(seed_record("Dr. Patel")).await.expect("seed");
        let newest = gateway.create(seed_record("Dr. Shah")).await.expect("seed");

        let outcome = pipeline
            .handle_at(request("Edit the last one, set outcome to negative"), today())
            .await
            .expect("pipeline run");

        assert!(outcome.reply.contains("updated"), "reply: {}", outcome.reply);
        let touched = gateway.find_by_id(newest.id).await.expect("query").expect("exists");
        assert_eq!(touched.outcome, Outcome::Negative);
        let untouched = gateway.find_by_id(older.id).await.expect("query").expect("exists");
        assert_eq!(untouched.outcome, Outcome::Neutral);
    }

    #[tokio::test]
    async fn anaphoric_edit_with_an_empty_store_asks_for_clarification() {
        let (pipeline, gateway) = pipeline_with_gateway();

        let outcome = pipeline
            .handle_at(request("Edit the last one, set outcome to negative"), today())
            .await
            .expect("pipeline run");

        assert!(outcome.persisted_id.is_none());
        assert!(gateway.most_recent().await.expect("query").is_none());
        assert!(outcome.reply.contains('?'), "clarifying reply expected: {}", outcome.reply);
    }

    #[tokio::test]
    async fn search_enumerates_all_matching_records() {
        let (pipeline, gateway) = pipeline_with_gateway();
        let first = gateway.create(seed_record("Dr. Mehta")).await.expect("seed");
        let second = gateway.create(seed_record("Dr. Mehta")).await.expect("seed");

        let outcome =
            pipeline.handle_at(request("Find Dr. Mehta"), today()).await.expect("pipeline run");

        assert!(outcome.reply.contains(&format!("#{}", first.id)));
        assert!(outcome.reply.contains(&format!("#{}", second.id)));
        assert!(outcome.reply.contains("Dr. Mehta"));
        assert!(outcome.reply.contains("Meeting"));
        assert!(outcome.reply.contains("2026-08-06"));
        assert_eq!(
            outcome.extracted_data["results"].as_array().map(Vec::len),
            Some(2)
        );
    }

    #[tokio::test]
    async fn unidentifiable_message_asks_for_clarification_and_persists_nothing() {
        let (pipeline, gateway) = pipeline_with_gateway();

        let outcome =
            pipeline.handle_at(request("just checking in"), today()).await.expect("pipeline run");

        assert!(outcome.reply.contains('?'), "clarifying question expected: {}", outcome.reply);
        assert_eq!(outcome.persisted_id, None);
        assert!(gateway.most_recent().await.expect("query").is_none());
    }

    #[tokio::test]
    async fn self_introduction_sets_the_user_name() {
        let (pipeline, _gateway) = pipeline_with_gateway();

        let outcome = pipeline
            .handle_at(request("Hi, my name is John Smith"), today())
            .await
            .expect("pipeline run");

        assert!(outcome.reply.contains("John Smith"));
        assert_eq!(outcome.extracted_data["user_name"], "John Smith");
    }

    struct FailingClient;

    #[async_trait]
    impl UnderstandingClient for FailingClient {
        async fn complete(
            &self,
            _history: &[ChatMessage],
            _tools: &[ToolSchema],
        ) -> Result<CompletionOutcome, UnderstandingError> {
            Err(UnderstandingError::Timeout)
        }
    }

    #[tokio::test]
    async fn understanding_failure_is_fatal_to_the_request() {
        let gateway = Arc::new(InMemoryInteractionRepository::default());
        let pipeline = ChatPipeline::new(Arc::new(FailingClient), gateway.clone());

        let error = pipeline
            .handle_at(request("Met Dr. Patel today"), today())
            .await
            .expect_err("must fail");

        assert!(matches!(error, ApplicationError::Understanding(_)));
        assert!(gateway.most_recent().await.expect("query").is_none(), "nothing committed");
    }

    struct UnknownToolClient;

    #[async_trait]
    impl UnderstandingClient for UnknownToolClient {
        async fn complete(
            &self,
            _history: &[ChatMessage],
            _tools: &[ToolSchema],
        ) -> Result<CompletionOutcome, UnderstandingError> {
            Ok(CompletionOutcome::ToolCalls(vec![ToolInvocation {
                name: "drop_all_tables".to_string(),
                arguments: json!({}),
            }]))
        }
    }

    #[tokio::test]
    async fn unknown_tool_kind_is_a_collaborator_failure() {
        let gateway = Arc::new(InMemoryInteractionRepository::default());
        let pipeline = ChatPipeline::new(Arc::new(UnknownToolClient), gateway);

        let error = pipeline
            .handle_at(request("Met Dr. Patel today"), today())
            .await
            .expect_err("must fail");

        assert!(matches!(error, ApplicationError::Understanding(_)));
    }

    struct StubModelClient {
        outcome: CompletionOutcome,
    }

    #[async_trait]
    impl UnderstandingClient for StubModelClient {
        async fn complete(
            &self,
            _history: &[ChatMessage],
            _tools: &[ToolSchema],
        ) -> Result<CompletionOutcome, UnderstandingError> {
            Ok(self.outcome.clone())
        }
    }

    #[tokio::test]
    async fn invalid_tool_arguments_are_recovered_into_a_reply() {
        let gateway = Arc::new(InMemoryInteractionRepository::default());
        let client = StubModelClient {
            outcome: CompletionOutcome::ToolCalls(vec![ToolInvocation {
                name: "log_interaction".to_string(),
                arguments: json!({ "hcp_name": "Dr. Patel", "date": "next Tuesday" }),
            }]),
        };
        let pipeline = ChatPipeline::new(Arc::new(client), gateway.clone());

        let outcome = pipeline
            .handle_at(request("Met Dr. Patel next Tuesday"), today())
            .await
            .expect("recovered, not fatal");

        assert!(outcome.reply.contains("invalid date"), "reply: {}", outcome.reply);
        assert_eq!(outcome.persisted_id, None);
        assert!(gateway.most_recent().await.expect("query").is_none());
    }

    #[tokio::test]
    async fn model_assistant_turn_with_loggable_draft_still_creates() {
        let gateway = Arc::new(InMemoryInteractionRepository::default());
        let client = StubModelClient {
            outcome: CompletionOutcome::Assistant("Shall I log that?".to_string()),
        };
        let pipeline = ChatPipeline::new(Arc::new(client), gateway.clone());

        let outcome = pipeline
            .handle_at(request("Met Dr. Patel today about dosing"), today())
            .await
            .expect("pipeline run");

        assert!(outcome.persisted_id.is_some());
        let saved = gateway.most_recent().await.expect("query").expect("saved");
        assert_eq!(saved.hcp_name, "Dr. Patel");
    }

    #[tokio::test]
    async fn same_message_processed_twice_yields_the_same_draft_payload() {
        let (pipeline, _) = pipeline_with_gateway();
        let (other_pipeline, _) = pipeline_with_gateway();

        let first = pipeline
            .handle_at(request("Met Dr. Patel today about dosing"), today())
            .await
            .expect("run");
        let second = other_pipeline
            .handle_at(request("Met Dr. Patel today about dosing"), today())
            .await
            .expect("run");

        assert_eq!(first.extracted_data["hcp_name"], second.extracted_data["hcp_name"]);
        assert_eq!(first.extracted_data["summary"], second.extracted_data["summary"]);
        assert_eq!(first.extracted_data["topics"], second.extracted_data["topics"]);
    }
}
