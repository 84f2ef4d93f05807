use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use replog_agent::{ChatPipeline, ChatRequest};
use replog_core::domain::interaction::{Interaction, InteractionId};
use replog_core::errors::{ApplicationError, InterfaceError};
use replog_core::gateway::InteractionGateway;

const LIST_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<ChatPipeline>,
    gateway: Arc<dyn InteractionGateway>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub message: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub last_interaction_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponseBody {
    pub reply: String,
    pub extracted_data: Value,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

pub fn router(pipeline: Arc<ChatPipeline>, gateway: Arc<dyn InteractionGateway>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/interactions", get(list_interactions))
        .with_state(AppState { pipeline, gateway })
}

pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Json<ChatResponseBody>, (StatusCode, Json<ErrorBody>)> {
    let correlation_id = Uuid::new_v4().to_string();
    let request = ChatRequest {
        message: body.message,
        user_name: body.user_name,
        last_interaction_id: body.last_interaction_id.map(InteractionId),
    };

    match state.pipeline.handle(request).await {
        Ok(outcome) => {
            tracing::info!(
                event_name = "chat.request_completed",
                correlation_id = %correlation_id,
                persisted_id = ?outcome.persisted_id,
                "chat pipeline run completed"
            );
            Ok(Json(ChatResponseBody {
                reply: outcome.reply,
                extracted_data: outcome.extracted_data,
            }))
        }
        Err(error) => Err(error_response(error, correlation_id)),
    }
}

pub async fn list_interactions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Interaction>>, (StatusCode, Json<ErrorBody>)> {
    let correlation_id = Uuid::new_v4().to_string();

    state
        .gateway
        .list(LIST_PAGE_SIZE, 0)
        .await
        .map(Json)
        .map_err(|error| {
            error_response(ApplicationError::Persistence(error.to_string()), correlation_id)
        })
}

fn error_response(
    error: ApplicationError,
    correlation_id: String,
) -> (StatusCode, Json<ErrorBody>) {
    tracing::error!(
        event_name = "chat.request_failed",
        correlation_id = %correlation_id,
        error = %error,
        "chat request failed"
    );

    let interface = error.into_interface(correlation_id.clone());
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(ErrorBody { error: interface.user_message().to_string(), correlation_id }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use chrono::Utc;

    use replog_agent::{ChatPipeline, RuleBasedClient};
    use replog_core::domain::draft::NewInteraction;
    use replog_core::domain::interaction::{InteractionType, Outcome};
    use replog_core::gateway::InteractionGateway;
    use replog_db::InMemoryInteractionRepository;

    use super::{chat, list_interactions, AppState, ChatRequestBody};

    fn state_with_gateway() -> (AppState, Arc<InMemoryInteractionRepository>) {
        let gateway = Arc::new(InMemoryInteractionRepository::default());
        let pipeline =
            Arc::new(ChatPipeline::new(Arc::new(RuleBasedClient::new()), gateway.clone()));
        (AppState { pipeline, gateway: gateway.clone() }, gateway)
    }

    fn body(message: &str) -> ChatRequestBody {
        ChatRequestBody { message: message.to_string(), user_name: None, last_interaction_id: None }
    }

    #[tokio::test]
    async fn chat_logs_a_new_interaction_and_echoes_the_payload() {
        let (state, gateway) = state_with_gateway();

        let Json(response) = chat(
            State(state),
            Json(body("Met Dr. Patel today about product efficacy, went well")),
        )
        .await
        .expect("chat should succeed");

        assert!(response.reply.contains("saved"), "reply: {}", response.reply);
        assert_eq!(response.extracted_data["hcp_name"], "Dr. Patel");
        assert!(gateway.most_recent().await.expect("query").is_some());
    }

    #[tokio::test]
    async fn chat_with_no_identifiable_hcp_replies_without_persisting() {
        let (state, gateway) = state_with_gateway();

        let Json(response) =
            chat(State(state), Json(body("just checking in"))).await.expect("chat ok");

        assert!(response.reply.contains('?'));
        assert!(gateway.most_recent().await.expect("query").is_none());
    }

    #[tokio::test]
    async fn chat_edit_uses_the_callers_last_interaction_id() {
        let (state, gateway) = state_with_gateway();
        let created = gateway
            .create(NewInteraction {
                hcp_name: "Dr. Patel".to_string(),
                attendees: None,
                date: Utc::now().date_naive(),
                time: None,
                interaction_type: InteractionType::Meeting,
                topics: None,
                materials_distributed: None,
                outcome: Outcome::Neutral,
                follow_up: None,
                summary: Some("intro".to_string()),
            })
            .await
            .expect("seed");

        let Json(response) = chat(
            State(state),
            Json(ChatRequestBody {
                message: "Edit the last one, set outcome to negative".to_string(),
                user_name: None,
                last_interaction_id: Some(created.id.0),
            }),
        )
        .await
        .expect("chat ok");

        assert!(response.reply.contains("updated"), "reply: {}", response.reply);
        let stored = gateway.find_by_id(created.id).await.expect("query").expect("exists");
        assert_eq!(stored.outcome, Outcome::Negative);
    }

    #[tokio::test]
    async fn interactions_listing_returns_stored_records() {
        let (state, gateway) = state_with_gateway();
        gateway
            .create(NewInteraction {
                hcp_name: "Dr. Mehta".to_string(),
                attendees: None,
                date: Utc::now().date_naive(),
                time: None,
                interaction_type: InteractionType::Call,
                topics: None,
                materials_distributed: None,
                outcome: Outcome::Neutral,
                follow_up: None,
                summary: None,
            })
            .await
            .expect("seed");

        let Json(records) = list_interactions(State(state)).await.expect("list ok");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hcp_name, "Dr. Mehta");
    }

    struct BrokenClient;

    #[async_trait::async_trait]
    impl replog_agent::UnderstandingClient for BrokenClient {
        async fn complete(
            &self,
            _history: &[replog_agent::ChatMessage],
            _tools: &[replog_agent::ToolSchema],
        ) -> Result<replog_agent::CompletionOutcome, replog_agent::UnderstandingError> {
            Err(replog_agent::UnderstandingError::Transport("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn collaborator_failure_surfaces_as_service_unavailable() {
        let gateway = Arc::new(InMemoryInteractionRepository::default());
        let pipeline = Arc::new(ChatPipeline::new(Arc::new(BrokenClient), gateway.clone()));
        let state = AppState { pipeline, gateway };

        let (status, Json(error)) = chat(State(state), Json(body("Met Dr. Patel today")))
            .await
            .expect_err("must fail");

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!error.correlation_id.is_empty());
    }
}
