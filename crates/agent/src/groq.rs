use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use replog_core::config::{LlmConfig, LlmProvider};
use replog_core::errors::ApplicationError;

use crate::llm::{
    ChatMessage, CompletionOutcome, Role, ToolInvocation, ToolSchema, UnderstandingClient,
    UnderstandingError,
};

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

const SYSTEM_PROMPT: &str = "\
You are an assistant for pharmaceutical field representatives logging \
interactions with healthcare professionals (HCPs). Parse the user's natural \
language description and extract: hcp_name, attendees, date (YYYY-MM-DD), \
time, interaction_type (Meeting|Call|Email|Virtual), topics, \
materials_distributed, outcomes (Positive|Neutral|Negative), follow_up, and \
summary. When the user describes a new interaction with an identifiable HCP, \
call log_interaction with the extracted fields. When they ask to modify an \
existing record, call edit_interaction with only the fields that change. \
When they ask to find an HCP, call search_hcp. When they only introduce \
themselves, call set_user_name. Never invent an HCP name; if none is \
identifiable, reply with a short clarifying question instead of calling a \
tool. Be precise, professional, and helpful.";

/// OpenAI-compatible chat-completions client. Groq (the default), OpenAI,
/// and Ollama all speak this dialect; only the base URL and auth differ.
pub struct GroqClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl GroqClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ApplicationError> {
        let default_base = match config.provider {
            LlmProvider::Groq => GROQ_BASE_URL,
            LlmProvider::OpenAi => OPENAI_BASE_URL,
            LlmProvider::Ollama => OLLAMA_BASE_URL,
            LlmProvider::Rules => {
                return Err(ApplicationError::Configuration(
                    "the rules provider has no remote endpoint".to_string(),
                ));
            }
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| default_base.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn build_payload(&self, history: &[ChatMessage], tools: &[ToolSchema]) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": SYSTEM_PROMPT })];
        messages.extend(history.iter().map(|message| {
            let role = match message.role {
                Role::Human => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            json!({ "role": role, "content": message.content })
        }));

        let tool_definitions: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect();

        json!({
            "model": self.model,
            "messages": messages,
            "tools": tool_definitions,
            "tool_choice": "auto",
            "temperature": 0.4,
        })
    }
}

#[async_trait]
impl UnderstandingClient for GroqClient {
    async fn complete(
        &self,
        history: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> Result<CompletionOutcome, UnderstandingError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = self.build_payload(history, tools);

        let mut request = self.http.post(url).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(error) if error.is_timeout() => return Err(UnderstandingError::Timeout),
            Err(error) => return Err(UnderstandingError::Transport(error.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UnderstandingError::Transport(format!(
                "completion endpoint returned {status}: {body}"
            )));
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|error| UnderstandingError::Malformed(error.to_string()))?;

        parse_response(body)
    }
}

fn parse_response(body: ApiResponse) -> Result<CompletionOutcome, UnderstandingError> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| UnderstandingError::Malformed("response carried no choices".to_string()))?;

    if let Some(tool_calls) = choice.message.tool_calls {
        if !tool_calls.is_empty() {
            let invocations = tool_calls
                .into_iter()
                .map(|call| {
                    let arguments =
                        serde_json::from_str(&call.function.arguments).map_err(|error| {
                            UnderstandingError::Malformed(format!(
                                "tool arguments are not valid JSON: {error}"
                            ))
                        })?;
                    Ok(ToolInvocation { name: call.function.name, arguments })
                })
                .collect::<Result<Vec<_>, UnderstandingError>>()?;
            return Ok(CompletionOutcome::ToolCalls(invocations));
        }
    }

    match choice.message.content {
        Some(content) if !content.trim().is_empty() => Ok(CompletionOutcome::Assistant(content)),
        _ => Err(UnderstandingError::Malformed(
            "response carried neither content nor tool calls".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    function: ApiFunction,
}

#[derive(Debug, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}
