use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Assistant,
    Tool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn human(content: impl Into<String>) -> Self {
        Self { role: Role::Human, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self { role: Role::Tool, content: content.into() }
    }
}

/// Schema advertised to the understanding service for one callable action.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// A tool call proposed by the understanding service. Arguments arrive as
/// loosely-typed JSON and must pass the router's parse-or-reject boundary.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CompletionOutcome {
    Assistant(String),
    ToolCalls(Vec<ToolInvocation>),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UnderstandingError {
    #[error("completion request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed completion response: {0}")]
    Malformed(String),
    #[error("unsupported tool requested: {0}")]
    UnsupportedTool(String),
}

/// Black-box seam to the language-understanding collaborator. One call per
/// pipeline run; failures and timeouts surface as typed errors and are fatal
/// to the request.
#[async_trait]
pub trait UnderstandingClient: Send + Sync {
    async fn complete(
        &self,
        history: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> Result<CompletionOutcome, UnderstandingError>;
}

pub const TOOL_LOG_INTERACTION: &str = "log_interaction";
pub const TOOL_EDIT_INTERACTION: &str = "edit_interaction";
pub const TOOL_SEARCH_HCP: &str = "search_hcp";
pub const TOOL_SET_USER_NAME: &str = "set_user_name";

/// The closed set of actions the understanding service may request. Anything
/// outside this set is rejected as a collaborator failure.
pub fn interaction_tool_schemas() -> Vec<ToolSchema> {
    let field_properties = json!({
        "hcp_name": { "type": "string", "description": "Full name of the doctor/HCP" },
        "attendees": { "type": "string", "description": "Other attendees, comma-separated" },
        "date": { "type": "string", "description": "Date in YYYY-MM-DD format" },
        "time": { "type": "string", "description": "Clock time, e.g. 14:30" },
        "interaction_type": { "type": "string", "enum": ["Meeting", "Call", "Email", "Virtual"] },
        "topics": { "type": "string", "description": "Main topics discussed" },
        "materials_distributed": { "type": "string", "description": "Materials or samples given" },
        "outcomes": { "type": "string", "enum": ["Positive", "Neutral", "Negative"] },
        "follow_up": { "type": "string", "description": "Planned follow-up actions" },
        "summary": { "type": "string", "description": "Short 1-2 sentence summary" }
    });

    let mut edit_properties = field_properties.clone();
    if let Some(map) = edit_properties.as_object_mut() {
        map.insert(
            "interaction_id".to_string(),
            json!({ "type": "string", "description": "Id of the interaction to edit" }),
        );
    }

    vec![
        ToolSchema {
            name: TOOL_LOG_INTERACTION,
            description: "Log a new interaction with a healthcare professional into the CRM.",
            parameters: json!({
                "type": "object",
                "properties": field_properties,
                "required": ["hcp_name"]
            }),
        },
        ToolSchema {
            name: TOOL_EDIT_INTERACTION,
            description: "Edit an existing interaction. Provide only the fields that change.",
            parameters: json!({
                "type": "object",
                "properties": edit_properties,
                "required": []
            }),
        },
        ToolSchema {
            name: TOOL_SEARCH_HCP,
            description: "Search logged interactions by HCP name.",
            parameters: json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            }),
        },
        ToolSchema {
            name: TOOL_SET_USER_NAME,
            description: "Remember the field representative's own name.",
            parameters: json!({
                "type": "object",
                "properties": { "name": { "type": "string" } },
                "required": ["name"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::{interaction_tool_schemas, ChatMessage, Role};

    #[test]
    fn schema_set_is_closed_and_stable() {
        let schemas = interaction_tool_schemas();
        let names: Vec<&str> = schemas.iter().map(|schema| schema.name).collect();
        assert_eq!(
            names,
            vec!["log_interaction", "edit_interaction", "search_hcp", "set_user_name"]
        );
    }

    #[test]
    fn log_interaction_requires_an_hcp_name() {
        let schemas = interaction_tool_schemas();
        let log = schemas.iter().find(|schema| schema.name == "log_interaction").expect("schema");
        assert_eq!(log.parameters["required"][0], "hcp_name");
    }

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(ChatMessage::human("hi").role, Role::Human);
        assert_eq!(ChatMessage::assistant("ok").role, Role::Assistant);
        assert_eq!(ChatMessage::tool("{}").role, Role::Tool);
    }
}
