use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use replog_core::compliance::ComplianceVerdict;
use replog_core::domain::draft::{InteractionDraft, InteractionPatch};
use replog_core::domain::interaction::{parse_date, InteractionId, Outcome};
use replog_core::errors::{ApplicationError, DomainError};
use replog_core::gateway::{GatewayError, InteractionGateway};

use crate::llm::{
    ToolInvocation, TOOL_EDIT_INTERACTION, TOOL_LOG_INTERACTION, TOOL_SEARCH_HCP,
    TOOL_SET_USER_NAME,
};

/// The single action one pipeline run converges to. Exactly one variant is
/// active per user message.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionRequest {
    CreateInteraction { draft: InteractionDraft },
    EditInteraction { id: InteractionId, updates: InteractionPatch },
    SearchHcp { query: String },
    SetUserName { name: String },
    NoAction,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RouteError {
    #[error("unsupported tool requested: {0}")]
    UnsupportedTool(String),
    #[error("malformed tool arguments: {0}")]
    MalformedArguments(String),
    #[error(transparent)]
    Invalid(#[from] DomainError),
}

/// Deterministic action decision from the conversation text and the fields
/// extracted from it. Explicit edit/search intent wins over creation; a bare
/// self-introduction sets the user's name; a persistable draft creates.
pub fn decide(
    text: &str,
    extracted: &InteractionDraft,
    detected_name: Option<&str>,
    last_interaction_id: Option<InteractionId>,
) -> ActionRequest {
    let lower = text.to_ascii_lowercase();

    if has_edit_intent(&lower) {
        let resolved = explicit_id(&lower)
            .or_else(|| references_last_record(&lower).then_some(last_interaction_id).flatten());
        if let Some(id) = resolved {
            return ActionRequest::EditInteraction { id, updates: patch_from_draft(extracted) };
        }
        if references_last_record(&lower) {
            // "edit the last one" with nothing to resolve against
            return ActionRequest::NoAction;
        }
    }

    if let Some(query) = search_query(text, &lower, extracted) {
        return ActionRequest::SearchHcp { query };
    }

    if let Some(name) = detected_name {
        if !extracted.is_persistable() {
            return ActionRequest::SetUserName { name: name.to_string() };
        }
    }

    if extracted.is_persistable() {
        return ActionRequest::CreateInteraction { draft: extracted.clone() };
    }

    ActionRequest::NoAction
}

fn has_edit_intent(lower: &str) -> bool {
    ["edit", "update", "change", "modify", "correct", "set "]
        .iter()
        .any(|keyword| lower.contains(keyword))
}

pub(crate) fn references_last_record(lower: &str) -> bool {
    ["last one", "that one", "the last", "previous one", "most recent"]
        .iter()
        .any(|marker| lower.contains(marker))
}

fn explicit_id(lower: &str) -> Option<InteractionId> {
    let words: Vec<&str> = lower.split_whitespace().collect();

    for (index, word) in words.iter().enumerate() {
        if let Some(stripped) = word.strip_prefix('#') {
            if let Ok(id) = stripped.trim_matches(|c: char| c.is_ascii_punctuation()).parse::<i64>()
            {
                if id > 0 {
                    return Some(InteractionId(id));
                }
            }
        }

        if matches!(*word, "interaction" | "id" | "record" | "entry") {
            if let Some(next) = words.get(index + 1) {
                let cleaned = next.trim_matches(|c: char| c.is_ascii_punctuation());
                if let Ok(id) = cleaned.parse::<i64>() {
                    if id > 0 {
                        return Some(InteractionId(id));
                    }
                }
            }
        }
    }

    None
}

fn search_query(text: &str, lower: &str, extracted: &InteractionDraft) -> Option<String> {
    let markers = ["find ", "search for ", "search ", "look up ", "show me "];
    let position = markers.iter().find_map(|marker| {
        lower.find(marker).map(|position| position + marker.len())
    })?;

    let remainder = text[position..].trim().trim_end_matches(['.', '!', '?']);
    if !remainder.is_empty() {
        return Some(remainder.to_string());
    }
    extracted.hcp_name.clone()
}

fn patch_from_draft(draft: &InteractionDraft) -> InteractionPatch {
    InteractionPatch {
        hcp_name: draft.hcp_name.clone(),
        attendees: draft.attendees.clone(),
        date: draft.date,
        time: draft.time.clone(),
        interaction_type: draft.interaction_type,
        topics: draft.topics.clone(),
        materials_distributed: draft.materials_distributed.clone(),
        outcome: draft.outcome,
        follow_up: draft.follow_up.clone(),
        summary: draft.summary.clone(),
    }
}

/// Parse a tool invocation from the understanding service into a typed
/// action. The tool set is closed: an unknown name is a collaborator
/// failure. Loosely-typed argument values go through parse-or-reject.
pub fn parse_invocation(
    invocation: &ToolInvocation,
    last_interaction_id: Option<InteractionId>,
    today: NaiveDate,
) -> Result<ActionRequest, RouteError> {
    let arguments = &invocation.arguments;

    match invocation.name.as_str() {
        TOOL_LOG_INTERACTION => {
            let draft = draft_from_arguments(arguments, today)?;
            Ok(ActionRequest::CreateInteraction { draft })
        }
        TOOL_EDIT_INTERACTION => {
            let id = interaction_id_argument(arguments, last_interaction_id)?;
            let updates = patch_from_arguments(arguments, today)?;
            Ok(ActionRequest::EditInteraction { id, updates })
        }
        TOOL_SEARCH_HCP => {
            let query = string_argument(arguments, "query").ok_or_else(|| {
                RouteError::MalformedArguments("search_hcp requires a query".to_string())
            })?;
            Ok(ActionRequest::SearchHcp { query })
        }
        TOOL_SET_USER_NAME => {
            let name = string_argument(arguments, "name").ok_or_else(|| {
                RouteError::MalformedArguments("set_user_name requires a name".to_string())
            })?;
            Ok(ActionRequest::SetUserName { name })
        }
        other => Err(RouteError::UnsupportedTool(other.to_string())),
    }
}

/// Read a string argument, treating the model's "unknown" spellings as
/// absent rather than as literal values.
fn string_argument(arguments: &Value, key: &str) -> Option<String> {
    let value = arguments.get(key)?.as_str()?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("not specified")
        || value.eq_ignore_ascii_case("none")
        || value.eq_ignore_ascii_case("null")
    {
        return None;
    }
    Some(value.to_string())
}

fn interaction_id_argument(
    arguments: &Value,
    last_interaction_id: Option<InteractionId>,
) -> Result<InteractionId, RouteError> {
    match arguments.get("interaction_id") {
        Some(Value::Number(number)) => match number.as_i64() {
            Some(id) if id > 0 => Ok(InteractionId(id)),
            _ => Err(RouteError::Invalid(DomainError::InvalidInteractionId(number.to_string()))),
        },
        Some(Value::String(raw)) => {
            let trimmed = raw.trim();
            if trimmed.eq_ignore_ascii_case("last") || trimmed.eq_ignore_ascii_case("latest") {
                return last_interaction_id.ok_or_else(|| {
                    RouteError::Invalid(DomainError::InvalidInteractionId(trimmed.to_string()))
                });
            }
            trimmed.parse::<InteractionId>().map_err(RouteError::Invalid)
        }
        None | Some(Value::Null) => last_interaction_id.ok_or_else(|| {
            RouteError::Invalid(DomainError::InvalidInteractionId("not specified".to_string()))
        }),
        Some(other) => {
            Err(RouteError::Invalid(DomainError::InvalidInteractionId(other.to_string())))
        }
    }
}

fn draft_from_arguments(
    arguments: &Value,
    today: NaiveDate,
) -> Result<InteractionDraft, RouteError> {
    let patch = patch_from_arguments(arguments, today)?;

    Ok(InteractionDraft {
        hcp_name: patch.hcp_name,
        attendees: patch.attendees,
        date: patch.date,
        time: patch.time,
        interaction_type: patch.interaction_type,
        topics: patch.topics,
        materials_distributed: patch.materials_distributed,
        outcome: patch.outcome,
        follow_up: patch.follow_up,
        summary: patch.summary,
        compliance: None,
    })
}

fn patch_from_arguments(
    arguments: &Value,
    today: NaiveDate,
) -> Result<InteractionPatch, RouteError> {
    let date = match string_argument(arguments, "date") {
        Some(raw) if raw.eq_ignore_ascii_case("today") => Some(today),
        Some(raw) => Some(parse_date(&raw).map_err(RouteError::Invalid)?),
        None => None,
    };

    let interaction_type = string_argument(arguments, "interaction_type")
        .map(|raw| raw.parse().map_err(RouteError::Invalid))
        .transpose()?;

    let outcome = string_argument(arguments, "outcomes")
        .or_else(|| string_argument(arguments, "outcome"))
        .map(|raw| raw.parse::<Outcome>().map_err(RouteError::Invalid))
        .transpose()?;

    Ok(InteractionPatch {
        hcp_name: string_argument(arguments, "hcp_name"),
        attendees: string_argument(arguments, "attendees"),
        date,
        time: string_argument(arguments, "time"),
        interaction_type,
        topics: string_argument(arguments, "topics"),
        materials_distributed: string_argument(arguments, "materials_distributed"),
        outcome,
        follow_up: string_argument(arguments, "follow_up"),
        summary: string_argument(arguments, "summary"),
    })
}

/// Outcome of routing one action: the user-facing reply plus the structured
/// payload the caller can render or retry with.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutedReply {
    pub reply: String,
    pub extracted_data: Value,
    pub persisted_id: Option<InteractionId>,
}

pub struct ActionRouter {
    gateway: Arc<dyn InteractionGateway>,
}

impl ActionRouter {
    pub fn new(gateway: Arc<dyn InteractionGateway>) -> Self {
        Self { gateway }
    }

    /// Execute the routed action and compose the reply. Validation and
    /// not-found problems are recovered into reply text; only storage-level
    /// failures on read paths escape as application errors.
    pub async fn execute(
        &self,
        action: ActionRequest,
        verdict: ComplianceVerdict,
        draft: &InteractionDraft,
        today: NaiveDate,
        assistant_reply: Option<&str>,
    ) -> Result<RoutedReply, ApplicationError> {
        let routed = match action {
            ActionRequest::CreateInteraction { draft: to_create } => {
                self.create(to_create, today).await?
            }
            ActionRequest::EditInteraction { id, updates } => self.edit(id, updates).await?,
            ActionRequest::SearchHcp { query } => self.search(&query).await?,
            ActionRequest::SetUserName { name } => RoutedReply {
                reply: format!(
                    "Nice to meet you, {name}! Tell me about an HCP interaction and I'll log it."
                ),
                extracted_data: json!({ "user_name": name }),
                persisted_id: None,
            },
            ActionRequest::NoAction => {
                let reply = assistant_reply
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        "I couldn't identify a healthcare professional in that. \
                         Who did you meet, and what was discussed?"
                            .to_string()
                    });
                RoutedReply { reply, extracted_data: to_payload(draft), persisted_id: None }
            }
        };

        Ok(apply_compliance_prefix(routed, verdict))
    }

    /// Recover a stage-local validation failure into a reply that still
    /// carries the extracted data for client-side correction.
    pub fn recover_validation(&self, error: &DomainError, draft: &InteractionDraft) -> RoutedReply {
        let reply = match error {
            DomainError::MissingHcpName => {
                "I couldn't identify the healthcare professional. Who was the interaction with?"
                    .to_string()
            }
            other => format!(
                "I couldn't process that: {other}. The extracted details are returned so you \
                 can correct them."
            ),
        };

        RoutedReply { reply, extracted_data: to_payload(draft), persisted_id: None }
    }

    async fn create(
        &self,
        draft: InteractionDraft,
        today: NaiveDate,
    ) -> Result<RoutedReply, ApplicationError> {
        let record = match draft.finalize(today) {
            Ok(record) => record,
            Err(error) => return Ok(self.recover_validation(&error, &draft)),
        };

        match self.gateway.create(record).await {
            Ok(saved) => {
                let mut reply = format!(
                    "Interaction with {} saved as #{}.",
                    saved.hcp_name, saved.id
                );
                if let Some(suggestion) = follow_up_suggestion(saved.outcome) {
                    reply.push(' ');
                    reply.push_str(suggestion);
                }
                Ok(RoutedReply {
                    reply,
                    persisted_id: Some(saved.id),
                    extracted_data: to_payload(&saved),
                })
            }
            // The record is still returned so the client form can auto-fill
            // and retry.
            Err(error) => Ok(RoutedReply {
                reply: format!("Interaction extracted but failed to save: {error}"),
                extracted_data: to_payload(&draft),
                persisted_id: None,
            }),
        }
    }

    async fn edit(
        &self,
        id: InteractionId,
        updates: InteractionPatch,
    ) -> Result<RoutedReply, ApplicationError> {
        if updates.is_empty() {
            return Ok(RoutedReply {
                reply: format!(
                    "I didn't find any changes to apply to interaction #{id}. \
                     Tell me which field to update."
                ),
                extracted_data: json!({ "interaction_id": id }),
                persisted_id: None,
            });
        }

        match self.gateway.update(id, updates.clone()).await {
            Ok(updated) => Ok(RoutedReply {
                reply: format!(
                    "Interaction #{id} updated. Changed: {}.",
                    updates.changed_fields().join(", ")
                ),
                extracted_data: to_payload(&updated),
                persisted_id: Some(id),
            }),
            Err(GatewayError::NotFound(_)) => Ok(RoutedReply {
                reply: format!("No interaction with id #{id} was found."),
                extracted_data: json!({ "interaction_id": id, "updates": updates }),
                persisted_id: None,
            }),
            Err(error) => Ok(RoutedReply {
                reply: format!("Interaction #{id} was not updated: {error}"),
                extracted_data: json!({ "interaction_id": id, "updates": updates }),
                persisted_id: None,
            }),
        }
    }

    async fn search(&self, query: &str) -> Result<RoutedReply, ApplicationError> {
        let records = self
            .gateway
            .find_by_hcp_name(query)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        if records.is_empty() {
            return Ok(RoutedReply {
                reply: format!("No interactions found matching \"{query}\"."),
                extracted_data: json!({ "query": query, "results": [] }),
                persisted_id: None,
            });
        }

        let lines: Vec<String> = records
            .iter()
            .map(|record| {
                format!(
                    "#{} {} ({}, {}): {}",
                    record.id,
                    record.hcp_name,
                    record.interaction_type.as_str(),
                    record.date,
                    record.summary.as_deref().unwrap_or("no summary")
                )
            })
            .collect();

        Ok(RoutedReply {
            reply: format!(
                "Found {} interaction(s) matching \"{query}\":\n{}",
                records.len(),
                lines.join("\n")
            ),
            extracted_data: json!({ "query": query, "results": to_payload(&records) }),
            persisted_id: None,
        })
    }
}

fn follow_up_suggestion(outcome: Outcome) -> Option<&'static str> {
    match outcome {
        Outcome::Positive => {
            Some("Suggested next step: schedule a follow-up in 2 weeks and send product samples.")
        }
        Outcome::Negative => {
            Some("Suggested next step: escalate to the medical liaison and monitor closely.")
        }
        Outcome::Neutral => None,
    }
}

/// A compliance warning is always prepended to whatever reply the router
/// composed; it is never dropped.
fn apply_compliance_prefix(mut routed: RoutedReply, verdict: ComplianceVerdict) -> RoutedReply {
    if verdict.is_warning() {
        routed.reply = format!("{} {}", verdict.message(), routed.reply);
    }
    routed
}

fn to_payload<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
