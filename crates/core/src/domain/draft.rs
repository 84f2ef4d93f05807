use chrono::NaiveDate;
use serde::Serialize;

use crate::compliance::ComplianceVerdict;
use crate::domain::interaction::{InteractionType, Outcome};
use crate::errors::DomainError;

/// In-flight, possibly incomplete representation of one interaction being
/// built up during a pipeline run. Every field is optional; the validated
/// projection for persistence is produced by [`InteractionDraft::finalize`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InteractionDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hcp_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_type: Option<InteractionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materials_distributed: Option<String>,
    #[serde(rename = "outcomes", skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Derived by the compliance stage, never user-supplied.
    #[serde(rename = "compliance_result", skip_serializing_if = "Option::is_none")]
    pub compliance: Option<ComplianceVerdict>,
}

impl InteractionDraft {
    /// Merge newly extracted fields into this draft. Last-non-null wins per
    /// field: absent incoming fields never erase a previously known value.
    pub fn merge(&mut self, incoming: InteractionDraft) {
        merge_field(&mut self.hcp_name, incoming.hcp_name);
        merge_field(&mut self.attendees, incoming.attendees);
        merge_field(&mut self.date, incoming.date);
        merge_field(&mut self.time, incoming.time);
        merge_field(&mut self.interaction_type, incoming.interaction_type);
        merge_field(&mut self.topics, incoming.topics);
        merge_field(&mut self.materials_distributed, incoming.materials_distributed);
        merge_field(&mut self.outcome, incoming.outcome);
        merge_field(&mut self.follow_up, incoming.follow_up);
        merge_field(&mut self.summary, incoming.summary);
    }

    pub fn has_summary(&self) -> bool {
        self.summary.as_deref().is_some_and(|summary| !summary.trim().is_empty())
    }

    /// A draft can only be persisted once an HCP has been identified.
    pub fn is_persistable(&self) -> bool {
        self.hcp_name.as_deref().is_some_and(|name| !name.trim().is_empty())
    }

    /// Validate the draft into a persistable record. `today` is the caller's
    /// reference date and is used only when the draft carries no date.
    pub fn finalize(&self, today: NaiveDate) -> Result<NewInteraction, DomainError> {
        let hcp_name = self
            .hcp_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(DomainError::MissingHcpName)?;

        Ok(NewInteraction {
            hcp_name: hcp_name.to_string(),
            attendees: self.attendees.clone(),
            date: self.date.unwrap_or(today),
            time: self.time.clone(),
            interaction_type: self.interaction_type.unwrap_or(InteractionType::Meeting),
            topics: self.topics.clone(),
            materials_distributed: self.materials_distributed.clone(),
            outcome: self.outcome.unwrap_or_default(),
            follow_up: self.follow_up.clone(),
            summary: self.summary.clone(),
        })
    }
}

fn merge_field<T>(existing: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *existing = incoming;
    }
}

/// Validated projection of a draft, ready for the persistence gateway.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewInteraction {
    pub hcp_name: String,
    pub attendees: Option<String>,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub interaction_type: InteractionType,
    pub topics: Option<String>,
    pub materials_distributed: Option<String>,
    #[serde(rename = "outcomes")]
    pub outcome: Outcome,
    pub follow_up: Option<String>,
    pub summary: Option<String>,
}

/// Partial update for an existing record. Only fields the user mentioned are
/// set; unset fields are never sent as overwrites.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InteractionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hcp_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_type: Option<InteractionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materials_distributed: Option<String>,
    #[serde(rename = "outcomes", skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl InteractionPatch {
    pub fn is_empty(&self) -> bool {
        self.hcp_name.is_none()
            && self.attendees.is_none()
            && self.date.is_none()
            && self.time.is_none()
            && self.interaction_type.is_none()
            && self.topics.is_none()
            && self.materials_distributed.is_none()
            && self.outcome.is_none()
            && self.follow_up.is_none()
            && self.summary.is_none()
    }

    /// Names of the fields carried by this patch, for reply composition.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.hcp_name.is_some() {
            fields.push("hcp_name");
        }
        if self.attendees.is_some() {
            fields.push("attendees");
        }
        if self.date.is_some() {
            fields.push("date");
        }
        if self.time.is_some() {
            fields.push("time");
        }
        if self.interaction_type.is_some() {
            fields.push("interaction_type");
        }
        if self.topics.is_some() {
            fields.push("topics");
        }
        if self.materials_distributed.is_some() {
            fields.push("materials_distributed");
        }
        if self.outcome.is_some() {
            fields.push("outcomes");
        }
        if self.follow_up.is_some() {
            fields.push("follow_up");
        }
        if self.summary.is_some() {
            fields.push("summary");
        }
        fields
    }
}
