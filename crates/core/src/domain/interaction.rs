use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Identifier of a persisted interaction. Ids can arrive as free text from
/// the understanding service; use `FromStr` to obtain a typed value or a
/// rejection, never an unvalidated fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionId(pub i64);

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InteractionId {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().trim_start_matches('#');
        match trimmed.parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(DomainError::InvalidInteractionId(value.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionType {
    Meeting,
    Call,
    Email,
    Virtual,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meeting => "Meeting",
            Self::Call => "Call",
            Self::Email => "Email",
            Self::Virtual => "Virtual",
        }
    }
}

impl FromStr for InteractionType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "meeting" => Ok(Self::Meeting),
            "call" => Ok(Self::Call),
            "email" => Ok(Self::Email),
            "virtual" => Ok(Self::Virtual),
            _ => Err(DomainError::UnknownInteractionType(value.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Neutral => "Neutral",
            Self::Negative => "Negative",
        }
    }
}

impl FromStr for Outcome {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            _ => Err(DomainError::UnknownOutcome(value.to_string())),
        }
    }
}

/// A persisted HCP interaction record. Field names are the wire contract
/// shared with clients and storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
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
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub fn parse_date(value: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| DomainError::InvalidDate(value.to_string()))
}
