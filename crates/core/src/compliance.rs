use serde::{Serialize, Serializer};

/// Terms that require QA review before an interaction may be logged.
pub const RESTRICTED_TERMS: [&str; 3] = ["off-label", "price", "discount"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComplianceVerdict {
    Clear,
    Warning,
}

impl ComplianceVerdict {
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Warning)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Clear => "All topics compliant.",
            Self::Warning => "Compliance WARNING: Review with QA before logging.",
        }
    }
}

impl Serialize for ComplianceVerdict {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.message())
    }
}

/// Case-insensitive substring scan of the discussed topics. Total: empty or
/// absent topics are compliant.
pub fn check_topics(topics: Option<&str>) -> ComplianceVerdict {
    let Some(topics) = topics else {
        return ComplianceVerdict::Clear;
    };

    let normalized = topics.to_ascii_lowercase();
    if RESTRICTED_TERMS.iter().any(|term| normalized.contains(term)) {
        ComplianceVerdict::Warning
    } else {
        ComplianceVerdict::Clear
    }
}
