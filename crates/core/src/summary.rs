use crate::domain::draft::InteractionDraft;

/// Upper bound on a generated summary, matching the CRM form field.
pub const MAX_SUMMARY_CHARS: usize = 120;

/// Fill in `draft.summary` when it is empty. A draft that already carries a
/// non-empty summary is returned untouched; the generator never rewrites one.
pub fn ensure_summary(draft: &mut InteractionDraft, raw_input: &str) {
    if draft.has_summary() {
        return;
    }
    draft.summary = Some(generate(draft, raw_input));
}

/// Build a digest of the present fields in fixed priority order, falling
/// back to the raw user message when no structured field is present.
pub fn generate(draft: &InteractionDraft, raw_input: &str) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(hcp_name) = draft.hcp_name.as_deref() {
        parts.push(format!("HCP: {hcp_name}"));
    }
    if let Some(kind) = draft.interaction_type {
        parts.push(format!("Type: {}", kind.as_str()));
    }
    if let Some(topics) = draft.topics.as_deref() {
        parts.push(format!("Topics: {topics}"));
    }
    if let Some(materials) = draft.materials_distributed.as_deref() {
        parts.push(format!("Materials: {materials}"));
    }
    if let Some(outcome) = draft.outcome {
        parts.push(format!("Outcome: {}", outcome.as_str()));
    }

    if parts.is_empty() {
        return truncate(raw_input.trim());
    }

    truncate(&parts.join(". "))
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_SUMMARY_CHARS {
        return text.to_string();
    }
    let clipped: String = text.chars().take(MAX_SUMMARY_CHARS).collect();
    format!("{clipped}...")
}

#[cfg(test)]
mod tests {
    use super::{ensure_summary, generate, MAX_SUMMARY_CHARS};
    use crate::domain::draft::InteractionDraft;
    use crate::domain::interaction::{InteractionType, Outcome};

    fn rich_draft() -> InteractionDraft {
        InteractionDraft {
            hcp_name: Some("Dr. Patel".to_string()),
            interaction_type: Some(InteractionType::Meeting),
            topics: Some("product efficacy".to_string()),
            materials_distributed: Some("samples".to_string()),
            outcome: Some(Outcome::Positive),
            ..InteractionDraft::default()
        }
    }

    #[test]
    fn digest_concatenates_fields_in_priority_order() {
        let summary = generate(&rich_draft(), "irrelevant raw text");
        assert_eq!(
            summary,
            "HCP: Dr. Patel. Type: Meeting. Topics: product efficacy. Materials: samples. \
             Outcome: Positive"
        );
    }

    #[test]
    fn falls_back_to_raw_input_when_no_structured_field_is_present() {
        let summary = generate(&InteractionDraft::default(), "  just checking in  ");
        assert_eq!(summary, "just checking in");
    }

    #[test]
    fn long_digests_are_truncated_with_an_ellipsis_marker() {
        let draft = InteractionDraft {
            topics: Some("t".repeat(200)),
            ..InteractionDraft::default()
        };

        let summary = generate(&draft, "");
        assert_eq!(summary.chars().count(), MAX_SUMMARY_CHARS + 3);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn existing_summary_makes_ensure_a_no_op() {
        let mut draft = rich_draft();
        draft.summary = Some("hand-written summary".to_string());
        let before = draft.clone();

        ensure_summary(&mut draft, "raw text");
        assert_eq!(draft, before);
    }

    #[test]
    fn blank_summary_is_treated_as_absent() {
        let mut draft = rich_draft();
        draft.summary = Some("   ".to_string());

        ensure_summary(&mut draft, "raw text");
        assert!(draft.summary.as_deref().is_some_and(|s| s.starts_with("HCP: Dr. Patel")));
    }

    #[test]
    fn generation_is_deterministic_for_identical_input() {
        let draft = rich_draft();
        assert_eq!(generate(&draft, "same"), generate(&draft, "same"));
    }
}
