use chrono::{Duration, NaiveDate};

use replog_core::domain::draft::InteractionDraft;
use replog_core::domain::interaction::{InteractionType, Outcome};

use crate::llm::{ChatMessage, Role};

/// Result of one extraction pass: a partial draft plus, when the user
/// introduced themselves, their detected name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Extraction {
    pub draft: InteractionDraft,
    pub user_name: Option<String>,
}

/// Deterministic field extraction from free text. Pure: no I/O, no clock -
/// relative dates are resolved against the caller-supplied reference date.
/// Never fabricates an HCP name; unidentifiable fields stay absent.
#[derive(Clone, Debug, Default)]
pub struct FieldExtractor;

impl FieldExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract over the full message history. Additive across turns:
    /// later non-null values win per field, absent values never erase.
    pub fn extract(&self, messages: &[ChatMessage], today: NaiveDate) -> Extraction {
        let mut merged = Extraction::default();
        for message in messages.iter().filter(|message| message.role == Role::Human) {
            let extraction = self.extract_message(&message.content, today);
            merged.draft.merge(extraction.draft);
            if extraction.user_name.is_some() {
                merged.user_name = extraction.user_name;
            }
        }
        merged
    }

    pub fn extract_message(&self, text: &str, today: NaiveDate) -> Extraction {
        let lower = text.to_ascii_lowercase();
        let tokens = tokenize(&lower);

        let draft = InteractionDraft {
            hcp_name: extract_hcp_name(text),
            attendees: extract_attendees(text, &lower),
            date: extract_date(&tokens, &lower, today),
            time: extract_time(text),
            interaction_type: extract_interaction_type(&tokens),
            topics: extract_topics(text, &lower),
            materials_distributed: extract_materials(text, &lower, &tokens),
            outcome: extract_outcome(&lower),
            follow_up: extract_follow_up(text, &lower),
            summary: extract_summary(text, &lower),
            compliance: None,
        };

        Extraction { draft, user_name: detect_user_name(text, &lower) }
    }
}

fn tokenize(lower: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(lower.len());
    for character in lower.chars() {
        if character.is_ascii_alphanumeric() || matches!(character, '-' | ':') {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(|token| token.to_string()).collect()
}

fn strip_punctuation(token: &str) -> &str {
    token.trim_matches(|c: char| c.is_ascii_punctuation())
}

fn is_capitalized(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn extract_hcp_name(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();

    for (index, word) in words.iter().enumerate() {
        let marker = strip_punctuation(word).to_ascii_lowercase();
        if marker != "dr" && marker != "doctor" {
            continue;
        }

        let mut name_parts = Vec::new();
        for candidate in words.iter().skip(index + 1).take(2) {
            let cleaned = strip_punctuation(candidate);
            if cleaned.is_empty() || !is_capitalized(cleaned) {
                break;
            }
            name_parts.push(cleaned);
        }

        if !name_parts.is_empty() {
            return Some(format!("Dr. {}", name_parts.join(" ")));
        }
    }

    None
}

fn extract_attendees(text: &str, lower: &str) -> Option<String> {
    clause_after(text, lower, &["along with ", "joined by ", "accompanied by ", "attendees: "], &[
        ".", ";",
    ])
}

fn extract_date(tokens: &[String], lower: &str, today: NaiveDate) -> Option<NaiveDate> {
    for token in tokens {
        if let Ok(date) = NaiveDate::parse_from_str(strip_punctuation(token), "%Y-%m-%d") {
            return Some(date);
        }
    }

    if lower.contains("yesterday") {
        return Some(today - Duration::days(1));
    }
    if lower.contains("today") || lower.contains("this morning") || lower.contains("this afternoon")
    {
        return Some(today);
    }

    None
}

fn extract_time(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();

    for (index, word) in words.iter().enumerate() {
        let cleaned = strip_punctuation(word);

        if let Some((hours, minutes)) = cleaned.split_once(':') {
            if hours.chars().all(|c| c.is_ascii_digit())
                && minutes.chars().take(2).all(|c| c.is_ascii_digit())
                && !hours.is_empty()
            {
                let meridiem = words
                    .get(index + 1)
                    .map(|next| strip_punctuation(next).to_ascii_lowercase())
                    .filter(|next| next == "am" || next == "pm");
                return Some(match meridiem {
                    Some(suffix) => format!("{cleaned} {}", suffix.to_ascii_uppercase()),
                    None => cleaned.to_string(),
                });
            }
        }

        let lowered = cleaned.to_ascii_lowercase();
        for suffix in ["am", "pm"] {
            if let Some(prefix) = lowered.strip_suffix(suffix) {
                if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) {
                    return Some(format!("{prefix} {}", suffix.to_ascii_uppercase()));
                }
            }
        }
    }

    None
}

fn extract_interaction_type(tokens: &[String]) -> Option<InteractionType> {
    let has = |candidates: &[&str]| {
        tokens.iter().any(|token| candidates.contains(&token.as_str()))
    };

    if has(&["virtual", "zoom", "teams", "video", "webex"]) {
        return Some(InteractionType::Virtual);
    }
    if has(&["email", "emailed", "e-mail"]) {
        return Some(InteractionType::Email);
    }
    if has(&["call", "called", "phone", "phoned", "rang"]) {
        return Some(InteractionType::Call);
    }
    if has(&["met", "meeting", "meet", "visit", "visited"]) {
        return Some(InteractionType::Meeting);
    }

    None
}

fn extract_topics(text: &str, lower: &str) -> Option<String> {
    clause_after(text, lower, &["about ", "discussed ", "regarding ", "re: "], &[
        ",", ".", ";", " with ",
    ])
}

const MATERIAL_KEYWORDS: [&str; 7] =
    ["sample", "brochure", "leaflet", "kit", "material", "literature", "reprint"];

fn extract_materials(text: &str, lower: &str, tokens: &[String]) -> Option<String> {
    let clause = clause_after(
        text,
        lower,
        &["left ", "gave ", "distributed ", "handed over ", "handed ", "shared "],
        &[",", ".", ";", " and "],
    );

    if let Some(clause) = clause {
        let clause_lower = clause.to_ascii_lowercase();
        if MATERIAL_KEYWORDS.iter().any(|keyword| clause_lower.contains(keyword)) {
            return Some(clause);
        }
    }

    if tokens.iter().any(|token| token == "samples" || token == "sample") {
        return Some("samples".to_string());
    }

    None
}

fn extract_outcome(lower: &str) -> Option<Outcome> {
    let negative = [
        "went poorly",
        "went badly",
        "not interested",
        "declined",
        "negative",
        "dismissive",
        "unhappy",
        "skeptical",
    ];
    if negative.iter().any(|phrase| lower.contains(phrase)) {
        return Some(Outcome::Negative);
    }

    let positive = [
        "went well",
        "went great",
        "receptive",
        "interested",
        "positive",
        "agreed to",
        "enthusiastic",
    ];
    if positive.iter().any(|phrase| lower.contains(phrase)) {
        return Some(Outcome::Positive);
    }

    if lower.contains("neutral") {
        return Some(Outcome::Neutral);
    }

    None
}

fn extract_follow_up(text: &str, lower: &str) -> Option<String> {
    let marker = lower.find("follow-up").or_else(|| lower.find("follow up"))?;

    // Return the sentence carrying the marker.
    let mut start = 0;
    for (index, _) in lower.match_indices(['.', ';']) {
        if index < marker {
            start = index + 1;
        } else {
            let sentence = text[start..index].trim();
            return (!sentence.is_empty()).then(|| sentence.to_string());
        }
    }

    let sentence = text[start..].trim().trim_end_matches(['.', '!', '?']);
    (!sentence.is_empty()).then(|| sentence.to_string())
}

fn extract_summary(text: &str, lower: &str) -> Option<String> {
    clause_after(text, lower, &["summary: "], &[])
}

fn detect_user_name(text: &str, lower: &str) -> Option<String> {
    for marker in ["my name is ", "i'm called ", "call me "] {
        let Some(position) = lower.find(marker) else {
            continue;
        };

        let remainder = &text[position + marker.len()..];
        let name_parts: Vec<&str> = remainder
            .split_whitespace()
            .take(2)
            .map(strip_punctuation)
            .take_while(|part| !part.is_empty() && is_capitalized(part))
            .collect();

        if !name_parts.is_empty() {
            return Some(name_parts.join(" "));
        }
    }

    None
}

/// Slice of the original text following the first matching marker, cut at
/// the earliest stop marker, with surrounding punctuation trimmed.
fn clause_after(
    text: &str,
    lower: &str,
    markers: &[&str],
    stops: &[&str],
) -> Option<String> {
    for marker in markers {
        let Some(position) = lower.find(marker) else {
            continue;
        };

        let start = position + marker.len();
        let tail = &text[start..];
        let tail_lower = &lower[start..];

        let mut end = tail.len();
        for stop in stops {
            if let Some(stop_position) = tail_lower.find(stop) {
                end = end.min(stop_position);
            }
        }

        let clause = tail[..end].trim().trim_end_matches(['.', ',', '!', '?', ';']);
        if !clause.is_empty() {
            return Some(clause.to_string());
        }
    }

    None
}
