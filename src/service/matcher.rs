//! Resolves a free-text recipient reference ("mom", "Liz", "Sarha") to one
//! of the user's recipients.
//!
//! Priority: exact name → exact nickname → relationship term → nickname
//! expansion → fuzzy (full name, first name, nickname) → no match with
//! suggestions.

use serde::Serialize;

use crate::db::models::Recipient;
use crate::service::levenshtein::{adaptive_max_distance, distance, similarity};
use crate::service::nicknames::{formal_name, is_nickname, is_relationship_term, normalize_relationship};

const SUGGESTION_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    Exact,
    High,
    Medium,
    Low,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    ExactName,
    ExactNickname,
    Relationship,
    FuzzyName,
    FuzzyFirstName,
    FuzzyNickname,
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipientSuggestion {
    pub recipient: Recipient,
    pub similarity: u32,
    pub distance: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub matched: Option<Recipient>,
    pub confidence: MatchConfidence,
    pub should_confirm: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_message: Option<String>,
    pub suggestions: Vec<RecipientSuggestion>,
    pub match_method: MatchMethod,
}

impl MatchResult {
    fn none(suggestions: Vec<RecipientSuggestion>) -> Self {
        Self {
            matched: None,
            confidence: MatchConfidence::None,
            should_confirm: false,
            confirmation_message: None,
            suggestions,
            match_method: MatchMethod::None,
        }
    }

    fn exact(recipient: &Recipient, method: MatchMethod) -> Self {
        Self {
            matched: Some(recipient.clone()),
            confidence: MatchConfidence::Exact,
            should_confirm: false,
            confirmation_message: None,
            suggestions: Vec::new(),
            match_method: method,
        }
    }
}

struct Candidate<'a> {
    recipient: &'a Recipient,
    score: u32,
    method: MatchMethod,
    distance: usize,
    reason: String,
}

/// Lowercase, trim, drop everything but ASCII letters, digits and whitespace.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect()
}

pub fn first_name(full_name: &str) -> String {
    let normalized = normalize_name(full_name);
    normalized
        .split_whitespace()
        .next()
        .map(str::to_string)
        .unwrap_or(normalized)
}

fn confidence_for(score: u32) -> MatchConfidence {
    match score {
        95.. => MatchConfidence::High,
        80..=94 => MatchConfidence::Medium,
        60..=79 => MatchConfidence::Low,
        _ => MatchConfidence::None,
    }
}

fn confirmation_message(recipient: &Recipient, confidence: MatchConfidence) -> Option<String> {
    match confidence {
        MatchConfidence::Medium => Some(format!("Did you mean {}?", recipient.name)),
        MatchConfidence::Low => Some(format!(
            "Not sure if you meant {}. Is this correct?",
            recipient.name
        )),
        _ => None,
    }
}

fn to_suggestions(candidates: &[Candidate<'_>], limit: usize) -> Vec<RecipientSuggestion> {
    candidates
        .iter()
        .take(limit)
        .map(|c| RecipientSuggestion {
            recipient: c.recipient.clone(),
            similarity: c.score,
            distance: c.distance,
            reason: c.reason.clone(),
        })
        .collect()
}

fn by_relationship<'a>(search: &str, recipients: &'a [Recipient]) -> Option<&'a Recipient> {
    let wanted = normalize_relationship(search)?;
    recipients
        .iter()
        .find(|r| normalize_relationship(&r.relationship) == Some(wanted))
        .or_else(|| {
            let term = search.to_lowercase();
            recipients
                .iter()
                .find(|r| normalize_name(&r.name).contains(&term))
        })
}

fn fuzzy<'a>(search: &str, recipients: &'a [Recipient]) -> Vec<Candidate<'a>> {
    let normalized = normalize_name(search);
    let max = adaptive_max_distance(&normalized);
    let mut out = Vec::new();

    for recipient in recipients {
        let full = normalize_name(&recipient.name);
        let first = first_name(&recipient.name);
        let nick = recipient.nickname.as_deref().map(normalize_name);

        let d = distance(&normalized, &full);
        if d <= max {
            let s = similarity(&normalized, &full);
            out.push(Candidate {
                recipient,
                score: s,
                method: MatchMethod::FuzzyName,
                distance: d,
                reason: format!("Name similarity: {s}%"),
            });
            continue;
        }
        let d = distance(&normalized, &first);
        if d <= max {
            let s = similarity(&normalized, &first);
            out.push(Candidate {
                recipient,
                score: s,
                method: MatchMethod::FuzzyFirstName,
                distance: d,
                reason: format!("First name similarity: {s}%"),
            });
            continue;
        }
        if let Some(nick) = nick {
            let d = distance(&normalized, &nick);
            if d <= max {
                let s = similarity(&normalized, &nick);
                out.push(Candidate {
                    recipient,
                    score: s,
                    method: MatchMethod::FuzzyNickname,
                    distance: d,
                    reason: format!("Nickname similarity: {s}%"),
                });
            }
        }
    }

    out.sort_by(|a, b| b.score.cmp(&a.score));
    out
}

/// Match `search` against `recipients`.
pub fn find_match(search: &str, recipients: &[Recipient]) -> MatchResult {
    if search.trim().is_empty() || recipients.is_empty() {
        return MatchResult::none(Vec::new());
    }
    let normalized = normalize_name(search);

    if let Some(r) = recipients.iter().find(|r| normalize_name(&r.name) == normalized) {
        return MatchResult::exact(r, MatchMethod::ExactName);
    }
    if let Some(r) = recipients.iter().find(|r| {
        r.nickname
            .as_deref()
            .is_some_and(|n| normalize_name(n) == normalized)
    }) {
        return MatchResult::exact(r, MatchMethod::ExactNickname);
    }
    if is_relationship_term(&normalized)
        && let Some(r) = by_relationship(search.trim(), recipients)
    {
        return MatchResult::exact(r, MatchMethod::Relationship);
    }
    if is_nickname(&normalized) {
        let formal = formal_name(&normalized);
        if let Some(r) = recipients.iter().find(|r| first_name(&r.name) == formal) {
            return MatchResult {
                matched: Some(r.clone()),
                confidence: MatchConfidence::High,
                should_confirm: true,
                confirmation_message: None,
                suggestions: Vec::new(),
                match_method: MatchMethod::FuzzyNickname,
            };
        }
    }

    let candidates = fuzzy(search, recipients);
    if let Some(best) = candidates.first() {
        let confidence = confidence_for(best.score);
        if confidence != MatchConfidence::None {
            return MatchResult {
                matched: Some(best.recipient.clone()),
                confidence,
                should_confirm: matches!(confidence, MatchConfidence::Medium | MatchConfidence::Low),
                confirmation_message: confirmation_message(best.recipient, confidence),
                suggestions: to_suggestions(&candidates[1..], SUGGESTION_LIMIT),
                match_method: best.method,
            };
        }
    }
    MatchResult::none(to_suggestions(&candidates, SUGGESTION_LIMIT))
}

/// Typeahead: name prefix (100) → first-name prefix (95) → nickname prefix
/// (90) → similarity ≥ 60.
pub fn suggest(query: &str, recipients: &[Recipient], limit: usize) -> Vec<RecipientSuggestion> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    let q = normalize_name(query);
    let mut scored = Vec::new();

    for recipient in recipients {
        let full = normalize_name(&recipient.name);
        let candidate = |score, method, reason: &str| Candidate {
            recipient,
            score,
            method,
            distance: 0,
            reason: reason.to_string(),
        };
        if full.starts_with(&q) {
            scored.push(candidate(100, MatchMethod::ExactName, "Name starts with query"));
            continue;
        }
        if first_name(&recipient.name).starts_with(&q) {
            scored.push(candidate(95, MatchMethod::FuzzyFirstName, "First name starts with query"));
            continue;
        }
        if recipient
            .nickname
            .as_deref()
            .is_some_and(|n| normalize_name(n).starts_with(&q))
        {
            scored.push(candidate(90, MatchMethod::FuzzyNickname, "Nickname starts with query"));
            continue;
        }
        let s = similarity(&q, &full);
        if s >= 60 {
            scored.push(Candidate {
                recipient,
                score: s,
                method: MatchMethod::FuzzyName,
                distance: distance(&q, &full),
                reason: format!("{s}% similar"),
            });
        }
    }

    scored.sort_by(|a, b| b.score.cmp(&a.score));
    to_suggestions(&scored, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn recipient(name: &str, nickname: Option<&str>, relationship: &str) -> Recipient {
        let now = Utc::now();
        Recipient {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: name.to_string(),
            relationship: relationship.to_string(),
            nickname: nickname.map(str::to_string),
            birthday: None,
            age_range: None,
            gender: None,
            interests: None,
            gift_preferences: None,
            restrictions: None,
            max_budget: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn family() -> Vec<Recipient> {
        vec![
            recipient("Sarah Johnson", Some("Sarah"), "friend"),
            recipient("John Smith", Some("Johnny"), "other"),
            recipient("Linda Martinez", None, "Mother"),
            recipient("Robert Wilson", Some("Bob"), "Father"),
            recipient("Elizabeth Brown", Some("Liz"), "Sister"),
            recipient("Sara Garcia", None, "other"),
        ]
    }

    fn name_of(r: &MatchResult) -> Option<&str> {
        r.matched.as_ref().map(|m| m.name.as_str())
    }

    #[test]
    fn normalizes_names() {
        assert_eq!(normalize_name("  Sarah  "), "sarah");
        assert_eq!(normalize_name("Sarah-Jane"), "sarahjane");
        assert_eq!(normalize_name("O'Connor"), "oconnor");
        assert_eq!(first_name("Sarah   Marie   Johnson"), "sarah");
        assert_eq!(first_name("John Smith Jr."), "john");
    }

    #[test]
    fn exact_name_and_nickname() {
        let all = family();
        let r = find_match("SARAH JOHNSON", &all);
        assert_eq!(name_of(&r), Some("Sarah Johnson"));
        assert_eq!(r.match_method, MatchMethod::ExactName);
        assert!(!r.should_confirm);
        assert!(r.confirmation_message.is_none());

        let r = find_match("johnny", &all);
        assert_eq!(name_of(&r), Some("John Smith"));
        assert_eq!(r.match_method, MatchMethod::ExactNickname);
        assert_eq!(r.confidence, MatchConfidence::Exact);
    }

    #[test]
    fn relationship_terms() {
        let all = family();
        let r = find_match("Mom", &all);
        assert_eq!(name_of(&r), Some("Linda Martinez"));
        assert_eq!(r.match_method, MatchMethod::Relationship);
        let r = find_match("dad", &all);
        assert_eq!(name_of(&r), Some("Robert Wilson"));
        let r = find_match("sis", &all);
        assert_eq!(name_of(&r), Some("Elizabeth Brown"));
    }

    #[test]
    fn nickname_expansion_needs_confirmation() {
        let all = family();
        let r = find_match("Beth", &all);
        assert_eq!(name_of(&r), Some("Elizabeth Brown"));
        assert_eq!(r.confidence, MatchConfidence::High);
        assert!(r.should_confirm);
        assert_eq!(r.match_method, MatchMethod::FuzzyNickname);
    }

    #[test]
    fn fuzzy_typo_is_medium() {
        let all = family();
        let r = find_match("Sarha", &all);
        assert_eq!(name_of(&r), Some("Sara Garcia"));
        assert_eq!(r.confidence, MatchConfidence::Medium);
        assert!(r.should_confirm);
        assert_eq!(r.confirmation_message.as_deref(), Some("Did you mean Sara Garcia?"));
    }

    #[test]
    fn unknown_and_empty() {
        let all = family();
        let r = find_match("Xavier", &all);
        assert!(r.matched.is_none());
        assert_eq!(r.confidence, MatchConfidence::None);
        assert!(!r.should_confirm);
        assert!(find_match("   ", &all).matched.is_none());
        assert!(find_match("Sarah", &[]).suggestions.is_empty());
    }

    #[test]
    fn typeahead_ranks_prefixes() {
        let all = family();
        let s = suggest("sar", &all, 10);
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].similarity, 100);
        assert!(s[0].recipient.name.starts_with("Sar"));

        let s = suggest("liz", &all, 10);
        assert_eq!(s[0].recipient.name, "Elizabeth Brown");
        assert_eq!(s[0].similarity, 90);

        assert!(suggest("", &all, 10).is_empty());
        assert!(suggest("qqq", &all, 10).is_empty());
        assert!(suggest("s", &all, 1).len() <= 1);
    }
}
