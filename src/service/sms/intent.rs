//! Keyword classification of inbound texts.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use strum_macros::Display;

use crate::db::models::Child;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
    Consequence,
    Commitment,
    Query,
    Response,
    Gift,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterResult {
    pub intent: Intent,
    pub confidence: Confidence,
    /// Lowercased, trimmed message.
    pub message: String,
}

const CONSEQUENCE_KEYWORDS: &[&str] = &[
    "no", "restrict", "take away", "remove", "ban", "grounded", "ground", "lose", "lost",
    "consequence", "punishment", "punish",
];

const COMMITMENT_KEYWORDS: &[&str] = &[
    "will", "commit", "promise", "by", "do", "finish", "complete", "get done", "gonna",
    "going to",
];

const QUERY_KEYWORDS: &[&str] = &[
    "what", "show", "status", "check", "list", "tell me", "display", "view", "see", "how",
    "when",
];

// "no" on its own is a reply; inside a sentence it starts a restriction.
const RESPONSE_KEYWORDS: &[&str] = &[
    "confirm", "approved", "approve", "yes", "ok", "okay", "deny", "reject", "modify", "change",
    "discuss", "talk", "done", "missed", "late", "lift", "extend",
];

const ACTION_WORDS: &[&str] = &[
    "needs to",
    "has to",
    "must",
    "should",
    "supposed to",
    "going to",
    "gonna",
];

fn keyword_set(words: &[&str]) -> Regex {
    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("valid keyword regex")
}

static CONSEQUENCE_RE: LazyLock<Regex> = LazyLock::new(|| keyword_set(CONSEQUENCE_KEYWORDS));
static COMMITMENT_RE: LazyLock<Regex> = LazyLock::new(|| keyword_set(COMMITMENT_KEYWORDS));
static QUERY_RE: LazyLock<Regex> = LazyLock::new(|| keyword_set(QUERY_KEYWORDS));
static RESPONSE_RE: LazyLock<Regex> = LazyLock::new(|| keyword_set(RESPONSE_KEYWORDS));

static CHILD_REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bkid [a-z]\b|\bson\b|\bdaughter\b|\bchild\b|\b[a-z]+ (?:he|she|they)\b")
        .expect("valid child reference regex")
});
static KID_LETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bkid ([a-z])\b").expect("valid kid regex"));
static GIFT_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*\S.*?\s+for\s+\S+").expect("valid gift regex"));

fn result(intent: Intent, confidence: Confidence, message: String) -> RouterResult {
    RouterResult {
        intent,
        confidence,
        message,
    }
}

/// Classify a text: replies first, then questions, then consequence vs
/// commitment, then a weak child-plus-action heuristic.
pub fn detect_message_intent(message: &str) -> RouterResult {
    let normalized = message.trim().to_lowercase();

    if normalized == "no" || RESPONSE_RE.is_match(&normalized) {
        return result(Intent::Response, Confidence::High, normalized);
    }
    if QUERY_RE.is_match(&normalized) {
        return result(Intent::Query, Confidence::High, normalized);
    }

    let consequence = CONSEQUENCE_RE.is_match(&normalized);
    let commitment = COMMITMENT_RE.is_match(&normalized);
    match (consequence, commitment) {
        (true, false) => return result(Intent::Consequence, Confidence::High, normalized),
        (false, true) => return result(Intent::Commitment, Confidence::High, normalized),
        (true, true) => {
            if normalized.contains("no ") || normalized.contains("restrict") {
                return result(Intent::Consequence, Confidence::Medium, normalized);
            }
            if normalized.contains("will") || normalized.contains("by") {
                return result(Intent::Commitment, Confidence::Medium, normalized);
            }
        }
        (false, false) => {}
    }

    if CHILD_REFERENCE_RE.is_match(&normalized)
        && ACTION_WORDS.iter().any(|w| normalized.contains(w))
    {
        return result(Intent::Consequence, Confidence::Low, normalized);
    }
    if GIFT_SHAPE_RE.is_match(&normalized) {
        return result(Intent::Gift, Confidence::Medium, normalized);
    }
    result(Intent::Unknown, Confidence::Low, normalized)
}

/// `"kid a"` → `"Kid A"`.
pub fn extract_child_name(message: &str) -> Option<String> {
    KID_LETTER_RE
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| format!("Kid {}", m.as_str().to_uppercase()))
}

/// The child a message refers to: a "Kid X" label first, then any of the
/// user's children named on a word boundary (longest name wins).
pub fn find_child<'a>(message: &str, children: &'a [Child]) -> Option<&'a Child> {
    if let Some(label) = extract_child_name(message)
        && let Some(child) = children.iter().find(|c| c.name.eq_ignore_ascii_case(&label))
    {
        return Some(child);
    }
    let lower = message.to_lowercase();
    let mut by_len: Vec<&Child> = children.iter().collect();
    by_len.sort_by_key(|c| std::cmp::Reverse(c.name.len()));
    by_len.into_iter().find(|c| names_child(&lower, c))
}

/// Whether lowercased `lower` names `child` on word boundaries.
pub fn names_child(lower: &str, child: &Child) -> bool {
    let name = child.name.trim().to_lowercase();
    !name.is_empty()
        && Regex::new(&format!(r"\b{}\b", regex::escape(&name)))
            .map(|re| re.is_match(lower))
            .unwrap_or(false)
}

/// The child name a message mentions, known or not.
pub fn mentioned_child_name(message: &str, children: &[Child]) -> Option<String> {
    find_child(message, children)
        .map(|c| c.name.clone())
        .or_else(|| extract_child_name(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn child(name: &str) -> Child {
        let now = Utc::now();
        Child {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: name.to_string(),
            age: None,
            avatar_color: "#6366f1".into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn intent(msg: &str) -> (Intent, Confidence) {
        let r = detect_message_intent(msg);
        (r.intent, r.confidence)
    }

    #[test]
    fn classifies_core_examples() {
        assert_eq!(intent("No iPad 3 days Kid A"), (Intent::Consequence, Confidence::High));
        assert_eq!(
            intent("Kid A will finish homework by 7pm"),
            (Intent::Commitment, Confidence::High)
        );
        assert_eq!(intent("What's Kid A restricted from?"), (Intent::Query, Confidence::High));
        assert_eq!(intent("CONFIRM"), (Intent::Response, Confidence::High));
        assert_eq!(intent("done"), (Intent::Response, Confidence::High));
        assert_eq!(intent("no"), (Intent::Response, Confidence::High));
    }

    #[test]
    fn mixed_keywords_fall_back_to_patterns() {
        assert_eq!(
            intent("no xbox until kid b will finish chores"),
            (Intent::Consequence, Confidence::Medium)
        );
        assert_eq!(
            intent("kid a will not lose the remote again"),
            (Intent::Commitment, Confidence::Medium)
        );
    }

    #[test]
    fn child_and_action_word_is_weak_consequence() {
        assert_eq!(
            intent("my son needs to apologize"),
            (Intent::Consequence, Confidence::Low)
        );
    }

    #[test]
    fn gift_shaped_and_unknown() {
        assert_eq!(intent("LEGO set for Mom").0, Intent::Gift);
        assert_eq!(intent("AirPods Pro - $249 for Sarah").0, Intent::Gift);
        assert_eq!(intent("hello there").0, Intent::Unknown);
    }

    #[test]
    fn keywords_need_word_boundaries() {
        // "book" contains "ok", "nobody" contains "no"
        assert_eq!(intent("nobody likes this book").0, Intent::Unknown);
    }

    #[test]
    fn child_extraction() {
        assert_eq!(extract_child_name("no tv kid b"), Some("Kid B".to_string()));
        assert_eq!(extract_child_name("no tv kidb"), None);

        let kids = vec![child("Emma"), child("Kid A"), child("Em")];
        assert_eq!(find_child("No iPad 3 days kid a", &kids).map(|c| c.name.as_str()), Some("Kid A"));
        assert_eq!(find_child("emma lost her phone", &kids).map(|c| c.name.as_str()), Some("Emma"));
        assert!(find_child("nobody here", &kids).is_none());
        assert_eq!(mentioned_child_name("no tv kid z", &kids), Some("Kid Z".to_string()));
    }
}
