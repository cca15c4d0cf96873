use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, Utc};
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::SmsSession;
use super::ai_parse::{AiParse, parse_consequence_ai};
use super::bulk::bulk_targets;
use super::intent::{Intent, find_child};
use crate::db::models::{
    Child, Consequence, ConsequenceStatus, ConsequenceView, RestrictionType, Severity,
};
use crate::error::StashError;
use crate::service::dates::{add_days, month_day, parse_duration_days};
use crate::types::sms::{ActionKind, LastAction};

const DEVICES: &[&str] = &[
    "ipad", "tablet", "phone", "tv", "television", "computer", "laptop", "screen time", "screens",
    "screen", "xbox", "playstation", "switch", "nintendo", "video games", "youtube",
];
const ACTIVITIES: &[&str] = &[
    "games", "sports", "playdates", "playdate", "sleepover", "party", "soccer", "practice",
];
const PRIVILEGES: &[&str] = &[
    "dessert", "treats", "candy", "allowance", "staying up", "bedtime", "sweets",
];
const LOCATIONS: &[&str] = &["friends house", "friend's house", "going out", "outside", "park", "mall"];

const REASON_WORDS: &[&str] = &[
    "homework", "attitude", "fighting", "lying", "chores", "grades", "behavior", "disrespect",
    "hitting", "talking back", "bedtime",
];

static AFTER_NO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:no|restrict|ban|take away)\s+([a-z][a-z']*)").expect("valid restriction regex")
});
static REASON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:because(?:\s+of)?|due\s+to|reason:?)\s+(.+)$").expect("valid reason regex")
});

/// Consequence ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsequenceDraft {
    pub child_name: String,
    pub restriction_type: RestrictionType,
    pub restriction_item: String,
    pub duration_days: Option<i64>,
    pub reason: Option<String>,
    pub severity: Severity,
}

fn contains_phrase(lower: &str, phrase: &str) -> bool {
    Regex::new(&format!(r"\b{}\b", regex::escape(phrase)))
        .map(|re| re.is_match(lower))
        .unwrap_or(false)
}

/// Known restriction vocabulary first, then the word after "no"/"restrict"
/// that is not part of a child's name.
pub(super) fn restriction(lower: &str, children: &[&Child]) -> Option<(RestrictionType, String)> {
    let vocab: [(&[&str], RestrictionType); 4] = [
        (DEVICES, RestrictionType::Device),
        (ACTIVITIES, RestrictionType::Activity),
        (PRIVILEGES, RestrictionType::Privilege),
        (LOCATIONS, RestrictionType::Location),
    ];
    if contains_phrase(lower, "grounded") {
        return Some((RestrictionType::Location, "going out".to_string()));
    }
    for (words, kind) in vocab {
        if let Some(word) = words.iter().find(|w| contains_phrase(lower, w)) {
            return Some((kind, display_item(word)));
        }
    }
    let name_parts: Vec<String> = children
        .iter()
        .flat_map(|c| c.name.to_lowercase().split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .collect();
    AFTER_NO
        .captures_iter(lower)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|w| !name_parts.iter().any(|part| part == w) && *w != "more")
        .map(|w| (RestrictionType::Other, w.to_string()))
}

fn display_item(word: &str) -> String {
    match word {
        "ipad" => "iPad".to_string(),
        "tv" => "TV".to_string(),
        "xbox" => "Xbox".to_string(),
        "youtube" => "YouTube".to_string(),
        "playstation" => "PlayStation".to_string(),
        other => other.to_string(),
    }
}

pub(super) fn reason(message: &str, lower: &str) -> Option<String> {
    if let Some(m) = REASON.captures(message).and_then(|c| c.get(1)) {
        return Some(m.as_str().trim().trim_end_matches('.').to_string());
    }
    REASON_WORDS
        .iter()
        .find(|w| contains_phrase(lower, w))
        .map(|w| w.to_string())
}

/// Rule-based reading of texts like `No iPad 3 days Kid A homework`.
/// Needs at least a child and a restriction; an out-of-range duration
/// makes the whole text unreadable.
pub fn parse_consequence(
    message: &str,
    children: &[Child],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<ConsequenceDraft> {
    let lower = message.to_lowercase();
    let child = find_child(message, children)?;
    let (restriction_type, restriction_item) = restriction(&lower, &[child])?;
    let duration_days = parse_duration_days(&lower, now, offset).ok()?.filter(|d| *d > 0);
    Some(ConsequenceDraft {
        child_name: child.name.clone(),
        restriction_type,
        restriction_item,
        duration_days,
        reason: reason(message, &lower),
        severity: Severity::from_duration(duration_days),
    })
}

pub const CONSEQUENCE_HELP: &str = "Could not understand the consequence. Try:\n\n\
    \"No iPad 3 days Kid A homework\"\n\
    \"Kid B grounded until Friday\"\n\n\
    Include the child, what is restricted and for how long.";

fn summary(q: &ConsequenceView, offset: FixedOffset) -> String {
    let duration = match (q.duration_days, q.expires_at) {
        (Some(d), Some(at)) => format!("{d} day{} (until {})", if d == 1 { "" } else { "s" }, month_day(at, offset)),
        _ => "indefinite (manual lift only)".to_string(),
    };
    format!(
        "✓ {} restricted for {}\nDuration: {duration}\nReason: {}",
        q.restriction_item, q.child_name, q.reason
    )
}

impl SmsSession<'_> {
    pub(super) async fn handle_consequence(&mut self, message: &str) -> Result<String, StashError> {
        let children = self.children().await?;
        if children.is_empty() {
            return Ok(super::NO_CHILDREN.to_string());
        }
        if let Some(targets) = bulk_targets(message, &children) {
            return self.bulk_consequence(message, &targets).await;
        }

        let drafts = match parse_consequence(message, &children, self.now, self.offset) {
            Some(draft) => vec![draft],
            None if self.claude.is_configured() => {
                match parse_consequence_ai(self.claude, message, &children, self.now, self.offset).await {
                    AiParse::Parsed(drafts) => drafts,
                    AiParse::Clarify(question) => {
                        self.conversation.ask(Intent::Consequence, message, &question);
                        return Ok(question);
                    }
                }
            }
            None => {
                if find_child(message, &children).is_none() {
                    let question = super::which_child_question(&children);
                    self.conversation.ask(Intent::Consequence, message, &question);
                    return Ok(question);
                }
                return Ok(CONSEQUENCE_HELP.to_string());
            }
        };

        let mut replies = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let Some(child) = children.iter().find(|c| c.name == draft.child_name) else {
                continue;
            };
            let view = self
                .create_consequence(child, &draft, ConsequenceStatus::PendingConfirmation)
                .await?;
            self.conversation.data.last_child_mentioned = Some(child.name.clone());
            self.conversation.data.last_action = Some(LastAction {
                kind: ActionKind::Consequence,
                id: view.id,
                label: format!("{} restriction for {}", view.restriction_item, view.child_name),
            });
            if let Err(e) = self
                .notifier
                .consequence_created(&view, self.user.display_name())
                .await
            {
                warn!(consequence = %view.id, error = %e, "partner notification failed");
            }
            replies.push(summary(&view, self.offset));
        }
        if replies.is_empty() {
            return Ok(CONSEQUENCE_HELP.to_string());
        }
        Ok(format!("{}\n\nPartner will be notified for confirmation.", replies.join("\n\n")))
    }

    pub(super) async fn create_consequence(
        &self,
        child: &Child,
        draft: &ConsequenceDraft,
        status: ConsequenceStatus,
    ) -> Result<ConsequenceView, StashError> {
        let expires_at = draft
            .duration_days
            .map(|d| add_days(self.now, d).ok_or_else(|| StashError::bad_request("duration is out of range")))
            .transpose()?;
        let consequence = Consequence {
            id: Uuid::new_v4(),
            child_id: child.id,
            restriction_type: draft.restriction_type,
            restriction_item: draft.restriction_item.clone(),
            reason: draft
                .reason
                .clone()
                .unwrap_or_else(|| "No reason given".to_string()),
            duration_days: draft.duration_days,
            expires_at,
            status,
            severity: draft.severity,
            created_by: self.user.id,
            confirmed_by: None,
            lifted_by: None,
            created_at: self.now,
            confirmed_at: None,
            lifted_at: None,
            related_commitment_id: None,
            notes: None,
        };
        self.db.accountability().insert_consequence(&consequence).await?;
        info!(consequence = %consequence.id, child = %child.name, item = %consequence.restriction_item, "consequence created over sms");
        Ok(ConsequenceView {
            consequence,
            child_name: child.name.clone(),
            owner_id: self.user.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn kids() -> Vec<Child> {
        ["Kid A", "Kid B"]
            .iter()
            .map(|n| Child {
                id: Uuid::new_v4(),
                user_id: Uuid::nil(),
                name: n.to_string(),
                age: None,
                avatar_color: "#6366f1".into(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 19, 15, 0, 0).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn device_restriction_with_duration_and_reason_word() {
        let draft = parse_consequence("No iPad 3 days Kid A homework", &kids(), now(), utc()).unwrap();
        assert_eq!(draft.child_name, "Kid A");
        assert_eq!(draft.restriction_type, RestrictionType::Device);
        assert_eq!(draft.restriction_item, "iPad");
        assert_eq!(draft.duration_days, Some(3));
        assert_eq!(draft.reason.as_deref(), Some("homework"));
        assert_eq!(draft.severity, Severity::Medium);
    }

    #[test]
    fn fallback_item_and_explicit_reason() {
        let draft = parse_consequence(
            "no bike for kid b 2 weeks because he rode it in the street",
            &kids(),
            now(),
            utc(),
        )
        .unwrap();
        assert_eq!(draft.child_name, "Kid B");
        assert_eq!(draft.restriction_type, RestrictionType::Other);
        assert_eq!(draft.restriction_item, "bike");
        assert_eq!(draft.duration_days, Some(14));
        assert_eq!(draft.severity, Severity::Major);
        assert_eq!(draft.reason.as_deref(), Some("he rode it in the street"));
    }

    #[test]
    fn indefinite_without_duration() {
        let draft = parse_consequence("Kid A no dessert", &kids(), now(), utc()).unwrap();
        assert_eq!(draft.restriction_type, RestrictionType::Privilege);
        assert_eq!(draft.duration_days, None);
        assert_eq!(draft.severity, Severity::Medium);
    }

    #[test]
    fn needs_child_and_item() {
        assert!(parse_consequence("no iPad 3 days", &kids(), now(), utc()).is_none());
        assert!(parse_consequence("Kid A needs a talk", &kids(), now(), utc()).is_none());

        let grounded = parse_consequence("Kid B grounded until Friday", &kids(), now(), utc()).unwrap();
        assert_eq!(grounded.restriction_type, RestrictionType::Location);
        assert_eq!(grounded.duration_days, Some(3));
    }

    #[test]
    fn oversized_duration_is_unreadable() {
        assert!(parse_consequence("No iPad 9999999999 days Kid A", &kids(), now(), utc()).is_none());
        assert!(parse_consequence("Kid B no tv 4000 weeks", &kids(), now(), utc()).is_none());
    }
}
