//! Claude-backed parsing of accountability texts, used when the rule-based
//! parsers give up.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::commitment::CommitmentDraft;
use super::consequence::ConsequenceDraft;
use super::intent::Intent;
use crate::api::claude::{ClaudeClient, extract_json_object};
use crate::db::models::{Child, CommitmentCategory, RestrictionType, Severity};
use crate::service::dates::{MAX_DURATION_DAYS, days_until, parse_until};

/// Outcome of an AI parse: usable drafts, or a question for the sender.
#[derive(Debug, Clone, PartialEq)]
pub enum AiParse<T> {
    Parsed(T),
    Clarify(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParsedRestriction {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub item: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParsedDuration {
    pub days: Option<i64>,
    pub until: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParsedConsequence {
    pub child: Option<String>,
    pub restrictions: Vec<ParsedRestriction>,
    pub duration: Option<ParsedDuration>,
    pub reasons: Vec<String>,
    pub severity: Option<String>,
    pub notes: Option<String>,
    pub needs_clarification: bool,
    pub clarification_question: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParsedCommitmentItem {
    pub text: String,
    pub category: Option<String>,
    pub deadline: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParsedCommitment {
    pub child: Option<String>,
    pub commitments: Vec<ParsedCommitmentItem>,
    pub committed_by: Option<String>,
    pub notes: Option<String>,
    pub needs_clarification: bool,
    pub clarification_question: Option<String>,
}

const CONSEQUENCE_HELP: &str = "Could not parse consequence. Please include:\n\
    • Child name\n• What to restrict\n• Duration\n\n\
    Example: \"No iPad 3 days Kid A homework\"";

const COMMITMENT_HELP: &str = "Could not parse commitment. Please include:\n\
    • Child name\n• What to do\n• Deadline\n\n\
    Example: \"Kid A will finish homework by 7pm\"";

fn child_names(children: &[Child]) -> String {
    children
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `Child "X" not found` followed by a numbered list of the user's children.
pub fn unknown_child_question(name: &str, children: &[Child]) -> String {
    let list = children
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c.name))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Child \"{name}\" not found. Available children:\n{list}\n\nReply with the number or correct name.")
}

fn exact_child<'a>(name: Option<&str>, children: &'a [Child]) -> Option<&'a Child> {
    let name = name?.trim();
    children.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

/// Ask Claude to answer with JSON matching `schema` and decode it.
/// Any failure is logged and yields `None`.
pub async fn parse_with_ai<T: DeserializeOwned>(
    claude: &ClaudeClient,
    message: &str,
    system_prompt: &str,
    schema: &str,
) -> Option<T> {
    let prompt = format!(
        "Message to parse: \"{message}\"\n\nExpected JSON schema: {schema}\n\nRespond with ONLY valid JSON matching the schema."
    );
    let text = match claude.complete(&prompt, Some(system_prompt), 1024).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "AI parse request failed");
            return None;
        }
    };
    let Some(json) = extract_json_object(&text) else {
        warn!(preview = %text.chars().take(200).collect::<String>(), "no JSON object in AI response");
        return None;
    };
    serde_json::from_str(json)
        .map_err(|e| warn!(error = %e, "AI response did not match schema"))
        .ok()
}

/// One-word classification of an accountability text.
pub async fn detect_message_type_ai(
    claude: &ClaudeClient,
    message: &str,
    children: &[Child],
    now: DateTime<Utc>,
) -> Intent {
    let prompt = format!(
        "You are a family accountability assistant. Analyze this SMS message and determine its type.\n\n\
         Available children: {}\nCurrent date/time: {}\n\nMessage: \"{message}\"\n\n\
         Determine if this is:\n\
         1. CONSEQUENCE - Parent setting a punishment/restriction (keywords: no, restrict, take away, ban, grounded)\n\
         2. COMMITMENT - Someone committing to do something (keywords: will, commit, promise, by, do)\n\
         3. QUERY - Asking for information (keywords: what, show, status, when, how)\n\
         4. RESPONSE - Responding to a previous notification (keywords: confirm, yes, no, done, missed, lift)\n\
         5. UNKNOWN - Cannot determine\n\n\
         Respond with ONLY one word: CONSEQUENCE, COMMITMENT, QUERY, RESPONSE, or UNKNOWN",
        child_names(children),
        now.to_rfc3339()
    );
    match claude.complete(&prompt, None, 50).await {
        Ok(text) => classify_word(&text),
        Err(e) => {
            warn!(error = %e, "AI message type detection failed");
            Intent::Unknown
        }
    }
}

fn classify_word(text: &str) -> Intent {
    let upper = text.trim().to_uppercase();
    if upper.contains("CONSEQUENCE") {
        Intent::Consequence
    } else if upper.contains("COMMITMENT") {
        Intent::Commitment
    } else if upper.contains("QUERY") {
        Intent::Query
    } else if upper.contains("RESPONSE") {
        Intent::Response
    } else {
        Intent::Unknown
    }
}

pub async fn parse_consequence_ai(
    claude: &ClaudeClient,
    message: &str,
    children: &[Child],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> AiParse<Vec<ConsequenceDraft>> {
    let system = format!(
        "You are a family accountability assistant. Parse this message about a consequence/punishment.\n\n\
         Available children: {}\nCurrent date/time: {}\n\n\
         Extract the following information:\n\
         1. Which child (must match one of the available names exactly)\n\
         2. What is restricted (devices, activities, privileges, location, other)\n\
         3. Duration (in days or specific end date/time)\n\
         4. Reason for the consequence\n\
         5. Severity (minor: 1-2 days, medium: 3-6 days, major: 7+ days or serious issue)\n\n\
         Restriction types:\n\
         - device: iPad, phone, TV, computer, screens, etc.\n\
         - activity: games, sports, playdates, etc.\n\
         - privilege: staying up late, treats, allowance, etc.\n\
         - location: going out, friends house, etc.\n\
         - other: anything else\n\n\
         Parse relative dates:\n\
         - \"until Friday\" → calculate date for next Friday\n\
         - \"for a week\" → 7 days\n\
         - \"3 days\" → 3 days from now\n\
         - \"until tomorrow\" → tomorrow's date",
        child_names(children),
        now.to_rfc3339()
    );
    let schema = r#"{
  "child": "string (exact match from available children)",
  "restrictions": [{"type": "device | activity | privilege | location | other", "item": "string"}],
  "duration": {"days": "number or null", "until": "ISO date string or null"},
  "reasons": ["string"],
  "severity": "minor | medium | major",
  "notes": "string or null",
  "needsClarification": "boolean",
  "clarificationQuestion": "string or null"
}"#;
    let parsed = parse_with_ai::<ParsedConsequence>(claude, message, &system, schema).await;
    validate_consequence(parsed, children, now, offset)
}

/// Child check, clarification passthrough and `until` → days.
pub fn validate_consequence(
    parsed: Option<ParsedConsequence>,
    children: &[Child],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> AiParse<Vec<ConsequenceDraft>> {
    let Some(parsed) = parsed else {
        return AiParse::Clarify(CONSEQUENCE_HELP.to_string());
    };
    let Some(child) = exact_child(parsed.child.as_deref(), children) else {
        return AiParse::Clarify(unknown_child_question(
            parsed.child.as_deref().unwrap_or_default(),
            children,
        ));
    };
    if parsed.needs_clarification {
        return AiParse::Clarify(
            parsed
                .clarification_question
                .unwrap_or_else(|| "Please provide more details.".to_string()),
        );
    }
    let restrictions: Vec<&ParsedRestriction> = parsed
        .restrictions
        .iter()
        .filter(|r| !r.item.trim().is_empty())
        .collect();
    if restrictions.is_empty() {
        return AiParse::Clarify(CONSEQUENCE_HELP.to_string());
    }

    let duration = parsed.duration.unwrap_or_default();
    if duration.days.is_some_and(|d| d > MAX_DURATION_DAYS) {
        return AiParse::Clarify(CONSEQUENCE_HELP.to_string());
    }
    let days = duration.days.filter(|d| *d > 0).or_else(|| {
        duration
            .until
            .as_deref()
            .and_then(|u| parse_until(u, now, offset))
            .map(|end| days_until(end, now))
            .filter(|d| (1..=MAX_DURATION_DAYS).contains(d))
    });
    let severity = parsed
        .severity
        .as_deref()
        .and_then(|s| Severity::from_str(s.trim()).ok())
        .unwrap_or_else(|| Severity::from_duration(days));
    let reason = (!parsed.reasons.is_empty()).then(|| parsed.reasons.join(", "));

    AiParse::Parsed(
        restrictions
            .into_iter()
            .map(|r| ConsequenceDraft {
                child_name: child.name.clone(),
                restriction_type: r
                    .kind
                    .as_deref()
                    .and_then(|k| RestrictionType::from_str(k.trim()).ok())
                    .unwrap_or_default(),
                restriction_item: r.item.trim().to_string(),
                duration_days: days,
                reason: reason.clone(),
                severity,
            })
            .collect(),
    )
}

pub async fn parse_commitment_ai(
    claude: &ClaudeClient,
    message: &str,
    children: &[Child],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> AiParse<Vec<CommitmentDraft>> {
    let local_now = now.with_timezone(&offset).to_rfc3339();
    let system = format!(
        "You are a family accountability assistant. Parse this message about a commitment/promise.\n\n\
         Available children: {}\nCurrent date/time: {local_now}\n\n\
         Extract the following information:\n\
         1. Which child is committing\n\
         2. What they're committing to do (can be multiple commitments)\n\
         3. Deadline for each commitment (specific date/time)\n\
         4. Category for each commitment\n\
         5. Who is making the commitment (parent or child)\n\n\
         Categories:\n\
         - homework: school assignments, studying, reading\n\
         - chores: cleaning, dishes, laundry, trash, etc.\n\
         - responsibilities: practice, lessons, sports, taking care of pets\n\
         - behavior: being respectful, attitude improvement, following rules\n\
         - other: anything else\n\n\
         Parse relative deadlines (all relative to {local_now}):\n\
         - \"tonight\" → today at 8pm\n\
         - \"by 7pm\" → today at 7pm (or tomorrow if already past)\n\
         - \"tomorrow morning\" → tomorrow at 9am\n\
         - \"tomorrow afternoon\" → tomorrow at 5pm\n\
         - \"Friday\" → next Friday at 5pm\n\
         - \"by tomorrow\" → tomorrow at 8pm\n\n\
         Return deadline as ISO 8601 datetime string with offset.",
        child_names(children),
    );
    let schema = r#"{
  "child": "string (exact match from available children)",
  "commitments": [{"text": "string", "category": "homework | chores | responsibilities | behavior | other", "deadline": "ISO 8601 date string"}],
  "committedBy": "parent | child",
  "notes": "string or null",
  "needsClarification": "boolean",
  "clarificationQuestion": "string or null"
}"#;
    let parsed = parse_with_ai::<ParsedCommitment>(claude, message, &system, schema).await;
    validate_commitment(parsed, children, now)
}

/// Child check, clarification passthrough, deadline validity and
/// not-in-the-past check.
pub fn validate_commitment(
    parsed: Option<ParsedCommitment>,
    children: &[Child],
    now: DateTime<Utc>,
) -> AiParse<Vec<CommitmentDraft>> {
    let Some(parsed) = parsed else {
        return AiParse::Clarify(COMMITMENT_HELP.to_string());
    };
    let Some(child) = exact_child(parsed.child.as_deref(), children) else {
        return AiParse::Clarify(unknown_child_question(
            parsed.child.as_deref().unwrap_or_default(),
            children,
        ));
    };
    if parsed.needs_clarification {
        return AiParse::Clarify(
            parsed
                .clarification_question
                .unwrap_or_else(|| "Please provide more details.".to_string()),
        );
    }
    if parsed.commitments.is_empty() {
        return AiParse::Clarify(COMMITMENT_HELP.to_string());
    }

    let by_child = parsed
        .committed_by
        .as_deref()
        .is_some_and(|c| c.eq_ignore_ascii_case("child"));
    let mut drafts = Vec::with_capacity(parsed.commitments.len());
    for item in &parsed.commitments {
        let Ok(due) = DateTime::parse_from_rfc3339(item.deadline.trim()) else {
            return AiParse::Clarify(format!(
                "Invalid deadline \"{}\". Please specify when this should be done.",
                item.deadline
            ));
        };
        let due = due.with_timezone(&Utc);
        if due < now {
            return AiParse::Clarify("Deadline is in the past. Did you mean tomorrow?".to_string());
        }
        drafts.push(CommitmentDraft {
            child_name: child.name.clone(),
            text: item.text.trim().to_string(),
            category: item
                .category
                .as_deref()
                .and_then(|c| CommitmentCategory::from_str(c.trim()).ok())
                .unwrap_or_default(),
            due,
            by_child,
        });
    }
    AiParse::Parsed(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

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
    fn classifies_single_word_answers() {
        assert_eq!(classify_word(" consequence\n"), Intent::Consequence);
        assert_eq!(classify_word("QUERY."), Intent::Query);
        assert_eq!(classify_word("no idea"), Intent::Unknown);
    }

    #[test]
    fn consequence_uses_exact_child_name_and_until() {
        let parsed: ParsedConsequence = serde_json::from_str(
            r#"{"child": "kid b", "restrictions": [{"type": "privilege", "item": "going out"}],
                "duration": {"days": null, "until": "Friday"}, "reasons": ["lied", "chores"],
                "needsClarification": false}"#,
        )
        .unwrap();
        let AiParse::Parsed(drafts) = validate_consequence(Some(parsed), &kids(), now(), utc()) else {
            panic!("expected drafts");
        };
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].child_name, "Kid B");
        assert_eq!(drafts[0].restriction_type, RestrictionType::Privilege);
        assert_eq!(drafts[0].duration_days, Some(3));
        assert_eq!(drafts[0].severity, Severity::Medium);
        assert_eq!(drafts[0].reason.as_deref(), Some("lied, chores"));
    }

    #[test]
    fn consequence_unknown_child_lists_children() {
        let parsed = ParsedConsequence {
            child: Some("Zed".into()),
            ..Default::default()
        };
        let AiParse::Clarify(q) = validate_consequence(Some(parsed), &kids(), now(), utc()) else {
            panic!("expected clarification");
        };
        assert!(q.starts_with("Child \"Zed\" not found"));
        assert!(q.contains("1. Kid A\n2. Kid B"));
        assert!(matches!(
            validate_consequence(None, &kids(), now(), utc()),
            AiParse::Clarify(_)
        ));
    }

    #[test]
    fn oversized_model_duration_asks_again() {
        let parsed: ParsedConsequence = serde_json::from_str(
            r#"{"child": "Kid A", "restrictions": [{"type": "device", "item": "iPad"}],
                "duration": {"days": 9999999999}, "needsClarification": false}"#,
        )
        .unwrap();
        let AiParse::Clarify(q) = validate_consequence(Some(parsed), &kids(), now(), utc()) else {
            panic!("expected clarification");
        };
        assert_eq!(q, CONSEQUENCE_HELP);
    }

    #[test]
    fn clarification_is_passed_through() {
        let parsed = ParsedCommitment {
            child: Some("Kid A".into()),
            needs_clarification: true,
            clarification_question: Some("When should this be done by?".into()),
            ..Default::default()
        };
        assert_eq!(
            validate_commitment(Some(parsed), &kids(), now()),
            AiParse::Clarify("When should this be done by?".into())
        );
    }

    #[test]
    fn commitment_deadlines_are_checked() {
        let future = (now() + Duration::hours(4)).to_rfc3339();
        let parsed: ParsedCommitment = serde_json::from_str(&format!(
            r#"{{"child": "Kid A", "committedBy": "child",
                "commitments": [{{"text": "clean room", "category": "chores", "deadline": "{future}"}}]}}"#
        ))
        .unwrap();
        let AiParse::Parsed(drafts) = validate_commitment(Some(parsed.clone()), &kids(), now()) else {
            panic!("expected drafts");
        };
        assert_eq!(drafts[0].category, CommitmentCategory::Chores);
        assert!(drafts[0].by_child);

        let mut past = parsed.clone();
        past.commitments[0].deadline = (now() - Duration::hours(1)).to_rfc3339();
        assert_eq!(
            validate_commitment(Some(past), &kids(), now()),
            AiParse::Clarify("Deadline is in the past. Did you mean tomorrow?".into())
        );

        let mut garbage = parsed;
        garbage.commitments[0].deadline = "soonish".into();
        assert!(matches!(
            validate_commitment(Some(garbage), &kids(), now()),
            AiParse::Clarify(q) if q.starts_with("Invalid deadline \"soonish\"")
        ));
    }
}
