use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, Utc};
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::SmsSession;
use super::ai_parse::{AiParse, parse_commitment_ai};
use super::intent::{Intent, find_child};
use crate::db::models::{Child, Commitment, CommitmentCategory, CommitmentStatus, CommitmentView};
use crate::error::StashError;
use crate::service::dates::{due_label, parse_deadline};
use crate::types::sms::{ActionKind, LastAction};

static TASK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:will|promises? to|committed to|commits? to|gonna|going to)\s+(.+?)(?:\s+(?:by|before|tonight|today|tomorrow|on)\b|[.!]|$)",
    )
    .expect("valid commitment text regex")
});

const CATEGORY_WORDS: [(CommitmentCategory, &[&str]); 4] = [
    (
        CommitmentCategory::Homework,
        &["homework", "study", "studying", "reading", "read", "math", "essay", "project", "school", "assignment"],
    ),
    (
        CommitmentCategory::Chores,
        &["clean", "dishes", "laundry", "trash", "room", "vacuum", "chores", "bed", "sweep", "tidy"],
    ),
    (
        CommitmentCategory::Responsibilities,
        &["practice", "piano", "feed", "dog", "cat", "walk", "lesson", "lessons", "instrument"],
    ),
    (
        CommitmentCategory::Behavior,
        &["respect", "respectful", "attitude", "nice", "behave", "kind", "polite", "listen"],
    ),
];

/// Commitment ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitmentDraft {
    pub child_name: String,
    pub text: String,
    pub category: CommitmentCategory,
    pub due: DateTime<Utc>,
    pub by_child: bool,
}

pub fn category_for(text: &str) -> CommitmentCategory {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    CATEGORY_WORDS
        .iter()
        .find(|(_, keys)| keys.iter().any(|k| words.contains(k)))
        .map(|(cat, _)| *cat)
        .unwrap_or_default()
}

fn task_text(message: &str) -> Option<String> {
    let text = TASK.captures(message)?.get(1)?.as_str().trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Rule-based reading of texts like `Kid A will finish homework by 7pm`.
pub fn parse_commitment(
    message: &str,
    children: &[Child],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<CommitmentDraft> {
    let child = find_child(message, children)?;
    let text = task_text(message)?;
    let due = parse_deadline(message, now, offset)?;
    Some(CommitmentDraft {
        child_name: child.name.clone(),
        category: category_for(&text),
        text,
        due,
        by_child: false,
    })
}

pub const COMMITMENT_HELP: &str = "Could not understand the commitment. Try:\n\n\
    \"Kid A will finish homework by 7pm\"\n\
    \"Kid B will clean room tomorrow\"\n\n\
    Include the child, the task and a deadline.";

const DEADLINE_QUESTION: &str = "When should this be done by? (e.g. \"by 7pm\", \"tonight\", \"tomorrow\")";

impl SmsSession<'_> {
    pub(super) async fn handle_commitment(&mut self, message: &str) -> Result<String, StashError> {
        let children = self.children().await?;
        if children.is_empty() {
            return Ok(super::NO_CHILDREN.to_string());
        }

        let drafts = match parse_commitment(message, &children, self.now, self.offset) {
            Some(draft) => vec![draft],
            None if self.claude.is_configured() => {
                match parse_commitment_ai(self.claude, message, &children, self.now, self.offset).await {
                    AiParse::Parsed(drafts) => drafts,
                    AiParse::Clarify(question) => {
                        self.conversation.ask(Intent::Commitment, message, &question);
                        return Ok(question);
                    }
                }
            }
            None => {
                let question = if find_child(message, &children).is_none() {
                    super::which_child_question(&children)
                } else if task_text(message).is_some()
                    && parse_deadline(message, self.now, self.offset).is_none()
                {
                    DEADLINE_QUESTION.to_string()
                } else {
                    return Ok(COMMITMENT_HELP.to_string());
                };
                self.conversation.ask(Intent::Commitment, message, &question);
                return Ok(question);
            }
        };

        let mut replies = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let Some(child) = children.iter().find(|c| c.name == draft.child_name) else {
                continue;
            };
            let view = self.create_commitment(child, &draft).await?;
            self.conversation.data.last_child_mentioned = Some(child.name.clone());
            self.conversation.data.last_action = Some(LastAction {
                kind: ActionKind::Commitment,
                id: view.id,
                label: format!("{}: {}", view.child_name, view.commitment_text),
            });
            if let Err(e) = self.notifier.commitment_created(&view, draft.by_child).await {
                warn!(commitment = %view.id, error = %e, "commitment notification failed");
            }
            replies.push(format!(
                "✓ {} committed: {}\nDue: {}\nCategory: {}",
                view.child_name,
                view.commitment_text,
                due_label(view.due_date, self.now, self.offset),
                view.category
            ));
        }
        if replies.is_empty() {
            return Ok(COMMITMENT_HELP.to_string());
        }
        Ok(format!(
            "{}\n\nReminder will be sent 30min before deadline.",
            replies.join("\n\n")
        ))
    }

    async fn create_commitment(
        &self,
        child: &Child,
        draft: &CommitmentDraft,
    ) -> Result<CommitmentView, StashError> {
        let commitment = Commitment {
            id: Uuid::new_v4(),
            child_id: child.id,
            commitment_text: draft.text.clone(),
            due_date: draft.due,
            status: CommitmentStatus::Active,
            category: draft.category,
            committed_by: self.user.id,
            verified_by: None,
            requested_by: (!draft.by_child).then_some(self.user.id),
            created_at: self.now,
            completed_at: None,
            reminded_at: None,
            extension_requested_at: None,
            completed_on_time: None,
            related_consequence_id: None,
            extension_reason: None,
            notes: None,
        };
        self.db.accountability().insert_commitment(&commitment).await?;
        info!(commitment = %commitment.id, child = %child.name, due = %commitment.due_date, "commitment created over sms");
        Ok(CommitmentView {
            commitment,
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
    fn will_by_time() {
        let draft = parse_commitment("Kid A will finish homework by 7pm", &kids(), now(), utc()).unwrap();
        assert_eq!(draft.child_name, "Kid A");
        assert_eq!(draft.text, "finish homework");
        assert_eq!(draft.category, CommitmentCategory::Homework);
        assert_eq!(draft.due, Utc.with_ymd_and_hms(2025, 11, 19, 19, 0, 0).unwrap());
    }

    #[test]
    fn relative_deadline_ends_text() {
        let draft = parse_commitment("kid b will clean room tomorrow morning", &kids(), now(), utc()).unwrap();
        assert_eq!(draft.text, "clean room");
        assert_eq!(draft.category, CommitmentCategory::Chores);
        assert_eq!(draft.due, Utc.with_ymd_and_hms(2025, 11, 20, 9, 0, 0).unwrap());
    }

    #[test]
    fn incomplete_texts_do_not_parse() {
        assert!(parse_commitment("Kid A will finish homework", &kids(), now(), utc()).is_none());
        assert!(parse_commitment("will finish homework by 7pm", &kids(), now(), utc()).is_none());
    }

    #[test]
    fn categories() {
        assert_eq!(category_for("practice piano"), CommitmentCategory::Responsibilities);
        assert_eq!(category_for("be respectful at dinner"), CommitmentCategory::Behavior);
        assert_eq!(category_for("call grandma"), CommitmentCategory::Other);
    }
}
