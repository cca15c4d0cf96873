//! Per-phone conversation state carried between texts.

use uuid::Uuid;

use super::intent::Intent;
use crate::db::models::{Child, SmsContext};
use crate::db::sms::ContextUpdate;
use crate::types::sms::{ClarificationStep, SmsContextData};

/// Working copy of a phone's context for the duration of one inbound text.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    pub last_message: Option<String>,
    pub last_intent: Option<String>,
    pub pending_clarification: Option<String>,
    pub data: SmsContextData,
}

impl Conversation {
    pub fn from_row(row: Option<&SmsContext>) -> Self {
        match row {
            Some(row) => Self {
                last_message: row.last_message.clone(),
                last_intent: row.last_intent.clone(),
                pending_clarification: row.pending_clarification.clone(),
                data: row.data(),
            },
            None => Self::default(),
        }
    }

    pub fn has_pending_clarification(&self) -> bool {
        self.pending_clarification.is_some() && self.data.conversation_step.is_some()
    }

    /// Remember `message` and wait for the answer to `question`.
    pub fn ask(&mut self, intent: Intent, message: &str, question: &str) {
        self.last_message = Some(message.to_string());
        self.last_intent = Some(intent.to_string());
        self.pending_clarification = Some(question.to_string());
        self.data.conversation_step = Some(step_for_question(question));
    }

    /// Consume a pending clarification with `reply`, yielding the intent to
    /// re-run and the merged message.
    pub fn take_clarification(&mut self, reply: &str, children: &[Child]) -> Option<(Intent, String)> {
        if !self.has_pending_clarification() {
            return None;
        }
        let step = self.data.conversation_step.take()?;
        self.pending_clarification = None;
        let original = self.last_message.take().unwrap_or_default();
        let intent = match self.last_intent.take().as_deref() {
            Some("commitment") => Intent::Commitment,
            _ => Intent::Consequence,
        };
        Some((intent, merge_clarification(&original, step, reply, children)))
    }

    pub fn into_update(self, user_id: Uuid) -> ContextUpdate {
        ContextUpdate {
            user_id: Some(user_id),
            last_message: self.last_message,
            last_intent: self.last_intent,
            pending_clarification: self.pending_clarification,
            data: self.data,
        }
    }
}

/// Which missing piece a follow-up question is about.
pub fn step_for_question(question: &str) -> ClarificationStep {
    let lower = question.to_lowercase();
    if lower.contains("child") || lower.contains("which kid") || lower.contains("who") {
        ClarificationStep::AwaitingChild
    } else if ["long", "duration", "days", "when", "deadline"]
        .iter()
        .any(|w| lower.contains(w))
    {
        ClarificationStep::AwaitingDuration
    } else {
        ClarificationStep::AwaitingReason
    }
}

/// Append the reply to the original text. A numeric reply to a child
/// question picks from the numbered list that was sent.
pub fn merge_clarification(
    original: &str,
    step: ClarificationStep,
    reply: &str,
    children: &[Child],
) -> String {
    let reply = reply.trim();
    let addition = match step {
        ClarificationStep::AwaitingChild => reply
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| children.get(i))
            .map(|c| c.name.as_str())
            .unwrap_or(reply),
        ClarificationStep::AwaitingDuration | ClarificationStep::AwaitingReason => reply,
    };
    format!("{} {addition}", original.trim())
}
