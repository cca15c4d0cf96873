use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fields of Twilio's inbound message form we act on.
#[derive(Debug, Clone, Default)]
pub struct InboundSms {
    pub from: String,
    pub body: String,
    pub message_sid: Option<String>,
}

/// Which piece a clarification question is waiting on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClarificationStep {
    AwaitingChild,
    AwaitingDuration,
    AwaitingReason,
}

/// Partially understood consequence or commitment held across messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialAction {
    pub child_name: Option<String>,
    pub duration_days: Option<i64>,
    pub reason: Option<String>,
}

/// Gift waiting for the sender's confirmation or recipient choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PendingGift {
    pub item: String,
    pub recipient_name: String,
    pub recipient_id: Option<Uuid>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Gift,
    Recipient,
    Consequence,
    Commitment,
}

/// Last row created over SMS, so UNDO can remove it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastAction {
    pub kind: ActionKind,
    pub id: Uuid,
    pub label: String,
}

/// JSON kept in `sms_context.context_data`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SmsContextData {
    pub pending_gift: Option<PendingGift>,
    pub awaiting_confirmation: bool,
    pub suggestions: Vec<SuggestionRef>,
    pub awaiting_suggestion_selection: bool,
    pub awaiting_recipient_creation: bool,
    pub awaiting_new_recipient_name: bool,
    pub awaiting_lift: bool,
    pub partial_consequence: Option<PartialAction>,
    pub partial_commitment: Option<PartialAction>,
    pub last_child_mentioned: Option<String>,
    pub conversation_step: Option<ClarificationStep>,
    pub last_action: Option<LastAction>,
}

impl SmsContextData {
    /// True while a gift flow is waiting on the next reply.
    pub fn gift_pending(&self) -> bool {
        self.pending_gift.is_some()
            && (self.awaiting_confirmation
                || self.awaiting_suggestion_selection
                || self.awaiting_recipient_creation
                || self.awaiting_new_recipient_name)
    }

    /// Drop every in-flight flow, keeping only the undo pointer.
    pub fn reset_flows(&mut self) {
        let last_action = self.last_action.take();
        *self = SmsContextData {
            last_action,
            ..Default::default()
        };
    }
}
