use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::ai_parse::detect_message_type_ai;
use super::commands::{ONBOARDING, help_text};
use super::intent::{Intent, detect_message_intent};
use super::shortcuts::shortcut;
use super::{ERROR_REPLY, SmsDeps, SmsSession, UNKNOWN_REPLY};
use crate::db::models::{SmsDirection, User};
use crate::error::StashError;

impl SmsSession<'_> {
    /// Dispatch a classified text to its handler.
    pub async fn route_message(&mut self, intent: Intent, message: &str) -> Result<String, StashError> {
        debug!(%intent, user_id = %self.user.id, "routing sms");
        match intent {
            Intent::Consequence => self.handle_consequence(message).await,
            Intent::Commitment => self.handle_commitment(message).await,
            Intent::Query => self.handle_query(message).await,
            Intent::Response => self.handle_response(message).await,
            Intent::Gift => self.handle_gift(message).await,
            Intent::Unknown => Ok(UNKNOWN_REPLY.to_string()),
        }
    }

    /// Commands, open flows, clarifications, shortcuts, then intent
    /// detection. Returns the reply and the intent it was handled as.
    pub async fn process(&mut self, body: &str) -> Result<(String, Option<Intent>), StashError> {
        let message = body.trim();
        match message.to_uppercase().as_str() {
            "EXPORT" => return Ok((self.export_shopping_list().await?, None)),
            "HELP" => return Ok((help_text(), None)),
            _ => {}
        }

        if self.conversation.data.gift_pending() {
            return Ok((self.continue_gift(message).await?, Some(Intent::Gift)));
        }
        if self.conversation.data.awaiting_lift {
            return Ok((self.continue_lift(message).await?, Some(Intent::Response)));
        }
        if self.conversation.has_pending_clarification() && shortcut(message).is_none() {
            let children = self.children().await?;
            if let Some((intent, merged)) = self.conversation.take_clarification(message, &children) {
                info!(%intent, "merging clarification reply");
                return Ok((self.route_message(intent, &merged).await?, Some(intent)));
            }
        }
        if let Some(cut) = shortcut(message) {
            return Ok((self.run_shortcut(cut).await?, None));
        }

        let mut intent = detect_message_intent(message).intent;
        if intent == Intent::Unknown && self.claude.is_configured() {
            let children = self.children().await?;
            if !children.is_empty() {
                intent = detect_message_type_ai(self.claude, message, &children, self.now).await;
            }
        }
        Ok((self.route_message(intent, message).await?, Some(intent)))
    }
}

/// Full handling of one text from a known user: log it, process, persist
/// the conversation, log the reply. First contact gets the onboarding text.
/// A failure still leaves the inbound text and [`ERROR_REPLY`] in the log.
pub async fn handle_inbound(
    deps: SmsDeps<'_>,
    user: &User,
    phone: &str,
    body: &str,
    message_sid: Option<&str>,
    now: DateTime<Utc>,
) -> Result<String, StashError> {
    let sms = deps.db.sms();
    let inbound_id = sms
        .log_message(Some(user.id), phone, SmsDirection::Inbound, body, message_sid, None)
        .await?;

    let (reply, intent) = match answer(deps, user, phone, body, now).await {
        Ok(answered) => answered,
        Err(e) => {
            if let Err(log_err) = sms
                .log_message(Some(user.id), phone, SmsDirection::Outbound, ERROR_REPLY, None, None)
                .await
            {
                warn!(error = %log_err, "failed to log sms error reply");
            }
            return Err(e);
        }
    };

    let intent = intent.map(|i| i.to_string());
    if let Some(intent) = intent.as_deref() {
        sms.set_intent(inbound_id, intent).await?;
    }
    sms.log_message(Some(user.id), phone, SmsDirection::Outbound, &reply, None, intent.as_deref())
        .await?;
    info!(user_id = %user.id, intent = intent.as_deref().unwrap_or("command"), "sms handled");
    Ok(reply)
}

async fn answer(
    deps: SmsDeps<'_>,
    user: &User,
    phone: &str,
    body: &str,
    now: DateTime<Utc>,
) -> Result<(String, Option<Intent>), StashError> {
    let mut session = SmsSession::load(deps, user, phone, now).await?;
    let (reply, intent) = session.process(body).await?;
    session.save().await?;

    if user.sms_onboarded {
        return Ok((reply, intent));
    }
    deps.db.users().mark_onboarded(user.id).await?;
    Ok((format!("{ONBOARDING}\n\n{reply}"), intent))
}
