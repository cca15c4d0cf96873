//! "LEGO set for Emma" texts: extract, match the recipient, save.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::SmsSession;
use crate::api::claude::ClaudeClient;
use crate::db::gifts::GiftInput;
use crate::db::models::{GiftSource, Recipient};
use crate::db::recipients::RecipientInput;
use crate::error::StashError;
use crate::service::matcher::{MatchConfidence, find_match};
use crate::types::sms::{ActionKind, LastAction, PendingGift, SuggestionRef};

static ITEM_FOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*(.+?)\s+for\s+(.+?)\s*[.!]?\s*$").expect("valid gift regex"));
static PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*(\d+(?:\.\d{1,2})?)").expect("valid price regex"));
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid url regex"));

const MAX_SUGGESTIONS: usize = 3;

/// Gift fields pulled out of a text.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ParsedGift {
    pub item: String,
    pub recipient_name: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub url: Option<String>,
}

impl ParsedGift {
    fn is_usable(&self) -> bool {
        !self.item.trim().is_empty() && !self.recipient_name.trim().is_empty()
    }

    fn into_pending(self) -> PendingGift {
        PendingGift {
            item: self.item.trim().to_string(),
            recipient_name: self.recipient_name.trim().to_string(),
            recipient_id: None,
            description: self.description,
            price: self.price,
            url: self.url,
        }
    }
}

/// `<item> for <name>`, with an optional `$price` and link.
pub fn parse_gift_rules(message: &str) -> Option<ParsedGift> {
    let url = URL.find(message).map(|m| m.as_str().to_string());
    let price = PRICE
        .captures(message)
        .and_then(|c| c.get(1)?.as_str().parse().ok());
    let stripped = PRICE.replace_all(&URL.replace_all(message, ""), "").to_string();
    let caps = ITEM_FOR.captures(stripped.trim())?;
    let gift = ParsedGift {
        item: caps.get(1)?.as_str().trim().to_string(),
        recipient_name: caps.get(2)?.as_str().trim().to_string(),
        description: None,
        price,
        url,
    };
    gift.is_usable().then_some(gift)
}

async fn parse_gift_ai(claude: &ClaudeClient, message: &str) -> Option<ParsedGift> {
    let prompt = format!(
        "Extract gift information from this text message:\n\"{message}\"\n\n\
         Return ONLY JSON: {{\"item\": \"gift name\", \"recipientName\": \"person's name\", \
         \"description\": \"optional details\", \"price\": number or null, \"url\": \"link or null\"}}"
    );
    match claude.ask_json::<ParsedGift>(&prompt, 512).await {
        Ok(gift) if gift.is_usable() => Some(gift),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "AI gift extraction failed");
            None
        }
    }
}

fn is_yes(reply: &str) -> bool {
    matches!(reply, "y" | "yes" | "yep" | "yeah" | "ok" | "okay" | "confirm")
}

fn is_no(reply: &str) -> bool {
    matches!(reply, "n" | "no" | "nope" | "cancel")
}

impl SmsSession<'_> {
    pub(super) async fn handle_gift(&mut self, message: &str) -> Result<String, StashError> {
        let parsed = match self.claude.is_configured() {
            true => match parse_gift_ai(self.claude, message).await {
                Some(gift) => Some(gift),
                None => parse_gift_rules(message),
            },
            false => parse_gift_rules(message),
        };
        let Some(parsed) = parsed else {
            return Ok(
                "I couldn't find a gift and recipient in that. Try: \"LEGO set for Emma\"".to_string(),
            );
        };
        let mut pending = parsed.into_pending();
        let recipients = self.db.recipients().list(self.user.id).await?;
        let matched = find_match(&pending.recipient_name, &recipients);

        let offered: Vec<SuggestionRef> = matched
            .matched
            .iter()
            .filter(|_| matched.confidence == MatchConfidence::Low)
            .chain(matched.suggestions.iter().map(|s| &s.recipient))
            .take(MAX_SUGGESTIONS)
            .map(|r| SuggestionRef {
                id: r.id,
                name: r.name.clone(),
            })
            .collect();

        match (matched.matched, matched.confidence) {
            (Some(r), MatchConfidence::Exact | MatchConfidence::High) => self.save_gift(pending, &r).await,
            (Some(r), MatchConfidence::Medium) => {
                let question = matched
                    .confirmation_message
                    .unwrap_or_else(|| format!("Did you mean {}?", r.name));
                pending.recipient_id = Some(r.id);
                self.conversation.data.reset_flows();
                self.conversation.data.pending_gift = Some(pending);
                self.conversation.data.awaiting_confirmation = true;
                Ok(format!("{question}\n\nReply Y to confirm or N to cancel"))
            }
            // a weak match is offered alongside the other near names
            _ if !offered.is_empty() => {
                let list = offered
                    .iter()
                    .enumerate()
                    .map(|(i, s)| format!("{}. {}", i + 1, s.name))
                    .collect::<Vec<_>>()
                    .join("\n");
                let reply = format!(
                    "I couldn't find \"{}\". Did you mean:\n{list}\n\nReply with the number, or NEW to create a new recipient.",
                    pending.recipient_name
                );
                self.conversation.data.reset_flows();
                self.conversation.data.pending_gift = Some(pending);
                self.conversation.data.suggestions = offered;
                self.conversation.data.awaiting_suggestion_selection = true;
                Ok(reply)
            }
            _ => {
                let reply = format!(
                    "I don't know \"{}\" yet.\n\nReply Y to create a new recipient, or provide their full name.",
                    pending.recipient_name
                );
                self.conversation.data.reset_flows();
                self.conversation.data.pending_gift = Some(pending);
                self.conversation.data.awaiting_recipient_creation = true;
                Ok(reply)
            }
        }
    }

    /// Next step of a gift waiting on the sender.
    pub(super) async fn continue_gift(&mut self, message: &str) -> Result<String, StashError> {
        let reply = message.trim().to_lowercase();
        let data = self.conversation.data.clone();
        let Some(pending) = data.pending_gift.clone() else {
            return Ok(super::UNKNOWN_REPLY.to_string());
        };

        if data.awaiting_confirmation {
            if is_yes(&reply) {
                let recipient = match pending.recipient_id {
                    Some(id) => self.db.recipients().get(self.user.id, id).await?,
                    None => None,
                };
                return match recipient {
                    Some(r) => self.save_gift(pending, &r).await,
                    None => {
                        self.conversation.data.reset_flows();
                        Ok("That recipient no longer exists. Gift not saved.".to_string())
                    }
                };
            }
            self.conversation.data.reset_flows();
            return Ok("Gift not saved. Text it again with the right name.".to_string());
        }

        if data.awaiting_suggestion_selection {
            if reply == "new" {
                self.conversation.data.awaiting_suggestion_selection = false;
                self.conversation.data.suggestions.clear();
                self.conversation.data.awaiting_new_recipient_name = true;
                return Ok(format!(
                    "What's the new recipient's full name? Reply Y to use \"{}\".",
                    pending.recipient_name
                ));
            }
            if is_no(&reply) {
                self.conversation.data.reset_flows();
                return Ok("Gift not saved.".to_string());
            }
            let choice = reply
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| data.suggestions.get(i))
                .map(|s| s.id);
            let Some(id) = choice else {
                return Ok("Invalid selection. Reply with 1, 2, 3, or NEW.".to_string());
            };
            return match self.db.recipients().get(self.user.id, id).await? {
                Some(r) => self.save_gift(pending, &r).await,
                None => {
                    self.conversation.data.reset_flows();
                    Ok("That recipient no longer exists. Gift not saved.".to_string())
                }
            };
        }

        if data.awaiting_recipient_creation || data.awaiting_new_recipient_name {
            if reply == "cancel" || reply == "n" || reply == "no" {
                self.conversation.data.reset_flows();
                return Ok("Gift not saved.".to_string());
            }
            let name = if is_yes(&reply) {
                pending.recipient_name.clone()
            } else {
                message.trim().to_string()
            };
            let recipient = self
                .db
                .recipients()
                .create(
                    self.user.id,
                    RecipientInput {
                        name: Some(name),
                        relationship: Some("other".to_string()),
                        ..Default::default()
                    },
                )
                .await?;
            info!(recipient = %recipient.id, "recipient created over sms");
            return self.save_gift(pending, &recipient).await;
        }

        self.conversation.data.reset_flows();
        Ok(super::UNKNOWN_REPLY.to_string())
    }

    async fn save_gift(&mut self, pending: PendingGift, recipient: &Recipient) -> Result<String, StashError> {
        let input = GiftInput {
            name: Some(pending.item.clone()),
            description: pending.description,
            url: pending.url,
            current_price: pending.price.filter(|p| *p >= 0.0),
            recipient_ids: Some(vec![recipient.id]),
            ..Default::default()
        };
        let gift = self.db.gifts().create(self.user.id, input, GiftSource::Sms).await?;
        info!(gift = %gift.gift.id, recipient = %recipient.id, "gift saved over sms");
        self.conversation.data.reset_flows();
        self.conversation.data.last_action = Some(LastAction {
            kind: ActionKind::Gift,
            id: gift.gift.id,
            label: format!("{} for {}", gift.gift.name, recipient.name),
        });
        Ok(format!("✅ Saved! {} for {}", gift.gift.name, recipient.name))
    }

    /// Undo the last row created over SMS.
    pub(super) async fn undo_last(&mut self) -> Result<String, StashError> {
        let Some(last) = self.conversation.data.last_action.take() else {
            return Ok("Nothing to undo.".to_string());
        };
        let removed = self.delete_created(last.kind, last.id).await?;
        Ok(if removed {
            format!("↩️ Undone: {}", last.label)
        } else {
            "Nothing to undo.".to_string()
        })
    }

    async fn delete_created(&self, kind: ActionKind, id: Uuid) -> Result<bool, StashError> {
        let user = self.user.id;
        match kind {
            ActionKind::Gift => self.db.gifts().delete(user, id).await,
            ActionKind::Recipient => self.db.recipients().delete(user, id).await,
            ActionKind::Consequence => self.db.accountability().delete_consequence(user, id).await,
            ActionKind::Commitment => self.db.accountability().delete_commitment(user, id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_for_name() {
        let g = parse_gift_rules("LEGO Star Wars set for Emma").unwrap();
        assert_eq!(g.item, "LEGO Star Wars set");
        assert_eq!(g.recipient_name, "Emma");
        assert_eq!(g.price, None);
    }

    #[test]
    fn price_and_link_are_pulled_out() {
        let g = parse_gift_rules("Cozy slippers $24.99 for mom https://shop.example/slippers").unwrap();
        assert_eq!(g.item, "Cozy slippers");
        assert_eq!(g.recipient_name, "mom");
        assert_eq!(g.price, Some(24.99));
        assert_eq!(g.url.as_deref(), Some("https://shop.example/slippers"));
    }

    #[test]
    fn needs_both_halves() {
        assert!(parse_gift_rules("just a scarf").is_none());
        assert!(parse_gift_rules("for Emma").is_none());
    }

    #[test]
    fn yes_no_words() {
        assert!(is_yes("y"));
        assert!(is_no("cancel"));
        assert!(!is_yes("maybe"));
    }
}
