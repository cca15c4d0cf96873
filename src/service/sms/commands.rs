use std::collections::BTreeMap;

use super::SmsSession;
use crate::db::models::GiftWithRecipients;
use crate::error::StashError;
use crate::service::notify::templates;

const EXPORT_LIMIT: usize = 1500;
const EXPORT_CUT: usize = 1450;

pub const ONBOARDING: &str = "👋 Welcome to GiftStash!\n\n\
    Text gift ideas like \"LEGO set for Emma\" and they'll be saved to your list.\n\
    Reply HELP anytime for commands.";

pub fn help_text() -> String {
    format!(
        "🎁 GiftStash SMS\n\n\
         GIFTS:\n\
         • \"LEGO set for Emma\" - save an idea\n\
         • EXPORT - shopping list\n\
         • UNDO - remove the last saved item\n\n{}",
        templates::help()
    )
}

fn line(g: &GiftWithRecipients) -> String {
    match g.gift.current_price {
        Some(p) => format!("• {} - ${p:.2}", g.gift.name),
        None => format!("• {}", g.gift.name),
    }
}

/// Shopping list grouped by recipient, cut to one long SMS.
pub fn format_shopping_list(gifts: &[GiftWithRecipients], app_url: &str) -> String {
    if gifts.is_empty() {
        return "Your shopping list is empty! Text a gift idea like \"LEGO set for Emma\" to add one."
            .to_string();
    }
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut unassigned = Vec::new();
    for g in gifts {
        if g.recipients.is_empty() {
            unassigned.push(line(g));
        }
        for link in &g.recipients {
            groups
                .entry(link.recipient_name.to_uppercase())
                .or_default()
                .push(line(g));
        }
    }
    let total: f64 = gifts.iter().filter_map(|g| g.gift.current_price).sum();

    let mut out = format!("🛍️ SHOPPING LIST ({} items)", gifts.len());
    for (name, lines) in &groups {
        out.push_str(&format!("\n\nFOR {name}:\n{}", lines.join("\n")));
    }
    if !unassigned.is_empty() {
        out.push_str(&format!("\n\nUNASSIGNED:\n{}", unassigned.join("\n")));
    }
    if total > 0.0 {
        out.push_str(&format!("\n\n💰 Total: ${total:.2}"));
    }
    out.push_str(&format!("\n\nView online: {app_url}/gifts"));

    if out.chars().count() > EXPORT_LIMIT {
        let cut: String = out.chars().take(EXPORT_CUT).collect();
        return format!("{cut}...\n\nView complete list at {app_url}/gifts");
    }
    out
}

impl SmsSession<'_> {
    pub(super) async fn export_shopping_list(&self) -> Result<String, StashError> {
        let gifts = self.db.gifts().shopping_list(self.user.id).await?;
        Ok(format_shopping_list(&gifts, self.app_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Gift, GiftRecipientLink, GiftSource, GiftStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn gift(name: &str, price: Option<f64>, recipient: Option<&str>) -> GiftWithRecipients {
        let id = Uuid::new_v4();
        GiftWithRecipients {
            gift: Gift {
                id,
                user_id: Uuid::nil(),
                name: name.into(),
                description: None,
                category: None,
                url: None,
                image_url: None,
                store: None,
                brand: None,
                current_price: price,
                original_price: None,
                status: GiftStatus::Idea,
                priority: None,
                occasion: None,
                notes: None,
                source: GiftSource::Sms,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            recipients: recipient
                .map(|r| GiftRecipientLink {
                    gift_id: id,
                    recipient_id: Uuid::new_v4(),
                    recipient_name: r.into(),
                    status: None,
                    notes: None,
                })
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn groups_and_totals() {
        let gifts = vec![
            gift("LEGO set", Some(49.99), Some("Emma")),
            gift("Book", None, Some("Emma")),
            gift("Scarf", Some(20.0), None),
        ];
        let text = format_shopping_list(&gifts, "https://app.test");
        assert!(text.starts_with("🛍️ SHOPPING LIST (3 items)"));
        assert!(text.contains("FOR EMMA:\n• LEGO set - $49.99\n• Book"));
        assert!(text.contains("UNASSIGNED:\n• Scarf - $20.00"));
        assert!(text.contains("💰 Total: $69.99"));
        assert!(text.ends_with("View online: https://app.test/gifts"));
    }

    #[test]
    fn long_lists_are_cut() {
        let gifts: Vec<_> = (0..80)
            .map(|i| gift(&format!("A rather long gift idea number {i}"), Some(10.0), Some("Emma")))
            .collect();
        let text = format_shopping_list(&gifts, "https://app.test");
        assert!(text.ends_with("...\n\nView complete list at https://app.test/gifts"));
        assert!(text.chars().count() < EXPORT_LIMIT);
    }

    #[test]
    fn empty_list() {
        assert!(format_shopping_list(&[], "x").starts_with("Your shopping list is empty"));
    }
}
