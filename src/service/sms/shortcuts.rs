//! One-word commands answered before intent detection.

use uuid::Uuid;

use super::SmsSession;
use super::query::{format_commitments, format_restrictions};
use crate::db::models::{Child, CommitmentStats, ConsequenceStatus};
use crate::error::StashError;
use crate::service::lifecycle;
use crate::service::stats::{month_start, refresh_month};
use crate::types::sms::SuggestionRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Status,
    ClearAll,
    Clear,
    CompleteAll,
    Help,
    Stats,
    Summary,
    Active,
    Undo,
    Cancel,
}

pub fn shortcut(message: &str) -> Option<Shortcut> {
    let m = message.trim().to_lowercase();
    let m = m.trim_end_matches(['.', '!']);
    Some(match m {
        "status" | "check" | "what" | "show" | "list" => Shortcut::Status,
        "clear all" | "lift all" | "lift everything" | "clear everything" => Shortcut::ClearAll,
        "all done" | "done all" => Shortcut::CompleteAll,
        "clear" | "lift" | "remove" => Shortcut::Clear,
        "help" | "?" | "commands" => Shortcut::Help,
        "stats" | "report" => Shortcut::Stats,
        "summary" | "overview" => Shortcut::Summary,
        "active" | "current" => Shortcut::Active,
        "undo" => Shortcut::Undo,
        "cancel" => Shortcut::Cancel,
        _ => return None,
    })
}

fn stats_line(child: &Child, stats: &CommitmentStats) -> String {
    let Some(score) = stats.reliability_score else {
        return format!("{}: no commitments yet", child.name);
    };
    let badge = if score >= 80.0 {
        "🏆"
    } else if score >= 60.0 {
        "👍"
    } else {
        "⚠️"
    };
    format!(
        "{badge} {}: {}/{} on time ({}%), {} missed",
        child.name,
        stats.completed_on_time,
        stats.total_commitments,
        score.round() as i64,
        stats.missed
    )
}

impl SmsSession<'_> {
    pub(super) async fn run_shortcut(&mut self, shortcut: Shortcut) -> Result<String, StashError> {
        match shortcut {
            Shortcut::Status => self.family_status().await,
            Shortcut::ClearAll => self.clear_all().await,
            Shortcut::Clear => self.prompt_lift().await,
            Shortcut::CompleteAll => self.complete_all().await,
            Shortcut::Help => Ok(super::commands::help_text()),
            Shortcut::Stats => self.month_stats().await,
            Shortcut::Summary => self.summary().await,
            Shortcut::Active => {
                let consequences = self.active_consequences(None).await?;
                let commitments = self.active_commitments(None).await?;
                Ok(format!(
                    "📊 Current Status:\n\n{}\n\n{}",
                    format_restrictions(None, &consequences, self.offset),
                    format_commitments(None, &commitments, self.now, self.offset)
                ))
            }
            Shortcut::Undo => self.undo_last().await,
            Shortcut::Cancel => {
                let had_flow = self.conversation.data.gift_pending()
                    || self.conversation.data.awaiting_lift
                    || self.conversation.has_pending_clarification();
                self.conversation.data.reset_flows();
                self.conversation.pending_clarification = None;
                Ok(if had_flow {
                    "✓ Cancelled.".to_string()
                } else {
                    "Nothing to cancel.".to_string()
                })
            }
        }
    }

    async fn clear_all(&mut self) -> Result<String, StashError> {
        let lifted = self
            .db
            .accountability()
            .lift_all_active(self.user.id, self.user.id)
            .await?;
        if lifted.is_empty() {
            return Ok("No active restrictions to lift.".to_string());
        }
        let lines = lifted
            .iter()
            .map(|q| format!("• {}: {}", q.child_name, q.restriction_item))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(format!("✓ Lifted {} restrictions:\n{lines}", lifted.len()))
    }

    async fn prompt_lift(&mut self) -> Result<String, StashError> {
        let active = self.active_consequences(None).await?;
        match active.as_slice() {
            [] => Ok("No active restrictions to lift.".to_string()),
            [only] => self.lift_one(only.id).await,
            many => {
                let options: Vec<SuggestionRef> = many
                    .iter()
                    .map(|q| SuggestionRef {
                        id: q.id,
                        name: format!("{}: {}", q.child_name, q.restriction_item),
                    })
                    .collect();
                let list = options
                    .iter()
                    .enumerate()
                    .map(|(i, o)| format!("{}. {}", i + 1, o.name))
                    .collect::<Vec<_>>()
                    .join("\n");
                self.conversation.data.reset_flows();
                self.conversation.data.suggestions = options;
                self.conversation.data.awaiting_lift = true;
                Ok(format!(
                    "Which restriction should I lift?\n{list}\n\nReply with the number, ALL, or CANCEL."
                ))
            }
        }
    }

    /// Answer to the numbered lift prompt.
    pub(super) async fn continue_lift(&mut self, message: &str) -> Result<String, StashError> {
        let reply = message.trim().to_lowercase();
        let options = std::mem::take(&mut self.conversation.data.suggestions);
        self.conversation.data.awaiting_lift = false;
        if reply == "all" {
            return self.clear_all().await;
        }
        let choice = reply
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| options.get(i));
        match choice {
            Some(option) => self.lift_one(option.id).await,
            None => Ok("Nothing lifted.".to_string()),
        }
    }

    async fn lift_one(&mut self, id: Uuid) -> Result<String, StashError> {
        let store = self.db.accountability();
        let Some(mut view) = store.consequence(self.user.id, id).await? else {
            return Ok("That restriction no longer exists.".to_string());
        };
        if view.status != ConsequenceStatus::Active {
            return Ok(format!(
                "{} restriction for {} is no longer active.",
                view.restriction_item, view.child_name
            ));
        }
        lifecycle::lift_consequence(&mut view.consequence, self.user.id, self.now);
        store.save_consequence(&view).await?;
        Ok(format!(
            "✓ Lifted {} restriction for {}",
            view.restriction_item, view.child_name
        ))
    }

    async fn month_stats(&self) -> Result<String, StashError> {
        let children = self.children().await?;
        if children.is_empty() {
            return Ok(super::NO_CHILDREN.to_string());
        }
        let store = self.db.accountability();
        let month = month_start(self.now);
        let mut lines = Vec::with_capacity(children.len());
        for child in &children {
            let stats = refresh_month(&store, child.id, month).await?;
            lines.push(stats_line(child, &stats));
        }
        Ok(format!("📈 This Month Stats:\n\n{}", lines.join("\n")))
    }

    async fn summary(&self) -> Result<String, StashError> {
        let children = self.children().await?;
        let consequences = self.active_consequences(None).await?;
        let commitments = self.active_commitments(None).await?;
        let gifts = self.db.gifts().shopping_list(self.user.id).await?;
        let overdue = commitments.iter().filter(|c| c.due_date < self.now).count();
        Ok(format!(
            "📋 Family Summary:\n\n👧 {} children\n🚫 {} active restrictions\n📝 {} active commitments ({overdue} overdue)\n🎁 {} gift ideas to buy",
            children.len(),
            consequences.len(),
            commitments.len(),
            gifts.len()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn exact_words_only() {
        assert_eq!(shortcut(" Status "), Some(Shortcut::Status));
        assert_eq!(shortcut("CLEAR ALL"), Some(Shortcut::ClearAll));
        assert_eq!(shortcut("?"), Some(Shortcut::Help));
        assert_eq!(shortcut("undo!"), Some(Shortcut::Undo));
        assert_eq!(shortcut("Lift everything"), Some(Shortcut::ClearAll));
        assert_eq!(shortcut("all done!"), Some(Shortcut::CompleteAll));
        assert_eq!(shortcut("status of kid a"), None);
    }

    #[test]
    fn stats_badges() {
        let child = Child {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: "Kid A".into(),
            age: None,
            avatar_color: "#6366f1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let mut stats = CommitmentStats {
            id: Uuid::new_v4(),
            child_id: child.id,
            month: "2025-11-01".into(),
            total_commitments: 5,
            completed_on_time: 4,
            completed_late: 0,
            missed: 1,
            reliability_score: Some(80.0),
            homework_count: 5,
            chores_count: 0,
            other_count: 0,
            updated_at: Utc::now(),
        };
        assert_eq!(stats_line(&child, &stats), "🏆 Kid A: 4/5 on time (80%), 1 missed");
        stats.reliability_score = Some(60.0);
        assert!(stats_line(&child, &stats).starts_with("👍"));
        stats.reliability_score = Some(20.0);
        assert!(stats_line(&child, &stats).starts_with("⚠️"));
        stats.reliability_score = None;
        assert_eq!(stats_line(&child, &stats), "Kid A: no commitments yet");
    }
}
