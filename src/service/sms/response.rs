use tracing::warn;

use super::SmsSession;
use crate::db::models::{CommitmentStats, CommitmentView, ConsequenceStatus};
use crate::error::StashError;
use crate::service::dates::{add_days, month_day, month_day_time};
use crate::service::lifecycle;
use crate::service::stats::{month_start, refresh_month};

/// What a short reply asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyAction {
    Confirm,
    Deny,
    Discuss,
    Done,
    Late,
    Missed,
    Lift,
    Extend,
}

const REPLY_WORDS: &[(ReplyAction, &[&str])] = &[
    (ReplyAction::Done, &["done", "finished", "completed"]),
    (ReplyAction::Late, &["late"]),
    (ReplyAction::Missed, &["missed"]),
    (ReplyAction::Lift, &["lift"]),
    (ReplyAction::Extend, &["extend"]),
    (ReplyAction::Deny, &["deny", "reject", "no"]),
    (ReplyAction::Discuss, &["modify", "change", "discuss", "talk"]),
    (ReplyAction::Confirm, &["confirm", "approved", "approve", "yes", "ok", "okay", "y"]),
];

pub fn reply_action(message: &str) -> Option<ReplyAction> {
    let lower = message.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    // a bare "no" refuses; inside a sentence it is a restriction
    let bare_no = words.as_slice() == ["no"];
    REPLY_WORDS
        .iter()
        .find(|(_, keys)| {
            keys.iter()
                .any(|k| words.contains(k) && (*k != "no" || bare_no))
        })
        .map(|(action, _)| *action)
}

impl SmsSession<'_> {
    pub(super) async fn handle_response(&mut self, message: &str) -> Result<String, StashError> {
        let Some(action) = reply_action(message) else {
            return Ok(super::UNKNOWN_REPLY.to_string());
        };
        match action {
            ReplyAction::Confirm => self.confirm_pending().await,
            ReplyAction::Deny => self.deny_pending().await,
            ReplyAction::Discuss => Ok(
                "Noted. Text the updated consequence (e.g. \"No iPad 2 days Kid A\") or DENY to drop it."
                    .to_string(),
            ),
            ReplyAction::Done => self.resolve_commitment(ReplyAction::Done).await,
            ReplyAction::Late => self.resolve_commitment(ReplyAction::Late).await,
            ReplyAction::Missed => self.resolve_commitment(ReplyAction::Missed).await,
            ReplyAction::Lift => self.lift_newest().await,
            ReplyAction::Extend => self.extend_something().await,
        }
    }

    async fn confirm_pending(&mut self) -> Result<String, StashError> {
        let store = self.db.accountability();
        let Some(mut view) = store
            .newest_consequence(self.user.id, ConsequenceStatus::PendingConfirmation)
            .await?
        else {
            return Ok("No consequences waiting for confirmation.".to_string());
        };
        lifecycle::confirm_consequence(&mut view.consequence, self.user.id, self.now);
        store.save_consequence(&view).await?;
        if let Err(e) = self
            .notifier
            .consequence_confirmed(&view, self.user.display_name())
            .await
        {
            warn!(consequence = %view.id, error = %e, "confirmation notification failed");
        }
        let until = view
            .expires_at
            .map(|at| format!("until {}", month_day(at, self.offset)))
            .unwrap_or_else(|| "until lifted".to_string());
        Ok(format!(
            "✓ Confirmed: {} restricted for {} {until}",
            view.restriction_item, view.child_name
        ))
    }

    async fn deny_pending(&mut self) -> Result<String, StashError> {
        let store = self.db.accountability();
        let Some(mut view) = store
            .newest_consequence(self.user.id, ConsequenceStatus::PendingConfirmation)
            .await?
        else {
            return Ok("No consequences waiting for confirmation.".to_string());
        };
        lifecycle::lift_consequence(&mut view.consequence, self.user.id, self.now);
        store.save_consequence(&view).await?;
        Ok(format!(
            "✗ Declined: {} restriction for {} removed.",
            view.restriction_item, view.child_name
        ))
    }

    async fn resolve_commitment(&mut self, action: ReplyAction) -> Result<String, StashError> {
        let store = self.db.accountability();
        let Some(mut view) = store.soonest_active_commitment(self.user.id).await? else {
            return Ok("No active commitments to update.".to_string());
        };
        let reply = match action {
            ReplyAction::Missed => {
                lifecycle::miss_commitment(&mut view.commitment, Some(self.user.id));
                store.save_commitment(&view).await?;
                let stats = refresh_month(&store, view.child_id, month_start(view.created_at)).await?;
                self.notify_missed(&view, &stats).await;
                format!("⚠️ Marked missed: {} - {}", view.child_name, view.commitment_text)
            }
            _ => {
                let forced = (action == ReplyAction::Late).then_some(false);
                let on_time = lifecycle::complete_commitment(
                    &mut view.commitment,
                    self.now,
                    forced,
                    Some(self.user.id),
                );
                store.save_commitment(&view).await?;
                let stats = refresh_month(&store, view.child_id, month_start(view.created_at)).await?;
                if let Err(e) = self.notifier.commitment_completed(&view, on_time, &stats).await {
                    warn!(commitment = %view.id, error = %e, "completion notification failed");
                }
                let when = if on_time { "on time" } else { "late" };
                format!(
                    "✓ {} completed \"{}\" {when}!",
                    view.child_name, view.commitment_text
                )
            }
        };
        Ok(reply)
    }

    async fn notify_missed(&self, view: &CommitmentView, stats: &CommitmentStats) {
        if let Err(e) = self.notifier.commitment_missed(view, stats).await {
            warn!(commitment = %view.id, error = %e, "missed notification failed");
        }
    }

    async fn lift_newest(&mut self) -> Result<String, StashError> {
        let store = self.db.accountability();
        let Some(mut view) = store
            .newest_consequence(self.user.id, ConsequenceStatus::Active)
            .await?
        else {
            return Ok("No active restrictions to lift.".to_string());
        };
        lifecycle::lift_consequence(&mut view.consequence, self.user.id, self.now);
        store.save_consequence(&view).await?;
        Ok(format!(
            "✓ Lifted {} restriction for {}",
            view.restriction_item, view.child_name
        ))
    }

    /// +1 day on the soonest commitment, else on the newest restriction.
    async fn extend_something(&mut self) -> Result<String, StashError> {
        let store = self.db.accountability();
        if let Some(mut view) = store.soonest_active_commitment(self.user.id).await? {
            let due = add_days(view.due_date, 1)
                .ok_or_else(|| StashError::bad_request("deadline is out of range"))?;
            lifecycle::extend_commitment(&mut view.commitment, due, self.now, None);
            store.save_commitment(&view).await?;
            return Ok(format!(
                "✓ Extended: {} - {}\nNew deadline: {}",
                view.child_name,
                view.commitment_text,
                month_day_time(view.due_date, self.offset)
            ));
        }
        if let Some(mut view) = store
            .newest_consequence(self.user.id, ConsequenceStatus::Active)
            .await?
        {
            lifecycle::extend_consequence(&mut view.consequence, 1, self.now)
                .map_err(|e| StashError::bad_request(e.to_string()))?;
            store.save_consequence(&view).await?;
            let until = view
                .expires_at
                .map(|at| month_day(at, self.offset))
                .unwrap_or_default();
            return Ok(format!(
                "✓ Extended {} restriction for {} until {until}",
                view.restriction_item, view.child_name
            ));
        }
        Ok("Nothing active to extend.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_words() {
        assert_eq!(reply_action("CONFIRM"), Some(ReplyAction::Confirm));
        assert_eq!(reply_action("ok"), Some(ReplyAction::Confirm));
        assert_eq!(reply_action("No"), Some(ReplyAction::Deny));
        assert_eq!(reply_action("done!"), Some(ReplyAction::Done));
        assert_eq!(reply_action("he was late"), Some(ReplyAction::Late));
        assert_eq!(reply_action("MISSED"), Some(ReplyAction::Missed));
        assert_eq!(reply_action("lift"), Some(ReplyAction::Lift));
        assert_eq!(reply_action("please extend"), Some(ReplyAction::Extend));
        assert_eq!(reply_action("let's discuss"), Some(ReplyAction::Discuss));
        assert_eq!(reply_action("no ipad"), None);
        assert_eq!(reply_action("hello"), None);
    }
}
