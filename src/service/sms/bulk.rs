//! Texts aimed at several children at once: "no tv all kids",
//! "Kid A and Kid B no dessert 2 days", "all done".

use chrono::{DateTime, FixedOffset, Utc};
use tracing::info;

use super::SmsSession;
use super::consequence::{CONSEQUENCE_HELP, ConsequenceDraft, reason, restriction};
use super::intent::names_child;
use crate::db::models::{Child, CommitmentStatus, ConsequenceStatus, Severity};
use crate::error::StashError;
use crate::service::dates::parse_duration_days;
use crate::service::lifecycle;
use crate::service::stats::{month_start, refresh_month};

const ALL_WORDS: &[&str] = &["all kids", "all children", "everyone", "everybody", "both"];

/// Children a text targets when it names more than one. "all kids",
/// "both" and friends mean every child.
pub fn bulk_targets<'a>(message: &str, children: &'a [Child]) -> Option<Vec<&'a Child>> {
    let lower = message.to_lowercase();
    let targets: Vec<&Child> = if ALL_WORDS.iter().any(|w| lower.contains(w)) {
        children.iter().collect()
    } else {
        children.iter().filter(|c| names_child(&lower, c)).collect()
    };
    (targets.len() > 1).then_some(targets)
}

/// One restriction for every target. A missing duration means one day.
pub fn parse_bulk_consequence(
    message: &str,
    targets: &[&Child],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<Vec<ConsequenceDraft>> {
    let lower = message.to_lowercase();
    let (restriction_type, restriction_item) = restriction(&lower, targets)?;
    let duration_days = parse_duration_days(&lower, now, offset)
        .ok()?
        .filter(|d| *d > 0)
        .unwrap_or(1);
    let reason = reason(message, &lower).unwrap_or_else(|| "behavior".to_string());
    Some(
        targets
            .iter()
            .map(|child| ConsequenceDraft {
                child_name: child.name.clone(),
                restriction_type,
                restriction_item: restriction_item.clone(),
                duration_days: Some(duration_days),
                reason: Some(reason.clone()),
                severity: Severity::from_duration(Some(duration_days)),
            })
            .collect(),
    )
}

fn plural(n: i64, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

impl SmsSession<'_> {
    /// Bulk restrictions start active: the sender is acting for the family.
    pub(super) async fn bulk_consequence(
        &mut self,
        message: &str,
        targets: &[&Child],
    ) -> Result<String, StashError> {
        let Some(drafts) = parse_bulk_consequence(message, targets, self.now, self.offset) else {
            return Ok(CONSEQUENCE_HELP.to_string());
        };
        let mut names = Vec::with_capacity(drafts.len());
        for (child, draft) in targets.iter().zip(&drafts) {
            let view = self
                .create_consequence(child, draft, ConsequenceStatus::Active)
                .await?;
            names.push(view.child_name);
        }
        // a single undo cannot take back several rows
        self.conversation.data.last_action = None;

        let days = drafts.first().and_then(|d| d.duration_days).unwrap_or(1);
        let item = drafts
            .first()
            .map(|d| d.restriction_item.as_str())
            .unwrap_or_default();
        info!(user_id = %self.user.id, children = names.len(), item, "bulk consequence applied");
        let list = names
            .iter()
            .map(|n| format!("  • {n}"))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(format!(
            "✓ Applied {item} restriction to {} children\n{list}\n\nDuration: {}",
            names.len(),
            plural(days, "day")
        ))
    }

    /// Mark every active commitment completed now.
    pub(super) async fn complete_all(&mut self) -> Result<String, StashError> {
        let store = self.db.accountability();
        let active = store
            .commitments(self.user.id, None, Some(CommitmentStatus::Active))
            .await?;
        if active.is_empty() {
            return Ok("No pending commitments.".to_string());
        }
        let mut names: Vec<String> = Vec::new();
        let mut months = Vec::new();
        for mut view in active.iter().cloned() {
            lifecycle::complete_commitment(&mut view.commitment, self.now, None, Some(self.user.id));
            store.save_commitment(&view).await?;
            if !names.contains(&view.child_name) {
                names.push(view.child_name.clone());
            }
            let key = (view.child_id, month_start(view.created_at));
            if !months.contains(&key) {
                months.push(key);
            }
        }
        for (child_id, month) in months {
            refresh_month(&store, child_id, month).await?;
        }
        self.conversation.data.last_action = None;
        info!(user_id = %self.user.id, count = active.len(), "all commitments completed");
        Ok(format!(
            "✓ Marked {} complete for {}",
            plural(active.len() as i64, "commitment"),
            names.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::RestrictionType;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn kids(names: &[&str]) -> Vec<Child> {
        names
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

    fn names(targets: Option<Vec<&Child>>) -> Vec<String> {
        targets
            .unwrap_or_default()
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    #[test]
    fn targets_everyone_or_several_named() {
        let family = kids(&["Kid A", "Kid B", "Emma"]);
        assert_eq!(names(bulk_targets("no tv all kids", &family)), ["Kid A", "Kid B", "Emma"]);
        assert_eq!(names(bulk_targets("Both lose dessert", &family)).len(), 3);
        assert_eq!(
            names(bulk_targets("kid a and emma no ipad", &family)),
            ["Kid A", "Emma"]
        );
        assert!(bulk_targets("no ipad kid a", &family).is_none());
        // one child is never a bulk operation
        assert!(bulk_targets("no tv everyone", &kids(&["Kid A"])).is_none());
    }

    #[test]
    fn bulk_draft_defaults() {
        let family = kids(&["Kid A", "Kid B"]);
        let targets: Vec<&Child> = family.iter().collect();
        let drafts = parse_bulk_consequence("no tv all kids", &targets, now(), utc()).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[1].child_name, "Kid B");
        assert_eq!(drafts[0].restriction_type, RestrictionType::Device);
        assert_eq!(drafts[0].restriction_item, "TV");
        assert_eq!(drafts[0].duration_days, Some(1));
        assert_eq!(drafts[0].reason.as_deref(), Some("behavior"));

        let drafts =
            parse_bulk_consequence("Kid A and Kid B no dessert 2 weeks because fighting", &targets, now(), utc())
                .unwrap();
        assert_eq!(drafts[0].restriction_item, "dessert");
        assert_eq!(drafts[0].duration_days, Some(14));
        assert_eq!(drafts[0].reason.as_deref(), Some("fighting"));

        assert!(parse_bulk_consequence("everyone 9999999999 days no tv", &targets, now(), utc()).is_none());
        assert!(parse_bulk_consequence("all kids are great", &targets, now(), utc()).is_none());
    }
}
