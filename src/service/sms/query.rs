use chrono::{DateTime, FixedOffset, Utc};

use super::SmsSession;
use super::intent::find_child;
use crate::db::models::{Child, CommitmentStatus, CommitmentView, ConsequenceStatus, ConsequenceView};
use crate::error::StashError;
use crate::service::dates::{due_label, month_day, month_day_time};
use crate::service::notify::templates;

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Per-child counts of active restrictions and commitments.
pub fn format_family_status(
    children: &[Child],
    consequences: &[ConsequenceView],
    commitments: &[CommitmentView],
) -> String {
    let mut out = String::from("📊 Family Status:");
    for child in children {
        let restricted = consequences.iter().filter(|q| q.child_id == child.id).count();
        let committed = commitments.iter().filter(|c| c.child_id == child.id).count();
        out.push_str(&format!("\n\n{}:", child.name));
        if restricted == 0 && committed == 0 {
            out.push_str("\n✓ All clear");
            continue;
        }
        if restricted > 0 {
            out.push_str(&format!("\n🚫 {}", plural(restricted, "restriction")));
        }
        if committed > 0 {
            out.push_str(&format!("\n📝 {}", plural(committed, "commitment")));
        }
    }
    out
}

pub fn format_restrictions(
    child: Option<&Child>,
    consequences: &[ConsequenceView],
    offset: FixedOffset,
) -> String {
    if consequences.is_empty() {
        return match child {
            Some(c) => format!("{} has no active restrictions.", c.name),
            None => "No active restrictions.".to_string(),
        };
    }
    let mut out = match child {
        Some(c) => format!("{}'s Restrictions:", c.name),
        None => "Active Restrictions:".to_string(),
    };
    for q in consequences {
        let until = q
            .expires_at
            .map(|at| format!("until {}", month_day(at, offset)))
            .unwrap_or_else(|| "indefinite".to_string());
        match child {
            Some(_) => out.push_str(&format!("\n• {} ({until})", q.restriction_item)),
            None => out.push_str(&format!("\n• {}: {} ({until})", q.child_name, q.restriction_item)),
        }
    }
    out
}

pub fn format_commitments(
    child: Option<&Child>,
    commitments: &[CommitmentView],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> String {
    if commitments.is_empty() {
        return match child {
            Some(c) => format!("{} has no active commitments.", c.name),
            None => "No active commitments.".to_string(),
        };
    }
    let mut out = match child {
        Some(c) => format!("{}'s Commitments:", c.name),
        None => "Active Commitments:".to_string(),
    };
    for c in commitments {
        let due = if c.due_date < now {
            format!("⚠️ OVERDUE (was due {})", month_day_time(c.due_date, offset))
        } else {
            format!("due {}", due_label(c.due_date, now, offset))
        };
        match child {
            Some(_) => out.push_str(&format!("\n• {} - {due}", c.commitment_text)),
            None => out.push_str(&format!("\n• {}: {} - {due}", c.child_name, c.commitment_text)),
        }
    }
    out
}

impl SmsSession<'_> {
    pub(super) async fn active_consequences(
        &self,
        child: Option<&Child>,
    ) -> Result<Vec<ConsequenceView>, StashError> {
        self.db
            .accountability()
            .consequences(self.user.id, child.map(|c| c.id), Some(ConsequenceStatus::Active))
            .await
    }

    pub(super) async fn active_commitments(
        &self,
        child: Option<&Child>,
    ) -> Result<Vec<CommitmentView>, StashError> {
        self.db
            .accountability()
            .commitments(self.user.id, child.map(|c| c.id), Some(CommitmentStatus::Active))
            .await
    }

    pub(super) async fn family_status(&self) -> Result<String, StashError> {
        let children = self.children().await?;
        if children.is_empty() {
            return Ok(super::NO_CHILDREN.to_string());
        }
        let consequences = self.active_consequences(None).await?;
        let commitments = self.active_commitments(None).await?;
        Ok(format_family_status(&children, &consequences, &commitments))
    }

    pub(super) async fn handle_query(&mut self, message: &str) -> Result<String, StashError> {
        let lower = message.to_lowercase();
        if lower.contains("help") || lower.contains("command") {
            return Ok(templates::help().to_string());
        }
        let children = self.children().await?;
        let child = find_child(message, &children);
        if let Some(c) = child {
            self.conversation.data.last_child_mentioned = Some(c.name.clone());
        }

        if lower.contains("restrict") || lower.contains("punish") || lower.contains("consequence") {
            let consequences = self.active_consequences(child).await?;
            return Ok(format_restrictions(child, &consequences, self.offset));
        }
        if lower.contains("commit") || lower.contains("due") || lower.contains("homework") {
            let commitments = self.active_commitments(child).await?;
            return Ok(format_commitments(child, &commitments, self.now, self.offset));
        }
        match child {
            Some(c) => {
                let consequences = self.active_consequences(Some(c)).await?;
                let commitments = self.active_commitments(Some(c)).await?;
                Ok(format!(
                    "{}\n\n{}",
                    format_restrictions(Some(c), &consequences, self.offset),
                    format_commitments(Some(c), &commitments, self.now, self.offset)
                ))
            }
            None => self.family_status().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{
        Commitment, CommitmentCategory, Consequence, RestrictionType, Severity,
    };
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 19, 15, 0, 0).unwrap()
    }

    fn child(name: &str) -> Child {
        Child {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: name.into(),
            age: None,
            avatar_color: "#6366f1".into(),
            created_at: now(),
            updated_at: now(),
        }
    }

    fn restriction(child: &Child, item: &str, expires: Option<DateTime<Utc>>) -> ConsequenceView {
        ConsequenceView {
            consequence: Consequence {
                id: Uuid::new_v4(),
                child_id: child.id,
                restriction_type: RestrictionType::Device,
                restriction_item: item.into(),
                reason: "homework".into(),
                duration_days: None,
                expires_at: expires,
                status: ConsequenceStatus::Active,
                severity: Severity::Medium,
                created_by: Uuid::nil(),
                confirmed_by: None,
                lifted_by: None,
                created_at: now(),
                confirmed_at: None,
                lifted_at: None,
                related_commitment_id: None,
                notes: None,
            },
            child_name: child.name.clone(),
            owner_id: Uuid::nil(),
        }
    }

    fn commitment(child: &Child, text: &str, due: DateTime<Utc>) -> CommitmentView {
        CommitmentView {
            commitment: Commitment {
                id: Uuid::new_v4(),
                child_id: child.id,
                commitment_text: text.into(),
                due_date: due,
                status: CommitmentStatus::Active,
                category: CommitmentCategory::Chores,
                committed_by: Uuid::nil(),
                verified_by: None,
                requested_by: None,
                created_at: now(),
                completed_at: None,
                reminded_at: None,
                extension_requested_at: None,
                completed_on_time: None,
                related_consequence_id: None,
                extension_reason: None,
                notes: None,
            },
            child_name: child.name.clone(),
            owner_id: Uuid::nil(),
        }
    }

    #[test]
    fn family_status_counts_per_child() {
        let a = child("Kid A");
        let b = child("Kid B");
        let qs = vec![
            restriction(&a, "iPad", None),
            restriction(&a, "TV", None),
        ];
        let cs = vec![commitment(&a, "dishes", now() + Duration::hours(2))];
        let text = format_family_status(&[a, b], &qs, &cs);
        assert_eq!(
            text,
            "📊 Family Status:\n\nKid A:\n🚫 2 restrictions\n📝 1 commitment\n\nKid B:\n✓ All clear"
        );
    }

    #[test]
    fn restrictions_list() {
        let a = child("Kid A");
        let until = Utc.with_ymd_and_hms(2025, 11, 22, 15, 0, 0).unwrap();
        let qs = vec![restriction(&a, "iPad", Some(until)), restriction(&a, "TV", None)];
        assert_eq!(
            format_restrictions(Some(&a), &qs, utc()),
            "Kid A's Restrictions:\n• iPad (until Nov 22)\n• TV (indefinite)"
        );
        assert!(format_restrictions(None, &qs, utc()).starts_with("Active Restrictions:\n• Kid A: iPad"));
        assert_eq!(format_restrictions(Some(&a), &[], utc()), "Kid A has no active restrictions.");
    }

    #[test]
    fn overdue_commitments_are_flagged() {
        let a = child("Kid A");
        let cs = vec![
            commitment(&a, "dishes", now() - Duration::hours(3)),
            commitment(&a, "homework", now() + Duration::hours(4)),
        ];
        let text = format_commitments(None, &cs, now(), utc());
        assert!(text.contains("• Kid A: dishes - ⚠️ OVERDUE (was due Nov 19 12:00 PM)"));
        assert!(text.contains("• Kid A: homework - due Today 7:00 PM"));
    }
}
