//! Partner SMS bodies. Kept short: one SMS segment where possible.

use chrono::{DateTime, FixedOffset, Utc};

use crate::db::models::{Child, CommitmentStats, CommitmentView, ConsequenceView};
use crate::service::dates::{clock, month_day_time};

fn pct(score: Option<f64>) -> i64 {
    score.unwrap_or(0.0).round() as i64
}

pub fn consequence_created(q: &ConsequenceView, setter: &str, offset: FixedOffset) -> String {
    let expires = q
        .expires_at
        .map(|at| month_day_time(at, offset))
        .unwrap_or_else(|| "manual lift only".to_string());
    let days = q
        .duration_days
        .map(|d| d.to_string())
        .unwrap_or_else(|| "?".to_string());
    format!(
        "{setter} set {} restriction ({days} days) for {} - {}\n\nExpires: {expires}\n\nReply CONFIRM, MODIFY, or DISCUSS",
        q.restriction_item, q.child_name, q.reason
    )
}

pub fn consequence_confirmed(q: &ConsequenceView, confirmed_by: &str, offset: FixedOffset) -> String {
    let expires = q
        .expires_at
        .map(|at| month_day_time(at, offset))
        .unwrap_or_else(|| "indefinite".to_string());
    format!(
        "✓ Both parents aligned. {}: {} restricted until {expires}\n\nConfirmed by {confirmed_by}",
        q.child_name, q.restriction_item
    )
}

pub fn consequence_expiring(q: &ConsequenceView, now: DateTime<Utc>, offset: FixedOffset) -> String {
    let (hours, expires) = match q.expires_at {
        Some(at) => (
            ((at - now).num_minutes() as f64 / 60.0).round() as i64,
            month_day_time(at, offset),
        ),
        None => (0, "soon".to_string()),
    };
    format!(
        "⏰ {}'s {} restriction ends in {hours}h ({expires})\n\nReason: {}\n\nReply LIFT to end now, or EXTEND to continue",
        q.child_name, q.restriction_item, q.reason
    )
}

pub fn consequence_expired(q: &ConsequenceView) -> String {
    let duration = q
        .duration_days
        .map(|d| format!("{d} days completed"))
        .unwrap_or_else(|| "restriction period ended".to_string());
    format!(
        "✓ {item} restriction ended for {child}\n\n{duration}. {child} can now use {item}.",
        item = q.restriction_item,
        child = q.child_name,
    )
}

pub fn commitment_created(c: &CommitmentView, by_child: bool, offset: FixedOffset) -> String {
    let creator = if by_child {
        format!("{} committed", c.child_name)
    } else {
        "Parent set".to_string()
    };
    format!(
        "📝 {creator}: {} - {}\n\nDue: {}\nBoth parents notified",
        c.child_name,
        c.commitment_text,
        month_day_time(c.due_date, offset)
    )
}

pub fn commitment_reminder(c: &CommitmentView, now: DateTime<Utc>, offset: FixedOffset) -> String {
    let minutes = (c.due_date - now).num_minutes().max(0);
    format!(
        "⏰ Reminder: {} - {}\n\nDue in {minutes} minutes ({})\n\nReply DONE if finished early",
        c.child_name,
        c.commitment_text,
        clock(c.due_date, offset)
    )
}

pub fn commitment_verification(c: &CommitmentView) -> String {
    format!(
        "⏰ {}'s commitment is now due:\n\"{}\"\n\nReply DONE, LATE, or MISSED to verify",
        c.child_name, c.commitment_text
    )
}

pub fn commitment_missed(c: &CommitmentView, stats: &CommitmentStats) -> String {
    let misses = if stats.missed > 1 {
        format!("{} misses this month. ", stats.missed)
    } else {
        String::new()
    };
    format!(
        "⚠️ {} missed commitment: {}\n\n{misses}Reliability: {}%\n\nReply with consequence or DISCUSS",
        c.child_name,
        c.commitment_text,
        pct(stats.reliability_score)
    )
}

pub fn commitment_completed(c: &CommitmentView, on_time: bool, stats: &CommitmentStats) -> String {
    let (mark, when) = if on_time { ("✓", "on time") } else { ("⏰", "late") };
    format!(
        "{mark} {} completed \"{}\" {when}!\n\nReliability: {}/{} ({}%) this month",
        c.child_name,
        c.commitment_text,
        stats.completed_on_time,
        stats.total_commitments,
        pct(stats.reliability_score)
    )
}

fn badge(score: i64) -> &'static str {
    match score {
        80.. => "🏆",
        60..=79 => "👍",
        _ => "⚠️",
    }
}

/// Month-to-date reliability, one line per child.
pub fn weekly_report(rows: &[(Child, CommitmentStats)]) -> String {
    let lines: String = rows
        .iter()
        .map(|(child, stats)| {
            let score = pct(stats.reliability_score);
            format!(
                "{} {}: {score}% ({}/{})\n",
                badge(score),
                child.name,
                stats.completed_on_time,
                stats.total_commitments
            )
        })
        .collect();
    format!("📊 Weekly Family Report:\n\n{lines}\nKeep up the great work!")
}

/// Accountability command reference.
pub fn help() -> &'static str {
    "SMS Commands:\n\n\
     CONSEQUENCES:\n\
     • \"No iPad 3 days Kid A\"\n\
     • Reply: CONFIRM, MODIFY, LIFT, EXTEND\n\n\
     COMMITMENTS:\n\
     • \"Kid A will finish homework by 7pm\"\n\
     • Reply: DONE, LATE, MISSED\n\n\
     QUERIES:\n\
     • \"status\" - overall status\n\
     • \"What's Kid A restricted from?\"\n\n\
     RESPONSES:\n\
     • CONFIRM - agree with consequence\n\
     • DONE - commitment completed\n\
     • LIFT - end restriction early\n\
     • EXTEND - extend restriction/commitment"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{
        Commitment, CommitmentCategory, CommitmentStatus, Consequence, ConsequenceStatus,
        RestrictionType, Severity,
    };
    use chrono::TimeZone;
    use uuid::Uuid;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn consequence(days: Option<i64>, expires: Option<DateTime<Utc>>) -> ConsequenceView {
        ConsequenceView {
            consequence: Consequence {
                id: Uuid::new_v4(),
                child_id: Uuid::new_v4(),
                restriction_type: RestrictionType::Device,
                restriction_item: "iPad".into(),
                reason: "homework".into(),
                duration_days: days,
                expires_at: expires,
                status: ConsequenceStatus::Active,
                severity: Severity::Medium,
                created_by: Uuid::nil(),
                confirmed_by: None,
                lifted_by: None,
                created_at: Utc::now(),
                confirmed_at: None,
                lifted_at: None,
                related_commitment_id: None,
                notes: None,
            },
            child_name: "Kid A".into(),
            owner_id: Uuid::nil(),
        }
    }

    fn commitment(due: DateTime<Utc>) -> CommitmentView {
        CommitmentView {
            commitment: Commitment {
                id: Uuid::new_v4(),
                child_id: Uuid::new_v4(),
                commitment_text: "finish homework".into(),
                due_date: due,
                status: CommitmentStatus::Active,
                category: CommitmentCategory::Homework,
                committed_by: Uuid::nil(),
                verified_by: None,
                requested_by: None,
                created_at: Utc::now(),
                completed_at: None,
                reminded_at: None,
                extension_requested_at: None,
                completed_on_time: None,
                related_consequence_id: None,
                extension_reason: None,
                notes: None,
            },
            child_name: "Kid A".into(),
            owner_id: Uuid::nil(),
        }
    }

    #[test]
    fn consequence_templates() {
        let at = Utc.with_ymd_and_hms(2025, 11, 22, 19, 0, 0).unwrap();
        let q = consequence(Some(3), Some(at));
        let body = consequence_created(&q, "Alex", utc());
        assert!(body.starts_with("Alex set iPad restriction (3 days) for Kid A - homework"));
        assert!(body.contains("Expires: Nov 22 7:00 PM"));
        assert!(body.ends_with("Reply CONFIRM, MODIFY, or DISCUSS"));

        let open = consequence(None, None);
        assert!(consequence_created(&open, "Alex", utc()).contains("(? days)"));
        assert!(consequence_created(&open, "Alex", utc()).contains("manual lift only"));
        assert!(consequence_expired(&open).contains("restriction period ended. Kid A can now use iPad."));

        let now = at - chrono::Duration::minutes(90);
        assert!(consequence_expiring(&q, now, utc()).contains("ends in 2h (Nov 22 7:00 PM)"));
    }

    #[test]
    fn commitment_templates() {
        let due = Utc.with_ymd_and_hms(2025, 11, 19, 19, 0, 0).unwrap();
        let c = commitment(due);
        let now = due - chrono::Duration::minutes(30);
        assert!(commitment_reminder(&c, now, utc()).contains("Due in 30 minutes (7:00 PM)"));
        assert!(commitment_verification(&c).contains("Reply DONE, LATE, or MISSED"));
        assert!(commitment_created(&c, true, utc()).starts_with("📝 Kid A committed: Kid A - finish homework"));

        let stats = CommitmentStats {
            id: Uuid::new_v4(),
            child_id: c.child_id,
            month: "2025-11-01".into(),
            total_commitments: 4,
            completed_on_time: 3,
            completed_late: 0,
            missed: 2,
            reliability_score: Some(75.0),
            homework_count: 4,
            chores_count: 0,
            other_count: 0,
            updated_at: Utc::now(),
        };
        let missed = commitment_missed(&c, &stats);
        assert!(missed.contains("2 misses this month. Reliability: 75%"));
        let done = commitment_completed(&c, true, &stats);
        assert!(done.contains("completed \"finish homework\" on time!"));
        assert!(done.contains("Reliability: 3/4 (75%) this month"));

        let child = |name: &str| Child {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: name.into(),
            age: None,
            avatar_color: "#6366f1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let mut shaky = stats.clone();
        shaky.reliability_score = Some(50.0);
        shaky.completed_on_time = 1;
        shaky.total_commitments = 2;
        let report = weekly_report(&[(child("Kid A"), stats), (child("Kid B"), shaky)]);
        assert_eq!(
            report,
            "📊 Weekly Family Report:\n\n👍 Kid A: 75% (3/4)\n⚠️ Kid B: 50% (1/2)\n\nKeep up the great work!"
        );
    }
}
