//! Monthly commitment reliability.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::db::AccountabilityStore;
use crate::db::models::{Commitment, CommitmentCategory, CommitmentStats, CommitmentStatus};
use crate::error::StashError;

/// Counts for one child and one month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthTally {
    pub total: i64,
    pub on_time: i64,
    pub late: i64,
    pub missed: i64,
    pub homework: i64,
    pub chores: i64,
    pub other: i64,
}

impl MonthTally {
    pub fn from_commitments(commitments: &[Commitment]) -> Self {
        let mut t = MonthTally::default();
        for c in commitments {
            t.total += 1;
            match (c.status, c.completed_on_time) {
                (CommitmentStatus::Completed, Some(false)) => t.late += 1,
                (CommitmentStatus::Completed, _) => t.on_time += 1,
                (CommitmentStatus::Missed, _) => t.missed += 1,
                _ => {}
            }
            match c.category {
                CommitmentCategory::Homework => t.homework += 1,
                CommitmentCategory::Chores => t.chores += 1,
                _ => t.other += 1,
            }
        }
        t
    }

    /// Percentage of commitments completed on time, `None` with no commitments.
    pub fn reliability(&self) -> Option<f64> {
        (self.total > 0).then(|| {
            let pct = self.on_time as f64 / self.total as f64 * 100.0;
            (pct * 100.0).round() / 100.0
        })
    }
}

/// First day of the month containing `at`.
pub fn month_start(at: DateTime<Utc>) -> NaiveDate {
    NaiveDate::from_ymd_opt(at.year(), at.month(), 1).unwrap_or_else(|| at.date_naive())
}

/// `"2025-03"` (or `"2025-03-01"`) → first day of that month.
pub fn parse_month(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let ym = s.get(..7)?;
    NaiveDate::parse_from_str(&format!("{ym}-01"), "%Y-%m-%d").ok()
}

/// `[start, end)` of the month starting at `first`, in UTC.
pub fn month_bounds(first: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    }
    .unwrap_or(first);
    let start = Utc.from_utc_datetime(&first.and_time(chrono::NaiveTime::MIN));
    let end = Utc.from_utc_datetime(&next.and_time(chrono::NaiveTime::MIN));
    (start, end)
}

/// Key stored in `commitment_stats.month`.
pub fn month_key(first: NaiveDate) -> String {
    first.format("%Y-%m-01").to_string()
}

/// Recount a child's commitments created in `month` and upsert the row.
pub async fn refresh_month(
    store: &AccountabilityStore,
    child_id: Uuid,
    month: NaiveDate,
) -> Result<CommitmentStats, StashError> {
    let (start, end) = month_bounds(month);
    let commitments = store.commitments_created_between(child_id, start, end).await?;
    let tally = MonthTally::from_commitments(&commitments);
    store.upsert_stats(child_id, &month_key(month), &tally).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commitment(status: CommitmentStatus, on_time: Option<bool>, cat: CommitmentCategory) -> Commitment {
        let now = Utc::now();
        Commitment {
            id: Uuid::new_v4(),
            child_id: Uuid::nil(),
            commitment_text: "x".into(),
            due_date: now,
            status,
            category: cat,
            committed_by: Uuid::nil(),
            verified_by: None,
            requested_by: None,
            created_at: now,
            completed_at: None,
            reminded_at: None,
            extension_requested_at: None,
            completed_on_time: on_time,
            related_consequence_id: None,
            extension_reason: None,
            notes: None,
        }
    }

    #[test]
    fn tally_counts_outcomes_and_categories() {
        let list = vec![
            commitment(CommitmentStatus::Completed, Some(true), CommitmentCategory::Homework),
            commitment(CommitmentStatus::Completed, Some(false), CommitmentCategory::Chores),
            commitment(CommitmentStatus::Missed, Some(false), CommitmentCategory::Behavior),
            commitment(CommitmentStatus::Active, None, CommitmentCategory::Homework),
        ];
        let t = MonthTally::from_commitments(&list);
        assert_eq!(t.total, 4);
        assert_eq!((t.on_time, t.late, t.missed), (1, 1, 1));
        assert_eq!((t.homework, t.chores, t.other), (2, 1, 1));
        assert_eq!(t.reliability(), Some(25.0));
        assert_eq!(MonthTally::default().reliability(), None);
    }

    #[test]
    fn reliability_rounds_to_two_places() {
        let t = MonthTally {
            total: 3,
            on_time: 2,
            ..Default::default()
        };
        assert_eq!(t.reliability(), Some(66.67));
    }

    #[test]
    fn month_helpers() {
        let first = parse_month("2025-12").unwrap();
        assert_eq!(month_key(first), "2025-12-01");
        let (start, end) = month_bounds(first);
        assert_eq!(start.to_rfc3339(), "2025-12-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-01-01T00:00:00+00:00");
        assert!(parse_month("garbage").is_none());
        assert_eq!(parse_month("2024-02-01"), NaiveDate::from_ymd_opt(2024, 2, 1));
    }
}
