//! Status transitions for commitments and consequences, shared by the REST
//! handlers, SMS replies and cron jobs.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{Commitment, CommitmentStatus, Consequence, ConsequenceStatus};
use crate::service::dates::{DurationOutOfRange, MAX_DURATION_DAYS, add_days};

/// Mark completed. `on_time` defaults to `at <= due_date`; returns the
/// value recorded.
pub fn complete_commitment(
    c: &mut Commitment,
    at: DateTime<Utc>,
    on_time: Option<bool>,
    verified_by: Option<Uuid>,
) -> bool {
    let on_time = on_time.unwrap_or(at <= c.due_date);
    c.status = CommitmentStatus::Completed;
    c.completed_at = Some(at);
    c.completed_on_time = Some(on_time);
    if verified_by.is_some() {
        c.verified_by = verified_by;
    }
    on_time
}

pub fn miss_commitment(c: &mut Commitment, verified_by: Option<Uuid>) {
    c.status = CommitmentStatus::Missed;
    c.completed_on_time = Some(false);
    if verified_by.is_some() {
        c.verified_by = verified_by;
    }
}

/// Move the deadline and re-arm the reminder.
pub fn extend_commitment(c: &mut Commitment, due: DateTime<Utc>, at: DateTime<Utc>, reason: Option<String>) {
    c.due_date = due;
    c.status = CommitmentStatus::Active;
    c.reminded_at = None;
    c.extension_requested_at = Some(at);
    if reason.is_some() {
        c.extension_reason = reason;
    }
}

pub fn confirm_consequence(q: &mut Consequence, by: Uuid, at: DateTime<Utc>) {
    q.status = ConsequenceStatus::Active;
    q.confirmed_by = Some(by);
    q.confirmed_at = Some(at);
}

pub fn lift_consequence(q: &mut Consequence, by: Uuid, at: DateTime<Utc>) {
    q.status = ConsequenceStatus::Lifted;
    q.lifted_by = Some(by);
    q.lifted_at = Some(at);
}

/// Push the expiry out by `days` (from now when open-ended) and keep it
/// active. Leaves `q` untouched when the new expiry is out of range.
pub fn extend_consequence(
    q: &mut Consequence,
    days: i64,
    now: DateTime<Utc>,
) -> Result<(), DurationOutOfRange> {
    if !(0..=MAX_DURATION_DAYS).contains(&days) {
        return Err(DurationOutOfRange);
    }
    let base = q.expires_at.unwrap_or(now);
    let expires_at = add_days(base, days).ok_or(DurationOutOfRange)?;
    let total = q
        .duration_days
        .unwrap_or(0)
        .checked_add(days)
        .ok_or(DurationOutOfRange)?;
    q.expires_at = Some(expires_at);
    q.duration_days = Some(total);
    q.status = ConsequenceStatus::Active;
    Ok(())
}
