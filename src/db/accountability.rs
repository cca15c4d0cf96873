use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::SqlitePool;
use super::models::{
    Child, Commitment, CommitmentStats, CommitmentStatus, CommitmentView, Consequence,
    ConsequenceStatus, ConsequenceView,
};
use crate::error::StashError;
use crate::service::stats::MonthTally;

const COMMITMENT_VIEW: &str = "SELECT c.*, ch.name AS child_name, ch.user_id AS owner_id \
     FROM commitments c JOIN children ch ON ch.id = c.child_id";

const CONSEQUENCE_VIEW: &str = "SELECT q.*, ch.name AS child_name, ch.user_id AS owner_id \
     FROM consequences q JOIN children ch ON ch.id = q.child_id";

/// Children, commitments, consequences and their monthly statistics.
#[derive(Clone)]
pub struct AccountabilityStore {
    pool: SqlitePool,
}

impl AccountabilityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ---- children ----

    pub async fn children(&self, user_id: Uuid) -> Result<Vec<Child>, StashError> {
        let rows = sqlx::query_as::<_, Child>(
            "SELECT * FROM children WHERE user_id = ? ORDER BY name COLLATE NOCASE",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn all_children(&self) -> Result<Vec<Child>, StashError> {
        let rows = sqlx::query_as::<_, Child>("SELECT * FROM children ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn child(&self, user_id: Uuid, id: Uuid) -> Result<Option<Child>, StashError> {
        let row = sqlx::query_as::<_, Child>("SELECT * FROM children WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Case-insensitive lookup by exact name.
    pub async fn child_by_name(
        &self,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<Child>, StashError> {
        let row = sqlx::query_as::<_, Child>(
            "SELECT * FROM children WHERE user_id = ? AND lower(name) = lower(?) LIMIT 1",
        )
        .bind(user_id)
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn create_child(
        &self,
        user_id: Uuid,
        name: &str,
        age: Option<i64>,
        avatar_color: Option<&str>,
    ) -> Result<Child, StashError> {
        let now = Utc::now();
        let child = Child {
            id: Uuid::new_v4(),
            user_id,
            name: name.trim().to_string(),
            age,
            avatar_color: avatar_color.unwrap_or("#6366f1").to_string(),
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            r#"
            INSERT INTO children (id, user_id, name, age, avatar_color, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(child.id)
        .bind(child.user_id)
        .bind(&child.name)
        .bind(child.age)
        .bind(&child.avatar_color)
        .bind(child.created_at)
        .bind(child.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(child)
    }

    pub async fn delete_child(&self, user_id: Uuid, id: Uuid) -> Result<bool, StashError> {
        let res = sqlx::query("DELETE FROM children WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // ---- commitments ----

    pub async fn commitments(
        &self,
        user_id: Uuid,
        child_id: Option<Uuid>,
        status: Option<CommitmentStatus>,
    ) -> Result<Vec<CommitmentView>, StashError> {
        let sql = format!(
            "{COMMITMENT_VIEW} WHERE ch.user_id = ? \
             AND (? IS NULL OR c.child_id = ?) \
             AND (? IS NULL OR c.status = ?) \
             ORDER BY julianday(c.due_date)"
        );
        let rows = sqlx::query_as::<_, CommitmentView>(&sql)
            .bind(user_id)
            .bind(child_id)
            .bind(child_id)
            .bind(status)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn commitment(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<CommitmentView>, StashError> {
        let sql = format!("{COMMITMENT_VIEW} WHERE c.id = ? AND ch.user_id = ?");
        let row = sqlx::query_as::<_, CommitmentView>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn insert_commitment(&self, c: &Commitment) -> Result<(), StashError> {
        sqlx::query(
            r#"
            INSERT INTO commitments (
                id, child_id, commitment_text, due_date, status, category, committed_by,
                verified_by, requested_by, created_at, completed_at, reminded_at,
                extension_requested_at, completed_on_time, related_consequence_id,
                extension_reason, notes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(c.id)
        .bind(c.child_id)
        .bind(&c.commitment_text)
        .bind(c.due_date)
        .bind(c.status)
        .bind(c.category)
        .bind(c.committed_by)
        .bind(c.verified_by)
        .bind(c.requested_by)
        .bind(c.created_at)
        .bind(c.completed_at)
        .bind(c.reminded_at)
        .bind(c.extension_requested_at)
        .bind(c.completed_on_time)
        .bind(c.related_consequence_id)
        .bind(&c.extension_reason)
        .bind(&c.notes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist the mutable columns of a commitment.
    pub async fn save_commitment(&self, c: &Commitment) -> Result<(), StashError> {
        sqlx::query(
            r#"
            UPDATE commitments SET
                commitment_text = ?, due_date = ?, status = ?, category = ?, verified_by = ?,
                completed_at = ?, reminded_at = ?, extension_requested_at = ?,
                completed_on_time = ?, extension_reason = ?, notes = ?
            WHERE id = ?
            "#,
        )
        .bind(&c.commitment_text)
        .bind(c.due_date)
        .bind(c.status)
        .bind(c.category)
        .bind(c.verified_by)
        .bind(c.completed_at)
        .bind(c.reminded_at)
        .bind(c.extension_requested_at)
        .bind(c.completed_on_time)
        .bind(&c.extension_reason)
        .bind(&c.notes)
        .bind(c.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_commitment(&self, user_id: Uuid, id: Uuid) -> Result<bool, StashError> {
        let res = sqlx::query(
            "DELETE FROM commitments WHERE id = ? \
             AND child_id IN (SELECT id FROM children WHERE user_id = ?)",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// The active commitment with the nearest due date.
    pub async fn soonest_active_commitment(
        &self,
        user_id: Uuid,
    ) -> Result<Option<CommitmentView>, StashError> {
        let sql = format!(
            "{COMMITMENT_VIEW} WHERE ch.user_id = ? AND c.status = ? \
             ORDER BY julianday(c.due_date) LIMIT 1"
        );
        let row = sqlx::query_as::<_, CommitmentView>(&sql)
            .bind(user_id)
            .bind(CommitmentStatus::Active)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Active, not yet reminded, due within the next `lead`.
    pub async fn due_for_reminder(
        &self,
        now: DateTime<Utc>,
        lead: Duration,
    ) -> Result<Vec<CommitmentView>, StashError> {
        let sql = format!(
            "{COMMITMENT_VIEW} WHERE c.status = ? AND c.reminded_at IS NULL \
             AND julianday(c.due_date) >= julianday(?) AND julianday(c.due_date) <= julianday(?) \
             ORDER BY julianday(c.due_date)"
        );
        let rows = sqlx::query_as::<_, CommitmentView>(&sql)
            .bind(CommitmentStatus::Active)
            .bind(now)
            .bind(now + lead)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Active, came due within the last `grace`, no verification request logged yet.
    pub async fn due_for_verification(
        &self,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> Result<Vec<CommitmentView>, StashError> {
        let sql = format!(
            "{COMMITMENT_VIEW} WHERE c.status = ? \
             AND julianday(c.due_date) >= julianday(?) AND julianday(c.due_date) < julianday(?) \
             AND NOT EXISTS (SELECT 1 FROM partner_notifications n \
                 WHERE n.reference_id = c.id AND n.notification_type = 'verification_needed') \
             ORDER BY julianday(c.due_date)"
        );
        let rows = sqlx::query_as::<_, CommitmentView>(&sql)
            .bind(CommitmentStatus::Active)
            .bind(now - grace)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Active commitments whose due date passed more than `grace` ago.
    pub async fn overdue(
        &self,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> Result<Vec<CommitmentView>, StashError> {
        let sql = format!(
            "{COMMITMENT_VIEW} WHERE c.status = ? AND julianday(c.due_date) < julianday(?) \
             ORDER BY julianday(c.due_date)"
        );
        let rows = sqlx::query_as::<_, CommitmentView>(&sql)
            .bind(CommitmentStatus::Active)
            .bind(now - grace)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn mark_reminded(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StashError> {
        sqlx::query("UPDATE commitments SET reminded_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- consequences ----

    pub async fn consequences(
        &self,
        user_id: Uuid,
        child_id: Option<Uuid>,
        status: Option<ConsequenceStatus>,
    ) -> Result<Vec<ConsequenceView>, StashError> {
        let sql = format!(
            "{CONSEQUENCE_VIEW} WHERE ch.user_id = ? \
             AND (? IS NULL OR q.child_id = ?) \
             AND (? IS NULL OR q.status = ?) \
             ORDER BY julianday(q.created_at) DESC"
        );
        let rows = sqlx::query_as::<_, ConsequenceView>(&sql)
            .bind(user_id)
            .bind(child_id)
            .bind(child_id)
            .bind(status)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn consequence(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ConsequenceView>, StashError> {
        let sql = format!("{CONSEQUENCE_VIEW} WHERE q.id = ? AND ch.user_id = ?");
        let row = sqlx::query_as::<_, ConsequenceView>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn insert_consequence(&self, q: &Consequence) -> Result<(), StashError> {
        sqlx::query(
            r#"
            INSERT INTO consequences (
                id, child_id, restriction_type, restriction_item, reason, duration_days,
                expires_at, status, severity, created_by, confirmed_by, lifted_by,
                created_at, confirmed_at, lifted_at, related_commitment_id, notes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(q.id)
        .bind(q.child_id)
        .bind(q.restriction_type)
        .bind(&q.restriction_item)
        .bind(&q.reason)
        .bind(q.duration_days)
        .bind(q.expires_at)
        .bind(q.status)
        .bind(q.severity)
        .bind(q.created_by)
        .bind(q.confirmed_by)
        .bind(q.lifted_by)
        .bind(q.created_at)
        .bind(q.confirmed_at)
        .bind(q.lifted_at)
        .bind(q.related_commitment_id)
        .bind(&q.notes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist the mutable columns of a consequence.
    pub async fn save_consequence(&self, q: &Consequence) -> Result<(), StashError> {
        sqlx::query(
            r#"
            UPDATE consequences SET
                restriction_item = ?, reason = ?, duration_days = ?, expires_at = ?,
                status = ?, severity = ?, confirmed_by = ?, lifted_by = ?,
                confirmed_at = ?, lifted_at = ?, notes = ?
            WHERE id = ?
            "#,
        )
        .bind(&q.restriction_item)
        .bind(&q.reason)
        .bind(q.duration_days)
        .bind(q.expires_at)
        .bind(q.status)
        .bind(q.severity)
        .bind(q.confirmed_by)
        .bind(q.lifted_by)
        .bind(q.confirmed_at)
        .bind(q.lifted_at)
        .bind(&q.notes)
        .bind(q.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_consequence(&self, user_id: Uuid, id: Uuid) -> Result<bool, StashError> {
        let res = sqlx::query(
            "DELETE FROM consequences WHERE id = ? \
             AND child_id IN (SELECT id FROM children WHERE user_id = ?)",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Most recently created consequence in `status`.
    pub async fn newest_consequence(
        &self,
        user_id: Uuid,
        status: ConsequenceStatus,
    ) -> Result<Option<ConsequenceView>, StashError> {
        let sql = format!(
            "{CONSEQUENCE_VIEW} WHERE ch.user_id = ? AND q.status = ? \
             ORDER BY julianday(q.created_at) DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, ConsequenceView>(&sql)
            .bind(user_id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Active consequences whose `expires_at` has passed.
    pub async fn expired_active(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsequenceView>, StashError> {
        let sql = format!(
            "{CONSEQUENCE_VIEW} WHERE q.status = ? AND q.expires_at IS NOT NULL \
             AND julianday(q.expires_at) < julianday(?)"
        );
        let rows = sqlx::query_as::<_, ConsequenceView>(&sql)
            .bind(ConsequenceStatus::Active)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Active consequences expiring in `[from, to]`.
    pub async fn expiring_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ConsequenceView>, StashError> {
        let sql = format!(
            "{CONSEQUENCE_VIEW} WHERE q.status = ? AND q.expires_at IS NOT NULL \
             AND julianday(q.expires_at) >= julianday(?) AND julianday(q.expires_at) <= julianday(?) \
             ORDER BY julianday(q.expires_at)"
        );
        let rows = sqlx::query_as::<_, ConsequenceView>(&sql)
            .bind(ConsequenceStatus::Active)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Lift every active consequence of the user. Returns the lifted rows.
    pub async fn lift_all_active(
        &self,
        user_id: Uuid,
        lifted_by: Uuid,
    ) -> Result<Vec<ConsequenceView>, StashError> {
        let active = self
            .consequences(user_id, None, Some(ConsequenceStatus::Active))
            .await?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for q in &active {
            sqlx::query(
                "UPDATE consequences SET status = ?, lifted_at = ?, lifted_by = ? WHERE id = ?",
            )
            .bind(ConsequenceStatus::Lifted)
            .bind(now)
            .bind(lifted_by)
            .bind(q.id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(active)
    }

    // ---- stats ----

    /// Commitments for a child created in `[start, end)`.
    pub async fn commitments_created_between(
        &self,
        child_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Commitment>, StashError> {
        let rows = sqlx::query_as::<_, Commitment>(
            "SELECT * FROM commitments WHERE child_id = ? \
             AND julianday(created_at) >= julianday(?) AND julianday(created_at) < julianday(?)",
        )
        .bind(child_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Upsert the monthly stats row for `(child_id, month)`.
    pub async fn upsert_stats(
        &self,
        child_id: Uuid,
        month: &str,
        tally: &MonthTally,
    ) -> Result<CommitmentStats, StashError> {
        sqlx::query(
            r#"
            INSERT INTO commitment_stats (
                id, child_id, month, total_commitments, completed_on_time, completed_late,
                missed, reliability_score, homework_count, chores_count, other_count, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(child_id, month) DO UPDATE SET
                total_commitments=excluded.total_commitments,
                completed_on_time=excluded.completed_on_time,
                completed_late=excluded.completed_late,
                missed=excluded.missed,
                reliability_score=excluded.reliability_score,
                homework_count=excluded.homework_count,
                chores_count=excluded.chores_count,
                other_count=excluded.other_count,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(child_id)
        .bind(month)
        .bind(tally.total)
        .bind(tally.on_time)
        .bind(tally.late)
        .bind(tally.missed)
        .bind(tally.reliability())
        .bind(tally.homework)
        .bind(tally.chores)
        .bind(tally.other)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, CommitmentStats>(
            "SELECT * FROM commitment_stats WHERE child_id = ? AND month = ?",
        )
        .bind(child_id)
        .bind(month)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
