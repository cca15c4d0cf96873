use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::SqlitePool;
use super::models::{NotificationStatus, NotificationType, PartnerNotification, ReferenceType};
use crate::error::StashError;

/// One outbound partner SMS to record.
#[derive(Debug, Clone)]
pub struct NotificationRecord<'a> {
    pub user_id: Option<Uuid>,
    pub notification_type: NotificationType,
    pub reference_id: Uuid,
    pub reference_type: ReferenceType,
    pub partner_phone: &'a str,
    pub partner_name: Option<&'a str>,
    pub status: NotificationStatus,
    pub message_text: &'a str,
    pub child_name: Option<&'a str>,
}

#[derive(Clone)]
pub struct NotificationStore {
    pool: SqlitePool,
}

impl NotificationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, n: NotificationRecord<'_>) -> Result<(), StashError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO partner_notifications (
                id, user_id, notification_type, reference_id, reference_type, partner_phone,
                partner_name, status, message_text, sent_at, child_name, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(n.user_id)
        .bind(n.notification_type)
        .bind(n.reference_id)
        .bind(n.reference_type)
        .bind(n.partner_phone)
        .bind(n.partner_name)
        .bind(n.status)
        .bind(n.message_text)
        .bind(now)
        .bind(n.child_name)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Whether a notification of `kind` for `reference_id` was logged at or after `since`.
    pub async fn sent_since(
        &self,
        reference_id: Uuid,
        kind: NotificationType,
        since: DateTime<Utc>,
    ) -> Result<bool, StashError> {
        let hit: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM partner_notifications WHERE reference_id = ? \
             AND notification_type = ? AND julianday(sent_at) >= julianday(?) LIMIT 1",
        )
        .bind(reference_id)
        .bind(kind)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hit.is_some())
    }

    pub async fn for_reference(
        &self,
        reference_id: Uuid,
    ) -> Result<Vec<PartnerNotification>, StashError> {
        let rows = sqlx::query_as::<_, PartnerNotification>(
            "SELECT * FROM partner_notifications WHERE reference_id = ? ORDER BY julianday(sent_at)",
        )
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
