use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::SqlitePool;
use super::models::{SmsContext, SmsDirection, SmsMessage};
use crate::error::StashError;
use crate::types::sms::SmsContextData;

/// Lifetime of a conversation context after its last write.
pub const CONTEXT_TTL_MINUTES: i64 = 30;

/// Fields written on every context save.
#[derive(Debug, Clone, Default)]
pub struct ContextUpdate {
    pub user_id: Option<Uuid>,
    pub last_message: Option<String>,
    pub last_intent: Option<String>,
    pub pending_clarification: Option<String>,
    pub data: SmsContextData,
}

/// Conversation context and the inbound/outbound message log.
#[derive(Clone)]
pub struct SmsStore {
    pool: SqlitePool,
}

impl SmsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Live (unexpired) context for a phone number.
    pub async fn context(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SmsContext>, StashError> {
        let row = sqlx::query_as::<_, SmsContext>(
            "SELECT * FROM sms_context WHERE phone_number = ? \
             AND julianday(expires_at) > julianday(?)",
        )
        .bind(phone)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Insert or replace the context for `phone`, pushing its expiry out.
    pub async fn save_context(&self, phone: &str, update: ContextUpdate) -> Result<(), StashError> {
        let now = Utc::now();
        let expires_at = now + Duration::minutes(CONTEXT_TTL_MINUTES);
        sqlx::query(
            r#"
            INSERT INTO sms_context (
                id, phone_number, user_id, last_message, last_intent, pending_clarification,
                context_data, created_at, updated_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(phone_number) DO UPDATE SET
                user_id=excluded.user_id,
                last_message=excluded.last_message,
                last_intent=excluded.last_intent,
                pending_clarification=excluded.pending_clarification,
                context_data=excluded.context_data,
                updated_at=excluded.updated_at,
                expires_at=excluded.expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(phone)
        .bind(update.user_id)
        .bind(update.last_message)
        .bind(update.last_intent)
        .bind(update.pending_clarification)
        .bind(Json(update.data))
        .bind(now)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear_context(&self, phone: &str) -> Result<(), StashError> {
        sqlx::query("DELETE FROM sms_context WHERE phone_number = ?")
            .bind(phone)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete expired contexts, returning how many went away.
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, StashError> {
        let res = sqlx::query(
            "DELETE FROM sms_context WHERE julianday(expires_at) <= julianday(?)",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    pub async fn log_message(
        &self,
        user_id: Option<Uuid>,
        phone: &str,
        direction: SmsDirection,
        body: &str,
        message_sid: Option<&str>,
        intent: Option<&str>,
    ) -> Result<Uuid, StashError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO sms_messages (id, user_id, phone_number, direction, body, message_sid, intent, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(phone)
        .bind(direction)
        .bind(body)
        .bind(message_sid)
        .bind(intent)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Record the intent a logged message was handled as.
    pub async fn set_intent(&self, id: Uuid, intent: &str) -> Result<(), StashError> {
        sqlx::query("UPDATE sms_messages SET intent = ? WHERE id = ?")
            .bind(intent)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Logged messages for a phone number, oldest first.
    pub async fn messages(&self, phone: &str) -> Result<Vec<SmsMessage>, StashError> {
        let rows = sqlx::query_as::<_, SmsMessage>(
            "SELECT * FROM sms_messages WHERE phone_number = ? ORDER BY julianday(created_at), rowid",
        )
        .bind(phone)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
