use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::SqlitePool;
use super::models::{PartnerSettings, User};
use crate::api::twilio::{format_phone_number, last_ten_digits, phone_lookup_formats};
use crate::error::StashError;

/// Fields accepted by `PUT /api/user/settings`. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsInput {
    pub phone_number: Option<String>,
    pub partner_phone: Option<String>,
    pub partner_name: Option<String>,
    pub notify_consequences: Option<bool>,
    pub notify_commitments: Option<bool>,
    pub notify_reminders: Option<bool>,
    pub require_both_parents: Option<bool>,
    pub quiet_hours_start: Option<String>,
    pub quiet_hours_end: Option<String>,
}

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user with a freshly minted API key.
    pub async fn create(
        &self,
        email: &str,
        full_name: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<User, StashError> {
        let id = Uuid::new_v4();
        let api_key = format!("gs_{}", Uuid::new_v4().simple());
        let phone = phone_number.map(format_phone_number);
        sqlx::query(
            r#"
            INSERT INTO users (id, email, full_name, phone_number, api_key, sms_onboarded, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(full_name)
        .bind(phone)
        .bind(&api_key)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        self.get(id).await?.ok_or(StashError::NotFound("User"))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<User>, StashError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn by_api_key(&self, api_key: &str) -> Result<Option<User>, StashError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE api_key = ?")
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Resolve an inbound phone number: E.164 first, then the common
    /// alternative spellings, then a last-10-digit comparison.
    pub async fn by_phone(&self, raw: &str) -> Result<Option<User>, StashError> {
        for candidate in phone_lookup_formats(raw) {
            let found = sqlx::query_as::<_, User>(
                "SELECT * FROM users WHERE phone_number = ? ORDER BY created_at LIMIT 1",
            )
            .bind(&candidate)
            .fetch_optional(&self.pool)
            .await?;
            if found.is_some() {
                return Ok(found);
            }
        }

        let wanted = last_ten_digits(raw);
        if wanted.is_empty() {
            return Ok(None);
        }
        let user = self.with_phone().await?.into_iter().find(|u| {
            u.phone_number
                .as_deref()
                .is_some_and(|p| last_ten_digits(p) == wanted)
        });
        Ok(user)
    }

    /// Users that have a phone number on file.
    pub async fn with_phone(&self) -> Result<Vec<User>, StashError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE phone_number IS NOT NULL AND phone_number != '' ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn mark_onboarded(&self, id: Uuid) -> Result<(), StashError> {
        sqlx::query("UPDATE users SET sms_onboarded = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn settings(&self, user_id: Uuid) -> Result<Option<PartnerSettings>, StashError> {
        let row = sqlx::query_as::<_, PartnerSettings>(
            "SELECT * FROM partner_settings WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Every partner settings row; their owners use the accountability side.
    pub async fn all_settings(&self) -> Result<Vec<PartnerSettings>, StashError> {
        let rows = sqlx::query_as::<_, PartnerSettings>(
            "SELECT * FROM partner_settings ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Merge `input` into the user's partner settings (and phone number),
    /// creating the row on first write.
    pub async fn upsert_settings(
        &self,
        user_id: Uuid,
        input: SettingsInput,
    ) -> Result<PartnerSettings, StashError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if let Some(phone) = input.phone_number.as_deref() {
            let phone = Some(phone.trim())
                .filter(|p| !p.is_empty())
                .map(format_phone_number);
            sqlx::query("UPDATE users SET phone_number = ? WHERE id = ?")
                .bind(phone)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let current = sqlx::query_as::<_, PartnerSettings>(
            "SELECT * FROM partner_settings WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let partner_phone = match input.partner_phone {
            Some(p) if p.trim().is_empty() => None,
            Some(p) => Some(format_phone_number(p.trim())),
            None => current.as_ref().and_then(|c| c.partner_phone.clone()),
        };
        let partner_name = input
            .partner_name
            .or_else(|| current.as_ref().and_then(|c| c.partner_name.clone()));
        let flag = |new: Option<bool>, old: Option<bool>, default: bool| {
            new.or(old).unwrap_or(default)
        };
        let notify_consequences = flag(
            input.notify_consequences,
            current.as_ref().map(|c| c.notify_consequences),
            true,
        );
        let notify_commitments = flag(
            input.notify_commitments,
            current.as_ref().map(|c| c.notify_commitments),
            true,
        );
        let notify_reminders = flag(
            input.notify_reminders,
            current.as_ref().map(|c| c.notify_reminders),
            true,
        );
        let require_both_parents = flag(
            input.require_both_parents,
            current.as_ref().map(|c| c.require_both_parents),
            false,
        );
        let quiet_start = input
            .quiet_hours_start
            .or_else(|| current.as_ref().and_then(|c| c.quiet_hours_start.clone()))
            .filter(|s| !s.is_empty());
        let quiet_end = input
            .quiet_hours_end
            .or_else(|| current.as_ref().and_then(|c| c.quiet_hours_end.clone()))
            .filter(|s| !s.is_empty());

        sqlx::query(
            r#"
            INSERT INTO partner_settings (
                id, user_id, partner_phone, partner_name, notify_consequences,
                notify_commitments, notify_reminders, require_both_parents,
                quiet_hours_start, quiet_hours_end, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                partner_phone=excluded.partner_phone,
                partner_name=excluded.partner_name,
                notify_consequences=excluded.notify_consequences,
                notify_commitments=excluded.notify_commitments,
                notify_reminders=excluded.notify_reminders,
                require_both_parents=excluded.require_both_parents,
                quiet_hours_start=excluded.quiet_hours_start,
                quiet_hours_end=excluded.quiet_hours_end,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(partner_phone)
        .bind(partner_name)
        .bind(notify_consequences)
        .bind(notify_commitments)
        .bind(notify_reminders)
        .bind(require_both_parents)
        .bind(quiet_start)
        .bind(quiet_end)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, PartnerSettings>(
            "SELECT * FROM partner_settings WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row)
    }
}
