use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::types::Json;
use uuid::Uuid;

use super::SqlitePool;
use super::models::{Gift, Recipient};
use crate::error::StashError;

/// Editable recipient fields. On update, absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipientInput {
    pub name: Option<String>,
    pub relationship: Option<String>,
    pub nickname: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub age_range: Option<String>,
    pub gender: Option<String>,
    pub interests: Option<Vec<String>>,
    pub gift_preferences: Option<String>,
    pub restrictions: Option<Vec<String>>,
    pub max_budget: Option<f64>,
    pub notes: Option<String>,
}

impl RecipientInput {
    fn apply(self, r: &mut Recipient) {
        if let Some(v) = self.name {
            r.name = v;
        }
        if let Some(v) = self.relationship {
            r.relationship = v;
        }
        if self.nickname.is_some() {
            r.nickname = self.nickname;
        }
        if self.birthday.is_some() {
            r.birthday = self.birthday;
        }
        if self.age_range.is_some() {
            r.age_range = self.age_range;
        }
        if self.gender.is_some() {
            r.gender = self.gender;
        }
        if let Some(v) = self.interests {
            r.interests = Some(Json(v));
        }
        if self.gift_preferences.is_some() {
            r.gift_preferences = self.gift_preferences;
        }
        if let Some(v) = self.restrictions {
            r.restrictions = Some(Json(v));
        }
        if self.max_budget.is_some() {
            r.max_budget = self.max_budget;
        }
        if self.notes.is_some() {
            r.notes = self.notes;
        }
    }
}

#[derive(Clone)]
pub struct RecipientStore {
    pool: SqlitePool,
}

impl RecipientStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Recipient>, StashError> {
        let rows = sqlx::query_as::<_, Recipient>(
            "SELECT * FROM recipients WHERE user_id = ? ORDER BY name COLLATE NOCASE",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Recipient>, StashError> {
        let row = sqlx::query_as::<_, Recipient>(
            "SELECT * FROM recipients WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Insert a recipient. `name` and `relationship` must already be validated.
    pub async fn create(
        &self,
        user_id: Uuid,
        input: RecipientInput,
    ) -> Result<Recipient, StashError> {
        let now = Utc::now();
        let mut r = Recipient {
            id: Uuid::new_v4(),
            user_id,
            name: String::new(),
            relationship: String::new(),
            nickname: None,
            birthday: None,
            age_range: None,
            gender: None,
            interests: None,
            gift_preferences: None,
            restrictions: None,
            max_budget: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        input.apply(&mut r);
        sqlx::query(
            r#"
            INSERT INTO recipients (
                id, user_id, name, relationship, nickname, birthday, age_range, gender,
                interests, gift_preferences, restrictions, max_budget, notes,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(r.id)
        .bind(r.user_id)
        .bind(&r.name)
        .bind(&r.relationship)
        .bind(&r.nickname)
        .bind(r.birthday)
        .bind(&r.age_range)
        .bind(&r.gender)
        .bind(&r.interests)
        .bind(&r.gift_preferences)
        .bind(&r.restrictions)
        .bind(r.max_budget)
        .bind(&r.notes)
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(r)
    }

    /// Apply `input` to an owned recipient. `None` when missing or foreign.
    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: RecipientInput,
    ) -> Result<Option<Recipient>, StashError> {
        let Some(mut r) = self.get(user_id, id).await? else {
            return Ok(None);
        };
        input.apply(&mut r);
        r.updated_at = Utc::now();
        sqlx::query(
            r#"
            UPDATE recipients SET
                name = ?, relationship = ?, nickname = ?, birthday = ?, age_range = ?,
                gender = ?, interests = ?, gift_preferences = ?, restrictions = ?,
                max_budget = ?, notes = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&r.name)
        .bind(&r.relationship)
        .bind(&r.nickname)
        .bind(r.birthday)
        .bind(&r.age_range)
        .bind(&r.gender)
        .bind(&r.interests)
        .bind(&r.gift_preferences)
        .bind(&r.restrictions)
        .bind(r.max_budget)
        .bind(&r.notes)
        .bind(r.updated_at)
        .bind(r.id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(Some(r))
    }

    /// Returns false when nothing owned by `user_id` matched.
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StashError> {
        let res = sqlx::query("DELETE FROM recipients WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Gifts linked to an owned recipient, newest first.
    pub async fn gifts(&self, user_id: Uuid, id: Uuid) -> Result<Vec<Gift>, StashError> {
        let rows = sqlx::query_as::<_, Gift>(
            r#"
            SELECT g.* FROM gifts g
            JOIN gift_recipients gr ON gr.gift_id = g.id
            WHERE gr.recipient_id = ? AND g.user_id = ?
            ORDER BY g.created_at DESC
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Recipients with a birthday on file whose owner has a phone number,
    /// paired with that phone number.
    pub async fn with_birthdays(&self) -> Result<Vec<(Recipient, String)>, StashError> {
        let rows = sqlx::query_as::<_, BirthdayRow>(
            r#"
            SELECT r.*, u.phone_number AS owner_phone FROM recipients r
            JOIN users u ON u.id = r.user_id
            WHERE r.birthday IS NOT NULL
              AND u.phone_number IS NOT NULL AND u.phone_number != ''
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|b| (b.recipient, b.owner_phone)).collect())
    }
}

#[derive(sqlx::FromRow)]
struct BirthdayRow {
    #[sqlx(flatten)]
    recipient: Recipient,
    owner_phone: String,
}
