use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use super::SqlitePool;
use super::models::{Gift, GiftRecipientLink, GiftSource, GiftStatus, GiftWithRecipients};
use crate::error::StashError;

/// Editable gift fields. On update, absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GiftInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub store: Option<String>,
    pub brand: Option<String>,
    pub current_price: Option<f64>,
    pub original_price: Option<f64>,
    pub status: Option<GiftStatus>,
    pub priority: Option<String>,
    pub occasion: Option<String>,
    pub notes: Option<String>,
    pub recipient_ids: Option<Vec<Uuid>>,
}

impl GiftInput {
    fn apply(&mut self, g: &mut Gift) {
        if let Some(v) = self.name.take() {
            g.name = v;
        }
        macro_rules! replace {
            ($($field:ident),*) => {
                $(if self.$field.is_some() { g.$field = self.$field.take(); })*
            };
        }
        replace!(
            description,
            category,
            url,
            image_url,
            store,
            brand,
            current_price,
            original_price,
            priority,
            occasion,
            notes
        );
        if let Some(s) = self.status {
            g.status = s;
        }
    }
}

#[derive(Clone)]
pub struct GiftStore {
    pool: SqlitePool,
}

impl GiftStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Owned gifts, newest first, each with its recipient links.
    pub async fn list(
        &self,
        user_id: Uuid,
        status: Option<GiftStatus>,
    ) -> Result<Vec<GiftWithRecipients>, StashError> {
        let gifts = match status {
            Some(s) => {
                sqlx::query_as::<_, Gift>(
                    "SELECT * FROM gifts WHERE user_id = ? AND status = ? ORDER BY created_at DESC",
                )
                .bind(user_id)
                .bind(s)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Gift>(
                    "SELECT * FROM gifts WHERE user_id = ? ORDER BY created_at DESC",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let links = sqlx::query_as::<_, GiftRecipientLink>(
            r#"
            SELECT gr.gift_id, gr.recipient_id, r.name AS recipient_name, gr.status, gr.notes
            FROM gift_recipients gr
            JOIN recipients r ON r.id = gr.recipient_id
            WHERE r.user_id = ?
            ORDER BY r.name COLLATE NOCASE
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_gift: HashMap<Uuid, Vec<GiftRecipientLink>> = HashMap::new();
        for link in links {
            by_gift.entry(link.gift_id).or_default().push(link);
        }
        Ok(gifts
            .into_iter()
            .map(|gift| {
                let recipients = by_gift.remove(&gift.id).unwrap_or_default();
                GiftWithRecipients { gift, recipients }
            })
            .collect())
    }

    pub async fn get(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<GiftWithRecipients>, StashError> {
        let Some(gift) =
            sqlx::query_as::<_, Gift>("SELECT * FROM gifts WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };
        let recipients = self.links(id).await?;
        Ok(Some(GiftWithRecipients { gift, recipients }))
    }

    async fn links(&self, gift_id: Uuid) -> Result<Vec<GiftRecipientLink>, StashError> {
        let rows = sqlx::query_as::<_, GiftRecipientLink>(
            r#"
            SELECT gr.gift_id, gr.recipient_id, r.name AS recipient_name, gr.status, gr.notes
            FROM gift_recipients gr
            JOIN recipients r ON r.id = gr.recipient_id
            WHERE gr.gift_id = ?
            ORDER BY r.name COLLATE NOCASE
            "#,
        )
        .bind(gift_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Insert a gift and its recipient links in one transaction. A recipient
    /// not owned by `user_id` aborts with `NotFound`.
    pub async fn create(
        &self,
        user_id: Uuid,
        mut input: GiftInput,
        source: GiftSource,
    ) -> Result<GiftWithRecipients, StashError> {
        let now = Utc::now();
        let mut gift = Gift {
            id: Uuid::new_v4(),
            user_id,
            name: String::new(),
            description: None,
            category: None,
            url: None,
            image_url: None,
            store: None,
            brand: None,
            current_price: None,
            original_price: None,
            status: GiftStatus::Idea,
            priority: None,
            occasion: None,
            notes: None,
            source,
            created_at: now,
            updated_at: now,
        };
        let recipient_ids = input.recipient_ids.take().unwrap_or_default();
        input.apply(&mut gift);

        let mut tx = self.pool.begin().await?;
        ensure_recipients_owned(&mut tx, user_id, &recipient_ids).await?;
        sqlx::query(
            r#"
            INSERT INTO gifts (
                id, user_id, name, description, category, url, image_url, store, brand,
                current_price, original_price, status, priority, occasion, notes, source,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(gift.id)
        .bind(gift.user_id)
        .bind(&gift.name)
        .bind(&gift.description)
        .bind(&gift.category)
        .bind(&gift.url)
        .bind(&gift.image_url)
        .bind(&gift.store)
        .bind(&gift.brand)
        .bind(gift.current_price)
        .bind(gift.original_price)
        .bind(gift.status)
        .bind(&gift.priority)
        .bind(&gift.occasion)
        .bind(&gift.notes)
        .bind(gift.source)
        .bind(gift.created_at)
        .bind(gift.updated_at)
        .execute(&mut *tx)
        .await?;
        insert_links(&mut tx, gift.id, &recipient_ids).await?;
        tx.commit().await?;

        let recipients = self.links(gift.id).await?;
        Ok(GiftWithRecipients { gift, recipients })
    }

    /// Apply `input` to an owned gift; `recipient_ids`, when given, replaces
    /// the links. `None` when missing or foreign.
    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        mut input: GiftInput,
    ) -> Result<Option<GiftWithRecipients>, StashError> {
        let Some(GiftWithRecipients { mut gift, .. }) = self.get(user_id, id).await? else {
            return Ok(None);
        };
        let recipient_ids = input.recipient_ids.take();
        input.apply(&mut gift);
        gift.updated_at = Utc::now();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE gifts SET
                name = ?, description = ?, category = ?, url = ?, image_url = ?, store = ?,
                brand = ?, current_price = ?, original_price = ?, status = ?, priority = ?,
                occasion = ?, notes = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&gift.name)
        .bind(&gift.description)
        .bind(&gift.category)
        .bind(&gift.url)
        .bind(&gift.image_url)
        .bind(&gift.store)
        .bind(&gift.brand)
        .bind(gift.current_price)
        .bind(gift.original_price)
        .bind(gift.status)
        .bind(&gift.priority)
        .bind(&gift.occasion)
        .bind(&gift.notes)
        .bind(gift.updated_at)
        .bind(gift.id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if let Some(ids) = recipient_ids {
            ensure_recipients_owned(&mut tx, user_id, &ids).await?;
            sqlx::query("DELETE FROM gift_recipients WHERE gift_id = ?")
                .bind(gift.id)
                .execute(&mut *tx)
                .await?;
            insert_links(&mut tx, gift.id, &ids).await?;
        }
        tx.commit().await?;

        let recipients = self.links(gift.id).await?;
        Ok(Some(GiftWithRecipients { gift, recipients }))
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StashError> {
        let res = sqlx::query("DELETE FROM gifts WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Gifts still to buy (idea or considering), newest first.
    pub async fn shopping_list(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<GiftWithRecipients>, StashError> {
        let all = self.list(user_id, None).await?;
        Ok(all
            .into_iter()
            .filter(|g| matches!(g.gift.status, GiftStatus::Idea | GiftStatus::Considering))
            .collect())
    }
}

async fn ensure_recipients_owned(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: Uuid,
    ids: &[Uuid],
) -> Result<(), StashError> {
    for id in ids {
        let owned: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM recipients WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut **tx)
                .await?;
        if owned.is_none() {
            return Err(StashError::NotFound("Recipient"));
        }
    }
    Ok(())
}

async fn insert_links(
    tx: &mut Transaction<'_, Sqlite>,
    gift_id: Uuid,
    ids: &[Uuid],
) -> Result<(), StashError> {
    let now = Utc::now();
    for rid in ids {
        sqlx::query(
            r#"
            INSERT INTO gift_recipients (id, gift_id, recipient_id, status, created_at)
            VALUES (?, ?, ?, 'idea', ?)
            ON CONFLICT(gift_id, recipient_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(gift_id)
        .bind(rid)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
