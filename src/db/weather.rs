use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::SqlitePool;
use super::models::WeatherCache;
use crate::error::StashError;
use crate::types::weather::WeatherData;

/// Per-user forecast cache.
#[derive(Clone)]
pub struct WeatherStore {
    pool: SqlitePool,
}

impl WeatherStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Cached row regardless of freshness.
    pub async fn get(&self, user_id: Uuid) -> Result<Option<WeatherCache>, StashError> {
        let row = sqlx::query_as::<_, WeatherCache>("SELECT * FROM weather_cache WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn all(&self) -> Result<Vec<WeatherCache>, StashError> {
        let rows = sqlx::query_as::<_, WeatherCache>("SELECT * FROM weather_cache")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn put(
        &self,
        user_id: Uuid,
        location: &str,
        data: &WeatherData,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(), StashError> {
        sqlx::query(
            r#"
            INSERT INTO weather_cache (id, user_id, location, data, fetched_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                location=excluded.location,
                data=excluded.data,
                fetched_at=excluded.fetched_at,
                expires_at=excluded.expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(location)
        .bind(Json(data))
        .bind(now)
        .bind(now + ttl)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
