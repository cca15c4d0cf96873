use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::info;

use super::{
    AccountabilityStore, GiftStore, NotificationStore, RecipientStore, SmsStore, UserStore,
    WeatherStore,
};
use crate::db::schema::SQLITE_INIT;
use crate::error::StashError;

pub type SqlitePool = Pool<Sqlite>;

/// Pool handle plus accessors for the per-aggregate stores.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, StashError> {
        let opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(opts)
            .await?;
        let db = Self::new(pool);
        db.init_schema().await?;
        info!(database_url, "database ready");
        Ok(db)
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), StashError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    pub fn recipients(&self) -> RecipientStore {
        RecipientStore::new(self.pool.clone())
    }

    pub fn gifts(&self) -> GiftStore {
        GiftStore::new(self.pool.clone())
    }

    pub fn accountability(&self) -> AccountabilityStore {
        AccountabilityStore::new(self.pool.clone())
    }

    pub fn sms(&self) -> SmsStore {
        SmsStore::new(self.pool.clone())
    }

    pub fn notifications(&self) -> NotificationStore {
        NotificationStore::new(self.pool.clone())
    }

    pub fn weather(&self) -> WeatherStore {
        WeatherStore::new(self.pool.clone())
    }
}
