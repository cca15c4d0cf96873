//! Database module: models, schema and stores for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite)
//! - `sqlite.rs`: connection setup and the `Database` handle
//! - one store per aggregate; every user-facing call takes the owner's id

pub mod accountability;
pub mod gifts;
pub mod models;
pub mod notifications;
pub mod recipients;
pub mod schema;
pub mod sms;
pub mod sqlite;
pub mod users;
pub mod weather;

pub use accountability::AccountabilityStore;
pub use gifts::GiftStore;
pub use notifications::NotificationStore;
pub use recipients::RecipientStore;
pub use schema::SQLITE_INIT;
pub use sms::SmsStore;
pub use sqlite::{Database, SqlitePool};
pub use users::UserStore;
pub use weather::WeatherStore;
