use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::required;
use crate::error::StashError;
use crate::middleware::auth::RequireAdmin;
use crate::router::StashState;

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
}

/// Creates a user; the response is the only place the API key is shown.
pub async fn create_user(
    State(state): State<StashState>,
    _admin: RequireAdmin,
    Json(input): Json<NewUser>,
) -> Result<(StatusCode, Json<Value>), StashError> {
    let email = required(input.email.as_deref(), "email")?;
    let user = state
        .db
        .users()
        .create(&email, input.full_name.as_deref(), input.phone_number.as_deref())
        .await?;
    info!(user_id = %user.id, "user created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "user": user, "api_key": user.api_key })),
    ))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
