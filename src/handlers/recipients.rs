use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::{max_len, required};
use crate::db::models::{Gift, Recipient};
use crate::db::recipients::RecipientInput;
use crate::error::StashError;
use crate::middleware::auth::AuthUser;
use crate::router::StashState;
use crate::service::matcher::{self, MatchResult, RecipientSuggestion};

const SUGGEST_LIMIT: usize = 10;

fn validate(input: &RecipientInput) -> Result<(), StashError> {
    max_len(input.name.as_deref(), 100, "name")?;
    max_len(input.relationship.as_deref(), 50, "relationship")?;
    max_len(input.notes.as_deref(), 500, "notes")?;
    if input.max_budget.is_some_and(|b| b < 0.0) {
        return Err(StashError::bad_request("max_budget must be positive"));
    }
    Ok(())
}

pub async fn list(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Recipient>>, StashError> {
    Ok(Json(state.db.recipients().list(user.id).await?))
}

pub async fn create(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Json(mut input): Json<RecipientInput>,
) -> Result<Json<Value>, StashError> {
    input.name = Some(required(input.name.as_deref(), "name")?);
    input.relationship = Some(required(input.relationship.as_deref(), "relationship")?);
    validate(&input)?;
    let recipient = state.db.recipients().create(user.id, input).await?;
    info!(user_id = %user.id, recipient = %recipient.id, "recipient created");
    Ok(Json(json!({ "success": true, "recipient": recipient })))
}

pub async fn get_one(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Recipient>, StashError> {
    state
        .db
        .recipients()
        .get(user.id, id)
        .await?
        .map(Json)
        .ok_or(StashError::NotFound("Recipient"))
}

pub async fn update(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<RecipientInput>,
) -> Result<Json<Value>, StashError> {
    if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(StashError::bad_request("name is required"));
    }
    validate(&input)?;
    let recipient = state
        .db
        .recipients()
        .update(user.id, id, input)
        .await?
        .ok_or(StashError::NotFound("Recipient"))?;
    Ok(Json(json!({ "success": true, "recipient": recipient })))
}

pub async fn delete(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, StashError> {
    if !state.db.recipients().delete(user.id, id).await? {
        return Err(StashError::NotFound("Recipient"));
    }
    info!(user_id = %user.id, recipient = %id, "recipient deleted");
    Ok(Json(json!({ "success": true })))
}

pub async fn gifts(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Gift>>, StashError> {
    let store = state.db.recipients();
    if store.get(user.id, id).await?.is_none() {
        return Err(StashError::NotFound("Recipient"));
    }
    Ok(Json(store.gifts(user.id, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn suggest(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Query(query): Query<SuggestQuery>,
) -> Result<Json<Vec<RecipientSuggestion>>, StashError> {
    let recipients = state.db.recipients().list(user.id).await?;
    Ok(Json(matcher::suggest(&query.q, &recipients, SUGGEST_LIMIT)))
}

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub name: Option<String>,
}

pub async fn find(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Json(req): Json<MatchRequest>,
) -> Result<Json<MatchResult>, StashError> {
    let name = required(req.name.as_deref(), "name")?;
    let recipients = state.db.recipients().list(user.id).await?;
    Ok(Json(matcher::find_match(&name, &recipients)))
}
