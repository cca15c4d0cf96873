use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use url::Url;
use uuid::Uuid;

use super::{max_len, required};
use crate::db::gifts::GiftInput;
use crate::db::models::{GiftSource, GiftStatus, GiftWithRecipients};
use crate::error::StashError;
use crate::middleware::auth::AuthUser;
use crate::router::StashState;

fn validate(input: &GiftInput) -> Result<(), StashError> {
    max_len(input.name.as_deref(), 255, "name")?;
    max_len(input.store.as_deref(), 100, "store")?;
    max_len(input.brand.as_deref(), 100, "brand")?;
    max_len(input.category.as_deref(), 50, "category")?;
    max_len(input.description.as_deref(), 1000, "description")?;
    max_len(input.notes.as_deref(), 1000, "notes")?;
    for (field, value) in [("url", &input.url), ("image_url", &input.image_url)] {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty())
            && Url::parse(v).is_err()
        {
            return Err(StashError::bad_request(format!("{field} must be a valid URL")));
        }
    }
    for (field, value) in [
        ("current_price", input.current_price),
        ("original_price", input.original_price),
    ] {
        if value.is_some_and(|p| p < 0.0) {
            return Err(StashError::bad_request(format!("{field} must be positive")));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct GiftsQuery {
    pub status: Option<GiftStatus>,
}

pub async fn list(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Query(query): Query<GiftsQuery>,
) -> Result<Json<Vec<GiftWithRecipients>>, StashError> {
    Ok(Json(state.db.gifts().list(user.id, query.status).await?))
}

pub async fn create(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Json(mut input): Json<GiftInput>,
) -> Result<Json<Value>, StashError> {
    input.name = Some(required(input.name.as_deref(), "name")?);
    validate(&input)?;
    let gift = state.db.gifts().create(user.id, input, GiftSource::Manual).await?;
    info!(user_id = %user.id, gift = %gift.gift.id, links = gift.recipients.len(), "gift created");
    Ok(Json(json!({ "success": true, "gift": gift })))
}

pub async fn get_one(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<GiftWithRecipients>, StashError> {
    state
        .db
        .gifts()
        .get(user.id, id)
        .await?
        .map(Json)
        .ok_or(StashError::NotFound("Gift"))
}

pub async fn update(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<GiftInput>,
) -> Result<Json<Value>, StashError> {
    if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(StashError::bad_request("name is required"));
    }
    validate(&input)?;
    let gift = state
        .db
        .gifts()
        .update(user.id, id, input)
        .await?
        .ok_or(StashError::NotFound("Gift"))?;
    Ok(Json(json!({ "success": true, "gift": gift })))
}

pub async fn delete(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, StashError> {
    if !state.db.gifts().delete(user.id, id).await? {
        return Err(StashError::NotFound("Gift"));
    }
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_urls_and_prices() {
        let mut input = GiftInput {
            name: Some("Kite".into()),
            url: Some("not a url".into()),
            ..Default::default()
        };
        assert!(validate(&input).is_err());
        input.url = Some("https://shop.example/kite".into());
        assert!(validate(&input).is_ok());
        input.current_price = Some(-1.0);
        assert!(validate(&input).is_err());
    }
}
