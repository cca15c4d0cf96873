use axum::{Json, extract::State};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::StashError;
use crate::middleware::auth::AuthUser;
use crate::router::StashState;
use crate::service::recommendations::{RecommendationsResponse, recommend as generate};

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    #[serde(alias = "recipientId")]
    pub recipient_id: Option<Uuid>,
}

pub async fn recommend(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Json(req): Json<RecommendRequest>,
) -> Result<Json<RecommendationsResponse>, StashError> {
    let id = req
        .recipient_id
        .ok_or_else(|| StashError::bad_request("recipient_id is required"))?;
    let recipient = state
        .db
        .recipients()
        .get(user.id, id)
        .await?
        .ok_or(StashError::NotFound("Recipient"))?;
    Ok(Json(generate(&state.claude, &recipient).await?))
}
