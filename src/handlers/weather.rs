use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use super::required;
use crate::error::StashError;
use crate::middleware::auth::AuthUser;
use crate::router::StashState;
use crate::types::weather::WeatherResponse;

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub location: Option<String>,
}

async fn fetch_and_cache(
    state: &StashState,
    user_id: Uuid,
    location: &str,
) -> Result<WeatherResponse, StashError> {
    let data = state.weather.forecast(location).await?;
    let now = Utc::now();
    let ttl = Duration::minutes(state.config.weather.cache_ttl_minutes);
    state.db.weather().put(user_id, location, &data, now, ttl).await?;
    Ok(WeatherResponse {
        data,
        cached_at: now,
        expires_at: now + ttl,
    })
}

/// Cached forecast while fresh and for the same location, else a fetch.
pub async fn get_weather(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Query(query): Query<WeatherQuery>,
) -> Result<Json<WeatherResponse>, StashError> {
    let cached = state.db.weather().get(user.id).await?;
    let location = query
        .location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .or_else(|| cached.as_ref().map(|c| c.location.clone()))
        .ok_or_else(|| StashError::bad_request("location is required"))?;

    if let Some(row) = cached
        && row.expires_at > Utc::now()
        && row.location.eq_ignore_ascii_case(&location)
    {
        debug!(user_id = %user.id, location, "weather cache hit");
        return Ok(Json(WeatherResponse {
            data: row.data.0,
            cached_at: row.fetched_at,
            expires_at: row.expires_at,
        }));
    }
    Ok(Json(fetch_and_cache(&state, user.id, &location).await?))
}

pub async fn refresh_weather(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<WeatherResponse>, StashError> {
    let location = required(req.location.as_deref(), "location")?;
    Ok(Json(fetch_and_cache(&state, user.id, &location).await?))
}
