use axum::RequestPartsExt;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::db::models::User;
use crate::error::StashError;
use crate::router::StashState;

async fn bearer(parts: &mut Parts) -> Result<String, Response> {
    match parts.extract::<TypedHeader<Authorization<Bearer>>>().await {
        Ok(TypedHeader(Authorization(b))) => Ok(b.token().to_string()),
        Err(_) => Err(StashError::Unauthorized.into_response()),
    }
}

/// True only for a non-empty expected secret equal to `token`.
pub fn secret_matches(expected: &str, token: &str) -> bool {
    !expected.is_empty() && bool::from(token.as_bytes().ct_eq(expected.as_bytes()))
}

/// The user owning the bearer API key.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<StashState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &StashState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).await?;
        match state.db.users().by_api_key(&token).await {
            Ok(Some(user)) => {
                debug!(user_id = %user.id, "authenticated");
                Ok(Self(user))
            }
            Ok(None) => Err(StashError::Unauthorized.into_response()),
            Err(e) => Err(e.into_response()),
        }
    }
}

/// Bearer must equal `basic.cron_secret`.
#[derive(Debug, Clone, Copy)]
pub struct RequireCron;

impl FromRequestParts<StashState> for RequireCron {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &StashState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).await?;
        if secret_matches(&state.config.basic.cron_secret, &token) {
            Ok(Self)
        } else {
            warn!(path = %parts.uri.path(), "rejected cron call");
            Err(StashError::Unauthorized.into_response())
        }
    }
}

/// Bearer must equal `basic.admin_key`.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin;

impl FromRequestParts<StashState> for RequireAdmin {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &StashState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).await?;
        if secret_matches(&state.config.basic.admin_key, &token) {
            Ok(Self)
        } else {
            warn!("rejected admin call");
            Err(StashError::Unauthorized.into_response())
        }
    }
}
