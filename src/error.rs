use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::error;

use crate::api::claude::ClaudeError;
use crate::api::twilio::TwilioError;
use crate::api::weather::WeatherError;

#[derive(Debug, ThisError)]
pub enum StashError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Claude error: {0}")]
    Claude(#[from] ClaudeError),

    #[error("Twilio error: {0}")]
    Twilio(#[from] TwilioError),

    #[error("Weather error: {0}")]
    Weather(#[from] WeatherError),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("{0}")]
    Internal(String),
}

impl StashError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        StashError::BadRequest(msg.into())
    }
}

impl IntoResponse for StashError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            StashError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ApiErrorBody {
                    code: "UNAUTHORIZED".to_string(),
                    message: "Unauthorized".to_string(),
                },
            ),
            StashError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    code: "BAD_REQUEST".to_string(),
                    message,
                },
            ),
            StashError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                ApiErrorBody {
                    code: "NOT_FOUND".to_string(),
                    message: format!("{what} not found"),
                },
            ),
            StashError::Database(SqlxError::RowNotFound) => (
                StatusCode::NOT_FOUND,
                ApiErrorBody {
                    code: "NOT_FOUND".to_string(),
                    message: "Resource not found".to_string(),
                },
            ),
            StashError::NotConfigured(service) => {
                error!(service, "request needs an unconfigured service");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorBody {
                        code: "NOT_CONFIGURED".to_string(),
                        message: format!("{service} is not configured"),
                    },
                )
            }
            other => {
                error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorBody {
                        code: "INTERNAL_ERROR".to_string(),
                        message: "An internal server error occurred.".to_string(),
                    },
                )
            }
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (StashError::Unauthorized, StatusCode::UNAUTHORIZED),
            (StashError::bad_request("name is required"), StatusCode::BAD_REQUEST),
            (StashError::NotFound("Gift"), StatusCode::NOT_FOUND),
            (StashError::Database(SqlxError::RowNotFound), StatusCode::NOT_FOUND),
            (StashError::NotConfigured("Claude"), StatusCode::INTERNAL_SERVER_ERROR),
            (StashError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
