//! WeatherAPI.com forecast client.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::config::WeatherConfig;
use crate::types::weather::{ForecastResponse, WeatherData};

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("WEATHER_API_KEY not configured")]
    NotConfigured,
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Weather API error: {status} {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl WeatherClient {
    pub fn new(http: Client, cfg: &WeatherConfig) -> Self {
        Self {
            http,
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Seven-day forecast with alerts for `location`.
    pub async fn forecast(&self, location: &str) -> Result<WeatherData, WeatherError> {
        if !self.is_configured() {
            return Err(WeatherError::NotConfigured);
        }
        info!(location, "fetching fresh weather");
        let res = self
            .http
            .get(format!("{}/v1/forecast.json", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", location),
                ("days", "7"),
                ("aqi", "no"),
                ("alerts", "yes"),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let message = res
                .json::<ErrorEnvelope>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or_default().to_string());
            return Err(WeatherError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let raw: ForecastResponse = res.json().await?;
        Ok(raw.into_weather(location))
    }
}
