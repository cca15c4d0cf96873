//! Claude Messages API client.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AnthropicConfig;
use crate::types::claude::{Message, MessagesRequest, MessagesResponse};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Why a completion did not come back.
#[derive(Debug, Clone, Error)]
pub enum ClaudeError {
    #[error("anthropic api not configured")]
    NotConfigured,
    #[error("could not reach anthropic: {0}")]
    Unreachable(String),
    #[error("anthropic request timed out")]
    TimedOut,
    #[error("anthropic throttled the request")]
    Throttled,
    #[error("anthropic rejected the api key")]
    Rejected,
    #[error("anthropic answered {code}: {body}")]
    Status { code: StatusCode, body: String },
    #[error("unusable completion: {0}")]
    Unusable(String),
}

impl ClaudeError {
    /// Throttling, timeouts, dropped connections and 5xx clear up on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::TimedOut | Self::Throttled => true,
            Self::Status { code, .. } => code.is_server_error(),
            Self::NotConfigured | Self::Rejected | Self::Unusable(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClaudeClient {
    http: Client,
    api_key: String,
    model: String,
    endpoint: String,
    max_retries: usize,
}

impl ClaudeClient {
    pub fn new(http: Client, cfg: &AnthropicConfig) -> Self {
        Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            endpoint: format!("{}/v1/messages", cfg.base_url.trim_end_matches('/')),
            max_retries: cfg.max_retries,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn retry_policy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(10))
            .with_max_times(self.max_retries)
            .with_jitter()
    }

    /// Single-turn completion; returns the first text block.
    pub async fn complete(
        &self,
        prompt: &str,
        system: Option<&str>,
        max_tokens: u32,
    ) -> Result<String, ClaudeError> {
        if !self.is_configured() {
            return Err(ClaudeError::NotConfigured);
        }
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages: vec![Message::user(prompt)],
            system,
        };

        let response = (|| async { self.send(&request).await })
            .retry(self.retry_policy())
            .when(ClaudeError::is_transient)
            .notify(|e, dur| {
                warn!(
                    "Claude call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await?;

        if let Some(usage) = response.usage.as_ref() {
            debug!(
                id = %response.id,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Claude completion"
            );
        }
        response
            .text()
            .map(str::to_string)
            .ok_or_else(|| ClaudeError::Unusable("no text block".to_string()))
    }

    async fn send(&self, request: &MessagesRequest<'_>) -> Result<MessagesResponse, ClaudeError> {
        let res = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<MessagesResponse>()
                .await
                .map_err(|e| ClaudeError::Unusable(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(ClaudeError::Rejected),
            StatusCode::TOO_MANY_REQUESTS => Err(ClaudeError::Throttled),
            code => Err(ClaudeError::Status {
                code,
                body: res.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Completion parsed as a JSON object of type `T`.
    pub async fn ask_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<T, ClaudeError> {
        let text = self.complete(prompt, None, max_tokens).await?;
        let json = extract_json_object(&text)
            .ok_or_else(|| ClaudeError::Unusable("no JSON object".to_string()))?;
        serde_json::from_str(json).map_err(|e| {
            warn!(
                json_error = %e,
                preview = %json.chars().take(200).collect::<String>(),
                "failed to parse Claude JSON"
            );
            ClaudeError::Unusable(e.to_string())
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ClaudeError {
    if e.is_timeout() {
        ClaudeError::TimedOut
    } else {
        ClaudeError::Unreachable(e.to_string())
    }
}

/// Outermost `open .. close` run in a completion. When the model wraps its
/// answer in ``` fences only the first fenced section is searched, so a
/// language tag or chatter around the block never leaks in.
fn json_span(text: &str, open: char, close: char) -> Option<&str> {
    let body = match text.split_once("```") {
        Some((_, rest)) => rest.split_once("```").map_or(rest, |(inner, _)| inner),
        None => text,
    };
    let start = body.find(open)?;
    let end = body.rfind(close)?;
    (end > start).then(|| &body[start..=end])
}

pub fn extract_json_object(text: &str) -> Option<&str> {
    json_span(text, '{', '}')
}

pub fn extract_json_array(text: &str) -> Option<&str> {
    json_span(text, '[', ']')
}
