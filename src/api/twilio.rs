//! Twilio REST + webhook helpers.

use std::sync::LazyLock;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use futures::future::join_all;
use hmac::{Hmac, Mac};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::TwilioConfig;

pub const TEST_MESSAGE: &str =
    "✓ Gift Tracker SMS is configured correctly! You can now receive notifications.";

static E164: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9]\d{1,14}$").expect("valid e164 regex"));

#[derive(Debug, Error)]
pub enum TwilioError {
    #[error("SMS service not configured")]
    NotConfigured,
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("twilio {status}: {message}")]
    Api { status: u16, message: String },
}

/// Outcome of one send, serialized as returned by the SMS endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone)]
pub struct TwilioClient {
    http: Client,
    cfg: TwilioConfig,
}

impl TwilioClient {
    pub fn new(http: Client, cfg: &TwilioConfig) -> Self {
        Self {
            http,
            cfg: cfg.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.cfg.is_configured()
    }

    pub fn auth_token(&self) -> &str {
        &self.cfg.auth_token
    }

    async fn create_message(&self, to: &str, body: &str) -> Result<String, TwilioError> {
        if !self.is_configured() {
            return Err(TwilioError::NotConfigured);
        }
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.account_sid
        );
        let res = self
            .http
            .post(url)
            .basic_auth(&self.cfg.account_sid, Some(&self.cfg.auth_token))
            .form(&[("From", self.cfg.phone_number.as_str()), ("To", to), ("Body", body)])
            .send()
            .await?;

        let status = res.status();
        if status.is_success() {
            let msg: MessageResource = res.json().await?;
            Ok(msg.sid)
        } else {
            let message = res
                .json::<ApiErrorBody>()
                .await
                .map(|b| b.message)
                .unwrap_or_else(|_| status.to_string());
            Err(TwilioError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// Send one SMS. Failures are reported in the result, never raised.
    pub async fn send_sms(&self, to: &str, body: &str) -> SendSmsResult {
        match self.create_message(to, body).await {
            Ok(sid) => {
                info!(to, sid = %sid, "SMS sent");
                SendSmsResult {
                    success: true,
                    message_sid: Some(sid),
                    error: None,
                }
            }
            Err(TwilioError::NotConfigured) => {
                warn!(to, "Twilio not configured, SMS dropped");
                SendSmsResult {
                    success: false,
                    message_sid: None,
                    error: Some(TwilioError::NotConfigured.to_string()),
                }
            }
            Err(e) => {
                error!(to, error = %e, "SMS send failed");
                SendSmsResult {
                    success: false,
                    message_sid: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn send_bulk(&self, recipients: &[String], body: &str) -> Vec<SendSmsResult> {
        join_all(recipients.iter().map(|to| self.send_sms(to, body))).await
    }

    /// Check `X-Twilio-Signature` against the configured auth token.
    pub fn validate_signature(&self, signature: &str, url: &str, params: &[(String, String)]) -> bool {
        if self.cfg.auth_token.is_empty() {
            warn!("cannot validate signature: Twilio auth token not configured");
            return false;
        }
        validate_signature(&self.cfg.auth_token, signature, url, params)
    }
}

/// Twilio request signature: base64(HMAC-SHA1(token, url + sorted key/value pairs)).
pub fn compute_signature(auth_token: &str, url: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    let mut data = String::from(url);
    for (k, v) in sorted {
        data.push_str(k);
        data.push_str(v);
    }
    // HMAC accepts keys of any length
    let mut mac = match Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(data.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

pub fn validate_signature(
    auth_token: &str,
    signature: &str,
    url: &str,
    params: &[(String, String)],
) -> bool {
    let expected = compute_signature(auth_token, url, params);
    !expected.is_empty() && bool::from(expected.as_bytes().ct_eq(signature.as_bytes()))
}

/// Wrap a reply in a TwiML `<Message>`.
pub fn format_twiml(message: &str) -> String {
    let mut escaped = String::with_capacity(message.len());
    for ch in message.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{escaped}</Message></Response>"
    )
}

fn digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// E.164 normalization with a US default: `(401) 592-5209` → `+14015925209`.
pub fn format_phone_number(phone: &str) -> String {
    let d = digits(phone);
    if d.len() == 10 {
        return format!("+1{d}");
    }
    if d.len() == 11 && d.starts_with('1') {
        return format!("+{d}");
    }
    if phone.starts_with('+') {
        return phone.to_string();
    }
    format!("+{d}")
}

pub fn is_valid_phone_number(phone: &str) -> bool {
    E164.is_match(phone)
}

pub fn last_ten_digits(phone: &str) -> String {
    let d = digits(phone);
    let skip = d.len().saturating_sub(10);
    d[skip..].to_string()
}

/// Stored spellings to try, in order, when resolving an inbound number.
pub fn phone_lookup_formats(phone: &str) -> Vec<String> {
    let normalized = format_phone_number(phone);
    let all = digits(phone);
    let last10 = last_ten_digits(phone);
    let mut formats = vec![
        normalized,
        all,
        last10.clone(),
        format!("+1{last10}"),
        format!("1{last10}"),
    ];
    let mut seen = std::collections::HashSet::new();
    formats.retain(|f| !f.is_empty() && f != "+" && seen.insert(f.clone()));
    formats
}
