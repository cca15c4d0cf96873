//! Twilio inbound webhook. Every reply is TwiML, including failures.

use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::api::twilio::{SendSmsResult, TEST_MESSAGE, format_phone_number, format_twiml};
use crate::error::StashError;
use crate::middleware::auth::AuthUser;
use crate::router::StashState;
use crate::service::sms::{ERROR_REPLY, handle_inbound};
use crate::types::sms::InboundSms;

const SIGNATURE_HEADER: &str = "x-twilio-signature";
const RATE_LIMITED: &str =
    "You're sending messages too quickly. Please wait a minute and try again.";

fn twiml(status: StatusCode, message: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/xml")],
        format_twiml(message),
    )
        .into_response()
}

fn unknown_number_reply(app_url: &str) -> String {
    let host = app_url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    format!(
        "Welcome to GiftStash! To save gift ideas via text, please add your phone number in the app settings first.\n\nVisit {host}/settings to get started."
    )
}

fn inbound_from(params: &[(String, String)]) -> InboundSms {
    let mut sms = InboundSms::default();
    for (key, value) in params {
        match key.as_str() {
            "From" => sms.from = value.clone(),
            "Body" => sms.body = value.clone(),
            "MessageSid" => sms.message_sid = Some(value.clone()),
            _ => {}
        }
    }
    sms
}

/// `Err` carries the rejection when the request must not be processed.
fn check_signature(
    state: &StashState,
    headers: &HeaderMap,
    params: &[(String, String)],
) -> Result<(), Response> {
    let cfg = &state.config.twilio;
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    match (signature, cfg.webhook_url.as_deref()) {
        (Some(sig), Some(url)) => {
            if state.twilio.validate_signature(sig, url, params) {
                return Ok(());
            }
            warn!("invalid twilio signature");
            if cfg.require_signature {
                return Err(twiml(StatusCode::UNAUTHORIZED, "Unauthorized"));
            }
            Ok(())
        }
        (None, _) if cfg.require_signature => {
            warn!("missing twilio signature");
            Err(twiml(StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
        _ => Ok(()),
    }
}

pub async fn webhook(
    State(state): State<StashState>,
    headers: HeaderMap,
    Form(params): Form<Vec<(String, String)>>,
) -> Response {
    let sms = inbound_from(&params);
    if sms.from.trim().is_empty() || sms.body.trim().is_empty() {
        return twiml(StatusCode::BAD_REQUEST, "Error: Invalid message format");
    }
    if let Err(rejection) = check_signature(&state, &headers, &params) {
        return rejection;
    }

    let phone = format_phone_number(sms.from.trim());
    if state.sms_limiter.check_key(&phone).is_err() {
        warn!(phone, "sms rate limit hit");
        return twiml(StatusCode::OK, RATE_LIMITED);
    }

    let user = match state.db.users().by_phone(&phone).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!(phone, "sms from unknown number");
            return twiml(StatusCode::OK, &unknown_number_reply(&state.config.basic.app_url));
        }
        Err(e) => {
            error!(error = %e, "phone lookup failed");
            return twiml(StatusCode::INTERNAL_SERVER_ERROR, ERROR_REPLY);
        }
    };

    let reply = handle_inbound(
        state.sms_deps(),
        &user,
        &phone,
        sms.body.trim(),
        sms.message_sid.as_deref(),
        Utc::now(),
    )
    .await;
    match reply {
        Ok(reply) => twiml(StatusCode::OK, &reply),
        Err(e) => {
            error!(user_id = %user.id, error = %e, "sms handling failed");
            twiml(StatusCode::INTERNAL_SERVER_ERROR, ERROR_REPLY)
        }
    }
}

pub async fn webhook_health(State(state): State<StashState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "SMS webhook is configured correctly",
        "twilio_configured": state.twilio.is_configured(),
        "ai_configured": state.claude.is_configured(),
        "timestamp": Utc::now(),
    }))
}

/// Send the fixed test text to the caller's own phone.
pub async fn send_test(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
) -> Result<Json<SendSmsResult>, StashError> {
    let phone = user
        .phone_number
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| StashError::bad_request("No phone number on file"))?;
    let result = state.twilio.send_sms(&format_phone_number(phone), TEST_MESSAGE).await;
    info!(user_id = %user.id, success = result.success, "test sms");
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_fields_by_twilio_name() {
        let params = vec![
            ("From".to_string(), "+14015550100".to_string()),
            ("Body".to_string(), "LEGO for Emma".to_string()),
            ("MessageSid".to_string(), "SM1".to_string()),
            ("AccountSid".to_string(), "AC1".to_string()),
        ];
        let sms = inbound_from(&params);
        assert_eq!(sms.from, "+14015550100");
        assert_eq!(sms.body, "LEGO for Emma");
        assert_eq!(sms.message_sid.as_deref(), Some("SM1"));
    }

    #[test]
    fn welcome_uses_app_host() {
        let text = unknown_number_reply("https://giftstash.app/");
        assert!(text.ends_with("Visit giftstash.app/settings to get started."));
    }
}
