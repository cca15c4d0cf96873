use axum::{Json, extract::State};
use serde::Serialize;
use tracing::info;

use crate::api::twilio::{format_phone_number, is_valid_phone_number};
use crate::db::models::PartnerSettings;
use crate::db::users::SettingsInput;
use crate::error::StashError;
use crate::middleware::auth::AuthUser;
use crate::router::StashState;
use crate::service::dates::parse_hhmm;
use crate::service::quiet_hours::format_quiet_hours;

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub phone_number: Option<String>,
    pub settings: Option<PartnerSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiet_hours: Option<String>,
}

fn describe(phone_number: Option<String>, settings: Option<PartnerSettings>) -> SettingsResponse {
    let quiet_hours = settings.as_ref().and_then(|s| {
        match (s.quiet_hours_start.as_deref(), s.quiet_hours_end.as_deref()) {
            (Some(start), Some(end)) => Some(format_quiet_hours(start, end)),
            _ => None,
        }
    });
    SettingsResponse {
        phone_number,
        settings,
        quiet_hours,
    }
}

fn validate(input: &SettingsInput) -> Result<(), StashError> {
    for (field, value) in [
        ("phone_number", &input.phone_number),
        ("partner_phone", &input.partner_phone),
    ] {
        if let Some(p) = value.as_deref().map(str::trim).filter(|p| !p.is_empty())
            && !is_valid_phone_number(&format_phone_number(p))
        {
            return Err(StashError::bad_request(format!("{field} is not a valid phone number")));
        }
    }
    for (field, value) in [
        ("quiet_hours_start", &input.quiet_hours_start),
        ("quiet_hours_end", &input.quiet_hours_end),
    ] {
        if let Some(t) = value.as_deref().filter(|t| !t.is_empty())
            && parse_hhmm(t).is_none()
        {
            return Err(StashError::bad_request(format!("{field} must be HH:MM")));
        }
    }
    Ok(())
}

pub async fn get_settings(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
) -> Result<Json<SettingsResponse>, StashError> {
    let settings = state.db.users().settings(user.id).await?;
    Ok(Json(describe(user.phone_number, settings)))
}

pub async fn put_settings(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Json(input): Json<SettingsInput>,
) -> Result<Json<SettingsResponse>, StashError> {
    validate(&input)?;
    let users = state.db.users();
    let settings = users.upsert_settings(user.id, input).await?;
    let phone = users.get(user.id).await?.and_then(|u| u.phone_number);
    info!(user_id = %user.id, "settings updated");
    Ok(Json(describe(phone, Some(settings))))
}
