use axum::{Json, extract::State};
use chrono::{Duration, Utc};
use serde::Serialize;

use crate::error::StashError;
use crate::middleware::auth::RequireCron;
use crate::router::StashState;
use crate::service::cron::Workflows;

#[derive(Debug, Serialize)]
pub struct CronResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub report: T,
}

fn workflows(state: &StashState) -> Workflows<'_> {
    Workflows {
        db: &state.db,
        notifier: &state.notifier,
        twilio: &state.twilio,
        weather: &state.weather,
        weather_ttl: Duration::minutes(state.config.weather.cache_ttl_minutes),
        app_url: &state.config.basic.app_url,
        sms_limiter: &state.sms_limiter,
    }
}

macro_rules! cron_job {
    ($name:ident) => {
        pub async fn $name(
            State(state): State<StashState>,
            _cron: RequireCron,
        ) -> Result<Json<CronResponse<impl Serialize>>, StashError> {
            let report = workflows(&state).$name(Utc::now()).await?;
            Ok(Json(CronResponse { success: true, report }))
        }
    };
}

cron_job!(commitment_reminders);
cron_job!(expire_consequences);
cron_job!(consequence_warnings);
cron_job!(birthday_reminders);
cron_job!(cleanup_sms_context);
cron_job!(calculate_reliability);
cron_job!(refresh_weather);
cron_job!(weekly_report);
