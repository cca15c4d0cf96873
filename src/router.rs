use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use reqwest::Client;

use crate::api::claude::ClaudeClient;
use crate::api::twilio::TwilioClient;
use crate::api::weather::WeatherClient;
use crate::config::Config;
use crate::db::Database;
use crate::error::StashError;
use crate::handlers::{accountability, admin, cron, gifts, recipients, recommendations, settings, sms, weather};
use crate::service::notify::Notifier;
use crate::service::sms::SmsDeps;

const BODY_LIMIT: usize = 1024 * 1024;

/// Shared handles for every request.
#[derive(Clone)]
pub struct StashState {
    pub config: Arc<Config>,
    pub db: Database,
    pub claude: ClaudeClient,
    pub twilio: TwilioClient,
    pub weather: WeatherClient,
    pub notifier: Notifier,
    /// Inbound texts allowed per phone number.
    pub sms_limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl StashState {
    pub fn new(config: Config, db: Database) -> Result<Self, StashError> {
        let http = Client::builder()
            .user_agent(concat!("giftstash/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()?;
        let claude = ClaudeClient::new(http.clone(), &config.anthropic);
        let twilio = TwilioClient::new(http.clone(), &config.twilio);
        let weather = WeatherClient::new(http, &config.weather);
        let notifier = Notifier::new(db.clone(), twilio.clone(), config.local_offset());
        let per_minute = NonZeroU32::new(config.basic.sms_per_minute).unwrap_or(NonZeroU32::MIN);
        let sms_limiter = Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute)));
        Ok(Self {
            config: Arc::new(config),
            db,
            claude,
            twilio,
            weather,
            notifier,
            sms_limiter,
        })
    }

    pub fn sms_deps(&self) -> SmsDeps<'_> {
        SmsDeps {
            db: &self.db,
            claude: &self.claude,
            notifier: &self.notifier,
            app_url: &self.config.basic.app_url,
        }
    }
}

pub fn stash_router(state: StashState) -> Router {
    let api = Router::new()
        .route("/recipients", get(recipients::list).post(recipients::create))
        .route("/recipients/suggest", get(recipients::suggest))
        .route("/recipients/match", post(recipients::find))
        .route(
            "/recipients/{id}",
            get(recipients::get_one)
                .put(recipients::update)
                .delete(recipients::delete),
        )
        .route("/recipients/{id}/gifts", get(recipients::gifts))
        .route("/gifts", get(gifts::list).post(gifts::create))
        .route(
            "/gifts/{id}",
            get(gifts::get_one).put(gifts::update).delete(gifts::delete),
        )
        .route(
            "/accountability/children",
            get(accountability::list_children)
                .post(accountability::create_child)
                .delete(accountability::delete_child),
        )
        .route(
            "/accountability/commitments",
            get(accountability::list_commitments).post(accountability::create_commitment),
        )
        .route(
            "/accountability/commitments/{id}",
            axum::routing::patch(accountability::update_commitment),
        )
        .route(
            "/accountability/consequences",
            get(accountability::list_consequences).post(accountability::create_consequence),
        )
        .route(
            "/accountability/consequences/{id}",
            axum::routing::patch(accountability::update_consequence),
        )
        .route("/accountability/dashboard", get(accountability::dashboard))
        .route("/children/{id}/stats", get(accountability::child_stats))
        .route("/user/settings", get(settings::get_settings).put(settings::put_settings))
        .route("/sms/webhook", post(sms::webhook).get(sms::webhook_health))
        .route("/sms/test", post(sms::send_test))
        .route("/cron/commitment-reminders", get(cron::commitment_reminders).post(cron::commitment_reminders))
        .route("/cron/expire-consequences", get(cron::expire_consequences).post(cron::expire_consequences))
        .route("/cron/consequence-warnings", get(cron::consequence_warnings).post(cron::consequence_warnings))
        .route("/cron/birthday-reminders", post(cron::birthday_reminders))
        .route("/cron/cleanup-sms-context", get(cron::cleanup_sms_context).post(cron::cleanup_sms_context))
        .route("/cron/calculate-reliability", get(cron::calculate_reliability).post(cron::calculate_reliability))
        .route("/cron/refresh-weather", get(cron::refresh_weather).post(cron::refresh_weather))
        .route("/cron/weekly-report", get(cron::weekly_report).post(cron::weekly_report))
        .route("/weather", get(weather::get_weather).post(weather::refresh_weather))
        .route("/recommendations", post(recommendations::recommend))
        .route("/admin/users", post(admin::create_user));

    Router::new()
        .route("/health", get(admin::health))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}
