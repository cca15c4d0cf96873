use chrono::{FixedOffset, Offset, Utc};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const CONFIG_FILE: &str = "giftstash.toml";

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const TWILIO_BASE_URL: &str = "https://api.twilio.com";
pub const WEATHER_BASE_URL: &str = "https://api.weatherapi.com";

/// Process-wide configuration, resolved once on first access.
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::load().unwrap_or_else(|e| {
        eprintln!("invalid configuration, falling back to defaults: {e}");
        Config::default()
    })
});

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub anthropic: AnthropicConfig,
    pub twilio: TwilioConfig,
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub loglevel: String,
    /// Public base URL used in SMS links.
    pub app_url: String,
    /// Bearer secret expected on `/api/cron/*`. Empty rejects every call.
    pub cron_secret: String,
    /// Bearer secret expected on `/api/admin/*`. Empty rejects every call.
    pub admin_key: String,
    /// Offset applied when reading wall-clock phrases like "by 7pm".
    pub utc_offset_minutes: i32,
    /// Inbound SMS allowed per phone number per minute.
    pub sms_per_minute: u32,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite:giftstash.sqlite".to_string(),
            loglevel: "info".to_string(),
            app_url: "https://giftstash.app".to_string(),
            cron_secret: String::new(),
            admin_key: String::new(),
            utc_offset_minutes: 0,
            sms_per_minute: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_retries: usize,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: ANTHROPIC_DEFAULT_MODEL.to_string(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
            max_retries: 2,
        }
    }
}

impl AnthropicConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub phone_number: String,
    /// Exact URL Twilio signs webhook requests with.
    pub webhook_url: Option<String>,
    pub require_signature: bool,
    pub base_url: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            phone_number: String::new(),
            webhook_url: None,
            require_signature: false,
            base_url: TWILIO_BASE_URL.to_string(),
        }
    }
}

impl TwilioConfig {
    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.phone_number.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_key: String,
    pub base_url: String,
    pub cache_ttl_minutes: i64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: WEATHER_BASE_URL.to_string(),
            cache_ttl_minutes: 60,
        }
    }
}

impl Config {
    /// Defaults, then `giftstash.toml`, then `GIFTSTASH_*` env vars
    /// (nested keys separated by `__`, e.g. `GIFTSTASH_TWILIO__AUTH_TOKEN`).
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("GIFTSTASH_").split("__"))
            .extract()
    }

    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.basic.utc_offset_minutes * 60).unwrap_or(Utc.fix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_integrations_unconfigured() {
        let cfg = Config::default();
        assert!(!cfg.anthropic.is_configured());
        assert!(!cfg.twilio.is_configured());
        assert_eq!(cfg.basic.sms_per_minute, 20);
    }

    #[test]
    fn local_offset_follows_minutes() {
        let mut cfg = Config::default();
        cfg.basic.utc_offset_minutes = -300;
        assert_eq!(cfg.local_offset().local_minus_utc(), -300 * 60);
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        let mut cfg = Config::default();
        cfg.basic.utc_offset_minutes = 100_000;
        assert_eq!(cfg.local_offset().local_minus_utc(), 0);
    }
}
