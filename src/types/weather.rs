use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Forecast as served to clients and stored in `weather_cache.data`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherData {
    pub location: String,
    pub current_temp: f64,
    pub feels_like: f64,
    pub condition: String,
    pub condition_code: String,
    pub condition_icon: String,
    pub humidity: f64,
    pub wind_speed: f64,
    pub wind_direction: String,
    pub forecast: Vec<ForecastDay>,
    pub alerts: Vec<WeatherAlert>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForecastDay {
    pub date: String,
    pub max_temp: f64,
    pub min_temp: f64,
    pub condition: String,
    pub condition_icon: String,
    pub chance_of_rain: f64,
    pub chance_of_snow: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherAlert {
    pub headline: String,
    pub severity: String,
    pub urgency: String,
    pub event: String,
    pub effective: String,
    pub expires: String,
    pub description: String,
}

/// `GET /api/weather` payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherResponse {
    #[serde(flatten)]
    pub data: WeatherData,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ---- WeatherAPI.com forecast.json ----

#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub current: Current,
    #[serde(default)]
    pub forecast: Option<Forecast>,
    #[serde(default)]
    pub alerts: Option<Alerts>,
}

#[derive(Debug, Deserialize)]
pub struct Condition {
    pub text: String,
    pub icon: String,
    pub code: i64,
}

#[derive(Debug, Deserialize)]
pub struct Current {
    pub temp_f: f64,
    pub feelslike_f: f64,
    pub condition: Condition,
    pub humidity: f64,
    pub wind_mph: f64,
    pub wind_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub forecastday: Vec<ForecastDayRaw>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastDayRaw {
    pub date: String,
    pub day: DayRaw,
}

#[derive(Debug, Deserialize)]
pub struct DayRaw {
    pub maxtemp_f: f64,
    pub mintemp_f: f64,
    pub condition: Condition,
    #[serde(default)]
    pub daily_chance_of_rain: f64,
    #[serde(default)]
    pub daily_chance_of_snow: f64,
}

#[derive(Debug, Deserialize)]
pub struct Alerts {
    #[serde(default)]
    pub alert: Vec<AlertRaw>,
}

#[derive(Debug, Deserialize)]
pub struct AlertRaw {
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub urgency: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub effective: String,
    #[serde(default)]
    pub expires: String,
    #[serde(default)]
    pub desc: String,
}

/// Icons come back protocol-relative (`//cdn.weatherapi.com/...`).
fn absolute_icon(icon: &str) -> String {
    if icon.starts_with("//") {
        format!("https:{icon}")
    } else {
        icon.to_string()
    }
}

impl ForecastResponse {
    pub fn into_weather(self, location: &str) -> WeatherData {
        let forecast = self
            .forecast
            .map(|f| f.forecastday)
            .unwrap_or_default()
            .into_iter()
            .take(7)
            .map(|d| ForecastDay {
                date: d.date,
                max_temp: d.day.maxtemp_f,
                min_temp: d.day.mintemp_f,
                condition: d.day.condition.text,
                condition_icon: absolute_icon(&d.day.condition.icon),
                chance_of_rain: d.day.daily_chance_of_rain,
                chance_of_snow: d.day.daily_chance_of_snow,
            })
            .collect();
        let alerts = self
            .alerts
            .map(|a| a.alert)
            .unwrap_or_default()
            .into_iter()
            .map(|a| WeatherAlert {
                headline: a.headline,
                severity: a.severity,
                urgency: a.urgency,
                event: a.event,
                effective: a.effective,
                expires: a.expires,
                description: a.desc,
            })
            .collect();
        WeatherData {
            location: location.to_string(),
            current_temp: self.current.temp_f,
            feels_like: self.current.feelslike_f,
            condition: self.current.condition.text,
            condition_code: self.current.condition.code.to_string(),
            condition_icon: absolute_icon(&self.current.condition.icon),
            humidity: self.current.humidity,
            wind_speed: self.current.wind_mph,
            wind_direction: self.current.wind_dir,
            forecast,
            alerts,
        }
    }
}
