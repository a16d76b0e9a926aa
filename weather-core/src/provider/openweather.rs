use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    icons::resolve_glyph,
    model::{Units, WeatherQuery, WeatherSnapshot, capitalize, format_temperature},
};

use super::{ProviderError, WeatherProvider, truncate_body};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    base_url: String,
    timeout: Duration,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            http: Client::new(),
        }
    }

    /// Point the provider at another endpoint serving the same API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for OpenWeatherProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: u32,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: u32,
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    sys: OwSys,
}

/// Turn a raw current-weather body into a display-ready snapshot.
pub fn parse_current(
    body: &str,
    units: Units,
    fetched_at: DateTime<Utc>,
) -> Result<WeatherSnapshot, ProviderError> {
    let parsed: OwCurrentResponse = serde_json::from_str(body)?;

    let condition = parsed
        .weather
        .into_iter()
        .next()
        .ok_or(ProviderError::MissingCondition)?;

    Ok(WeatherSnapshot {
        temperature: format_temperature(parsed.main.temp, units),
        temp_value: parsed.main.temp,
        temp_unit: units.temperature_suffix(),
        condition_id: condition.id,
        main: condition.main,
        description: capitalize(&condition.description),
        icon_glyph: resolve_glyph(&condition.icon),
        icon_code: condition.icon,
        city: parsed.name,
        country: parsed.sys.country,
        humidity: format!("{}%", parsed.main.humidity),
        wind_speed: parsed.wind.speed,
        fetched_at,
    })
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(&self, query: &WeatherQuery) -> Result<WeatherSnapshot, ProviderError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("q", query.location.as_str()),
                ("appid", query.api_key.as_str()),
                ("units", query.units.as_str()),
            ])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        debug!(target: "weatherclock::weather", "Weather data received: {}", truncate_body(&body));

        parse_current(&body, query.units, Utc::now())
    }
}
