use std::{convert::TryFrom, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unit system requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    /// Suffix appended to the rounded temperature. Fixed per unit system,
    /// never taken from the provider.
    pub fn temperature_suffix(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub const fn all() -> &'static [Units] {
        &[Units::Metric, Units::Imperial]
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitsError {
    #[error("Invalid units value: {0}. Must be 'metric' or 'imperial'.")]
    Invalid(String),
}

impl TryFrom<&str> for Units {
    type Error = UnitsError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            _ => Err(UnitsError::Invalid(value.to_string())),
        }
    }
}

/// Everything a provider needs to perform one fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherQuery {
    pub location: String,
    pub api_key: String,
    pub units: Units,
}

impl WeatherQuery {
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// One normalized, display-ready weather result.
///
/// Produced only by a successful provider response and never mutated
/// afterwards; the service shares it as `Arc<WeatherSnapshot>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    /// Rounded temperature with unit suffix, e.g. `21°C`.
    pub temperature: String,
    pub temp_value: f64,
    pub temp_unit: &'static str,
    pub condition_id: u32,
    /// Provider condition category, e.g. `Clear`.
    pub main: String,
    pub description: String,
    pub icon_code: String,
    pub icon_glyph: &'static str,
    pub city: String,
    pub country: String,
    /// Relative humidity, e.g. `50%`.
    pub humidity: String,
    pub wind_speed: f64,
    pub fetched_at: DateTime<Utc>,
}

/// Outcome category of one failed fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum FetchError {
    #[error("No API key")]
    NoCredentials,
    #[error("Connection error")]
    ConnectionFailure,
    #[error("Data error")]
    DataFailure,
    #[error("Unknown error")]
    UnknownFailure,
}

/// Last good snapshot plus the outcome of the latest failed attempt.
///
/// A failure never clears the snapshot; a success always clears the error.
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    pub snapshot: Option<Arc<WeatherSnapshot>>,
    pub error: Option<FetchError>,
}

impl FetchState {
    pub(crate) fn record_success(&mut self, snapshot: WeatherSnapshot) {
        self.snapshot = Some(Arc::new(snapshot));
        self.error = None;
    }

    pub(crate) fn record_failure(&mut self, error: FetchError) {
        self.error = Some(error);
    }
}

/// Round to the nearest integer (ties to even) and append the unit suffix.
pub fn format_temperature(value: f64, units: Units) -> String {
    // `as i64` also folds -0.0 into 0.
    let rounded = value.round_ties_even() as i64;
    format!("{rounded}{}", units.temperature_suffix())
}

/// Upper-case the first character and lower-case the rest.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
