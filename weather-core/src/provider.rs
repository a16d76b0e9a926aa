use async_trait::async_trait;
use reqwest::StatusCode;
use std::fmt::Debug;
use thiserror::Error;

use crate::model::{FetchError, WeatherQuery, WeatherSnapshot};

pub mod openweather;

pub use openweather::OpenWeatherProvider;

/// Detailed cause of a failed fetch attempt.
///
/// The service logs this and keeps only its [`FetchError`] category.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to weather provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("weather provider returned status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to parse weather response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("weather response contained no condition entries")]
    MissingCondition,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProviderError {
    pub fn kind(&self) -> FetchError {
        match self {
            // A request that could not even be built is not a network problem.
            ProviderError::Transport(err) if err.is_builder() => FetchError::UnknownFailure,
            ProviderError::Transport(_) | ProviderError::Status { .. } => {
                FetchError::ConnectionFailure
            }
            ProviderError::Parse(_) | ProviderError::MissingCondition => FetchError::DataFailure,
            ProviderError::Other(_) => FetchError::UnknownFailure,
        }
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(&self, query: &WeatherQuery) -> Result<WeatherSnapshot, ProviderError>;
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
