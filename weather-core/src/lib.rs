//! Core library for the `weatherclock` widget.
//!
//! This crate defines:
//! - Settings loading and persistence
//! - The weather provider abstraction and the OpenWeatherMap client
//! - The background fetch service holding the last known weather
//! - The dual-cadence scheduler that pushes time and weather to a display
//!
//! It is used by the `weatherclock` binary, but any host that implements
//! [`DisplaySink`] can drive it.

pub mod config;
pub mod icons;
pub mod model;
pub mod provider;
pub mod scheduler;
pub mod service;

pub use config::{Settings, Theme};
pub use icons::resolve_glyph;
pub use model::{FetchError, FetchState, Units, UnitsError, WeatherQuery, WeatherSnapshot};
pub use provider::{OpenWeatherProvider, ProviderError, WeatherProvider};
pub use scheduler::{DisplaySink, ScheduleConfig, Scheduler, SchedulerHandle, WeatherPanel};
pub use service::WeatherService;
