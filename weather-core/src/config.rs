use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{error, info, warn};

use crate::{
    model::{Units, WeatherQuery},
    scheduler::ScheduleConfig,
};

const TARGET: &str = "weatherclock::config";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSettings {
    /// OpenWeatherMap API key.
    pub api_key: String,
    /// City name or ZIP code.
    pub location: String,
    pub units: Units,
    pub update_interval_ms: u64,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            location: "London".into(),
            units: Units::Metric,
            update_interval_ms: 900_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSettings {
    pub format: String,
    pub update_interval_ms: u64,
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self {
            format: "%H:%M:%S".into(),
            update_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateSettings {
    /// e.g. "Tuesday, April 08"
    pub format: String,
}

impl Default for DateSettings {
    fn default() -> Self {
        Self {
            format: "%A, %B %d".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    System,
    #[default]
    Dark,
    Light,
}

/// Presentation preferences for display hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub theme: Theme,
    pub color_theme: String,
    /// Custom font file; empty means the host default.
    pub font_path: String,
    pub time_font_size: u32,
    pub date_font_size: u32,
    pub weather_font_size: u32,
    pub width: u32,
    pub height: u32,
    pub transparency: f32,
    pub borderless: bool,
    pub stay_on_top: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            color_theme: "blue".into(),
            font_path: String::new(),
            time_font_size: 48,
            date_font_size: 24,
            weather_font_size: 18,
            width: 400,
            height: 300,
            transparency: 1.0,
            borderless: false,
            stay_on_top: true,
        }
    }
}

/// Top-level settings stored on disk.
///
/// Sections or keys missing from the file take their default values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub weather: WeatherSettings,
    pub time: TimeSettings,
    pub date: DateSettings,
    pub ui: UiSettings,
}

impl Settings {
    pub fn weather_query(&self) -> WeatherQuery {
        WeatherQuery {
            location: self.weather.location.clone(),
            api_key: self.weather.api_key.clone(),
            units: self.weather.units,
        }
    }

    /// Timer settings for the scheduler. Zero intervals fall back to the
    /// defaults with a warning.
    pub fn schedule(&self) -> ScheduleConfig {
        ScheduleConfig {
            time_format: self.time.format.clone(),
            date_format: self.date.format.clone(),
            time_update_interval: Duration::from_millis(self.time.update_interval_ms),
            weather_update_interval: Duration::from_millis(self.weather.update_interval_ms),
        }
        .with_nonzero_intervals()
    }

    /// Load settings from `path`, or return defaults if it doesn't exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(settings)
    }

    /// Save settings to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml = toml::to_string_pretty(self).context("Failed to serialize settings to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(target: TARGET, "Saved configuration to {}", path.display());
        Ok(())
    }

    /// Load the settings at `path` for a running host. Never fails.
    ///
    /// A missing file is created with defaults. An unreadable or invalid file
    /// is reported and replaced by defaults in memory only.
    pub fn load_or_create_at(path: &Path) -> Self {
        if !path.exists() {
            info!(target: TARGET, "No config file found, creating default at {}", path.display());
            let settings = Self::default();
            if let Err(err) = settings.save_to(path) {
                warn!(target: TARGET, "Using default configuration in memory only: {err:#}");
            }
            return settings;
        }

        match Self::load_from(path) {
            Ok(settings) => {
                info!(target: TARGET, "Loaded configuration from {}", path.display());
                settings
            }
            Err(err) => {
                error!(target: TARGET, "{err:#}");
                info!(target: TARGET, "Using default configuration");
                Self::default()
            }
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn load_or_create() -> Result<Self> {
        Ok(Self::load_or_create_at(&Self::config_file_path()?))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weatherclock", "weatherclock")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
