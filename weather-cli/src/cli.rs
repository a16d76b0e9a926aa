use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select, Text};
use tokio::runtime::Handle;
use tracing::info;
use weatherclock_core::{
    OpenWeatherProvider, Scheduler, Settings, Units, WeatherService, WeatherSnapshot,
};

use crate::display::TerminalDisplay;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherclock", version, about = "Terminal clock with live weather")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the clock until interrupted.
    Run {
        /// Override the configured location.
        #[arg(long)]
        location: Option<String>,

        /// Override the configured units ("metric" or "imperial").
        #[arg(long)]
        units: Option<String>,

        /// Override the weather refresh interval, in milliseconds.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        weather_interval_ms: Option<u64>,
    },

    /// Fetch the current weather once and print it.
    Show {
        /// Override the configured location.
        #[arg(long)]
        location: Option<String>,

        /// Override the configured units ("metric" or "imperial").
        #[arg(long)]
        units: Option<String>,

        /// Print the full snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Interactively set the API key, location and units.
    Configure,

    /// Print the location of the settings file.
    ConfigPath,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Run {
                location,
                units,
                weather_interval_ms,
            } => {
                let mut settings = Settings::load_or_create()?;
                apply_overrides(&mut settings, location, units)?;
                if let Some(ms) = weather_interval_ms {
                    settings.weather.update_interval_ms = ms;
                }
                run_clock(settings).await
            }
            Command::Show {
                location,
                units,
                json,
            } => {
                let mut settings = Settings::load()?;
                apply_overrides(&mut settings, location, units)?;
                show_once(&settings, json).await
            }
            Command::Configure => configure(),
            Command::ConfigPath => {
                println!("{}", Settings::config_file_path()?.display());
                Ok(())
            }
        }
    }
}

fn apply_overrides(
    settings: &mut Settings,
    location: Option<String>,
    units: Option<String>,
) -> anyhow::Result<()> {
    if let Some(location) = location {
        settings.weather.location = location;
    }
    if let Some(units) = units {
        settings.weather.units = Units::try_from(units.as_str())?;
    }
    Ok(())
}

fn weather_service(settings: &Settings) -> WeatherService {
    WeatherService::new(
        settings.weather_query(),
        Arc::new(OpenWeatherProvider::new()),
        Handle::current(),
    )
}

async fn run_clock(settings: Settings) -> anyhow::Result<()> {
    let service = weather_service(&settings);
    let scheduler = Scheduler::new(service, Arc::new(TerminalDisplay::new()), settings.schedule());

    let handle = scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    println!();
    info!("Shutdown signal received");
    handle.shutdown();
    Ok(())
}

async fn show_once(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let service = weather_service(settings);

    let task = service.start_fetch().ok_or_else(|| {
        anyhow!(
            "No API key configured.\n\
             Hint: run `weatherclock configure` and enter your OpenWeatherMap API key."
        )
    })?;
    task.await.context("Weather fetch task failed")?;

    let state = service.state();
    match (state.snapshot, state.error) {
        (Some(snapshot), _) if json => {
            println!("{}", serde_json::to_string_pretty(&*snapshot)?);
        }
        (Some(snapshot), _) => println!("{}", describe(&snapshot, settings.weather.units)),
        (None, Some(err)) => bail!("Could not fetch weather for {}: {err}", settings.weather.location),
        (None, None) => bail!("Weather fetch finished without a result"),
    }

    Ok(())
}

fn describe(snapshot: &WeatherSnapshot, units: Units) -> String {
    let wind_unit = match units {
        Units::Metric => "m/s",
        Units::Imperial => "mph",
    };
    format!(
        "{} {}  {}\n{}, {}  humidity {}  wind {} {}",
        snapshot.icon_glyph,
        snapshot.temperature,
        snapshot.description,
        snapshot.city,
        snapshot.country,
        snapshot.humidity,
        snapshot.wind_speed,
        wind_unit,
    )
}

fn configure() -> anyhow::Result<()> {
    let mut settings = Settings::load()?;

    let api_key = Password::new("OpenWeatherMap API key (leave empty to keep current):")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;
    if !api_key.trim().is_empty() {
        settings.weather.api_key = api_key.trim().to_string();
    }

    settings.weather.location = Text::new("Location (city name or ZIP code):")
        .with_default(&settings.weather.location)
        .prompt()?;

    let current = Units::all()
        .iter()
        .position(|u| *u == settings.weather.units)
        .unwrap_or(0);
    settings.weather.units = Select::new("Units:", Units::all().to_vec())
        .with_starting_cursor(current)
        .prompt()?;

    settings.save()?;
    println!("Saved settings to {}", Settings::config_file_path()?.display());
    Ok(())
}
