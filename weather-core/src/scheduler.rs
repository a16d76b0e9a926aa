//! Two independent repeating timers driving a [`DisplaySink`].
//!
//! The render timer pushes the local time and date on a short cadence. The
//! weather timer pushes whatever the [`WeatherService`] currently holds and
//! then asks it for fresh data, so each fetch is shown on the following fire.
//! Both reschedule with a fixed delay after their work is done.

use std::{fmt::Write as _, sync::Arc, time::Duration};

use chrono::{DateTime, Local, TimeZone};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    model::{FetchError, FetchState},
    service::WeatherService,
};

const TARGET: &str = "weatherclock::scheduler";

/// Where the scheduler pushes display updates.
pub trait DisplaySink: Send + Sync {
    fn show_time(&self, time: &str, date: &str);
    fn show_weather(&self, panel: &WeatherPanel);
}

/// Three strings a host renders for the weather area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherPanel {
    pub icon: String,
    pub temperature: String,
    pub description: String,
}

impl WeatherPanel {
    pub fn loading() -> Self {
        Self {
            icon: "🔄".into(),
            temperature: "--".into(),
            description: "Loading...".into(),
        }
    }

    pub fn failed(error: FetchError) -> Self {
        Self {
            icon: "❓".into(),
            temperature: "--".into(),
            description: format!("Error: {error}"),
        }
    }

    /// A snapshot wins over an error, an error wins over "loading".
    pub fn from_state(state: &FetchState) -> Self {
        match (&state.snapshot, state.error) {
            (Some(snapshot), _) => Self {
                icon: snapshot.icon_glyph.to_string(),
                temperature: snapshot.temperature.clone(),
                description: snapshot.description.clone(),
            },
            (None, Some(error)) => Self::failed(error),
            (None, None) => Self::loading(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub time_format: String,
    pub date_format: String,
    pub time_update_interval: Duration,
    pub weather_update_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time_format: "%H:%M:%S".into(),
            date_format: "%A, %B %d".into(),
            time_update_interval: Duration::from_millis(1000),
            weather_update_interval: Duration::from_millis(900_000),
        }
    }
}

impl ScheduleConfig {
    /// Replace zero intervals with the defaults.
    ///
    /// A zero delay would turn a timer into a busy loop, and for the weather
    /// timer a new request on every iteration.
    pub fn with_nonzero_intervals(mut self) -> Self {
        let defaults = Self::default();
        if self.time_update_interval.is_zero() {
            warn!(
                target: TARGET,
                "Time update interval must be positive, using {:?}",
                defaults.time_update_interval
            );
            self.time_update_interval = defaults.time_update_interval;
        }
        if self.weather_update_interval.is_zero() {
            warn!(
                target: TARGET,
                "Weather update interval must be positive, using {:?}",
                defaults.weather_update_interval
            );
            self.weather_update_interval = defaults.weather_update_interval;
        }
        self
    }
}

/// Render `now` with both strftime patterns.
///
/// Fails if either pattern contains an unsupported specifier.
pub fn format_clock<Tz>(
    now: &DateTime<Tz>,
    time_format: &str,
    date_format: &str,
) -> Result<(String, String), std::fmt::Error>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut time = String::new();
    write!(time, "{}", now.format(time_format))?;
    let mut date = String::new();
    write!(date, "{}", now.format(date_format))?;
    Ok((time, date))
}

pub struct Scheduler {
    service: WeatherService,
    sink: Arc<dyn DisplaySink>,
    config: ScheduleConfig,
}

impl Scheduler {
    pub fn new(service: WeatherService, sink: Arc<dyn DisplaySink>, config: ScheduleConfig) -> Self {
        Self {
            service,
            sink,
            config: config.with_nonzero_intervals(),
        }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// One render fire: format local time/date and push them.
    pub fn render_tick(&self) {
        self.render_at(&Local::now());
    }

    fn render_at<Tz>(&self, now: &DateTime<Tz>)
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        match format_clock(now, &self.config.time_format, &self.config.date_format) {
            Ok((time, date)) => self.sink.show_time(&time, &date),
            Err(_) => error!(
                target: TARGET,
                "Error updating time: invalid format '{}' / '{}'",
                self.config.time_format,
                self.config.date_format
            ),
        }
    }

    /// One weather fire: push the cached state, then request fresh data.
    pub fn weather_tick(&self) {
        let panel = WeatherPanel::from_state(&self.service.state());
        debug!(target: TARGET, "Weather panel: {} {} {}", panel.icon, panel.temperature, panel.description);
        self.sink.show_weather(&panel);
        self.service.start_fetch();
    }

    /// Start both timers on the current tokio runtime.
    ///
    /// Each timer fires immediately, then after every interval. The timers
    /// run until the returned handle is shut down or dropped.
    pub fn start(self) -> SchedulerHandle {
        let scheduler = Arc::new(self);
        info!(
            target: TARGET,
            "Scheduler started (render every {:?}, weather every {:?})",
            scheduler.config.time_update_interval,
            scheduler.config.weather_update_interval
        );

        let render = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move {
                loop {
                    scheduler.render_tick();
                    tokio::time::sleep(scheduler.config.time_update_interval).await;
                }
            })
        };

        let weather = tokio::spawn(async move {
            loop {
                scheduler.weather_tick();
                tokio::time::sleep(scheduler.config.weather_update_interval).await;
            }
        });

        SchedulerHandle { render, weather }
    }
}

/// Owns both timer tasks; dropping it cancels them.
#[derive(Debug)]
pub struct SchedulerHandle {
    render: JoinHandle<()>,
    weather: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn shutdown(self) {
        info!(target: TARGET, "Scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.render.is_finished() && !self.weather.is_finished()
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.render.abort();
        self.weather.abort();
    }
}
