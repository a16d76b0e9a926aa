use std::{
    io::{self, Write},
    sync::{Mutex, PoisonError},
};

use tracing::warn;
use weatherclock_core::{DisplaySink, WeatherPanel};

/// Single status line redrawn in place on stdout.
#[derive(Debug)]
pub struct TerminalDisplay {
    line: Mutex<StatusLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StatusLine {
    time: String,
    date: String,
    weather: WeatherPanel,
}

impl StatusLine {
    fn render(&self) -> String {
        format!(
            "{}  {}  {} {}  {}",
            self.time,
            self.date,
            self.weather.icon,
            self.weather.temperature,
            self.weather.description
        )
    }
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self {
            line: Mutex::new(StatusLine {
                time: "00:00:00".into(),
                date: "Loading date...".into(),
                weather: WeatherPanel {
                    icon: "🌡️".into(),
                    temperature: "--".into(),
                    description: "Loading weather...".into(),
                },
            }),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut StatusLine)) {
        let rendered = {
            let mut line = self.line.lock().unwrap_or_else(PoisonError::into_inner);
            apply(&mut line);
            line.render()
        };

        draw(&mut io::stdout().lock(), &rendered);
    }
}

const TARGET: &str = "weatherclock::display";

/// Redraw `rendered` over the current terminal row.
fn draw(out: &mut impl Write, rendered: &str) {
    // Carriage return plus "erase line" keeps the widget on one row.
    if let Err(err) = write!(out, "\r\x1b[2K{rendered}").and_then(|_| out.flush()) {
        warn!(target: TARGET, "Failed to draw clock line: {err}");
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for TerminalDisplay {
    fn show_time(&self, time: &str, date: &str) {
        self.update(|line| {
            line.time = time.to_string();
            line.date = date.to_string();
        });
    }

    fn show_weather(&self, panel: &WeatherPanel) {
        self.update(|line| line.weather = panel.clone());
    }
}
