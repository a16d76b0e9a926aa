//! Binary crate for the `weatherclock` terminal widget.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Rendering the clock and weather line in the terminal

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

mod cli;
mod display;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    init_logging(cmd.verbose);
    cmd.run().await
}

/// Install the process-wide subscriber. Logs go to stderr so the clock line
/// on stdout stays intact.
fn init_logging(verbosity: u8) {
    let base_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
