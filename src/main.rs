//! Tutorial server - deploys tutorial content and serves it over HTTP.

mod cgi;
mod cli;
mod config;
mod content;
mod core;
mod embed;
mod logger;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::ServerConfig;
use std::sync::Arc;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = Arc::new(ServerConfig::load(&cli)?);
    log!("config"; "{} from {}", config.app.name, config.config_path.display());

    cli::serve::serve(config)
}
