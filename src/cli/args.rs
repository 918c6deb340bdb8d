//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::path::PathBuf;

/// Tutorial server CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: tutorial.toml)
    #[arg(short = 'C', long, default_value = "tutorial.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// URL base path the server is mounted under (e.g. set by a hub proxy)
    #[arg(short, long)]
    pub basepath: Option<String>,

    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub interface: Option<std::net::IpAddr>,

    /// Port number to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,
}
