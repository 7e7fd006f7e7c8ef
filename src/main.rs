//! Garcon - development server and production builder for bundled web
//! applications.

mod app;
mod asset;
mod bundle;
mod cli;
mod config;
mod core;
mod error;
mod handler;
mod logger;
mod server;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::GarconConfig;

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
    logger::set_verbose(cli.verbose);

    let config = GarconConfig::load(&cli)?;
    debug!("config"; "loaded {}", config.config_path.display());

    match &cli.command {
        Commands::Serve { .. } => cli::serve::serve(&config),
        Commands::Build => cli::build::build_all(&config).map(|_| ()),
    }
}
