//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// Development server and build tool for bundled web applications
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Print debug messages
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (default: garcon.toml)
    #[arg(short = 'C', long, global = true, default_value = "garcon.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build every application and serve it over HTTP
    #[command(visible_alias = "s")]
    Serve {
        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short = 'i', long)]
        hostname: Option<IpAddr>,
    },

    /// Build, save and write the offline manifest of every application
    #[command(visible_alias = "b")]
    Build,
}
