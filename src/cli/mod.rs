//! Command line interface.

mod progress;
pub mod prompt;
mod report;
mod scrape;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

use crate::config::Settings;

pub use scrape::ScrapeArgs;

#[derive(Parser)]
#[command(name = "mapreviews")]
#[command(about = "Harvest Google Maps reviews into JSON")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides MAPREVIEWS_CONFIG and ./mapreviews.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Scroll a listing's reviews and save them as JSON
    Scrape(ScrapeArgs),

    /// Print the effective settings as TOML
    Config,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (settings, source) = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Scrape(args) => scrape::cmd_scrape(settings, args).await,
        Commands::Config => cmd_config(&settings, source.as_deref()),
    }
}

fn cmd_config(settings: &Settings, source: Option<&std::path::Path>) -> anyhow::Result<()> {
    match source {
        Some(path) => eprintln!("{} {}", style("# Loaded from").dim(), path.display()),
        None => eprintln!("{}", style("# Built-in defaults").dim()),
    }
    print!("{}", settings.to_toml()?);
    Ok(())
}
