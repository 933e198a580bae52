//! repobook - browse a repository's Markdown as a live-reloading local site.

mod cli;
mod config;
mod core;
mod embed;
mod exclude;
mod logger;
mod reload;
mod render;
mod scan;
mod search;
mod utils;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::RepoConfig;

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

    let config = RepoConfig::load(&cli).context("failed to load configuration")?;
    if let Some(path) = &config.config_path {
        debug!("config"; "loaded {}", path.display());
    }

    cli::serve::run(&config)
}
