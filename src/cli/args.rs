//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::net::IpAddr;
use std::path::PathBuf;

/// Browse a repository's Markdown as a live-reloading local site
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Repository directory to serve
    #[arg(default_value = ".", value_hint = clap::ValueHint::DirPath)]
    pub path: PathBuf,

    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: <PATH>/.repobook.toml)
    #[arg(short = 'C', long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub interface: Option<IpAddr>,

    /// Viewer port (0 = pick a free port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Port of the raw repository file origin (0 = pick a free port)
    #[arg(long)]
    pub asset_port: Option<u16>,

    /// Live reload WebSocket port (0 = pick a free port)
    #[arg(long)]
    pub ws_port: Option<u16>,

    /// Disable file watching and live reload
    #[arg(long)]
    pub no_watch: bool,

    /// Do not open the browser
    #[arg(long)]
    pub no_open: bool,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
