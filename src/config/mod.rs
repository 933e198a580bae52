//! Viewer configuration from `.repobook.toml`.
//!
//! # Sections
//!
//! | Section    | Purpose                                   |
//! |------------|-------------------------------------------|
//! | `[serve]`  | Interface, ports, watch, browser launch   |
//! | `[render]` | Hard wraps, highlighting, cache capacity  |
//! | `[search]` | Result limit, deadline, ripgrep toggle    |
//!
//! The file is optional. Lookup order: `--config <FILE>`, then
//! `<root>/.repobook.toml`. CLI flags override file values.

mod error;
pub mod section;

pub use error::ConfigError;
pub use section::{RenderConfig, SearchConfig, ServeConfig};

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::log;
use crate::utils::path::normalize_path;

/// Default config file name, looked up in the repository root.
pub const CONFIG_FILE: &str = ".repobook.toml";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Canonical repository root (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Config file that was loaded, if any (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

impl RepoConfig {
    /// Load configuration for the repository named on the command line.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let root = normalize_path(&cli.path);
        if !root.is_dir() {
            return Err(ConfigError::Validation(format!(
                "`{}` is not a directory",
                cli.path.display()
            )));
        }

        let (mut config, config_path) = match &cli.config {
            Some(path) => (Self::from_path(path)?, Some(path.clone())),
            None => {
                let path = root.join(CONFIG_FILE);
                if path.is_file() {
                    (Self::from_path(&path)?, Some(path))
                } else {
                    (Self::default(), None)
                }
            }
        };

        config.root = root;
        config.config_path = config_path;
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            log!("config"; "ignoring unknown fields in {}: {}", path.display(), ignored.join(", "));
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Apply command-line overrides.
    fn apply_cli(&mut self, cli: &Cli) {
        crate::logger::set_verbose(cli.verbose);

        Self::update_option(&mut self.serve.interface, cli.interface.as_ref());
        Self::update_option(&mut self.serve.port, cli.port.as_ref());
        Self::update_option(&mut self.serve.asset_port, cli.asset_port.as_ref());
        Self::update_option(&mut self.serve.ws_port, cli.ws_port.as_ref());
        if cli.no_watch {
            self.serve.watch = false;
        }
        if cli.no_open {
            self.serve.open = false;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.serve.threads == 0 {
            return Err(ConfigError::Validation("serve.threads must be at least 1".into()));
        }
        if self.search.limit == 0 {
            return Err(ConfigError::Validation("search.limit must be at least 1".into()));
        }
        if self.search.timeout_ms == 0 {
            return Err(ConfigError::Validation("search.timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }
}

#[cfg(test)]
pub fn test_parse_config(content: &str) -> RepoConfig {
    let (parsed, ignored) = RepoConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}
