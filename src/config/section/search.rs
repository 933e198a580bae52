//! `[search]` section configuration.
//!
//! ```toml
//! [search]
//! limit = 200             # Maximum results per query
//! timeout_ms = 3000       # Per-query deadline
//! ripgrep = true          # Use `rg` when it is on PATH
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Full-text search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub limit: usize,
    pub timeout_ms: u64,
    pub ripgrep: bool,
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 200,
            timeout_ms: 3000,
            ripgrep: true,
        }
    }
}
