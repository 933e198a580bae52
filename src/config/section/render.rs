//! `[render]` section configuration.
//!
//! ```toml
//! [render]
//! hard_wraps = true       # Single newlines inside a paragraph become <br>
//! highlight = true        # Class-based highlighting of fenced code
//! cache_capacity = 0      # Cached documents kept (0 = unbounded)
//! ```

use serde::{Deserialize, Serialize};

/// Markdown rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub hard_wraps: bool,
    pub highlight: bool,
    /// Maximum number of cached render results. `0` keeps every entry for
    /// the lifetime of the process.
    pub cache_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            hard_wraps: true,
            highlight: true,
            cache_capacity: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_render_config() {
        let config = test_parse_config("[render]\nhard_wraps = false\ncache_capacity = 64");
        assert!(!config.render.hard_wraps);
        assert!(config.render.highlight);
        assert_eq!(config.render.cache_capacity, 64);
    }
}
