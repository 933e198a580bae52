//! Exclusion rules: the repository's root `.gitignore` plus a fixed list of
//! heavyweight directories that are never listed, watched, or searched.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::config::ConfigError;

/// Ignore-rule file looked up at the repository root.
pub const IGNORE_FILE: &str = ".gitignore";

/// Dependency/VCS/editor directories skipped by name at any depth.
const HEAVY_DIRS: &[&str] = &[".git", "node_modules", "vendor", ".idea", ".vscode"];

/// Check a directory name against the heavyweight list.
#[inline]
pub fn is_heavy_dir(name: &str) -> bool {
    HEAVY_DIRS.contains(&name)
}

/// Immutable ruleset loaded once at startup.
#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    rules: Option<Gitignore>,
}

impl ExcludeMatcher {
    /// Matcher with no rules; excludes nothing.
    pub fn empty() -> Self {
        Self { rules: None }
    }

    /// Load `.gitignore` from `root`. A missing file yields an empty matcher.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(IGNORE_FILE);
        if !path.is_file() {
            return Ok(Self::empty());
        }

        let mut builder = GitignoreBuilder::new(root);
        if let Some(err) = builder.add(&path) {
            return Err(ConfigError::Ignore(path, err.to_string()));
        }
        let rules = builder
            .build()
            .map_err(|err| ConfigError::Ignore(path, err.to_string()))?;
        Ok(Self::with_rules(rules))
    }

    /// Build a matcher from inline rule lines.
    #[cfg(test)]
    pub fn from_lines<'a>(
        root: &Path,
        lines: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ConfigError> {
        let mut builder = GitignoreBuilder::new(root);
        for line in lines {
            builder
                .add_line(None, line)
                .map_err(|err| ConfigError::Ignore(root.join(IGNORE_FILE), err.to_string()))?;
        }
        let rules = builder
            .build()
            .map_err(|err| ConfigError::Ignore(root.join(IGNORE_FILE), err.to_string()))?;
        Ok(Self::with_rules(rules))
    }

    fn with_rules(rules: Gitignore) -> Self {
        let rules = (!rules.is_empty()).then_some(rules);
        Self { rules }
    }

    /// Whether the repository-relative `rel` is excluded.
    ///
    /// Pure; directory-only patterns (`build/`) match only when `is_dir`,
    /// and a path below an excluded directory is itself excluded.
    pub fn is_excluded(&self, rel: &str, is_dir: bool) -> bool {
        let Some(rules) = &self.rules else {
            return false;
        };
        let rel = rel.trim_matches('/');
        if rel.is_empty() {
            return false;
        }
        rules
            .matched_path_or_any_parents(Path::new(rel), is_dir)
            .is_ignore()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rules.is_none()
    }
}
