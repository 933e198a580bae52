//! Full-text search over the repository's Markdown files.
//!
//! Uses `rg` when it is installed and enabled, otherwise a single-pass
//! scanner. Both are fixed-string, smart-case, bounded by a deadline and a
//! result limit, and both outputs pass through the exclusion rules.

mod fallback;
mod rg;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::config::SearchConfig;
use crate::exclude::ExcludeMatcher;

/// One matching line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub path: String,
    pub line: u64,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
    /// Limit or deadline reached before the search finished.
    pub truncated: bool,
}

impl SearchResponse {
    fn empty(query: &str) -> Self {
        Self {
            query: query.to_string(),
            results: Vec::new(),
            truncated: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("ripgrep (rg) not found")]
    RipgrepNotFound,

    #[error("failed to run rg: {0}")]
    Io(#[from] std::io::Error),

    #[error("rg failed: {0}")]
    Failed(String),
}

/// Smart case: any uppercase character makes the match case-sensitive.
fn is_case_sensitive(query: &str) -> bool {
    query.chars().any(char::is_uppercase)
}

/// Search front-end bound to one repository.
pub struct Searcher {
    root: PathBuf,
    exclude: Arc<ExcludeMatcher>,
    config: SearchConfig,
}

impl Searcher {
    pub fn new(root: impl Into<PathBuf>, exclude: Arc<ExcludeMatcher>, config: SearchConfig) -> Self {
        Self {
            root: root.into(),
            exclude,
            config,
        }
    }

    /// Run `query`. A blank query returns an empty response.
    pub fn search(&self, query: &str) -> SearchResponse {
        let query = query.trim();
        if query.is_empty() {
            return SearchResponse::empty(query);
        }

        let started = Instant::now();
        let mut response = None;
        if self.config.ripgrep {
            match rg::search(&self.root, query, self.config.limit, self.config.timeout()) {
                Ok(found) => response = Some(found),
                Err(e) => crate::debug!("search"; "{}, using fallback scanner", e),
            }
        }
        let mut response = response.unwrap_or_else(|| {
            fallback::search(
                &self.root,
                &self.exclude,
                query,
                self.config.limit,
                self.config.timeout(),
            )
        });

        response
            .results
            .retain(|hit| !self.exclude.is_excluded(&hit.path, false));

        crate::debug!(
            "search"; "{:?}: {} results in {:?}{}",
            query,
            response.results.len(),
            started.elapsed(),
            if response.truncated { " (truncated)" } else { "" }
        );
        response
    }
}
