//! Markdown rendering.
//!
//! # Pipeline
//!
//! ```text
//! resolve ──► stat ──► cache? ──► parse ──► hard wraps ──► autolinks
//!                                                             │
//!     cache ◄── title ◄── sanitize ◄── html ◄── code ◄── links ◄── heading ids
//! ```
//!
//! Each stage after parsing is a pass over one `Vec<Event>`; only the
//! link pass touches the filesystem (to tell directories from assets).

mod autolink;
mod cache;
mod highlight;
pub mod links;
mod sanitize;
mod toc;

use std::fs::{self, Metadata};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use pulldown_cmark::{Event, Options, Parser, TextMergeStream, html};
use serde::Serialize;

use crate::config::RenderConfig;
use crate::core::{RepoError, RepoResult};
use crate::exclude::ExcludeMatcher;
use crate::utils::path::resolve_markdown_target;
use crate::utils::path::route::{base_name, parent_dir};

pub use cache::RenderCache;
pub use highlight::theme_css;
pub use sanitize::sanitize;
pub use toc::TocEntry;

/// One rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderResult {
    /// Repository-relative path of the rendered file.
    pub path: String,
    pub title: String,
    /// Sanitized HTML body.
    pub html: String,
    pub toc: Vec<TocEntry>,
    /// Modification time (nanoseconds since the Unix epoch) of the source
    /// this result was produced from.
    pub mtime: i64,
}

/// Markdown dialect: GitHub-flavored plus explicit heading ids.
fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Modification time in nanoseconds; negative before the epoch.
fn mtime_nanos(meta: &Metadata) -> i64 {
    let Ok(modified) = meta.modified() else {
        return 0;
    };
    match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as i64,
        Err(before) => -(before.duration().as_nanos() as i64),
    }
}

/// Renders repository documents, caching results by mtime.
pub struct Renderer {
    root: PathBuf,
    exclude: Arc<ExcludeMatcher>,
    config: RenderConfig,
    cache: RenderCache,
}

impl Renderer {
    /// `root` must be canonical.
    pub fn new(root: impl Into<PathBuf>, exclude: Arc<ExcludeMatcher>, config: RenderConfig) -> Self {
        let cache = RenderCache::new(config.cache_capacity);
        Self {
            root: root.into(),
            exclude,
            config,
            cache,
        }
    }

    /// Render the document at `rel` (`""` = repository default document).
    ///
    /// Paths outside the root, excluded paths, missing files and non-Markdown
    /// files all fail before the file is read.
    pub fn render_file(&self, rel: &str) -> RepoResult<Arc<RenderResult>> {
        let target = resolve_markdown_target(&self.root, rel)?;
        if self.exclude.is_excluded(&target.rel, false) {
            return Err(RepoError::NotFound(target.rel));
        }

        let meta = fs::metadata(&target.abs).map_err(|e| RepoError::io(&target.abs, e))?;
        let mtime = mtime_nanos(&meta);
        if let Some(cached) = self.cache.get(&target.rel, mtime) {
            crate::debug!("render"; "cache hit {}", target.rel);
            return Ok(cached);
        }

        let bytes = fs::read(&target.abs).map_err(|e| RepoError::io(&target.abs, e))?;
        let source = String::from_utf8_lossy(&bytes);

        let (html, toc) = self.render_source(&source, parent_dir(&target.rel));
        let title = toc
            .iter()
            .find(|entry| entry.level == 1)
            .map_or_else(|| base_name(&target.rel).to_string(), |entry| entry.title.clone());

        crate::debug!("render"; "rendered {} ({} headings)", target.rel, toc.len());
        let result = Arc::new(RenderResult {
            path: target.rel,
            title,
            html,
            toc,
            mtime,
        });
        self.cache.insert(Arc::clone(&result));
        Ok(result)
    }

    /// Run the event pipeline on `source`. `current_dir` is the document's
    /// directory relative to the root.
    fn render_source(&self, source: &str, current_dir: &str) -> (String, Vec<TocEntry>) {
        let mut events: Vec<Event> =
            TextMergeStream::new(Parser::new_ext(source, parser_options())).collect();

        if self.config.hard_wraps {
            for event in events.iter_mut() {
                if matches!(event, Event::SoftBreak) {
                    *event = Event::HardBreak;
                }
            }
        }

        let mut events = autolink::link_bare_urls(events);
        let toc = toc::assign_heading_ids(&mut events);

        let probe = links::FsProbe::new(&self.root);
        let rewrites = links::collect(&events, current_dir, &probe);
        links::apply(&mut events, rewrites);

        let events = highlight::render_code_blocks(events, self.config.highlight);

        let mut out = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        (sanitize(&out), toc)
    }
}
