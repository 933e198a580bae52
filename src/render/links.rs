//! Link and image destination rewriting.
//!
//! Runs in two passes over the event list: [`collect`] walks the events
//! without mutating them and records one [`Rewrite`] per link or image that
//! needs changing, then [`apply`] swaps the recorded events in place.
//!
//! Relative destinations are resolved against the rendered file's directory
//! and classified:
//!
//! | Target                                         | Route              |
//! |------------------------------------------------|--------------------|
//! | root, trailing `/`, `.md`/`.markdown`, or a directory on disk | `/file/<path>` |
//! | anything else                                  | `/repo/<path>`     |
//!
//! Query and fragment survive the rewrite. Scheme/host and fragment-only
//! destinations are left alone.

use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use pulldown_cmark::{CowStr, Event, LinkType, Tag, TagEnd};

use crate::core::LinkKind;
use crate::utils::html::escape_attr;
use crate::utils::path::is_markdown_file_name;
use crate::utils::path::route::{join_clean, split_path_suffix};

/// Route prefix for rendered documents.
pub const DOCUMENT_ROUTE: &str = "/file/";
/// Route prefix for raw repository files.
pub const ASSET_ROUTE: &str = "/repo/";

/// Characters escaped when a resolved path is written back into a URL.
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// What the filesystem says about a repository-relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Missing,
    Dir,
    File,
}

/// Existence oracle consulted when the path shape is inconclusive.
pub trait PathProbe {
    fn probe(&self, rel: &str) -> Entry;
}

/// [`PathProbe`] backed by the real filesystem under `root`.
pub struct FsProbe<'a> {
    root: &'a Path,
}

impl<'a> FsProbe<'a> {
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }
}

impl PathProbe for FsProbe<'_> {
    fn probe(&self, rel: &str) -> Entry {
        let abs: PathBuf = rel
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.to_path_buf(), |acc, s| acc.join(s));
        match std::fs::metadata(abs) {
            Ok(meta) if meta.is_dir() => Entry::Dir,
            Ok(_) => Entry::File,
            Err(_) => Entry::Missing,
        }
    }
}

/// Route class of a resolved destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Document(String),
    Asset(String),
}

impl Target {
    /// Internal URL for this target with `suffix` (`?query#fragment`) appended.
    pub fn to_url(&self, suffix: &str) -> String {
        let (prefix, rel) = match self {
            Self::Document(rel) => (DOCUMENT_ROUTE, rel),
            Self::Asset(rel) => (ASSET_ROUTE, rel),
        };
        format!("{prefix}{}{suffix}", encode_rel(rel))
    }
}

/// Percent-encode a repository-relative path for use as a URL path.
pub fn encode_rel(rel: &str) -> String {
    utf8_percent_encode(rel, PATH_ESCAPE).to_string()
}

/// Resolve and classify a relative destination path (without suffix).
///
/// `current_dir` is the rendered file's directory relative to the root.
pub fn classify(path: &str, current_dir: &str, probe: &dyn PathProbe) -> Target {
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_or_else(|_| path.to_string(), |s| s.into_owned());
    let resolved = join_clean(current_dir, &decoded);

    let is_document = resolved.is_empty()
        || decoded.ends_with('/')
        || decoded.ends_with('\\')
        || is_markdown_file_name(&resolved)
        || match probe.probe(&resolved) {
            Entry::Dir => true,
            Entry::File => is_markdown_file_name(&resolved),
            Entry::Missing => false,
        };

    if is_document {
        Target::Document(resolved)
    } else {
        Target::Asset(resolved)
    }
}

/// Rewrite a whole destination. `None` means "leave as written".
pub fn rewrite_destination(dest: &str, current_dir: &str, probe: &dyn PathProbe) -> Option<String> {
    let (path, suffix) = match LinkKind::parse(dest) {
        LinkKind::RepoRoot(link) | LinkKind::FileRelative(link) => split_path_suffix(link),
        _ => return None,
    };
    // `?x` alone points at the current document
    if path.is_empty() {
        return None;
    }
    Some(classify(path, current_dir, probe).to_url(suffix))
}

/// A recorded change to one link or image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// Index of the `Start(Link | Image)` event.
    pub start: usize,
    /// Index of the matching `End(Link)` for links opened in a new tab.
    pub end: Option<usize>,
    pub href: String,
    pub new_tab: bool,
}

/// First pass: decide every rewrite without touching the events.
pub fn collect(events: &[Event<'_>], current_dir: &str, probe: &dyn PathProbe) -> Vec<Rewrite> {
    let mut rewrites: Vec<Rewrite> = Vec::new();
    let mut open_link: Option<usize> = None;
    // Alt text is written as plain text, so links inside it only get a new href.
    let mut image_depth = 0usize;

    for (index, event) in events.iter().enumerate() {
        match event {
            Event::End(TagEnd::Image) => image_depth = image_depth.saturating_sub(1),
            Event::Start(Tag::Image { dest_url, .. }) => {
                image_depth += 1;
                if let Some(href) = rewrite_destination(dest_url, current_dir, probe) {
                    rewrites.push(Rewrite {
                        start: index,
                        end: None,
                        href,
                        new_tab: false,
                    });
                }
            }
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                ..
            }) => {
                let rewrite = plan_link(*link_type, dest_url, current_dir, probe);
                if let Some((href, new_tab)) = rewrite {
                    let new_tab = new_tab && image_depth == 0;
                    open_link = new_tab.then_some(rewrites.len());
                    rewrites.push(Rewrite {
                        start: index,
                        end: None,
                        href,
                        new_tab,
                    });
                }
            }
            Event::End(TagEnd::Link) => {
                if let Some(pos) = open_link.take() {
                    rewrites[pos].end = Some(index);
                }
            }
            _ => {}
        }
    }
    rewrites
}

/// Decide href and new-tab behavior for one link.
fn plan_link(
    link_type: LinkType,
    dest: &str,
    current_dir: &str,
    probe: &dyn PathProbe,
) -> Option<(String, bool)> {
    if link_type == LinkType::Email {
        return Some((format!("mailto:{dest}"), true));
    }
    match LinkKind::parse(dest) {
        LinkKind::External(url) => Some((url.to_string(), true)),
        LinkKind::Empty | LinkKind::Fragment(_) => None,
        _ => {
            let href = rewrite_destination(dest, current_dir, probe)?;
            let new_tab = href.starts_with(ASSET_ROUTE);
            Some((href, new_tab))
        }
    }
}

/// Second pass: apply recorded rewrites.
///
/// Links that open in a new tab are replaced by inline HTML so the
/// `target`/`rel` attributes can be emitted; their closing event becomes
/// `</a>`.
pub fn apply(events: &mut [Event<'_>], rewrites: Vec<Rewrite>) {
    for rewrite in rewrites {
        let title = match events.get_mut(rewrite.start) {
            Some(Event::Start(Tag::Image { dest_url, .. })) => {
                *dest_url = CowStr::from(rewrite.href);
                continue;
            }
            Some(Event::Start(Tag::Link {
                dest_url, title, ..
            })) => {
                if !rewrite.new_tab || rewrite.end.is_none() {
                    *dest_url = CowStr::from(rewrite.href);
                    continue;
                }
                title.to_string()
            }
            _ => continue,
        };

        events[rewrite.start] = Event::InlineHtml(anchor_open(&rewrite.href, &title).into());
        if let Some(end) = rewrite.end {
            events[end] = Event::InlineHtml("</a>".into());
        }
    }
}

fn anchor_open(href: &str, title: &str) -> String {
    let mut open = format!("<a href=\"{}\"", escape_attr(href));
    if !title.is_empty() {
        open.push_str(&format!(" title=\"{}\"", escape_attr(title)));
    }
    open.push_str(" target=\"_blank\" rel=\"noopener\">");
    open
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulldown_cmark::{Options, Parser, html};
    use rustc_hash::FxHashMap;

    /// In-memory probe: paths ending in `/` are directories.
    struct MapProbe(FxHashMap<&'static str, Entry>);

    impl MapProbe {
        fn new(entries: &[(&'static str, Entry)]) -> Self {
            Self(entries.iter().copied().collect())
        }
    }

    impl PathProbe for MapProbe {
        fn probe(&self, rel: &str) -> Entry {
            self.0.get(rel).copied().unwrap_or(Entry::Missing)
        }
    }

    fn probe() -> MapProbe {
        MapProbe::new(&[
            ("docs", Entry::Dir),
            ("docs/v1.2", Entry::Dir),
            ("img/logo.svg", Entry::File),
            ("LICENSE", Entry::File),
        ])
    }

    fn render(src: &str, current_dir: &str) -> String {
        let mut events: Vec<Event> = Parser::new_ext(src, Options::empty()).collect();
        let rewrites = collect(&events, current_dir, &probe());
        apply(&mut events, rewrites);
        let mut out = String::new();
        html::push_html(&mut out, events.into_iter());
        out
    }

    #[test]
    fn test_document_link_keeps_fragment() {
        let out = rewrite_destination("docs/note.md#h", "", &probe());
        assert_eq!(out.as_deref(), Some("/file/docs/note.md#h"));
    }

    #[test]
    fn test_directory_link_is_document() {
        assert_eq!(
            rewrite_destination("docs", "", &probe()).as_deref(),
            Some("/file/docs")
        );
        // Extension-looking directory name
        assert_eq!(
            rewrite_destination("docs/v1.2", "", &probe()).as_deref(),
            Some("/file/docs/v1.2")
        );
        assert_eq!(
            rewrite_destination("missing/", "", &probe()).as_deref(),
            Some("/file/missing")
        );
    }

    #[test]
    fn test_root_link_is_document() {
        assert_eq!(rewrite_destination("../", "docs", &probe()).as_deref(), Some("/file/"));
        assert_eq!(rewrite_destination("..", "docs", &probe()).as_deref(), Some("/file/"));
    }

    #[test]
    fn test_asset_link() {
        assert_eq!(
            rewrite_destination("img/logo.svg", "", &probe()).as_deref(),
            Some("/repo/img/logo.svg")
        );
        assert_eq!(
            rewrite_destination("../LICENSE?plain=1", "docs", &probe()).as_deref(),
            Some("/repo/LICENSE?plain=1")
        );
        // Missing and extension-less stays an asset
        assert_eq!(
            rewrite_destination("Makefile", "", &probe()).as_deref(),
            Some("/repo/Makefile")
        );
    }

    #[test]
    fn test_relative_to_current_dir_and_clamped() {
        assert_eq!(
            rewrite_destination("./a.md", "docs/guide", &probe()).as_deref(),
            Some("/file/docs/guide/a.md")
        );
        assert_eq!(
            rewrite_destination("../../../../a.md", "docs", &probe()).as_deref(),
            Some("/file/a.md")
        );
        assert_eq!(
            rewrite_destination("/README.md", "docs", &probe()).as_deref(),
            Some("/file/README.md")
        );
    }

    #[test]
    fn test_percent_encoding_round_trip() {
        assert_eq!(
            rewrite_destination("my%20notes.md", "", &probe()).as_deref(),
            Some("/file/my%20notes.md")
        );
    }

    #[test]
    fn test_passthrough() {
        for dest in ["", "#top", "https://example.com/x", "mailto:a@b.c", "//cdn/x.js", "?q=1"] {
            assert_eq!(rewrite_destination(dest, "docs", &probe()), None, "{dest}");
        }
    }

    #[test]
    fn test_rendered_links() {
        let out = render("[Note](docs/note.md#h) [Folder](docs) ![Logo](img/logo.svg)", "");
        assert!(out.contains(r#"<a href="/file/docs/note.md#h">Note</a>"#), "{out}");
        assert!(out.contains(r#"<a href="/file/docs">Folder</a>"#), "{out}");
        assert!(out.contains(r#"<img src="/repo/img/logo.svg" alt="Logo" />"#), "{out}");
    }

    #[test]
    fn test_asset_and_external_open_new_tab() {
        let out = render(
            "[lic](LICENSE \"License\") [ext](https://example.com/x) [top](#top)",
            "",
        );
        assert!(
            out.contains(
                r#"<a href="/repo/LICENSE" title="License" target="_blank" rel="noopener">lic</a>"#
            ),
            "{out}"
        );
        assert!(
            out.contains(r#"<a href="https://example.com/x" target="_blank" rel="noopener">ext</a>"#),
            "{out}"
        );
        assert!(out.contains(r##"<a href="#top">top</a>"##), "{out}");
    }

    #[test]
    fn test_link_in_image_alt_stays_plain_text() {
        let out = render("![see [lic](LICENSE) now](x.png)", "");
        assert!(out.contains(r#"<img src="/repo/x.png" alt="see lic now" />"#), "{out}");

        let src = "![a [ext](https://e.com) b](x.png) [c](LICENSE)";
        let events: Vec<Event> = Parser::new(src).collect();
        let rewrites = collect(&events, "", &probe());
        let new_tabs: Vec<bool> = rewrites.iter().map(|r| r.new_tab).collect();
        assert_eq!(new_tabs, [false, false, true]);
    }

    #[test]
    fn test_collect_does_not_mutate() {
        let src = "[a](a.md) ![b](b.png)";
        let events: Vec<Event> = Parser::new(src).collect();
        let before = events.clone();
        let rewrites = collect(&events, "", &probe());
        assert_eq!(events, before);
        assert_eq!(rewrites.len(), 2);
        assert!(rewrites.iter().all(|r| !r.new_tab));
    }
}
