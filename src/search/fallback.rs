//! Single-pass scanner used when `rg` is unavailable.
//!
//! Walks Markdown files in sorted order, skipping heavyweight and excluded
//! directories, and matches line by line. Stops at the deadline or the
//! result limit, either of which marks the response truncated.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jwalk::WalkDir;

use super::{SearchHit, SearchResponse, is_case_sensitive};
use crate::exclude::{ExcludeMatcher, is_heavy_dir};
use crate::utils::path::{derive_rel, is_markdown_file_name};

/// Fixed-string, smart-case line matcher.
struct LineMatcher {
    needle: String,
    case_sensitive: bool,
}

impl LineMatcher {
    fn new(query: &str) -> Self {
        let case_sensitive = is_case_sensitive(query);
        let needle = if case_sensitive {
            query.to_string()
        } else {
            query.to_lowercase()
        };
        Self {
            needle,
            case_sensitive,
        }
    }

    fn is_match(&self, line: &str) -> bool {
        if self.case_sensitive {
            line.contains(&self.needle)
        } else {
            line.to_lowercase().contains(&self.needle)
        }
    }
}

/// Outcome of scanning one file.
enum Scan {
    Continue,
    Stop,
}

pub(super) fn search(
    root: &Path,
    exclude: &Arc<ExcludeMatcher>,
    query: &str,
    limit: usize,
    timeout: Duration,
) -> SearchResponse {
    let deadline = Instant::now() + timeout;
    let matcher = LineMatcher::new(query);
    let mut response = SearchResponse::empty(query);

    let filter_root = root.to_path_buf();
    let filter_exclude = Arc::clone(exclude);
    let walk = WalkDir::new(root)
        .sort(true)
        .skip_hidden(false)
        .follow_links(false)
        .process_read_dir(move |_, _, _, children| {
            children.retain(|entry| {
                let Ok(entry) = entry else { return false };
                if !entry.file_type().is_dir() {
                    return true;
                }
                let name = entry.file_name().to_str().unwrap_or_default();
                let rel = derive_rel(&filter_root, &entry.path()).unwrap_or_default();
                rel.is_empty() || (!is_heavy_dir(name) && !filter_exclude.is_excluded(&rel, true))
            });
        });

    for entry in walk.into_iter().filter_map(Result::ok) {
        if Instant::now() >= deadline {
            response.truncated = true;
            break;
        }
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let Some(rel) = derive_rel(root, &path) else {
            continue;
        };
        if !is_markdown_file_name(&rel) || exclude.is_excluded(&rel, false) {
            continue;
        }
        if let Scan::Stop = scan_file(&path, &rel, &matcher, limit, deadline, &mut response) {
            break;
        }
    }
    response
}

fn scan_file(
    path: &Path,
    rel: &str,
    matcher: &LineMatcher,
    limit: usize,
    deadline: Instant,
    response: &mut SearchResponse,
) -> Scan {
    let Ok(file) = File::open(path) else {
        return Scan::Continue;
    };

    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut line_no = 0u64;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => return Scan::Continue,
            Ok(_) => {}
        }
        line_no += 1;
        if Instant::now() >= deadline {
            response.truncated = true;
            return Scan::Stop;
        }

        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\r', '\n']);
        if line.is_empty() || !matcher.is_match(line) {
            continue;
        }
        response.results.push(SearchHit {
            path: rel.to_string(),
            line: line_no,
            preview: line.to_string(),
        });
        if response.results.len() >= limit {
            response.truncated = true;
            return Scan::Stop;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn make_root(files: &[(&str, &str)]) -> (TempDir, std::path::PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        for (rel, content) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        (temp, root)
    }

    fn run(root: &Path, query: &str, limit: usize) -> SearchResponse {
        let exclude = Arc::new(ExcludeMatcher::load(root).unwrap());
        search(root, &exclude, query, limit, TIMEOUT)
    }

    #[test]
    fn test_finds_matches_in_markdown_only() {
        let (_temp, root) = make_root(&[
            ("a.md", "intro\n\nHello Alpha\n"),
            ("b.txt", "Hello Alpha\n"),
            ("docs/c.markdown", "alpha again\n"),
        ]);
        let response = run(&root, "alpha", 50);
        assert_eq!(
            response.results,
            vec![
                SearchHit { path: "a.md".into(), line: 3, preview: "Hello Alpha".into() },
                SearchHit { path: "docs/c.markdown".into(), line: 1, preview: "alpha again".into() },
            ]
        );
        assert!(!response.truncated);
    }

    #[test]
    fn test_smart_case() {
        let (_temp, root) = make_root(&[("a.md", "Alpha\nalpha\n")]);
        assert_eq!(run(&root, "alpha", 50).results.len(), 2);
        let upper = run(&root, "Alpha", 50);
        assert_eq!(upper.results.len(), 1);
        assert_eq!(upper.results[0].line, 1);
    }

    #[test]
    fn test_limit_truncates() {
        let (_temp, root) = make_root(&[("a.md", "x\nx\nx\n"), ("b.md", "x\n")]);
        let response = run(&root, "x", 2);
        assert_eq!(response.results.len(), 2);
        assert!(response.truncated);
    }

    #[test]
    fn test_skips_heavy_and_ignored() {
        let (_temp, root) = make_root(&[
            (".gitignore", "private/\n"),
            ("private/a.md", "needle\n"),
            ("node_modules/pkg/README.md", "needle\n"),
            ("ok.md", "needle\n"),
        ]);
        let response = run(&root, "needle", 50);
        let paths: Vec<_> = response.results.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(paths, vec!["ok.md"]);
    }

    #[test]
    fn test_expired_deadline() {
        let (_temp, root) = make_root(&[("a.md", "needle\n")]);
        let exclude = Arc::new(ExcludeMatcher::empty());
        let response = search(&root, &exclude, "needle", 50, Duration::ZERO);
        assert!(response.results.is_empty());
        assert!(response.truncated);
    }
}
