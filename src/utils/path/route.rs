//! Slash-separated path and URL helpers.
//!
//! Repository-relative paths are always forward-slash strings without a
//! leading slash; the empty string is the repository root.

/// Check if a link is external (has a URL scheme like http:, mailto:, etc.)
///
/// A valid scheme must:
/// - Have at least 1 character before the colon
/// - Only contain ASCII alphanumeric or `+`, `-`, `.`
/// - Come before any `/`, `?` or `#`
#[inline]
pub fn is_external_link(link: &str) -> bool {
    link.find(':').is_some_and(|pos| {
        pos > 0
            && link[..pos]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Split a URL into its path and the `?query#fragment` suffix.
///
/// The suffix keeps its leading `?` or `#` so it can be appended verbatim.
#[inline]
pub fn split_path_suffix(url: &str) -> (&str, &str) {
    match url.find(['?', '#']) {
        Some(pos) => url.split_at(pos),
        None => (url, ""),
    }
}

/// Parent directory of a repository-relative file path (`""` at root).
#[inline]
pub fn parent_dir(rel: &str) -> &str {
    rel.rfind('/').map_or("", |pos| &rel[..pos])
}

/// Last segment of a repository-relative path.
#[inline]
pub fn base_name(rel: &str) -> &str {
    let rel = rel.trim_end_matches('/');
    rel.rfind('/').map_or(rel, |pos| &rel[pos + 1..])
}

/// Join `rel` onto `base` and collapse `.`/`..` segments lexically.
///
/// Backslashes count as separators. `..` never climbs above the root, so
/// the result is always root-contained; a leading `/` in `rel` restarts
/// from the root.
pub fn join_clean(base: &str, rel: &str) -> String {
    let rel = rel.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    let start = if rel.starts_with('/') { "" } else { base };

    for segment in start.split('/').chain(rel.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}
