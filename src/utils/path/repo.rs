//! Repository path resolution.
//!
//! Every path coming from a client goes through [`resolve_within_root`]
//! before touching the filesystem. The result is re-derived from the joined
//! absolute path and, when the target exists, re-checked after symlinks are
//! resolved.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::core::{RepoError, RepoResult};

/// Name of the per-directory default document (matched case-insensitively).
pub const DEFAULT_DOCUMENT: &str = "README.md";

/// A path known to lie inside the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Absolute filesystem path.
    pub abs: PathBuf,
    /// Forward-slash path relative to the root (`""` for the root itself).
    pub rel: String,
}

/// Check for a recognized Markdown extension (`.md`, `.markdown`).
pub fn is_markdown_file_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".md") || lower.ends_with(".markdown")
}

/// Names that still look like Markdown after being renamed or deleted.
///
/// Covers editor artifacts such as `a.md~`, `a.md.swp` or `a.md.tmp`.
pub fn has_markdown_like_suffix(name: &str) -> bool {
    let lower = name.trim_end_matches('~').to_ascii_lowercase();
    is_markdown_file_name(&lower) || lower.contains(".md.") || lower.contains(".markdown.")
}

/// Resolve a client-supplied relative path against `root`.
///
/// `root` must already be canonical. Leading separators are stripped and
/// `.`/`..` segments collapsed; a `..` that would climb above the root, or a
/// symlink that resolves outside it, fails with [`RepoError::PathEscape`].
pub fn resolve_within_root(root: &Path, requested: &str) -> RepoResult<Resolved> {
    let escape = || RepoError::PathEscape(requested.to_string());

    let normalized = requested.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop().ok_or_else(escape)?;
            }
            s => parts.push(s),
        }
    }

    let abs = parts.iter().fold(root.to_path_buf(), |acc, s| acc.join(s));
    let rel = derive_rel(root, &abs).ok_or_else(escape)?;

    // Existing targets are re-checked after symlink resolution
    if fs::symlink_metadata(&abs).is_ok() {
        let canonical = abs.canonicalize().map_err(|e| RepoError::io(&abs, e))?;
        if !canonical.starts_with(root) {
            return Err(escape());
        }
    }

    Ok(Resolved { abs, rel })
}

/// Re-derive the slash-separated relative path of `abs` under `root`.
///
/// Returns `None` when `abs` is not below `root` or contains components
/// other than plain names.
pub fn derive_rel(root: &Path, abs: &Path) -> Option<String> {
    let stripped = abs.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in stripped.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_str()?),
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Find the default document directly inside `dir`.
///
/// The first entry (in directory-listing order) whose name equals
/// `README.md` ignoring ASCII case, and which is not a directory, wins.
pub fn resolve_default_document(dir: &Path) -> RepoResult<String> {
    let entries = fs::read_dir(dir).map_err(|e| RepoError::io(dir, e))?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.eq_ignore_ascii_case(DEFAULT_DOCUMENT) {
            continue;
        }
        if entry.file_type().is_ok_and(|t| !t.is_dir()) {
            return Ok(name.to_string());
        }
    }
    Err(RepoError::NotFound(dir.to_string_lossy().into_owned()))
}

/// Resolve `rel` to a Markdown document.
///
/// A directory resolves to its default document; a file must carry a
/// Markdown extension.
pub fn resolve_markdown_target(root: &Path, rel: &str) -> RepoResult<Resolved> {
    let resolved = resolve_within_root(root, rel)?;
    let meta = fs::metadata(&resolved.abs).map_err(|_| RepoError::NotFound(rel.to_string()))?;

    if meta.is_dir() {
        let name = resolve_default_document(&resolved.abs)
            .map_err(|_| RepoError::NotFound(rel.to_string()))?;
        let joined = if resolved.rel.is_empty() {
            name
        } else {
            format!("{}/{}", resolved.rel, name)
        };
        return resolve_within_root(root, &joined);
    }

    if !is_markdown_file_name(&resolved.rel) {
        return Err(RepoError::NotMarkdown(resolved.rel));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_root() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("docs/sub")).unwrap();
        fs::write(root.join("README.md"), "# Root").unwrap();
        fs::write(root.join("docs/readme.MD"), "# Docs").unwrap();
        fs::write(root.join("docs/a.md"), "# A").unwrap();
        fs::write(root.join("docs/logo.svg"), "<svg/>").unwrap();
        (temp, root)
    }

    #[test]
    fn test_markdown_names() {
        assert!(is_markdown_file_name("a.md"));
        assert!(is_markdown_file_name("A.MARKDOWN"));
        assert!(!is_markdown_file_name("a.mdx"));
        assert!(!is_markdown_file_name("md"));

        assert!(has_markdown_like_suffix("a.md~"));
        assert!(has_markdown_like_suffix("a.md.swp"));
        assert!(has_markdown_like_suffix("notes.markdown.tmp"));
        assert!(!has_markdown_like_suffix("a.txt"));
    }

    #[test]
    fn test_resolve_within_root_normalizes() {
        let (_temp, root) = make_root();
        let r = resolve_within_root(&root, "/docs/./sub/../a.md").unwrap();
        assert_eq!(r.rel, "docs/a.md");
        assert_eq!(r.abs, root.join("docs").join("a.md"));

        let r = resolve_within_root(&root, "").unwrap();
        assert_eq!(r.rel, "");
        assert_eq!(r.abs, root);
    }

    #[test]
    fn test_resolve_within_root_rejects_escape() {
        let (_temp, root) = make_root();
        for p in ["..", "../x", "docs/../../x", "a/b/../../../..", "..\\..\\etc"] {
            let err = resolve_within_root(&root, p).unwrap_err();
            assert!(matches!(err, RepoError::PathEscape(_)), "{p}");
        }
    }

    #[test]
    fn test_resolve_within_root_never_outside() {
        let (_temp, root) = make_root();
        let inputs = [
            "a/../../b", "./../..", "docs/sub/../../..", "x/y/z/../../../..", "/../", "////..",
            "docs/..", "a/./b/./../..",
        ];
        for p in inputs {
            if let Ok(r) = resolve_within_root(&root, p) {
                assert!(r.abs.starts_with(&root), "{p}");
                assert!(!r.rel.starts_with(".."), "{p}");
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_within_root_rejects_symlink_escape() {
        let (_temp, root) = make_root();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.md"), "x").unwrap();
        std::os::unix::fs::symlink(outside.path(), root.join("link")).unwrap();

        let err = resolve_within_root(&root, "link/secret.md").unwrap_err();
        assert!(matches!(err, RepoError::PathEscape(_)));
    }

    #[test]
    fn test_default_document_case_insensitive() {
        let (_temp, root) = make_root();
        assert_eq!(resolve_default_document(&root.join("docs")).unwrap(), "readme.MD");
        let err = resolve_default_document(&root.join("docs/sub")).unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }

    #[test]
    fn test_default_document_skips_directory() {
        let (_temp, root) = make_root();
        fs::create_dir_all(root.join("docs/sub/README.md")).unwrap();
        assert!(resolve_default_document(&root.join("docs/sub")).is_err());
    }

    #[test]
    fn test_resolve_markdown_target() {
        let (_temp, root) = make_root();
        assert_eq!(resolve_markdown_target(&root, "").unwrap().rel, "README.md");
        assert_eq!(resolve_markdown_target(&root, "docs").unwrap().rel, "docs/readme.MD");
        assert_eq!(resolve_markdown_target(&root, "docs/a.md").unwrap().rel, "docs/a.md");

        let err = resolve_markdown_target(&root, "docs/logo.svg").unwrap_err();
        assert!(matches!(err, RepoError::NotMarkdown(_)));
        let err = resolve_markdown_target(&root, "docs/missing.md").unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
        let err = resolve_markdown_target(&root, "docs/sub").unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }
}
