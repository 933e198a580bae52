//! Link classification utilities.

use crate::utils::path::route::is_external_link;

/// Syntactic classification of link destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind<'a> {
    /// Empty (or whitespace-only) destination.
    Empty,
    /// Destination with a URL scheme (https://, mailto:, tel:) or a
    /// network-path reference (`//host/x`).
    External(&'a str),
    /// Pure fragment/anchor link (#section). Value is anchor without `#`.
    Fragment(&'a str),
    /// Repository-root-relative path (/docs/a.md).
    RepoRoot(&'a str),
    /// File-relative path (./image.png, ../other, docs/a.md).
    FileRelative(&'a str),
}

impl<'a> LinkKind<'a> {
    /// Parse a (trimmed) link destination into its syntactic kind.
    #[inline]
    pub fn parse(link: &'a str) -> Self {
        let link = link.trim();
        if link.is_empty() {
            Self::Empty
        } else if let Some(anchor) = link.strip_prefix('#') {
            Self::Fragment(anchor)
        } else if is_external_link(link) || link.starts_with("//") {
            Self::External(link)
        } else if link.starts_with('/') {
            Self::RepoRoot(link)
        } else {
            Self::FileRelative(link)
        }
    }
}
