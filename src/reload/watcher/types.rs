use std::path::PathBuf;

use thiserror::Error;

/// What happened to a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum ChangeKind {
    Created,
    Modified,
    Removed,
    /// Renamed away; the path may no longer exist.
    Renamed,
}

impl ChangeKind {
    pub(super) fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
            Self::Renamed => "renamed",
        }
    }

    /// Changes that can alter the set of navigable documents.
    pub(super) fn is_structural(self) -> bool {
        !matches!(self, Self::Modified)
    }
}

/// What the watcher should do about one observed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Reaction {
    Ignore,
    /// A directory appeared: watch it and its subdirectories.
    WatchDir,
    /// A watched directory went away.
    ForgetDir,
    /// A Markdown file changed; `structural` adds a tree update.
    Markdown { structural: bool },
    /// A former Markdown file was removed or renamed away.
    MarkdownLike,
}

/// Watcher construction failures.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to watch repository: {0}")]
    Notify(#[from] notify::Error),

    #[error("cannot walk `{0}`: not a directory")]
    Walk(PathBuf),
}
