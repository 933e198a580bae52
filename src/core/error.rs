//! Error taxonomy for repository access and rendering.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while resolving, reading, or rendering repository files.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Requested path normalizes to a location outside the repository root.
    #[error("path escapes repository root: `{0}`")]
    PathEscape(String),

    #[error("not found: `{0}`")]
    NotFound(String),

    #[error("not a markdown file: `{0}`")]
    NotMarkdown(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error on `{0}`")]
    Io(PathBuf, #[source] io::Error),
}

impl RepoError {
    /// Wrap an I/O error, folding `NotFound` into [`RepoError::NotFound`].
    pub fn io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        let path = path.into();
        if err.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_string_lossy().replace('\\', "/"))
        } else {
            Self::Io(path, err)
        }
    }

    /// Errors that must reach clients as one indistinguishable "not found".
    pub fn is_not_found_like(&self) -> bool {
        matches!(
            self,
            Self::PathEscape(_) | Self::NotFound(_) | Self::NotMarkdown(_)
        )
    }
}

pub type RepoResult<T> = Result<T, RepoError>;
