//! Path and URL utilities.
//!
//! - [`fs`]: Filesystem path normalization (`normalize_path`)
//! - [`repo`]: Root-contained resolution of client paths and default documents
//! - [`route`]: Slash-path helpers (`join_clean`, `split_path_suffix`, `is_external_link`)

pub mod fs;
pub mod repo;
pub mod route;

pub use fs::normalize_path;
pub use repo::{
    derive_rel, has_markdown_like_suffix, is_markdown_file_name,
    resolve_default_document, resolve_markdown_target, resolve_within_root,
};
