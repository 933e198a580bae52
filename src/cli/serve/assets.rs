//! Raw repository files on the separate asset origin.
//!
//! Files are served from the repository root at `/`. Paths outside the
//! root, excluded paths, directories and missing files all answer the same
//! `404 not found`.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use tiny_http::{Method, Request};

use super::AppState;
use super::path::{rel_below, split_query};
use super::response::{respond_file, respond_method_not_allowed, respond_not_found};
use crate::core::RepoError;
use crate::log;
use crate::utils::path::resolve_within_root;

pub fn handle(request: Request, state: &AppState) -> Result<()> {
    if !matches!(request.method(), Method::Get | Method::Head) {
        return respond_method_not_allowed(request);
    }

    let (path, _) = split_query(request.url());
    match locate(state, &rel_below(path, "/")) {
        Some(abs) => respond_file(request, &abs),
        None => respond_not_found(request),
    }
}

/// Absolute path of a servable file, or `None`.
fn locate(state: &AppState, rel: &str) -> Option<PathBuf> {
    let resolved = match resolve_within_root(&state.root, rel) {
        Ok(resolved) => resolved,
        Err(e) => {
            if let RepoError::PathEscape(_) = e {
                log!("error"; "{}", e);
            }
            return None;
        }
    };
    if state.exclude.is_excluded(&resolved.rel, false) {
        return None;
    }
    let meta = fs::metadata(&resolved.abs).ok()?;
    meta.is_file().then_some(resolved.abs)
}
