//! JSON endpoints under `/api/`.

use anyhow::Result;
use serde::Serialize;
use tiny_http::Request;

use super::AppState;
use super::path::{decode, query_param};
use super::response::{respond_internal_error, respond_json, respond_not_found};
use crate::core::RepoError;
use crate::log;
use crate::scan::build_tree;
use crate::utils::path::resolve_default_document;

/// `GET /api/tree`
pub fn tree(request: Request, state: &AppState) -> Result<()> {
    respond_json(request, &build_tree(&state.root, &state.exclude))
}

#[derive(Serialize)]
struct Home {
    path: String,
}

/// `GET /api/home`: the root default document, or `""`.
pub fn home(request: Request, state: &AppState) -> Result<()> {
    let path = resolve_default_document(&state.root)
        .ok()
        .filter(|name| !state.exclude.is_excluded(name, false))
        .unwrap_or_default();
    respond_json(request, &Home { path })
}

/// `GET /api/render?path=<rel>`
///
/// An empty path renders the root default document. The value is
/// percent-decoded once more when possible, so both escaped and raw paths
/// are accepted.
pub fn render(request: Request, state: &AppState, query: &str) -> Result<()> {
    let raw = query_param(query, "path").unwrap_or_default();
    let rel = decode(&raw);

    match state.renderer.render_file(&rel) {
        Ok(result) => respond_json(request, &*result),
        Err(e) => respond_repo_error(request, &e),
    }
}

/// `GET /api/search?q=<query>`
pub fn search(request: Request, state: &AppState, query: &str) -> Result<()> {
    let q = query_param(query, "q").unwrap_or_default();
    respond_json(request, &state.searcher.search(&q))
}

/// Not-found-like errors share one body; traversal attempts are logged.
fn respond_repo_error(request: Request, err: &RepoError) -> Result<()> {
    if let RepoError::PathEscape(_) = err {
        log!("error"; "{}", err);
    }
    if err.is_not_found_like() {
        return respond_not_found(request);
    }
    log!("render"; "{}", err);
    respond_internal_error(request)
}
