//! HTTP response helpers.
//!
//! Every response carries `Cache-Control: no-cache`; the viewer re-fetches
//! on live reload rather than relying on validators.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::utils::mime::types::{JSON, PLAIN};

/// Body shared by every rejected path, whatever the reason.
pub const NOT_FOUND: &str = "not found";

/// Respond with a serialized JSON value.
pub fn respond_json<T: Serialize + ?Sized>(request: Request, value: &T) -> Result<()> {
    let body = serde_json::to_vec(value).context("failed to serialize response")?;
    send_body(request, 200, JSON, body, &[])
}

/// Respond with an embedded text resource.
pub fn respond_static(request: Request, content_type: &'static str, body: &str) -> Result<()> {
    send_body(request, 200, content_type, body.as_bytes().to_vec(), &[])
}

/// Respond with a plain-text status message.
pub fn respond_text(request: Request, status: u16, message: &str) -> Result<()> {
    send_body(request, status, PLAIN, message.as_bytes().to_vec(), &[])
}

pub fn respond_not_found(request: Request) -> Result<()> {
    respond_text(request, 404, NOT_FOUND)
}

pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    respond_text(request, 405, "method not allowed")
}

pub fn respond_internal_error(request: Request) -> Result<()> {
    respond_text(request, 500, "internal server error")
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    respond_text(request, 503, "service unavailable")
}

/// Permanent redirect preserving the method (`308`).
pub fn respond_redirect(request: Request, location: &str) -> Result<()> {
    let location = Header::from_bytes("Location", location.as_bytes())
        .map_err(|_| anyhow!("invalid redirect location"))?;
    let response = Response::empty(StatusCode(308))
        .with_header(location)
        .with_header(make_header("Cache-Control", "no-cache"));
    request.respond(response)?;
    Ok(())
}

/// Respond with a raw repository file.
///
/// Content type comes from the extension and is never sniffed.
pub fn respond_file(request: Request, path: &Path) -> Result<()> {
    let content_type = crate::utils::mime::from_path(path);
    let nosniff = [make_header("X-Content-Type-Options", "nosniff")];

    if is_head_request(&request) {
        let response = Response::empty(StatusCode(200))
            .with_header(make_header("Content-Type", content_type))
            .with_header(make_header("Cache-Control", "no-cache"))
            .with_header(make_header("X-Content-Type-Options", "nosniff"));
        request.respond(response)?;
        return Ok(());
    }

    // Range requests let audio and video seek
    if let Some(range) = get_range_header(&request) {
        return respond_range(request, path, content_type, &range);
    }

    let body = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    send_body(request, 200, content_type, body, &nosniff)
}

/// Handle a Range request with a streamed `206 Partial Content`.
fn respond_range(
    request: Request,
    path: &Path,
    content_type: &'static str,
    range: &str,
) -> Result<()> {
    let file_size = fs::metadata(path)?.len();
    let range = range.strip_prefix("bytes=").unwrap_or(range);
    let Some((start, end)) = parse_range(range, file_size) else {
        let response = Response::empty(StatusCode(416)).with_header(
            Header::from_bytes("Content-Range", format!("bytes */{file_size}").as_bytes())
                .map_err(|_| anyhow!("invalid content range"))?,
        );
        request.respond(response)?;
        return Ok(());
    };

    let length = end - start + 1;
    let mut file = fs::File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let reader = file.take(length);

    let content_range = format!("bytes {start}-{end}/{file_size}");
    let content_range = Header::from_bytes("Content-Range", content_range.as_bytes())
        .map_err(|_| anyhow!("invalid content range"))?;
    let response = Response::new(
        StatusCode(206),
        vec![
            make_header("Content-Type", content_type),
            content_range,
            make_header("Accept-Ranges", "bytes"),
            make_header("Cache-Control", "no-cache"),
            make_header("X-Content-Type-Options", "nosniff"),
        ],
        reader,
        Some(length as usize),
        None,
    );
    request.respond(response)?;
    Ok(())
}

/// Parse `start-end`, `start-` or `-suffix` into an inclusive byte range.
///
/// `None` when the range cannot be satisfied.
fn parse_range(range: &str, file_size: u64) -> Option<(u64, u64)> {
    if file_size == 0 {
        return None;
    }
    let last = file_size - 1;
    let (start, end) = range.trim().split_once('-')?;
    let (start, end) = (start.trim(), end.trim());

    let (start, end) = match (start.is_empty(), end.is_empty()) {
        (false, false) => (start.parse().ok()?, end.parse::<u64>().ok()?.min(last)),
        (false, true) => (start.parse().ok()?, last),
        (true, false) => {
            let suffix: u64 = end.parse().ok()?;
            if suffix == 0 {
                return None;
            }
            (file_size.saturating_sub(suffix), last)
        }
        (true, true) => return None,
    };
    (start <= end).then_some((start, end))
}

/// Extract Range header from request.
fn get_range_header(request: &Request) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Range"))
        .map(|h| h.value.to_string())
}

pub fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
    extra: &[Header],
) -> Result<()> {
    let mut response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type))
        .with_header(make_header("Cache-Control", "no-cache"));
    for header in extra {
        response.add_header(header.clone());
    }
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).unwrap()
}
