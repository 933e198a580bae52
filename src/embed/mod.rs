//! Embedded viewer shell.
//!
//! The assets are compiled into the binary. `index.html` carries
//! `__REPOBOOK_<NAME>__` markers that [`ShellPage::render`] fills once per
//! server start:
//!
//! | Marker    | Value                                       |
//! |-----------|---------------------------------------------|
//! | `TITLE`   | repository directory name, HTML-escaped     |
//! | `WS_PORT` | live reload port, empty when not watching   |

use crate::utils::html::escape;

/// Viewer page for `/` and `/file/*`, markers unfilled.
const INDEX_HTML: &str = include_str!("shell/index.html");

/// Client-side router, tree, search and live reload.
pub const APP_JS: &str = include_str!("shell/app.js");

/// Viewer layout and Markdown body styles.
pub const APP_CSS: &str = include_str!("shell/app.css");

const MARKER_OPEN: &str = "__REPOBOOK_";
const MARKER_CLOSE: &str = "__";

/// Per-server values injected into `index.html`.
pub struct ShellPage {
    pub title: String,
    /// `None` disables live reload in the client.
    pub ws_port: Option<u16>,
}

impl ShellPage {
    pub fn render(&self) -> String {
        self.fill(INDEX_HTML)
    }

    fn value(&self, name: &str) -> Option<String> {
        match name {
            "TITLE" => Some(escape(&self.title).into_owned()),
            "WS_PORT" => Some(self.ws_port.map(|p| p.to_string()).unwrap_or_default()),
            _ => None,
        }
    }

    /// Replace known markers in one pass; unknown ones are left as written.
    fn fill(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find(MARKER_OPEN) {
            let (head, tail) = rest.split_at(start);
            out.push_str(head);
            let body = &tail[MARKER_OPEN.len()..];
            let Some(end) = body.find(MARKER_CLOSE) else {
                rest = tail;
                break;
            };
            let marker_len = MARKER_OPEN.len() + end + MARKER_CLOSE.len();
            match self.value(&body[..end]) {
                Some(value) => out.push_str(&value),
                None => out.push_str(&tail[..marker_len]),
            }
            rest = &tail[marker_len..];
        }
        out.push_str(rest);
        out
    }
}
