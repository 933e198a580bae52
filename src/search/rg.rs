//! `rg --json` backend.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError};
use parking_lot::Mutex;
use serde::Deserialize;

use super::{SearchError, SearchHit, SearchResponse};

/// Bytes of stderr kept for the error message.
const STDERR_LIMIT: usize = 4096;

const WAIT_POLL: Duration = Duration::from_millis(10);

const ARGS: &[&str] = &[
    "--json",
    "--no-heading",
    "--line-number",
    "--color=never",
    "--smart-case",
    "--fixed-strings",
    "--no-require-git",
    "--glob=*.md",
    "--glob=*.markdown",
];

/// One line of `rg --json` output. Only `match` lines are used.
#[derive(Deserialize)]
struct RgMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct RgMatch {
    path: RgText,
    lines: RgText,
    line_number: Option<u64>,
}

/// Non-UTF-8 data arrives as `{"bytes": ...}` and is skipped.
#[derive(Deserialize)]
struct RgText {
    #[serde(default)]
    text: Option<String>,
}

fn parse_match(line: &str) -> Option<SearchHit> {
    let message: RgMessage = serde_json::from_str(line).ok()?;
    if message.kind != "match" {
        return None;
    }
    let found: RgMatch = serde_json::from_value(message.data).ok()?;
    let path = found.path.text?;
    let path = path.strip_prefix("./").unwrap_or(&path).replace('\\', "/");
    Some(SearchHit {
        path,
        line: found.line_number.unwrap_or(0),
        preview: found.lines.text?.trim_end_matches(['\r', '\n']).to_string(),
    })
}

/// Kill `child` unless `done` fires within `timeout`.
fn spawn_watchdog(
    child: Arc<Mutex<Child>>,
    timeout: Duration,
    timed_out: Arc<AtomicBool>,
) -> channel::Sender<()> {
    let (done_tx, done_rx) = channel::bounded::<()>(1);
    thread::spawn(move || {
        if let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(timeout) {
            timed_out.store(true, Ordering::SeqCst);
            let _ = child.lock().kill();
        }
    });
    done_tx
}

pub(super) fn search(
    root: &Path,
    query: &str,
    limit: usize,
    timeout: Duration,
) -> Result<SearchResponse, SearchError> {
    let program = which::which("rg").map_err(|_| SearchError::RipgrepNotFound)?;

    let mut child = Command::new(program)
        .args(ARGS)
        .arg("--")
        .arg(query)
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let child = Arc::new(Mutex::new(child));
    let timed_out = Arc::new(AtomicBool::new(false));
    let done = spawn_watchdog(Arc::clone(&child), timeout, Arc::clone(&timed_out));

    let stderr_reader = thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut text);
        }
        if text.len() > STDERR_LIMIT {
            let mut end = STDERR_LIMIT;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        text
    });

    let mut response = SearchResponse::empty(query);
    let mut stopped_early = false;
    if let Some(stdout) = stdout {
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            let Some(hit) = parse_match(&line) else {
                continue;
            };
            response.results.push(hit);
            if response.results.len() >= limit {
                response.truncated = true;
                stopped_early = true;
                let _ = child.lock().kill();
                break;
            }
        }
    }

    // Poll so the watchdog can still take the lock to kill
    let status = loop {
        if let Some(status) = child.lock().try_wait()? {
            break status;
        }
        thread::sleep(WAIT_POLL);
    };
    let _ = done.send(());
    let stderr_text = stderr_reader.join().unwrap_or_default();

    if timed_out.load(Ordering::SeqCst) {
        response.truncated = true;
        return Ok(response);
    }
    if stopped_early || status.success() {
        return Ok(response);
    }
    // Exit code 1: no matches
    if status.code() == Some(1) {
        return Ok(SearchResponse::empty(query));
    }

    let message = stderr_text.trim();
    if message.is_empty() {
        Err(SearchError::Failed(status.to_string()))
    } else {
        Err(SearchError::Failed(message.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_match() {
        let line = r#"{"type":"match","data":{"path":{"text":"./docs/a.md"},"lines":{"text":"Hello Alpha\r\n"},"line_number":3,"absolute_offset":0,"submatches":[]}}"#;
        assert_eq!(
            parse_match(line),
            Some(SearchHit {
                path: "docs/a.md".into(),
                line: 3,
                preview: "Hello Alpha".into(),
            })
        );
    }

    #[test]
    fn test_parse_skips_other_messages() {
        assert_eq!(parse_match(r#"{"type":"begin","data":{"path":{"text":"a.md"}}}"#), None);
        assert_eq!(parse_match(r#"{"type":"summary","data":{}}"#), None);
        assert_eq!(parse_match("not json"), None);
        let bytes = r#"{"type":"match","data":{"path":{"bytes":"//8="},"lines":{"text":"x"},"line_number":1}}"#;
        assert_eq!(parse_match(bytes), None);
    }

    #[test]
    fn test_finds_matches_when_available() {
        if which::which("rg").is_err() {
            return;
        }
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.md"), "Hello Alpha\n").unwrap();
        fs::write(temp.path().join("b.txt"), "Hello Alpha\n").unwrap();

        let response = search(temp.path(), "Alpha", 50, Duration::from_secs(5)).unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].path, "a.md");
        assert_eq!(response.results[0].line, 1);

        let none = search(temp.path(), "Omega", 50, Duration::from_secs(5)).unwrap();
        assert!(none.results.is_empty());
        assert!(!none.truncated);
    }

    #[test]
    fn test_limit_truncates_when_available() {
        if which::which("rg").is_err() {
            return;
        }
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.md"), "x\nx\nx\nx\n").unwrap();
        let response = search(temp.path(), "x", 2, Duration::from_secs(5)).unwrap();
        assert_eq!(response.results.len(), 2);
        assert!(response.truncated);
    }
}
