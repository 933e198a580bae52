//! Live-reload message protocol.
//!
//! Server → client only; the client never sends anything meaningful.
//!
//! ```json
//! {"type":"file-changed","path":"docs/guide.md"}
//! {"type":"tree-updated"}
//! ```

use crossbeam::channel::Sender;
use serde::{Deserialize, Serialize};

/// Change notification pushed to every connected client.
///
/// Carries no delta: clients re-fetch the document or tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChangeEvent {
    /// A Markdown file's content changed.
    FileChanged { path: String },
    /// The set of documents may have changed (create/remove/rename).
    TreeUpdated,
}

impl ChangeEvent {
    pub fn file_changed(path: impl Into<String>) -> Self {
        Self::FileChanged { path: path.into() }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"tree-updated"}"#.to_string())
    }
}

/// Destination for watcher output.
pub trait EventSink: Send + 'static {
    fn send_event(&self, event: ChangeEvent);
}

impl EventSink for Sender<ChangeEvent> {
    fn send_event(&self, event: ChangeEvent) {
        let _ = self.send(event);
    }
}
