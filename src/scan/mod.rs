//! Navigation tree.
//!
//! Lists Markdown files and the directories that (transitively) contain
//! them. Heavyweight and ignored directories are never entered.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::exclude::{ExcludeMatcher, is_heavy_dir};
use crate::utils::path::is_markdown_file_name;
use crate::utils::path::repo::DEFAULT_DOCUMENT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Dir,
    File,
}

/// One entry of the navigation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub name: String,
    /// Repository-relative path (`""` for the root).
    pub path: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Node>>,
}

impl Node {
    fn file(name: String, path: String) -> Self {
        Self {
            name,
            path,
            kind: NodeKind::File,
            children: None,
        }
    }

    fn dir(name: String, path: String, children: Vec<Node>) -> Self {
        Self {
            name,
            path,
            kind: NodeKind::Dir,
            children: Some(children),
        }
    }
}

/// Build the tree rooted at `root`. The root node is always returned,
/// possibly with no children.
pub fn build_tree(root: &Path, exclude: &ExcludeMatcher) -> Node {
    let name = root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let children = scan_dir(root, "", exclude);
    Node::dir(name, String::new(), children)
}

fn scan_dir(dir: &Path, rel: &str, exclude: &ExcludeMatcher) -> Vec<Node> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut nodes = Vec::new();
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let child_rel = if rel.is_empty() {
            name.to_string()
        } else {
            format!("{rel}/{name}")
        };

        // Symlinked directories are not entered (cycles)
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            if is_heavy_dir(name) || exclude.is_excluded(&child_rel, true) {
                continue;
            }
            let children = scan_dir(&entry.path(), &child_rel, exclude);
            if !children.is_empty() {
                nodes.push(Node::dir(name.to_string(), child_rel, children));
            }
        } else if is_markdown_file_name(name)
            && !exclude.is_excluded(&child_rel, false)
            && fs::metadata(entry.path()).is_ok_and(|m| m.is_file())
        {
            nodes.push(Node::file(name.to_string(), child_rel));
        }
    }

    nodes.sort_by(compare_nodes);
    nodes
}

/// Directories first, then `README.md`, then case-insensitive by name.
fn compare_nodes(a: &Node, b: &Node) -> Ordering {
    let rank = |node: &Node| match node.kind {
        NodeKind::Dir => 0,
        NodeKind::File if node.name.eq_ignore_ascii_case(DEFAULT_DOCUMENT) => 1,
        NodeKind::File => 2,
    };
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}
