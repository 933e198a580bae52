//! Pure event classification: notify events → changes → reactions.
//!
//! No filesystem access here. Whether a path is a directory is decided by
//! the caller and passed in.

use std::path::PathBuf;

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

use super::types::{ChangeKind, Reaction};
use crate::exclude::{ExcludeMatcher, is_heavy_dir};
use crate::reload::message::ChangeEvent;
use crate::utils::path::{has_markdown_like_suffix, is_markdown_file_name};

/// Map one notify event to per-path changes.
///
/// Metadata and access events are dropped. A rename reported with both
/// paths is split into the old path (renamed away) and the new (created).
pub(super) fn changes(event: &notify::Event) -> Vec<(PathBuf, ChangeKind)> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Remove(_) => ChangeKind::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::with_capacity(2);
            if let Some(from) = event.paths.first() {
                out.push((from.clone(), ChangeKind::Renamed));
            }
            if let Some(to) = event.paths.get(1) {
                out.push((to.clone(), ChangeKind::Created));
            }
            return out;
        }
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Renamed,
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };
    event.paths.iter().map(|path| (path.clone(), kind)).collect()
}

/// Decide what to do about `rel` (repository-relative).
pub(super) fn react(rel: &str, kind: ChangeKind, is_dir: bool, exclude: &ExcludeMatcher) -> Reaction {
    if rel.is_empty() || rel.split('/').any(is_heavy_dir) {
        return Reaction::Ignore;
    }
    if exclude.is_excluded(rel, is_dir) {
        return Reaction::Ignore;
    }

    if is_dir {
        return match kind {
            ChangeKind::Created => Reaction::WatchDir,
            ChangeKind::Removed | ChangeKind::Renamed => Reaction::ForgetDir,
            ChangeKind::Modified => Reaction::Ignore,
        };
    }

    if is_markdown_file_name(rel) {
        return Reaction::Markdown {
            structural: kind.is_structural(),
        };
    }

    let gone = matches!(kind, ChangeKind::Removed | ChangeKind::Renamed);
    if gone && has_markdown_like_suffix(rel) {
        return Reaction::MarkdownLike;
    }
    Reaction::Ignore
}

/// Notifications for a reaction. Directory reactions also need the watch
/// set updated by the caller.
pub(super) fn events(reaction: Reaction, rel: &str) -> Vec<ChangeEvent> {
    match reaction {
        Reaction::Ignore => Vec::new(),
        Reaction::WatchDir | Reaction::ForgetDir | Reaction::MarkdownLike => {
            vec![ChangeEvent::TreeUpdated]
        }
        Reaction::Markdown { structural: false } => vec![ChangeEvent::file_changed(rel)],
        Reaction::Markdown { structural: true } => {
            vec![ChangeEvent::file_changed(rel), ChangeEvent::TreeUpdated]
        }
    }
}

/// Drop repeated entries, keeping the first occurrence of each.
pub(super) fn dedup_first<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
