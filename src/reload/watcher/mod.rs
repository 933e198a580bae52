//! Repository watcher.
//!
//! Watches every non-excluded directory non-recursively and turns raw
//! notify events into [`ChangeEvent`]s.
//!
//! ```text
//! notify ──► channel ──► event loop ──► classify ──► sink (hub)
//!                            ▲   │
//!              shutdown ─────┘   └──► watch set (new / removed dirs)
//! ```
//!
//! The event loop is started before the initial directory walk, so events
//! delivered while watches are being registered are buffered, not lost.

mod classify;
mod types;


use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use jwalk::WalkDir;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use super::message::{ChangeEvent, EventSink};
use crate::exclude::{ExcludeMatcher, is_heavy_dir};
use crate::utils::path::derive_rel;
use types::{ChangeKind, Reaction};

pub use types::WatchError;

type NotifyResult = notify::Result<notify::Event>;

/// OS watch handle plus the directories registered with it.
struct WatchSet {
    watcher: RecommendedWatcher,
    dirs: FxHashSet<PathBuf>,
}

impl WatchSet {
    /// Watch `start` and every kept directory below it.
    fn add_tree(
        &mut self,
        root: &Path,
        start: &Path,
        exclude: &Arc<ExcludeMatcher>,
    ) -> notify::Result<usize> {
        let mut added = 0;
        for dir in walk_dirs(root, start, exclude) {
            if self.dirs.contains(&dir) {
                continue;
            }
            self.watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            crate::debug!("watch"; "watching {}", dir.display());
            self.dirs.insert(dir);
            added += 1;
        }
        Ok(added)
    }

    /// Drop `dir` and everything below it from the set.
    fn forget(&mut self, dir: &Path) {
        self.dirs.retain(|watched| {
            let gone = watched.starts_with(dir);
            if gone {
                // The OS usually dropped the watch already
                let _ = self.watcher.unwatch(watched);
            }
            !gone
        });
    }
}

/// Whether a directory is walked and watched.
fn keep_dir(root: &Path, dir: &Path, exclude: &ExcludeMatcher) -> bool {
    let Some(rel) = derive_rel(root, dir) else {
        return false;
    };
    if rel.split('/').any(is_heavy_dir) {
        return false;
    }
    !exclude.is_excluded(&rel, true)
}

/// Kept directories at and below `start`, without descending into skipped
/// ones.
fn walk_dirs(root: &Path, start: &Path, exclude: &Arc<ExcludeMatcher>) -> Vec<PathBuf> {
    let filter_root = root.to_path_buf();
    let filter_exclude = Arc::clone(exclude);
    WalkDir::new(start)
        .skip_hidden(false)
        .follow_links(false)
        .process_read_dir(move |_, _, _, children| {
            children.retain(|entry| {
                entry.as_ref().is_ok_and(|e| {
                    e.file_type().is_dir() && keep_dir(&filter_root, &e.path(), &filter_exclude)
                })
            });
        })
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.path())
        .collect()
}

/// State owned by the event-loop thread.
struct EventLoop<S> {
    root: PathBuf,
    exclude: Arc<ExcludeMatcher>,
    watches: Arc<Mutex<Option<WatchSet>>>,
    sink: S,
}

impl<S: EventSink> EventLoop<S> {
    fn run(self, events: Receiver<NotifyResult>, shutdown: Receiver<()>) {
        loop {
            channel::select! {
                recv(shutdown) -> _ => break,
                recv(events) -> msg => {
                    // Sender lives in the notify handle; gone means shut down
                    let Ok(first) = msg else { break };
                    let mut batch = vec![first];
                    batch.extend(events.try_iter());
                    self.process(batch);
                }
            }
        }
        crate::debug!("watch"; "event loop stopped");
    }

    fn process(&self, batch: Vec<NotifyResult>) {
        let mut changes = Vec::new();
        for result in batch {
            match result {
                Ok(event) => changes.extend(classify::changes(&event)),
                // Best effort: a missed event only leaves a page stale
                Err(e) => crate::debug!("watch"; "notify error: {}", e),
            }
        }

        let mut out = Vec::new();
        for (path, kind) in classify::dedup_first(changes) {
            out.extend(self.handle(&path, kind));
        }

        for event in classify::dedup_first(out) {
            crate::debug!("watch"; "{}", event.to_json());
            self.sink.send_event(event);
        }
    }

    fn handle(&self, path: &Path, kind: ChangeKind) -> Vec<ChangeEvent> {
        let Some(rel) = derive_rel(&self.root, path) else {
            return Vec::new();
        };
        // A rename that left something behind at this path is a creation
        let kind = match kind {
            ChangeKind::Renamed if path.exists() => ChangeKind::Created,
            other => other,
        };
        let is_dir = match kind {
            ChangeKind::Removed | ChangeKind::Renamed => self.is_watched(path),
            _ => path.is_dir(),
        };

        let reaction = classify::react(&rel, kind, is_dir, &self.exclude);
        if reaction != Reaction::Ignore {
            crate::debug!("watch"; "{}: {}", kind.label(), rel);
        }
        match reaction {
            Reaction::WatchDir => self.watch_new_dir(path),
            Reaction::ForgetDir => {
                if let Some(set) = self.watches.lock().as_mut() {
                    set.forget(path);
                }
            }
            _ => {}
        }
        classify::events(reaction, &rel)
    }

    fn is_watched(&self, dir: &Path) -> bool {
        self.watches
            .lock()
            .as_ref()
            .is_some_and(|set| set.dirs.contains(dir))
    }

    fn watch_new_dir(&self, dir: &Path) {
        let mut guard = self.watches.lock();
        let Some(set) = guard.as_mut() else {
            return;
        };
        if let Err(e) = set.add_tree(&self.root, dir, &self.exclude) {
            crate::debug!("watch"; "cannot watch {}: {}", dir.display(), e);
        }
    }
}

/// Live watcher over one repository. Shuts down on drop.
pub struct RepoWatcher {
    watches: Arc<Mutex<Option<WatchSet>>>,
    shutdown_tx: Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RepoWatcher {
    /// Start watching `root` (canonical), pushing events into `sink`.
    ///
    /// Fails if any directory of the initial walk cannot be watched.
    pub fn start<S: EventSink>(
        root: PathBuf,
        exclude: Arc<ExcludeMatcher>,
        sink: S,
    ) -> Result<Self, WatchError> {
        if !root.is_dir() {
            return Err(WatchError::Walk(root));
        }

        let (event_tx, event_rx) = channel::unbounded::<NotifyResult>();
        let watcher = notify::recommended_watcher(move |res| {
            let _ = event_tx.send(res);
        })?;
        let watches = Arc::new(Mutex::new(Some(WatchSet {
            watcher,
            dirs: FxHashSet::default(),
        })));

        // Consumer first, then registration
        let (shutdown_tx, shutdown_rx) = channel::bounded(1);
        let event_loop = EventLoop {
            root: root.clone(),
            exclude: Arc::clone(&exclude),
            watches: Arc::clone(&watches),
            sink,
        };
        let handle = thread::spawn(move || event_loop.run(event_rx, shutdown_rx));

        let this = Self {
            watches,
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
        };

        let added = match this.watches.lock().as_mut() {
            Some(set) => set.add_tree(&root, &root, &exclude),
            None => Ok(0),
        };
        match added {
            Ok(count) => {
                crate::log!("watch"; "watching {} directories", count);
                Ok(this)
            }
            Err(e) => {
                this.shutdown();
                Err(WatchError::Notify(e))
            }
        }
    }

    /// Whether `dir` (absolute) is currently in the watch set.
    #[cfg(test)]
    pub fn is_watching(&self, dir: &Path) -> bool {
        self.watches
            .lock()
            .as_ref()
            .is_some_and(|set| set.dirs.contains(dir))
    }

    #[cfg(test)]
    pub fn watched_count(&self) -> usize {
        self.watches.lock().as_ref().map_or(0, |set| set.dirs.len())
    }

    /// Stop the event loop and release the OS watch handle. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.try_send(());
        // Dropping the handle closes the event channel as well
        self.watches.lock().take();
        if let Some(handle) = self.handle.lock().take()
            && handle.thread().id() != thread::current().id()
        {
            let _ = handle.join();
        }
    }
}

impl Drop for RepoWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
