//! File watcher for configuration sources.
//!
//! Watches the directories holding registered source files and emits
//! change events through a tokio watch channel. Events for files that are
//! not registered sources are dropped. Uses debouncing to coalesce rapid
//! writes.

use notify_debouncer_mini::{DebouncedEvent, DebouncedEventKind, new_debouncer};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Event types emitted when source files change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceChangeEvent {
    /// A single source file changed
    Changed(PathBuf),
    /// Several source files changed in quick succession
    Batch(Vec<PathBuf>),
    /// Watcher encountered an error
    Error(String),
}

impl SourceChangeEvent {
    pub fn requires_reload(&self) -> bool {
        !matches!(self, SourceChangeEvent::Error(_))
    }

    pub fn affected_paths(&self) -> Vec<&Path> {
        match self {
            SourceChangeEvent::Changed(p) => vec![p.as_path()],
            SourceChangeEvent::Batch(paths) => paths.iter().map(PathBuf::as_path).collect(),
            SourceChangeEvent::Error(_) => vec![],
        }
    }
}

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
        }
    }
}

/// The files being watched, normalized for comparison with event paths.
#[derive(Debug, Clone, Default)]
pub struct WatchedFiles {
    files: BTreeSet<PathBuf>,
}

impl WatchedFiles {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            files: paths.into_iter().map(|p| normalize(&p)).collect(),
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains(&normalize(path))
    }

    /// Parent directories to register with the OS watcher.
    pub fn directories(&self) -> BTreeSet<PathBuf> {
        self.files
            .iter()
            .filter_map(|f| f.parent().map(Path::to_path_buf))
            .map(|d| if d.as_os_str().is_empty() { PathBuf::from(".") } else { d })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Handle to control the source watcher.
pub struct SourceWatcherHandle {
    /// Receiver for change events.
    pub events: watch::Receiver<Option<SourceChangeEvent>>,
    /// Handle to the watcher task (dropping this will stop the watcher).
    _task_handle: tokio::task::JoinHandle<()>,
}

impl SourceWatcherHandle {
    /// Wait for the next change event. `None` once the watcher has stopped.
    pub async fn wait_for_change(&mut self) -> Option<SourceChangeEvent> {
        loop {
            if self.events.changed().await.is_err() {
                return None;
            }
            let event = self.events.borrow().clone();
            if event.is_some() {
                return event;
            }
        }
    }

    pub fn latest_event(&self) -> Option<SourceChangeEvent> {
        self.events.borrow().clone()
    }
}

/// Start watching `files`.
///
/// Directories are watched rather than the files themselves so that
/// editors that replace a file on save are still seen.
pub fn start_source_watcher(files: WatchedFiles, config: WatcherConfig) -> Result<SourceWatcherHandle, notify::Error> {
    let (event_tx, event_rx) = watch::channel(None);
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;
    let watcher = debouncer.watcher();

    for dir in files.directories() {
        if dir.exists() {
            info!("Watching source directory: {}", dir.display());
            watcher.watch(&dir, notify::RecursiveMode::NonRecursive)?;
        } else {
            warn!("Source directory does not exist, skipping watch: {}", dir.display());
        }
    }

    let task_handle = tokio::task::spawn_blocking(move || {
        // Keep the debouncer alive
        let _debouncer = debouncer;
        process_notify_events(notify_rx, event_tx, &files);
    });

    Ok(SourceWatcherHandle {
        events: event_rx,
        _task_handle: task_handle,
    })
}

fn process_notify_events(
    rx: mpsc::Receiver<Result<Vec<DebouncedEvent>, notify::Error>>,
    tx: watch::Sender<Option<SourceChangeEvent>>,
    files: &WatchedFiles,
) {
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                if let Some(event) = classify_events(events, files) {
                    debug!("Source change detected: {:?}", event);
                    if tx.send(Some(event)).is_err() {
                        info!("Source watcher receiver dropped, stopping");
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
                let _ = tx.send(Some(SourceChangeEvent::Error(e.to_string())));
            }
            Err(_) => {
                info!("Source watcher channel closed, stopping");
                return;
            }
        }
    }
}

/// Collapse a debounced batch into at most one event for watched files.
fn classify_events(events: Vec<DebouncedEvent>, files: &WatchedFiles) -> Option<SourceChangeEvent> {
    let mut changed: Vec<PathBuf> = Vec::new();
    for event in events {
        if !matches!(event.kind, DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous) {
            continue;
        }
        if files.contains(&event.path) && !changed.contains(&event.path) {
            changed.push(event.path);
        }
    }

    match changed.len() {
        0 => None,
        1 => changed.pop().map(SourceChangeEvent::Changed),
        _ => Some(SourceChangeEvent::Batch(changed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(path: &str) -> DebouncedEvent {
        DebouncedEvent {
            path: PathBuf::from(path),
            kind: DebouncedEventKind::Any,
        }
    }

    fn watched() -> WatchedFiles {
        WatchedFiles::new([PathBuf::from("conf/base.yaml"), PathBuf::from("conf/dev.yaml")])
    }

    #[test]
    fn test_single_change() {
        let result = classify_events(vec![event("conf/base.yaml"), event("conf/base.yaml")], &watched());
        assert_eq!(result, Some(SourceChangeEvent::Changed(PathBuf::from("conf/base.yaml"))));
    }

    #[test]
    fn test_batch_change() {
        let result = classify_events(vec![event("conf/base.yaml"), event("conf/dev.yaml")], &watched());
        assert!(matches!(result, Some(SourceChangeEvent::Batch(ref paths)) if paths.len() == 2));
    }

    #[test]
    fn test_unwatched_file_is_ignored() {
        assert_eq!(classify_events(vec![event("conf/notes.txt")], &watched()), None);
    }

    #[test]
    fn test_directories() {
        let files = WatchedFiles::new([PathBuf::from("a.yaml"), PathBuf::from("conf/b.yaml")]);
        let dirs = files.directories();
        assert!(dirs.contains(&PathBuf::from(".")));
        assert!(dirs.contains(&PathBuf::from("conf")));
    }

    #[test]
    fn test_event_requires_reload() {
        assert!(SourceChangeEvent::Changed(PathBuf::new()).requires_reload());
        assert!(SourceChangeEvent::Batch(vec![]).requires_reload());
        assert!(!SourceChangeEvent::Error("test".to_string()).requires_reload());
    }
}
