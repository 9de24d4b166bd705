use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::provider::{FsEvent, FsEventKind, FsTarget};

/// Default patterns to ignore when watching the filesystem.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "target",
];

/// Default debounce interval in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Distinct paths in one debounce window above which the window collapses
/// into a single refresh of the watched root.
pub const DEFAULT_FLOOD_THRESHOLD: usize = 100;

/// Filesystem watcher that monitors a root directory and sends classified
/// change events.
pub struct FsWatcher {
    /// Whether the watcher is currently forwarding events.
    active: Arc<AtomicBool>,
    /// Dropped to stop watching.
    _watcher: RecommendedWatcher,
}

impl FsWatcher {
    /// Watch `root` recursively. Paths matching any of `ignore_patterns`
    /// are dropped; the rest are coalesced per path over `debounce` before
    /// reaching `event_tx`. A zero `debounce` forwards every notification.
    ///
    /// Must be called inside a tokio runtime when `debounce` is non-zero.
    pub fn new(
        root: &Path,
        debounce: Duration,
        ignore_patterns: Vec<String>,
        event_tx: mpsc::UnboundedSender<FsEvent>,
    ) -> notify::Result<Self> {
        let active = Arc::new(AtomicBool::new(true));
        let active_clone = active.clone();

        let event_tx = if debounce.is_zero() {
            event_tx
        } else {
            let runtime = tokio::runtime::Handle::try_current()
                .map_err(|e| notify::Error::generic(&format!("no runtime for debouncing: {}", e)))?;
            let (raw_tx, raw_rx) = mpsc::unbounded_channel();
            runtime.spawn(debounce_events(
                raw_rx,
                event_tx,
                debounce,
                root.to_path_buf(),
            ));
            raw_tx
        };

        let mut watcher = notify::recommended_watcher(
            move |result: Result<notify::Event, notify::Error>| {
                if !active_clone.load(Ordering::Relaxed) {
                    return;
                }
                match result {
                    Ok(event) => {
                        let Some(fs_event) = classify(&event) else {
                            return;
                        };
                        if should_ignore(&fs_event.path, &ignore_patterns) {
                            return;
                        }
                        tracing::trace!(event = fs_event.channel_name(), path = %fs_event.path.display());
                        let _ = event_tx.send(fs_event);
                    }
                    Err(e) => tracing::warn!(error = %e, "watcher error"),
                }
            },
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        tracing::debug!(root = %root.display(), debounce_ms = debounce.as_millis() as u64, "watching");

        Ok(Self {
            active,
            _watcher: watcher,
        })
    }

    /// Pause event forwarding (watcher stays alive to avoid re-creating inotify watches).
    pub fn pause(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    /// Resume event forwarding.
    pub fn resume(&self) {
        self.active.store(true, Ordering::Relaxed);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}

/// Collect events for `window` after the first one arrives, then forward one
/// event per path. Ends when either side of the pipe closes.
async fn debounce_events(
    mut raw_rx: mpsc::UnboundedReceiver<FsEvent>,
    event_tx: mpsc::UnboundedSender<FsEvent>,
    window: Duration,
    root: PathBuf,
) {
    while let Some(first) = raw_rx.recv().await {
        let mut pending = Coalesced::default();
        pending.push(first);

        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);
        let mut closed = false;
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                next = raw_rx.recv() => match next {
                    Some(event) => pending.push(event),
                    None => {
                        closed = true;
                        break;
                    }
                },
            }
        }

        for event in pending.into_events(&root, DEFAULT_FLOOD_THRESHOLD) {
            if event_tx.send(event).is_err() {
                return;
            }
        }
        if closed {
            return;
        }
    }
}

/// Events of one debounce window, one per path in first-seen order.
#[derive(Debug, Default)]
struct Coalesced {
    events: Vec<FsEvent>,
    index: HashMap<PathBuf, usize>,
}

impl Coalesced {
    fn push(&mut self, event: FsEvent) {
        let Some(&slot) = self.index.get(&event.path) else {
            self.index.insert(event.path.clone(), self.events.len());
            self.events.push(event);
            return;
        };
        let previous = &mut self.events[slot];
        // Writes right after a create are part of the create.
        if previous.kind == FsEventKind::Created && event.kind == FsEventKind::Modified {
            return;
        }
        *previous = event;
    }

    /// The window's events, or one refresh of `root` past `flood_threshold`.
    fn into_events(self, root: &Path, flood_threshold: usize) -> Vec<FsEvent> {
        if self.events.len() > flood_threshold {
            tracing::debug!(paths = self.events.len(), "watcher flood, refreshing root");
            return vec![FsEvent::new(
                FsEventKind::Modified,
                FsTarget::Folder,
                root.to_path_buf(),
            )];
        }
        self.events
    }
}

/// Map a raw notification onto the create/delete/modify/rename × file/folder
/// event set. Anything else (access, metadata-only changes) yields `None`.
///
/// Deleted paths can't be inspected, so the folder/file split relies on what
/// the backend reports and defaults to `File`.
pub fn classify(event: &notify::Event) -> Option<FsEvent> {
    let path = event.paths.first()?;
    let (kind, target) = match event.kind {
        EventKind::Create(create) => {
            let target = match create {
                CreateKind::Folder => FsTarget::Folder,
                CreateKind::File => FsTarget::File,
                _ if path.is_dir() => FsTarget::Folder,
                _ => FsTarget::File,
            };
            (FsEventKind::Created, target)
        }
        EventKind::Remove(remove) => {
            let target = match remove {
                RemoveKind::Folder => FsTarget::Folder,
                _ => FsTarget::File,
            };
            (FsEventKind::Deleted, target)
        }
        EventKind::Modify(ModifyKind::Data(_)) => (FsEventKind::Modified, FsTarget::File),
        EventKind::Modify(ModifyKind::Name(_)) => {
            let target = if event.paths.iter().any(|p| p.is_file()) {
                FsTarget::File
            } else {
                FsTarget::Folder
            };
            (FsEventKind::Renamed, target)
        }
        _ => return None,
    };
    Some(FsEvent::new(kind, target, path.clone()))
}

/// Check if a path should be ignored based on ignore patterns.
///
/// A path is ignored if any of its components match any ignore pattern exactly.
pub fn should_ignore(path: &Path, patterns: &[String]) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            patterns.iter().any(|p| name == p.as_str())
        }
        _ => false,
    })
}
