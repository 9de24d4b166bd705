//! Lazily-populated mirror of a directory tree plus the set of expanded paths.
//!
//! `TreeCache` is a cheap-to-clone handle; every clone sees the same state.
//! State lives behind a mutex that is only held for synchronous bookkeeping,
//! never across a provider call, so distinct paths load concurrently.
//! Each mutation bumps a version counter published on a `watch` channel.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::error::{LoadError, ProviderError, ProviderResult};
use crate::fs::node::{Node, NodeKind};
use crate::fs::sort::sort_siblings_in_place;
use crate::provider::{FsEvent, FsEventKind, FsProvider};

/// Result of a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Fresh children were stored.
    Loaded,
    /// A load for the same path was already outstanding; nothing was requested.
    InFlight,
    /// The root changed while the request was outstanding; the response was dropped.
    Stale,
    /// The provider failed; cached data was left as it was.
    Failed,
}

/// A flattened, render-ready tree row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub node: Node,
    pub depth: usize,
    pub is_expanded: bool,
    pub is_loading: bool,
    pub is_last_sibling: bool,
}

#[derive(Debug, Default)]
struct TreeState {
    current_root: Option<PathBuf>,
    root_children: Vec<Node>,
    children: HashMap<PathBuf, Vec<Node>>,
    loading: HashSet<PathBuf>,
    expanded: HashSet<PathBuf>,
    error: Option<LoadError>,
    group_directories_first: bool,
}

struct Inner {
    provider: Arc<dyn FsProvider>,
    state: Mutex<TreeState>,
    version: watch::Sender<u64>,
}

#[derive(Clone)]
pub struct TreeCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TreeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeCache")
            .field("state", &*self.state())
            .field("version", &self.version())
            .finish()
    }
}

/// Clears a loading mark when the load finishes or its future is dropped.
struct LoadingGuard<'a> {
    cache: &'a TreeCache,
    path: PathBuf,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.cache.state().loading.remove(&self.path);
        self.cache.bump();
    }
}

impl TreeCache {
    pub fn new(provider: Arc<dyn FsProvider>, group_directories_first: bool) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                provider,
                state: Mutex::new(TreeState {
                    group_directories_first,
                    ..TreeState::default()
                }),
                version,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, TreeState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.inner.version.send_modify(|v| *v += 1);
    }

    pub fn provider(&self) -> Arc<dyn FsProvider> {
        self.inner.provider.clone()
    }

    // ── Loading ─────────────────────────────────────────────────────────────

    /// Navigate to `path` and load its immediate children.
    ///
    /// Switching to a different root discards every cached listing and
    /// expansion. A failure clears the root listing and records the error.
    pub async fn load_root(&self, path: &Path) -> LoadOutcome {
        {
            let mut state = self.state();
            state.error = None;
            if state.current_root.as_deref() != Some(path) {
                state.children.clear();
                state.expanded.clear();
                state.root_children.clear();
                state.current_root = Some(path.to_path_buf());
            }
        }
        self.bump();

        let result = self.inner.provider.list_directory(path).await;

        let outcome = {
            let mut state = self.state();
            if state.current_root.as_deref() != Some(path) {
                tracing::debug!(path = %path.display(), "discarding root listing after navigation");
                return LoadOutcome::Stale;
            }
            match result {
                Ok(mut nodes) => {
                    sort_siblings_in_place(&mut nodes, state.group_directories_first);
                    tracing::debug!(path = %path.display(), entries = nodes.len(), "root loaded");
                    state.root_children = nodes;
                    LoadOutcome::Loaded
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to load root");
                    state.error = Some(LoadError::from(&e));
                    state.root_children.clear();
                    LoadOutcome::Failed
                }
            }
        };
        self.bump();
        outcome
    }

    /// Load and cache the children of `path`.
    ///
    /// A request for a path that is already loading is dropped, not queued.
    /// The version is bumped when the load starts and again when it ends,
    /// whatever the outcome.
    pub async fn load_children(&self, path: &Path) -> LoadOutcome {
        let root_at_start = {
            let mut state = self.state();
            if !state.loading.insert(path.to_path_buf()) {
                return LoadOutcome::InFlight;
            }
            state.current_root.clone()
        };
        let _guard = LoadingGuard {
            cache: self,
            path: path.to_path_buf(),
        };
        self.bump();

        let result = self.inner.provider.list_directory(path).await;

        let mut state = self.state();
        if state.current_root != root_at_start {
            tracing::debug!(path = %path.display(), "discarding listing after navigation");
            return LoadOutcome::Stale;
        }
        match result {
            Ok(mut nodes) => {
                sort_siblings_in_place(&mut nodes, state.group_directories_first);
                state.children.insert(path.to_path_buf(), nodes);
                LoadOutcome::Loaded
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to load children");
                LoadOutcome::Failed
            }
        }
    }

    // ── Expansion ───────────────────────────────────────────────────────────

    /// Flip `path`'s expansion. Expanding a path with no cached children
    /// loads them. Returns whether the path is now expanded.
    pub async fn toggle_expansion(&self, path: &Path) -> bool {
        let (expanded, needs_load) = {
            let mut state = self.state();
            if state.expanded.remove(path) {
                (false, false)
            } else {
                state.expanded.insert(path.to_path_buf());
                (true, !state.children.contains_key(path))
            }
        };
        self.bump();

        if needs_load {
            self.load_children(path).await;
        }
        expanded
    }

    /// Mark every prefix of `path`, including `path`, as expanded.
    ///
    /// Does not load anything; see [`TreeCache::pending_loads`]. Returns
    /// whether the expanded set changed.
    pub fn expand_ancestry(&self, path: &Path) -> bool {
        let changed = {
            let mut state = self.state();
            let mut changed = false;
            for prefix in path.ancestors().filter(|p| !p.as_os_str().is_empty()) {
                changed |= state.expanded.insert(prefix.to_path_buf());
            }
            changed
        };
        if changed {
            self.bump();
        }
        changed
    }

    pub fn collapse_all(&self) {
        self.state().expanded.clear();
        self.bump();
    }

    /// Expanded directories under the current root whose children are
    /// neither cached nor loading. Only directories reachable through
    /// loaded, expanded parents are reported.
    pub fn pending_loads(&self) -> Vec<PathBuf> {
        let state = self.state();
        let mut pending = Vec::new();
        let mut stack: Vec<&Node> = state.root_children.iter().collect();

        while let Some(node) = stack.pop() {
            if !node.is_dir() || !state.expanded.contains(&node.path) {
                continue;
            }
            match state.children.get(&node.path) {
                Some(children) => stack.extend(children.iter()),
                None if !state.loading.contains(&node.path) => pending.push(node.path.clone()),
                None => {}
            }
        }

        pending.sort();
        pending
    }

    /// Load every pending directory, level by level, until nothing is
    /// pending or a pass makes no progress (failed loads stay pending).
    /// Loads within one level run concurrently. Returns how many listings
    /// were stored.
    pub async fn load_pending(&self) -> usize {
        let mut loaded = 0;
        let mut previous = Vec::new();
        loop {
            let pending = self.pending_loads();
            if pending.is_empty() || pending == previous {
                break;
            }

            let mut loads = JoinSet::new();
            for path in pending.iter().cloned() {
                let tree = self.clone();
                loads.spawn(async move { tree.load_children(&path).await });
            }
            while let Some(outcome) = loads.join_next().await {
                if matches!(outcome, Ok(LoadOutcome::Loaded)) {
                    loaded += 1;
                }
            }
            previous = pending;
        }
        loaded
    }

    // ── Refresh ─────────────────────────────────────────────────────────────

    /// Re-fetch after a change.
    ///
    /// With `levels_up == 0`, `path`'s own children are re-fetched in place.
    /// Otherwise the ancestor `levels_up` steps above `path` is re-fetched,
    /// every cached listing at or below `path` is discarded, and the ancestor
    /// is forced back into the expanded state. Returns the refreshed listing;
    /// on failure the cache is left as it was and the result is empty.
    pub async fn refresh_children(&self, path: &Path, levels_up: usize) -> Vec<Node> {
        if levels_up == 0 {
            return match self.inner.provider.list_directory(path).await {
                Ok(mut nodes) => {
                    {
                        let mut state = self.state();
                        sort_siblings_in_place(&mut nodes, state.group_directories_first);
                        if state.current_root.as_deref() == Some(path) {
                            state.root_children = nodes.clone();
                        }
                        state.children.insert(path.to_path_buf(), nodes.clone());
                    }
                    self.bump();
                    nodes
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to refresh children");
                    Vec::new()
                }
            };
        }

        let Some(ancestor) = path
            .ancestors()
            .nth(levels_up)
            .filter(|a| !a.as_os_str().is_empty())
            .map(Path::to_path_buf)
        else {
            return Vec::new();
        };

        let mut nodes = match self.inner.provider.list_directory(&ancestor).await {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::warn!(path = %ancestor.display(), error = %e, "failed to refresh ancestor");
                return Vec::new();
            }
        };

        {
            let mut state = self.state();
            sort_siblings_in_place(&mut nodes, state.group_directories_first);
            let before = state.children.len();
            state.children.retain(|key, _| !key.starts_with(path));
            tracing::debug!(
                path = %path.display(),
                purged = before - state.children.len(),
                "purged cached listings"
            );
            state.children.insert(ancestor.clone(), nodes.clone());
            if state.current_root.as_deref() == Some(ancestor.as_path()) {
                state.root_children = nodes.clone();
            }
            state.expanded.remove(&ancestor);
        }
        self.toggle_expansion(&ancestor).await;

        nodes
    }

    /// Apply a watcher notification.
    pub async fn apply_fs_event(&self, event: &FsEvent) {
        tracing::debug!(event = event.channel_name(), path = %event.path.display());
        self.refresh_children(&event.path, 1).await;
        if event.kind == FsEventKind::Created {
            if let Some(parent) = event.path.parent() {
                self.expand_ancestry(parent);
            }
        }
    }

    // ── Sorting ─────────────────────────────────────────────────────────────

    /// Re-sort every cached listing with the current grouping preference.
    pub fn resort_all(&self) {
        {
            let mut state = self.state();
            let group = state.group_directories_first;
            sort_siblings_in_place(&mut state.root_children, group);
            for nodes in state.children.values_mut() {
                sort_siblings_in_place(nodes, group);
            }
        }
        self.bump();
    }

    /// Change the grouping preference; re-sorts only when it actually changed.
    pub fn set_group_directories_first(&self, group: bool) {
        let changed = {
            let mut state = self.state();
            let changed = state.group_directories_first != group;
            state.group_directories_first = group;
            changed
        };
        if changed {
            self.resort_all();
        }
    }

    pub fn group_directories_first(&self) -> bool {
        self.state().group_directories_first
    }

    // ── Mutations through the provider ──────────────────────────────────────

    /// Create `name` under `parent`, then refresh and expand `parent`.
    /// On failure the tree is left untouched.
    pub async fn create_item(
        &self,
        parent: &Path,
        name: &str,
        kind: NodeKind,
    ) -> ProviderResult<PathBuf> {
        let name = name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ProviderError::InvalidName(name.to_string()));
        }
        let exists = {
            let state = self.state();
            let siblings = if state.current_root.as_deref() == Some(parent) {
                Some(&state.root_children)
            } else {
                state.children.get(parent)
            };
            siblings.is_some_and(|nodes| nodes.iter().any(|n| n.name == name))
        };
        if exists {
            return Err(ProviderError::AlreadyExists(parent.join(name)));
        }

        let created = self.inner.provider.create_item(parent, name, kind).await?;
        tracing::info!(path = %created.display(), "created");

        self.refresh_children(parent, 0).await;
        if self.state().expanded.insert(parent.to_path_buf()) {
            self.bump();
        }
        Ok(created)
    }

    /// Delete `node`, then refresh its parent and purge its cached subtree.
    pub async fn delete_item(&self, node: &Node) -> ProviderResult<()> {
        match node.kind {
            NodeKind::Directory => self.inner.provider.delete_directory(&node.path).await?,
            NodeKind::File => self.inner.provider.delete_file(&node.path).await?,
        }
        tracing::info!(path = %node.path.display(), "deleted");
        self.refresh_children(&node.path, 1).await;
        Ok(())
    }

    // ── Read access ─────────────────────────────────────────────────────────

    pub fn current_root(&self) -> Option<PathBuf> {
        self.state().current_root.clone()
    }

    pub fn root_children(&self) -> Vec<Node> {
        self.state().root_children.clone()
    }

    pub fn children_of(&self, path: &Path) -> Option<Vec<Node>> {
        self.state().children.get(path).cloned()
    }

    pub fn is_expanded(&self, path: &Path) -> bool {
        self.state().expanded.contains(path)
    }

    pub fn is_loading(&self, path: &Path) -> bool {
        self.state().loading.contains(path)
    }

    pub fn is_any_loading(&self) -> bool {
        !self.state().loading.is_empty()
    }

    pub fn error(&self) -> Option<LoadError> {
        self.state().error.clone()
    }

    /// Paths with a cached children listing, sorted.
    pub fn cached_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.state().children.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn version(&self) -> u64 {
        *self.inner.version.borrow()
    }

    /// Observe version bumps.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }

    /// Flatten the expanded part of the tree into display rows.
    pub fn visible_rows(&self, show_hidden: bool) -> Vec<TreeRow> {
        let state = self.state();
        let mut rows = Vec::new();
        flatten_level(&state, &state.root_children, 0, show_hidden, &mut rows);
        rows
    }
}

fn flatten_level(
    state: &TreeState,
    nodes: &[Node],
    depth: usize,
    show_hidden: bool,
    rows: &mut Vec<TreeRow>,
) {
    let visible: Vec<&Node> = nodes.iter().filter(|n| show_hidden || !n.hidden).collect();

    for (i, node) in visible.iter().enumerate() {
        let is_expanded = node.is_dir() && state.expanded.contains(&node.path);
        rows.push(TreeRow {
            node: (*node).clone(),
            depth,
            is_expanded,
            is_loading: state.loading.contains(&node.path),
            is_last_sibling: i == visible.len() - 1,
        });
        if is_expanded {
            if let Some(children) = state.children.get(&node.path) {
                flatten_level(state, children, depth + 1, show_hidden, rows);
            }
        }
    }
}
