//! Filesystem and search provider backed by the local disk.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::{broadcast, mpsc};

use crate::error::{ProviderError, ProviderResult};
use crate::fs::node::{Node, NodeKind};
use crate::fs::watcher::{FsWatcher, DEFAULT_DEBOUNCE_MS};
use crate::provider::pattern::build_pattern;
use crate::provider::{FsEvent, FsProvider, SearchChannels, SearchProvider};
use crate::search::types::{
    EarlyResults, Match, SearchProgress, SearchRequest, SearchResponse, SearchResult, SearchStats,
};

/// Files examined per directory before the rest are skipped.
pub const MAX_FILES_PER_DIR: usize = 300;
/// Matching files kept per directory.
pub const MAX_RESULTS_PER_DIR: usize = 20;
/// Total matching files before the search curtails itself.
pub const MAX_TOTAL_RESULTS: usize = 300;
/// Pending results that force an early-results push.
pub const BATCH_SIZE: usize = 50;
/// Files larger than this are not searched.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);
const EARLY_RESULTS_INTERVAL: Duration = Duration::from_millis(500);
const CHANNEL_CAPACITY: usize = 64;

/// Directory names visited before their siblings.
const PRIORITY_DIRS: &[&str] = &["src", "lib", "app", "components", "pages"];

pub struct LocalProvider {
    ignore_patterns: Vec<String>,
    watch_debounce: Duration,
    watchers: Mutex<Vec<FsWatcher>>,
    /// Bumped by every search start and every cancel; a running walk stops
    /// once it no longer owns the current value.
    active_search: Arc<AtomicU64>,
    progress_tx: broadcast::Sender<SearchProgress>,
    early_tx: broadcast::Sender<EarlyResults>,
}

impl LocalProvider {
    pub fn new(ignore_patterns: Vec<String>) -> Self {
        let (progress_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (early_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            ignore_patterns,
            watch_debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            watchers: Mutex::new(Vec::new()),
            active_search: Arc::new(AtomicU64::new(0)),
            progress_tx,
            early_tx,
        }
    }

    /// Window over which watch notifications are coalesced per path.
    pub fn with_watch_debounce(mut self, debounce: Duration) -> Self {
        self.watch_debounce = debounce;
        self
    }

    /// Pause or resume every watcher started through [`FsProvider::watch`].
    pub fn set_watching(&self, active: bool) {
        for watcher in self
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            if active {
                watcher.resume();
            } else {
                watcher.pause();
            }
        }
    }

    /// Drop every watcher; their event receivers close.
    pub fn stop_watching(&self) {
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// True if at least one watcher exists and all of them are forwarding.
    pub fn is_watching(&self) -> bool {
        let watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        !watchers.is_empty() && watchers.iter().all(FsWatcher::is_active)
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn validate_name(name: &str) -> ProviderResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(ProviderError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl FsProvider for LocalProvider {
    async fn list_directory(&self, path: &Path) -> ProviderResult<Vec<Node>> {
        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|e| ProviderError::from_io(path, e))?;

        let mut nodes = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProviderError::from_io(path, e))?
        {
            let entry_path = entry.path();
            // Follow symlinks; a dangling link falls back to the link itself.
            let metadata = match tokio::fs::metadata(&entry_path).await {
                Ok(m) => m,
                Err(_) => match entry.metadata().await {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::debug!(path = %entry_path.display(), error = %e, "skipping unreadable entry");
                        continue;
                    }
                },
            };
            nodes.push(Node::from_metadata(&entry_path, &metadata));
        }
        Ok(nodes)
    }

    async fn delete_file(&self, path: &Path) -> ProviderResult<()> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| ProviderError::from_io(path, e))
    }

    async fn delete_directory(&self, path: &Path) -> ProviderResult<()> {
        tokio::fs::remove_dir_all(path)
            .await
            .map_err(|e| ProviderError::from_io(path, e))
    }

    async fn create_item(
        &self,
        parent: &Path,
        name: &str,
        kind: NodeKind,
    ) -> ProviderResult<PathBuf> {
        validate_name(name)?;
        let target = parent.join(name);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Err(ProviderError::AlreadyExists(target));
        }

        match kind {
            NodeKind::Directory => tokio::fs::create_dir(&target).await,
            NodeKind::File => tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
                .await
                .map(|_| ()),
        }
        .map_err(|e| ProviderError::from_io(&target, e))?;

        Ok(target)
    }

    async fn read_file(&self, path: &Path) -> ProviderResult<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProviderError::from_io(path, e))
    }

    fn watch(&self, path: &Path) -> ProviderResult<mpsc::UnboundedReceiver<FsEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = FsWatcher::new(path, self.watch_debounce, self.ignore_patterns.clone(), tx)
            .map_err(|e| ProviderError::Unavailable(format!("watch {}: {}", path.display(), e)))?;
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(watcher);
        Ok(rx)
    }
}

#[async_trait]
impl SearchProvider for LocalProvider {
    async fn search(&self, request: SearchRequest) -> ProviderResult<SearchResponse> {
        let matcher = build_pattern(&request.query, &request.options)?;
        let version = self.active_search.fetch_add(1, Ordering::SeqCst) + 1;

        let walk = SearchWalk {
            search_id: request.search_id,
            root: request.path,
            matcher,
            timeout: Duration::from_secs(request.timeout_secs.max(1)),
            version,
            active: self.active_search.clone(),
            progress_tx: self.progress_tx.clone(),
            early_tx: self.early_tx.clone(),
        };

        tokio::task::spawn_blocking(move || walk.run())
            .await
            .map_err(|e| ProviderError::Search(format!("search task failed: {}", e)))
    }

    async fn cancel(&self) -> ProviderResult<()> {
        self.active_search.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> SearchChannels {
        SearchChannels {
            progress: self.progress_tx.subscribe(),
            early_results: self.early_tx.subscribe(),
        }
    }
}

/// One blocking content search over a directory tree.
struct SearchWalk {
    search_id: u64,
    root: PathBuf,
    matcher: Regex,
    timeout: Duration,
    version: u64,
    active: Arc<AtomicU64>,
    progress_tx: broadcast::Sender<SearchProgress>,
    early_tx: broadcast::Sender<EarlyResults>,
}

impl SearchWalk {
    fn is_cancelled(&self) -> bool {
        self.active.load(Ordering::SeqCst) != self.version
    }

    /// Stop here: nothing more is pushed once a newer search or a cancel
    /// owns the generation.
    fn cancelled(
        &self,
        results: Vec<SearchResult>,
        stats: SearchStats,
        started: Instant,
    ) -> SearchResponse {
        tracing::debug!(root = %self.root.display(), search = self.search_id, "search cancelled");
        SearchResponse {
            results,
            stats,
            cancelled: true,
            curtailed: false,
            processing_time_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn progress(&self, stats: &SearchStats, started: Instant) -> SearchProgress {
        SearchProgress {
            search_id: Some(self.search_id),
            files_searched: stats.files_searched,
            directories_searched: stats.directories_searched,
            total_matches: stats.total_matches,
            processing_time_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn run(self) -> SearchResponse {
        let started = Instant::now();
        let mut stats = SearchStats::default();
        let mut results: Vec<SearchResult> = Vec::new();
        let mut batch: Vec<SearchResult> = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([self.root.clone()]);
        let mut last_progress = Instant::now();
        let mut last_early = Instant::now();
        let mut curtailed = false;

        while let Some(dir) = queue.pop_front() {
            if self.is_cancelled() {
                results.append(&mut batch);
                return self.cancelled(results, stats, started);
            }

            if !batch.is_empty()
                && (batch.len() >= BATCH_SIZE || last_early.elapsed() >= EARLY_RESULTS_INTERVAL)
            {
                results.append(&mut batch);
                let _ = self.early_tx.send(EarlyResults {
                    search_id: Some(self.search_id),
                    results: results.clone(),
                    stats,
                    processing_time_ms: started.elapsed().as_millis() as u64,
                });
                last_early = Instant::now();
            }

            if started.elapsed() > self.timeout || results.len() >= MAX_TOTAL_RESULTS {
                curtailed = true;
                break;
            }

            if !visited.insert(dir.clone()) {
                continue;
            }

            let mut dir_results = self.scan_directory(&dir, &mut queue, &mut stats);
            dir_results.truncate(MAX_RESULTS_PER_DIR);
            batch.append(&mut dir_results);

            if self.is_cancelled() {
                results.append(&mut batch);
                return self.cancelled(results, stats, started);
            }

            if last_progress.elapsed() >= PROGRESS_INTERVAL {
                let _ = self.progress_tx.send(self.progress(&stats, started));
                last_progress = Instant::now();
            }
        }

        results.append(&mut batch);
        results.truncate(MAX_TOTAL_RESULTS);
        if self.is_cancelled() {
            return self.cancelled(results, stats, started);
        }
        let _ = self.progress_tx.send(self.progress(&stats, started));

        tracing::debug!(
            root = %self.root.display(),
            files = stats.files_searched,
            dirs = stats.directories_searched,
            matches = stats.total_matches,
            curtailed,
            "search finished"
        );

        SearchResponse {
            results,
            stats,
            cancelled: false,
            curtailed,
            processing_time_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Search the files directly in `dir` and queue its subdirectories.
    fn scan_directory(
        &self,
        dir: &Path,
        queue: &mut VecDeque<PathBuf>,
        stats: &mut SearchStats,
    ) -> Vec<SearchResult> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(path = %dir.display(), error = %e, "skipping unreadable directory");
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        let mut files_in_dir = 0usize;

        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();

            if file_type.is_dir() {
                if is_priority_dir(&path) {
                    queue.push_front(path);
                } else {
                    queue.push_back(path);
                }
            } else if file_type.is_file() {
                if files_in_dir >= MAX_FILES_PER_DIR {
                    continue;
                }
                let Some(content) = read_searchable(&path) else {
                    continue;
                };
                files_in_dir += 1;
                if let Some(result) = search_content(&path, &content, &self.matcher) {
                    stats.total_matches += result.match_count();
                    found.push(result);
                }
            }
        }

        stats.files_searched += files_in_dir as u64;
        stats.directories_searched += 1;
        found
    }
}

fn is_priority_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| PRIORITY_DIRS.contains(&n))
}

/// File content as text, or `None` for oversized, binary, or non-UTF-8 files.
fn read_searchable(path: &Path) -> Option<String> {
    let metadata = std::fs::metadata(path).ok()?;
    if metadata.len() > MAX_FILE_SIZE {
        return None;
    }
    let bytes = std::fs::read(path).ok()?;
    if bytes.contains(&0) {
        return None;
    }
    String::from_utf8(bytes).ok()
}

fn search_content(path: &Path, content: &str, matcher: &Regex) -> Option<SearchResult> {
    let matches: Vec<Match> = content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let ranges: Vec<[usize; 2]> = matcher
                .find_iter(line)
                .filter(|m| !m.is_empty())
                .map(|m| [m.start(), m.end()])
                .collect();
            (!ranges.is_empty()).then(|| Match {
                line: idx + 1,
                content: line.to_string(),
                ranges,
            })
        })
        .collect();

    (!matches.is_empty()).then(|| SearchResult {
        path: path.to_path_buf(),
        matches,
    })
}
