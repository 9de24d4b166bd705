use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use fm_search::completion::{Activity, CompletionDetector, Stage};
use fm_search::config::AppConfig;
use fm_search::fs::navigation::{resolve_typed_path, NavigationHistory};
use fm_search::fs::node::{Node, NodeKind};
use fm_search::fs::tree::{LoadOutcome, TreeCache, TreeRow};
use fm_search::provider::FsEvent;
use fm_search::search::coordinator::{
    CancelReason, SearchCoordinator, SearchEvent, SessionId, SessionState,
};
use fm_search::search::timeout::{self, SLIDER_MAX};
use fm_search::search::types::{SearchOptions, SearchStats};
use fm_search::store::{self, KeyValueStore, GROUP_DIRECTORIES_FIRST_KEY};

use crate::event::Event;

const STATUS_TTL: Duration = Duration::from_secs(3);

/// Slider steps moved by one timeout adjustment.
const TIMEOUT_STEP: i16 = 5;

/// The kind of dialog being displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogKind {
    CreateFile,
    CreateDirectory,
    DeleteConfirm { node: Node },
    History,
    /// Type a directory to make the new root.
    GoTo,
}

/// Application mode.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum AppMode {
    #[default]
    Normal,
    /// Typing into the search bar.
    Search,
    Dialog(DialogKind),
    /// Reading a file in the side pane.
    Viewer,
}

/// Which search option a key toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchToggle {
    Regex,
    CaseSensitive,
    WholeWord,
}

/// Single-line text input with a byte-offset cursor.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineInput {
    pub input: String,
    pub cursor_position: usize,
}

impl LineInput {
    /// Replace the text and put the cursor at the end.
    pub fn set(&mut self, text: &str) {
        self.input = text.to_string();
        self.cursor_position = self.input.len();
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
    }

    /// Insert a character at the current cursor position.
    pub fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor_position, c);
        self.cursor_position += c.len_utf8();
    }

    /// Delete the character before the cursor (backspace).
    pub fn delete_char(&mut self) {
        if let Some(prev) = self.input[..self.cursor_position].chars().next_back() {
            self.cursor_position -= prev.len_utf8();
            self.input.remove(self.cursor_position);
        }
    }

    pub fn move_left(&mut self) {
        if let Some(prev) = self.input[..self.cursor_position].chars().next_back() {
            self.cursor_position -= prev.len_utf8();
        }
    }

    pub fn move_right(&mut self) {
        if let Some(next) = self.input[self.cursor_position..].chars().next() {
            self.cursor_position += next.len_utf8();
        }
    }

    pub fn home(&mut self) {
        self.cursor_position = 0;
    }

    pub fn end(&mut self) {
        self.cursor_position = self.input.len();
    }

    /// Text before the cursor, the character under it and the rest.
    /// The middle part is empty when the cursor sits at the end.
    pub fn split_at_cursor(&self) -> (&str, &str, &str) {
        let (before, rest) = self.input.split_at(self.cursor_position);
        let cursor_len = rest.chars().next().map_or(0, char::len_utf8);
        let (at, after) = rest.split_at(cursor_len);
        (before, at, after)
    }
}

/// Text of the file pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileText {
    Loading,
    Lines(Vec<String>),
    Failed(String),
}

/// Read-only view of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileView {
    pub path: PathBuf,
    pub text: FileText,
    /// First visible line, zero-based.
    pub scroll: usize,
}

impl FileView {
    fn loading(path: PathBuf) -> Self {
        Self {
            path,
            text: FileText::Loading,
            scroll: 0,
        }
    }

    pub fn line_count(&self) -> usize {
        match &self.text {
            FileText::Lines(lines) => lines.len(),
            _ => 0,
        }
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let last = self.line_count().saturating_sub(1);
        self.scroll = self.scroll.saturating_add_signed(delta).min(last);
    }

    pub fn scroll_to_end(&mut self) {
        self.scroll = self.line_count().saturating_sub(1);
    }
}

/// A transient message shown in the status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
    pub created: Instant,
}

/// Main application state.
pub struct App {
    pub root: PathBuf,
    pub navigation: NavigationHistory,
    pub file_view: Option<FileView>,
    pub tree: TreeCache,
    pub search: SearchCoordinator,
    store: Arc<dyn KeyValueStore>,
    pub detector: CompletionDetector,
    pub activity: Activity,
    pub rows: Vec<TreeRow>,
    pub selected_index: usize,
    pub scroll_offset: usize,
    pub show_hidden: bool,
    pub mouse_enabled: bool,
    pub mode: AppMode,
    pub dialog_input: LineInput,
    pub history_selected: usize,
    pub search_input: LineInput,
    pub options: SearchOptions,
    pub status_message: Option<StatusMessage>,
    pub watcher_active: bool,
    pub should_quit: bool,
    /// Search session whose events drive the detector.
    search_session: Option<SessionId>,
    /// A search was submitted and its `Started` has not arrived yet.
    awaiting_search: bool,
    seen_version: u64,
    expansion_running: bool,
    expansion_dirty: bool,
    event_tx: mpsc::UnboundedSender<Event>,
}

impl App {
    pub fn new(
        root: &Path,
        tree: TreeCache,
        search: SearchCoordinator,
        store: Arc<dyn KeyValueStore>,
        config: &AppConfig,
        event_tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        search.set_timeout_secs(config.default_timeout_secs());
        Self {
            root: root.to_path_buf(),
            navigation: NavigationHistory::new(root),
            file_view: None,
            tree,
            search,
            store,
            detector: CompletionDetector::new(config.quiet_window(), config.burst_threshold()),
            activity: Activity::Settled,
            rows: Vec::new(),
            selected_index: 0,
            scroll_offset: 0,
            show_hidden: config.show_hidden(),
            mouse_enabled: config.mouse_enabled(),
            mode: AppMode::Normal,
            dialog_input: LineInput::default(),
            history_selected: 0,
            search_input: LineInput::default(),
            options: SearchOptions::default(),
            status_message: None,
            watcher_active: config.watcher_enabled(),
            should_quit: false,
            search_session: None,
            awaiting_search: false,
            seen_version: u64::MAX,
            expansion_running: false,
            expansion_dirty: false,
            event_tx,
        }
    }

    /// Quit the application.
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    // ── Tree view ───────────────────────────────────────────────────────────

    /// Rebuild the flattened rows from the cache and keep the selection in range.
    pub fn refresh_rows(&mut self) {
        let selected_path = self.selected_row().map(|r| r.node.path.clone());
        self.rows = self.tree.visible_rows(self.show_hidden);
        if let Some(path) = selected_path {
            if let Some(index) = self.rows.iter().position(|r| r.node.path == path) {
                self.selected_index = index;
            }
        }
        if self.selected_index >= self.rows.len() {
            self.selected_index = self.rows.len().saturating_sub(1);
        }
    }

    pub fn selected_row(&self) -> Option<&TreeRow> {
        self.rows.get(self.selected_index)
    }

    /// Get the directory of the currently selected item.
    pub fn current_dir(&self) -> PathBuf {
        match self.selected_row() {
            Some(row) if row.node.is_dir() => row.node.path.clone(),
            Some(row) => row
                .node
                .path
                .parent()
                .map_or_else(|| self.root.clone(), Path::to_path_buf),
            None => self.root.clone(),
        }
    }

    /// Move selection down by one item.
    pub fn select_next(&mut self) {
        if self.selected_index + 1 < self.rows.len() {
            self.selected_index += 1;
        }
    }

    /// Move selection up by one item.
    pub fn select_previous(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
    }

    /// Jump to the first item.
    pub fn select_first(&mut self) {
        self.selected_index = 0;
    }

    /// Jump to the last item.
    pub fn select_last(&mut self) {
        self.selected_index = self.rows.len().saturating_sub(1);
    }

    /// Keep the selected row inside a viewport of `visible_height` rows.
    pub fn update_scroll(&mut self, visible_height: usize) {
        if visible_height == 0 {
            return;
        }
        if self.selected_index < self.scroll_offset {
            self.scroll_offset = self.selected_index;
        } else if self.selected_index >= self.scroll_offset + visible_height {
            self.scroll_offset = self.selected_index + 1 - visible_height;
        }
    }

    /// Expand the selected directory (or no-op on files).
    pub fn expand_selected(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if row.node.is_dir() && !row.is_expanded {
            self.spawn_toggle(row.node.path.clone());
        }
    }

    /// Collapse the selected directory, or jump to its parent row.
    pub fn collapse_selected(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if row.node.is_dir() && row.is_expanded {
            self.spawn_toggle(row.node.path.clone());
            return;
        }
        let parent = row.node.path.parent().map(Path::to_path_buf);
        if let Some(index) = parent.and_then(|p| self.rows.iter().position(|r| r.node.path == p)) {
            self.selected_index = index;
        }
    }

    fn spawn_toggle(&self, path: PathBuf) {
        let tree = self.tree.clone();
        tokio::spawn(async move {
            tree.toggle_expansion(&path).await;
        });
    }

    pub fn collapse_all(&mut self) {
        self.tree.collapse_all();
        self.selected_index = 0;
    }

    /// Toggle hidden file visibility.
    pub fn toggle_hidden(&mut self) {
        self.show_hidden = !self.show_hidden;
        self.refresh_rows();
    }

    /// Flip directories-first grouping and remember the choice.
    pub fn toggle_grouping(&mut self) {
        let group = !self.tree.group_directories_first();
        self.tree.set_group_directories_first(group);
        if let Err(e) = store::set_as(self.store.as_ref(), GROUP_DIRECTORIES_FIRST_KEY, &group) {
            tracing::warn!(error = %e, "failed to save grouping preference");
        }
        let label = if group { "Directories first" } else { "Mixed order" };
        self.set_status_message(label.to_string(), false);
    }

    /// Re-fetch the directory containing the selection.
    pub fn refresh_current_dir(&mut self) {
        let dir = self.current_dir();
        let tree = self.tree.clone();
        tokio::spawn(async move {
            tree.refresh_children(&dir, 0).await;
        });
    }

    /// Jump to the next row whose file matched the current search.
    pub fn select_next_match(&mut self) {
        let highlights = self.search.highlights();
        let start = self.selected_index + 1;
        let found = (start..self.rows.len())
            .chain(0..start.min(self.rows.len()))
            .find(|&i| {
                let row = &self.rows[i];
                !row.node.is_dir() && highlights.get(&row.node.path).is_some()
            });
        if let Some(index) = found {
            self.selected_index = index;
        }
    }

    /// Show or hide the matched lines of the selected file.
    pub fn toggle_match_lines(&mut self) {
        if let Some(path) = self.selected_row().map(|r| r.node.path.clone()) {
            self.search.toggle_highlight_expanded(&path);
        }
    }

    pub fn toggle_mouse(&mut self) {
        self.mouse_enabled = !self.mouse_enabled;
        let label = if self.mouse_enabled {
            "Mouse capture on"
        } else {
            "Mouse capture off"
        };
        self.set_status_message(label.to_string(), false);
    }

    // ── Navigation ──────────────────────────────────────────────────────────

    /// Make `path` the root, recording it in the back/forward history.
    pub fn go_to(&mut self, path: PathBuf) {
        if self.navigation.navigate(&path) {
            self.change_root(path);
        }
    }

    pub fn go_parent(&mut self) {
        if let Some(parent) = self.root.parent().map(Path::to_path_buf) {
            self.go_to(parent);
        }
    }

    /// Make the selected directory the root.
    pub fn enter_selected(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if row.node.is_dir() {
            let path = row.node.path.clone();
            self.go_to(path);
        }
    }

    pub fn go_back(&mut self) {
        if let Some(path) = self.navigation.back().map(Path::to_path_buf) {
            self.change_root(path);
        }
    }

    pub fn go_forward(&mut self) {
        if let Some(path) = self.navigation.forward().map(Path::to_path_buf) {
            self.change_root(path);
        }
    }

    /// Switch the tree to `path`. Search results belong to the old root and
    /// are dropped.
    fn change_root(&mut self, path: PathBuf) {
        tracing::info!(root = %path.display(), "changing root");
        let was_running = self.search.is_running();
        self.search.clear();
        if was_running {
            let search = self.search.clone();
            tokio::spawn(async move { search.abort_provider().await });
        }
        self.detector.abandon();
        self.awaiting_search = false;
        self.close_file_view();

        self.root = path.clone();
        self.selected_index = 0;
        self.scroll_offset = 0;

        let tree = self.tree.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let outcome = tree.load_root(&path).await;
            let _ = tx.send(Event::RootLoaded { path, outcome });
        });
    }

    /// A root listing arrived. A root that cannot be listed is dropped from
    /// the history and the previous root comes back.
    pub fn handle_root_loaded(&mut self, path: PathBuf, outcome: LoadOutcome) {
        if path != self.root || outcome != LoadOutcome::Failed {
            return;
        }
        let message = self
            .tree
            .error()
            .map_or_else(|| format!("Cannot open {}", path.display()), |e| e.message);
        self.set_status_message(message, true);
        if let Some(previous) = self.navigation.discard(&path).map(Path::to_path_buf) {
            self.change_root(previous);
        }
    }

    // ── File pane ───────────────────────────────────────────────────────────

    /// Open the selected file in the side pane.
    pub fn open_file_view(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if row.node.is_dir() {
            return;
        }
        let path = row.node.path.clone();
        self.file_view = Some(FileView::loading(path.clone()));
        self.mode = AppMode::Viewer;

        let provider = self.tree.provider();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = provider.read_file(&path).await.map_err(|e| e.to_string());
            let _ = tx.send(Event::FileLoaded { path, result });
        });
    }

    /// Fill the pane if it still shows `path`; scroll to the first match.
    pub fn handle_file_loaded(&mut self, path: PathBuf, result: Result<String, String>) {
        let first_match = self
            .search
            .results()
            .into_iter()
            .find(|r| r.path == path)
            .and_then(|r| r.matches.first().map(|m| m.line));
        let Some(view) = self.file_view.as_mut().filter(|v| v.path == path) else {
            return;
        };
        match result {
            Ok(content) => {
                view.text = FileText::Lines(content.lines().map(str::to_string).collect());
                view.scroll = first_match.map_or(0, |line| line.saturating_sub(1));
                view.scroll_by(0);
            }
            Err(message) => {
                tracing::debug!(path = %path.display(), %message, "file pane read failed");
                view.text = FileText::Failed(message);
            }
        }
    }

    pub fn close_file_view(&mut self) {
        self.file_view = None;
        if self.mode == AppMode::Viewer {
            self.mode = AppMode::Normal;
        }
    }

    pub fn scroll_file_view(&mut self, delta: isize) {
        if let Some(view) = self.file_view.as_mut() {
            view.scroll_by(delta);
        }
    }

    pub fn scroll_file_view_to(&mut self, top: bool) {
        if let Some(view) = self.file_view.as_mut() {
            if top {
                view.scroll = 0;
            } else {
                view.scroll_to_end();
            }
        }
    }

    // ── Search ──────────────────────────────────────────────────────────────

    pub fn open_search(&mut self) {
        self.search_input.end();
        self.mode = AppMode::Search;
    }

    pub fn close_search(&mut self) {
        self.mode = AppMode::Normal;
    }

    pub fn toggle_option(&mut self, toggle: SearchToggle) {
        match toggle {
            SearchToggle::Regex => self.options.set_regex(!self.options.regex()),
            SearchToggle::CaseSensitive => self
                .options
                .set_case_sensitive(!self.options.case_sensitive()),
            SearchToggle::WholeWord => self.options.set_whole_word(!self.options.whole_word()),
        }
    }

    /// Move the timeout slider by `steps` adjustment steps.
    pub fn adjust_timeout(&mut self, steps: i16) {
        let position = i16::from(timeout::seconds_to_slider(self.search.timeout_secs()));
        let position = (position + steps * TIMEOUT_STEP).clamp(0, i16::from(SLIDER_MAX));
        // Clamped to 0..=100 above.
        let seconds = timeout::slider_to_seconds(position as u8);
        self.search.set_timeout_secs(seconds);
    }

    /// Run the query in the search bar against the current root.
    pub fn submit_search(&mut self) {
        self.mode = AppMode::Normal;
        let query = self.search_input.input.clone();
        if query.trim().is_empty() {
            return;
        }

        self.detector.begin_operation(Instant::now());
        self.detector.stage_started(Stage::Searching);
        self.awaiting_search = true;

        let search = self.search.clone();
        let options = self.options;
        let root = self.root.clone();
        tokio::spawn(async move {
            let outcome = search.start(&query, options, Some(&root)).await;
            tracing::debug!(?outcome, "search returned");
        });
    }

    /// Cancel a running search; with nothing running, clear the results.
    pub fn cancel_search(&mut self) {
        if self.search.cancel_local() {
            let search = self.search.clone();
            tokio::spawn(async move { search.abort_provider().await });
            self.set_status_message("Search cancelled".to_string(), false);
        } else if !self.search.highlights().is_empty() {
            self.search.clear();
        }
        self.detector.abandon();
    }

    pub fn handle_search_event(&mut self, event: SearchEvent) {
        if let SearchEvent::Started { session, .. } = event {
            if self.search_session.map_or(true, |current| session > current) {
                self.search_session = Some(session);
                self.awaiting_search = false;
            }
            return;
        }
        if let Some(session) = event.session() {
            if self.awaiting_search || self.search_session != Some(session) {
                tracing::debug!(session, current = ?self.search_session, "ignoring search event");
                return;
            }
        }

        match event {
            SearchEvent::ResultsUpdated { .. } => self.reveal_matches(),
            SearchEvent::Finished { state, stats, .. } => {
                self.detector.stage_finished(Stage::Searching, Instant::now());
                self.set_status_message(finished_message(state, &stats), false);
            }
            SearchEvent::Cancelled { reason, .. } => {
                if reason != CancelReason::Superseded {
                    self.detector.abandon();
                }
                if reason == CancelReason::Provider {
                    self.set_status_message("Search cancelled by provider".to_string(), true);
                }
            }
            SearchEvent::Failed { message, .. } => {
                self.detector.abandon();
                self.set_status_message(format!("Search failed: {}", message), true);
            }
            SearchEvent::Cleared => self.detector.abandon(),
            SearchEvent::Started { .. } | SearchEvent::Progress { .. } => {}
        }
    }

    /// Expand the ancestors of every matched file and load what that exposes.
    pub fn reveal_matches(&mut self) {
        let highlights = self.search.highlights();
        for file in highlights.matched_files() {
            if let Some(parent) = file.parent() {
                self.tree.expand_ancestry(parent);
            }
        }
        if self.tree.pending_loads().is_empty() {
            return;
        }

        self.detector.stage_started(Stage::Expanding);
        if self.expansion_running {
            self.expansion_dirty = true;
            return;
        }
        self.spawn_expansion();
    }

    fn spawn_expansion(&mut self) {
        self.expansion_running = true;
        self.expansion_dirty = false;
        let tree = self.tree.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let loaded = tree.load_pending().await;
            tracing::debug!(loaded, "auto-expansion drained");
            let _ = tx.send(Event::ExpansionDone);
        });
    }

    pub fn handle_expansion_done(&mut self) {
        self.expansion_running = false;
        if self.expansion_dirty {
            self.spawn_expansion();
        } else {
            self.detector.stage_finished(Stage::Expanding, Instant::now());
        }
    }

    // ── Events ──────────────────────────────────────────────────────────────

    /// Periodic bookkeeping: pick up tree changes and update the settle state.
    pub fn on_tick(&mut self, now: Instant) {
        self.clear_expired_status(now);
        let version = self.tree.version();
        if version != self.seen_version {
            self.seen_version = version;
            self.refresh_rows();
            self.detector.record_change(now);
        }
        self.activity = self.detector.status(now);
    }

    pub fn handle_fs_change(&mut self, event: FsEvent) {
        if !self.watcher_active {
            return;
        }
        let tree = self.tree.clone();
        tokio::spawn(async move {
            tree.apply_fs_event(&event).await;
        });
    }

    pub fn toggle_watcher(&mut self) {
        self.watcher_active = !self.watcher_active;
        let label = if self.watcher_active {
            "Auto-refresh on"
        } else {
            "Auto-refresh paused"
        };
        self.set_status_message(label.to_string(), false);
    }

    // ── Dialogs ─────────────────────────────────────────────────────────────

    /// Open a dialog of the given kind.
    pub fn open_dialog(&mut self, kind: DialogKind) {
        self.dialog_input.clear();
        self.history_selected = 0;
        self.mode = AppMode::Dialog(kind);
    }

    /// Open the go-to dialog holding the current root.
    pub fn open_go_to(&mut self) {
        let current = self.root.display().to_string();
        self.open_dialog(DialogKind::GoTo);
        self.dialog_input.set(&current);
    }

    /// Ask before deleting the selected node.
    pub fn request_delete(&mut self) {
        if let Some(node) = self.selected_row().map(|r| r.node.clone()) {
            self.open_dialog(DialogKind::DeleteConfirm { node });
        }
    }

    /// Close the current dialog and return to normal mode.
    pub fn close_dialog(&mut self) {
        self.mode = AppMode::Normal;
        self.dialog_input.clear();
    }

    pub fn history_next(&mut self) {
        let len = self.search.history().len();
        if self.history_selected + 1 < len {
            self.history_selected += 1;
        }
    }

    pub fn history_previous(&mut self) {
        self.history_selected = self.history_selected.saturating_sub(1);
    }

    /// Apply the open dialog.
    pub fn confirm_dialog(&mut self) {
        let AppMode::Dialog(kind) = std::mem::take(&mut self.mode) else {
            return;
        };
        match kind {
            DialogKind::CreateFile => self.spawn_create(NodeKind::File),
            DialogKind::CreateDirectory => self.spawn_create(NodeKind::Directory),
            DialogKind::DeleteConfirm { node } => self.spawn_delete(node),
            DialogKind::History => {
                if let Some(entry) = self.search.history().get(self.history_selected) {
                    self.search_input.set(entry);
                    self.mode = AppMode::Search;
                }
            }
            DialogKind::GoTo => {
                match resolve_typed_path(&self.dialog_input.input, &self.root) {
                    Some(path) => self.go_to(path),
                    None => self.set_status_message("No path entered".to_string(), true),
                }
            }
        }
        self.dialog_input.clear();
    }

    fn spawn_create(&self, kind: NodeKind) {
        let parent = self.current_dir();
        let name = self.dialog_input.input.clone();
        let tree = self.tree.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let event = match tree.create_item(&parent, &name, kind).await {
                Ok(path) => Event::OperationComplete {
                    message: format!("Created {}", path.display()),
                    is_error: false,
                },
                Err(e) => Event::OperationComplete {
                    message: e.to_string(),
                    is_error: true,
                },
            };
            let _ = tx.send(event);
        });
    }

    fn spawn_delete(&self, node: Node) {
        let tree = self.tree.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let event = match tree.delete_item(&node).await {
                Ok(()) => Event::OperationComplete {
                    message: format!("Deleted {}", node.name),
                    is_error: false,
                },
                Err(e) => Event::OperationComplete {
                    message: e.to_string(),
                    is_error: true,
                },
            };
            let _ = tx.send(event);
        });
    }

    pub fn handle_operation_complete(&mut self, message: String, is_error: bool) {
        self.set_status_message(message, is_error);
    }

    // ── Status ──────────────────────────────────────────────────────────────

    pub fn set_status_message(&mut self, text: String, is_error: bool) {
        self.status_message = Some(StatusMessage {
            text,
            is_error,
            created: Instant::now(),
        });
    }

    /// Drop the status message once it has been shown long enough.
    pub fn clear_expired_status(&mut self, now: Instant) {
        if let Some(ref msg) = self.status_message {
            if now.saturating_duration_since(msg.created) > STATUS_TTL {
                self.status_message = None;
            }
        }
    }

    /// One-line search summary for the status bar.
    pub fn search_summary(&self) -> Option<String> {
        let session = self.search.session()?;
        let files = self.search.results().len();
        let SearchStats {
            files_searched,
            total_matches,
            ..
        } = session.stats;
        let summary = match session.state {
            SessionState::Running => format!(
                "searching… {} files scanned, {} matches",
                files_searched, total_matches
            ),
            SessionState::Completed | SessionState::Curtailed => {
                format!("{} matches in {} files", total_matches, files)
            }
            SessionState::Cancelled => "cancelled".to_string(),
            SessionState::Idle => return None,
        };
        Some(summary)
    }
}

fn finished_message(state: SessionState, stats: &SearchStats) -> String {
    let mut msg = format!(
        "{} matches ({} files scanned in {} dirs)",
        stats.total_matches, stats.files_searched, stats.directories_searched
    );
    if state == SessionState::Curtailed {
        msg.push_str(", stopped early");
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use fm_search::provider::LocalProvider;
    use fm_search::store::MemoryStore;
    use std::fs::{self, File};
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        app: App,
        store: Arc<MemoryStore>,
        rx: mpsc::UnboundedReceiver<Event>,
    }

    async fn setup_app() -> Harness {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("alpha")).unwrap();
        fs::create_dir(root.join("beta")).unwrap();
        fs::write(root.join("alpha").join("inner.txt"), "a needle here\n").unwrap();
        File::create(root.join("file_a.txt")).unwrap();
        File::create(root.join("file_b.rs")).unwrap();
        File::create(root.join(".hidden")).unwrap();

        let provider = Arc::new(LocalProvider::default());
        let store = Arc::new(MemoryStore::new());
        let tree = TreeCache::new(provider.clone(), true);
        let search = SearchCoordinator::new(provider, store.clone(), 50);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut app = App::new(&root, tree, search, store.clone(), &AppConfig::default(), tx);

        app.tree.load_root(&root).await;
        app.on_tick(Instant::now());
        Harness {
            _dir: dir,
            app,
            store,
            rx,
        }
    }

    fn names(app: &App) -> Vec<String> {
        app.rows.iter().map(|r| r.node.name.clone()).collect()
    }

    async fn tick_until(app: &mut App, mut cond: impl FnMut(&App) -> bool) {
        for _ in 0..200 {
            app.on_tick(Instant::now());
            if cond(app) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    /// Feed the next `RootLoaded` back into the app and pick up the rows.
    async fn settle_root(h: &mut Harness) -> LoadOutcome {
        loop {
            match h.rx.recv().await {
                Some(Event::RootLoaded { path, outcome }) => {
                    h.app.handle_root_loaded(path, outcome);
                    h.app.on_tick(Instant::now());
                    return outcome;
                }
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    }

    async fn file_loaded(h: &mut Harness) {
        loop {
            match h.rx.recv().await {
                Some(Event::FileLoaded { path, result }) => {
                    h.app.handle_file_loaded(path, result);
                    return;
                }
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    }

    fn select_named(app: &mut App, name: &str) {
        app.selected_index = app
            .rows
            .iter()
            .position(|r| r.node.name == name)
            .expect("row present");
    }

    #[tokio::test]
    async fn rows_hide_dotfiles_and_group_directories() {
        let h = setup_app().await;
        assert_eq!(
            names(&h.app),
            vec!["alpha", "beta", "file_a.txt", "file_b.rs"]
        );
    }

    #[tokio::test]
    async fn toggle_hidden_changes_count() {
        let mut h = setup_app().await;
        let without_hidden = h.app.rows.len();
        h.app.toggle_hidden();
        assert!(h.app.rows.len() > without_hidden);
    }

    #[tokio::test]
    async fn selection_moves_and_clamps() {
        let mut h = setup_app().await;
        h.app.select_previous();
        assert_eq!(h.app.selected_index, 0);
        h.app.select_next();
        assert_eq!(h.app.selected_index, 1);
        h.app.select_last();
        assert_eq!(h.app.selected_index, 3);
        h.app.select_next();
        assert_eq!(h.app.selected_index, 3);
        h.app.select_first();
        assert_eq!(h.app.selected_index, 0);
    }

    #[tokio::test]
    async fn scroll_follows_selection() {
        let mut h = setup_app().await;
        h.app.select_last();
        h.app.update_scroll(2);
        assert_eq!(h.app.scroll_offset, 2);
        h.app.select_first();
        h.app.update_scroll(2);
        assert_eq!(h.app.scroll_offset, 0);
    }

    #[tokio::test]
    async fn current_dir_for_directory_and_file() {
        let mut h = setup_app().await;
        assert_eq!(h.app.current_dir(), h.app.root.join("alpha"));
        h.app.select_last();
        assert_eq!(h.app.current_dir(), h.app.root);
    }

    #[tokio::test]
    async fn expand_then_collapse_selected_directory() {
        let mut h = setup_app().await;
        h.app.expand_selected();
        tick_until(&mut h.app, |app| app.rows.len() == 5).await;
        assert_eq!(h.app.rows[1].node.name, "inner.txt");

        h.app.select_next();
        h.app.collapse_selected();
        assert_eq!(h.app.selected_index, 0);
        h.app.collapse_selected();
        tick_until(&mut h.app, |app| app.rows.len() == 4).await;
    }

    #[tokio::test]
    async fn toggle_grouping_persists_preference() {
        let mut h = setup_app().await;
        h.app.toggle_grouping();
        assert!(!h.app.tree.group_directories_first());
        assert_eq!(
            store::get_as::<bool>(h.store.as_ref(), GROUP_DIRECTORIES_FIRST_KEY),
            Some(false)
        );
        h.app.on_tick(Instant::now());
        assert_eq!(
            names(&h.app),
            vec!["alpha", "beta", "file_a.txt", "file_b.rs"]
        );
    }

    #[tokio::test]
    async fn search_reveals_matches_and_settles() {
        let mut h = setup_app().await;
        let mut events = h.app.search.subscribe();
        h.app.search_input.set("needle");
        h.app.submit_search();
        assert!(h.app.detector.is_stage_active(Stage::Searching));

        loop {
            let event = events.recv().await.unwrap();
            let finished = matches!(event, SearchEvent::Finished { .. });
            h.app.handle_search_event(event);
            if finished {
                break;
            }
        }
        assert!(!h.app.detector.is_stage_active(Stage::Searching));

        if h.app.detector.is_stage_active(Stage::Expanding) {
            while let Some(event) = h.rx.recv().await {
                if matches!(event, Event::ExpansionDone) {
                    h.app.handle_expansion_done();
                    break;
                }
            }
        }

        h.app.on_tick(Instant::now());
        assert!(names(&h.app).contains(&"inner.txt".to_string()));
        assert!(!h.app.activity.is_settled());
        h.app.on_tick(Instant::now() + Duration::from_secs(5));
        assert!(h.app.activity.is_settled());
        assert_eq!(h.app.search.history(), vec!["needle"]);
    }

    #[tokio::test]
    async fn events_from_an_older_session_are_ignored() {
        let mut h = setup_app().await;
        let stats = SearchStats::default();
        h.app.handle_search_event(SearchEvent::Started {
            session: 1,
            query: "old".to_string(),
            path: h.app.root.clone(),
        });

        h.app.search_input.set("needle");
        h.app.submit_search();
        // Queued before the new search announced itself.
        h.app.handle_search_event(SearchEvent::Finished {
            session: 1,
            state: SessionState::Completed,
            stats,
        });
        assert!(h.app.detector.is_stage_active(Stage::Searching));

        h.app.handle_search_event(SearchEvent::Started {
            session: 2,
            query: "needle".to_string(),
            path: h.app.root.clone(),
        });
        h.app.handle_search_event(SearchEvent::Failed {
            session: 1,
            message: "late".to_string(),
        });
        assert!(h.app.detector.is_stage_active(Stage::Searching));
        assert!(h.app.status_message.is_none());

        h.app.handle_search_event(SearchEvent::Finished {
            session: 2,
            state: SessionState::Completed,
            stats,
        });
        assert!(!h.app.detector.is_stage_active(Stage::Searching));
    }

    #[tokio::test]
    async fn enter_parent_back_and_forward_move_the_root() {
        let mut h = setup_app().await;
        let top = h.app.root.clone();

        h.app.enter_selected();
        assert_eq!(h.app.root, top.join("alpha"));
        assert_eq!(settle_root(&mut h).await, LoadOutcome::Loaded);
        assert_eq!(names(&h.app), vec!["inner.txt"]);

        h.app.go_parent();
        assert_eq!(h.app.root, top);
        settle_root(&mut h).await;
        assert_eq!(names(&h.app).len(), 4);

        h.app.go_back();
        assert_eq!(h.app.root, top.join("alpha"));
        settle_root(&mut h).await;
        assert_eq!(names(&h.app), vec!["inner.txt"]);

        h.app.go_forward();
        assert_eq!(h.app.root, top);
        settle_root(&mut h).await;
        assert!(!h.app.navigation.can_go_forward());
    }

    #[tokio::test]
    async fn entering_a_file_does_nothing() {
        let mut h = setup_app().await;
        let top = h.app.root.clone();
        select_named(&mut h.app, "file_a.txt");
        h.app.enter_selected();
        assert_eq!(h.app.root, top);
        assert!(!h.app.navigation.can_go_back());
    }

    #[tokio::test]
    async fn typed_path_resolves_against_the_root() {
        let mut h = setup_app().await;
        let top = h.app.root.clone();
        h.app.open_go_to();
        assert_eq!(h.app.dialog_input.input, top.display().to_string());
        h.app.dialog_input.set("alpha/../beta");
        h.app.confirm_dialog();

        assert_eq!(h.app.mode, AppMode::Normal);
        assert_eq!(h.app.root, top.join("beta"));
        assert_eq!(settle_root(&mut h).await, LoadOutcome::Loaded);
        assert!(h.app.rows.is_empty());
    }

    #[tokio::test]
    async fn unreadable_root_falls_back_to_the_previous_one() {
        let mut h = setup_app().await;
        let top = h.app.root.clone();
        h.app.go_to(top.join("missing"));

        assert_eq!(settle_root(&mut h).await, LoadOutcome::Failed);
        assert_eq!(h.app.root, top);
        assert!(h.app.status_message.as_ref().is_some_and(|m| m.is_error));
        assert!(!h.app.navigation.can_go_forward());

        assert_eq!(settle_root(&mut h).await, LoadOutcome::Loaded);
        assert_eq!(names(&h.app).len(), 4);
    }

    #[tokio::test]
    async fn changing_root_drops_search_results() {
        let mut h = setup_app().await;
        h.app
            .search
            .start("needle", SearchOptions::default(), Some(h.app.root.as_path()))
            .await;
        assert!(!h.app.search.highlights().is_empty());

        h.app.enter_selected();
        assert!(h.app.search.highlights().is_empty());
        assert!(h.app.search.session().is_none());
    }

    #[tokio::test]
    async fn file_pane_opens_at_the_first_match() {
        let mut h = setup_app().await;
        let root = h.app.root.clone();
        let content: String = (1..=50)
            .map(|i| if i == 30 { "a needle\n".to_string() } else { format!("line {}\n", i) })
            .collect();
        fs::write(root.join("long.txt"), content).unwrap();
        h.app.tree.load_root(&root).await;
        h.app.on_tick(Instant::now());
        h.app
            .search
            .start("needle", SearchOptions::default(), Some(root.as_path()))
            .await;

        select_named(&mut h.app, "long.txt");
        h.app.open_file_view();
        assert_eq!(h.app.mode, AppMode::Viewer);
        assert_eq!(h.app.file_view.as_ref().unwrap().text, FileText::Loading);

        file_loaded(&mut h).await;
        let view = h.app.file_view.as_ref().unwrap();
        assert_eq!(view.line_count(), 50);
        assert_eq!(view.scroll, 29);

        h.app.scroll_file_view(100);
        assert_eq!(h.app.file_view.as_ref().unwrap().scroll, 49);
        h.app.scroll_file_view_to(true);
        assert_eq!(h.app.file_view.as_ref().unwrap().scroll, 0);

        h.app.close_file_view();
        assert_eq!(h.app.mode, AppMode::Normal);
        assert!(h.app.file_view.is_none());
    }

    #[tokio::test]
    async fn file_pane_reports_read_errors() {
        let mut h = setup_app().await;
        select_named(&mut h.app, "file_b.rs");
        fs::remove_file(h.app.root.join("file_b.rs")).unwrap();

        h.app.open_file_view();
        file_loaded(&mut h).await;
        assert!(matches!(
            h.app.file_view.as_ref().unwrap().text,
            FileText::Failed(_)
        ));
    }

    #[tokio::test]
    async fn file_pane_ignores_directories_and_stale_reads() {
        let mut h = setup_app().await;
        h.app.open_file_view();
        assert!(h.app.file_view.is_none());
        assert_eq!(h.app.mode, AppMode::Normal);

        select_named(&mut h.app, "file_a.txt");
        h.app.open_file_view();
        h.app.handle_file_loaded(h.app.root.join("other.txt"), Ok("x".to_string()));
        assert_eq!(h.app.file_view.as_ref().unwrap().text, FileText::Loading);
    }

    #[tokio::test]
    async fn mouse_toggle_flips_capture() {
        let mut h = setup_app().await;
        assert!(h.app.mouse_enabled);
        h.app.toggle_mouse();
        assert!(!h.app.mouse_enabled);
    }

    #[tokio::test]
    async fn blank_search_does_nothing() {
        let mut h = setup_app().await;
        h.app.open_search();
        h.app.submit_search();
        assert_eq!(h.app.mode, AppMode::Normal);
        assert!(!h.app.detector.is_tracking());
    }

    #[tokio::test]
    async fn option_toggles_are_exclusive() {
        let mut h = setup_app().await;
        h.app.toggle_option(SearchToggle::WholeWord);
        h.app.toggle_option(SearchToggle::Regex);
        assert!(h.app.options.regex());
        assert!(!h.app.options.whole_word());
    }

    #[tokio::test]
    async fn timeout_adjustment_stays_in_range() {
        let mut h = setup_app().await;
        for _ in 0..40 {
            h.app.adjust_timeout(1);
        }
        assert_eq!(h.app.search.timeout_secs(), timeout::MAX_TIMEOUT_SECS);
        for _ in 0..40 {
            h.app.adjust_timeout(-1);
        }
        assert_eq!(h.app.search.timeout_secs(), timeout::MIN_TIMEOUT_SECS);
    }

    #[tokio::test]
    async fn create_file_through_dialog() {
        let mut h = setup_app().await;
        h.app.open_dialog(DialogKind::CreateFile);
        for c in "new.txt".chars() {
            h.app.dialog_input.insert_char(c);
        }
        h.app.confirm_dialog();
        assert_eq!(h.app.mode, AppMode::Normal);

        match h.rx.recv().await {
            Some(Event::OperationComplete { is_error, .. }) => assert!(!is_error),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(h.app.root.join("alpha").join("new.txt").exists());
    }

    #[tokio::test]
    async fn delete_through_dialog() {
        let mut h = setup_app().await;
        h.app.select_last();
        h.app.request_delete();
        assert!(matches!(
            h.app.mode,
            AppMode::Dialog(DialogKind::DeleteConfirm { .. })
        ));
        h.app.confirm_dialog();

        match h.rx.recv().await {
            Some(Event::OperationComplete { is_error, .. }) => assert!(!is_error),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(!h.app.root.join("file_b.rs").exists());
    }

    #[tokio::test]
    async fn history_dialog_fills_search_input() {
        let mut h = setup_app().await;
        h.app
            .search
            .start("needle", SearchOptions::default(), Some(h.app.root.as_path()))
            .await;
        h.app.open_dialog(DialogKind::History);
        h.app.confirm_dialog();
        assert_eq!(h.app.mode, AppMode::Search);
        assert_eq!(h.app.search_input.input, "needle");
    }

    #[tokio::test]
    async fn cancel_with_results_clears_them() {
        let mut h = setup_app().await;
        h.app
            .search
            .start("needle", SearchOptions::default(), Some(h.app.root.as_path()))
            .await;
        assert!(!h.app.search.highlights().is_empty());
        h.app.cancel_search();
        assert!(h.app.search.highlights().is_empty());
    }

    #[tokio::test]
    async fn status_message_expires() {
        let mut h = setup_app().await;
        h.app.set_status_message("fresh".to_string(), false);
        h.app.clear_expired_status(Instant::now());
        assert!(h.app.status_message.is_some());
        h.app.clear_expired_status(Instant::now() + Duration::from_secs(5));
        assert!(h.app.status_message.is_none());
    }

    #[test]
    fn line_input_editing() {
        let mut input = LineInput::default();
        input.insert_char('a');
        input.insert_char('é');
        input.insert_char('c');
        assert_eq!(input.input, "aéc");
        input.move_left();
        input.move_left();
        assert_eq!(input.cursor_position, 1);
        input.move_right();
        input.delete_char();
        assert_eq!(input.input, "ac");
        input.home();
        input.delete_char();
        assert_eq!(input.input, "ac");
        input.end();
        assert_eq!(input.cursor_position, 2);
        assert_eq!(input.split_at_cursor(), ("ac", "", ""));
    }

    #[test]
    fn split_at_cursor_handles_multibyte_chars() {
        let mut input = LineInput::default();
        input.set("aéc");
        input.move_left();
        input.move_left();
        assert_eq!(input.split_at_cursor(), ("a", "é", "c"));
    }

    #[test]
    fn finished_message_mentions_curtailment() {
        let stats = SearchStats {
            files_searched: 10,
            directories_searched: 2,
            total_matches: 4,
        };
        assert!(!finished_message(SessionState::Completed, &stats).contains("stopped"));
        assert!(finished_message(SessionState::Curtailed, &stats).contains("stopped early"));
    }
}
