//! Lifecycle of the single active content search.
//!
//! ```text
//! Idle ─start─▶ Running ─final response─▶ Completed | Curtailed
//!                  │ ─cancel───────────▶ Cancelled
//!                  │ ─watchdog─────────▶ Curtailed
//!                  └ ─provider error───▶ Idle
//! ```
//!
//! Every session gets a fresh id. Anything that arrives for an id that is no
//! longer the running session (late final responses, progress from a
//! superseded search) is dropped.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::error::ProviderResult;
use crate::provider::{SearchChannels, SearchProvider};
use crate::search::highlight::{HighlightAggregator, HighlightMap};
use crate::search::history::SearchHistory;
use crate::search::timeout::{self, DEFAULT_TIMEOUT_SECS};
use crate::search::types::{
    EarlyResults, SearchOptions, SearchProgress, SearchRequest, SearchResponse, SearchResult,
    SearchStats,
};
use crate::store::KeyValueStore;

/// Extra time the provider gets past its own timeout before the client gives up.
pub const WATCHDOG_GRACE: Duration = Duration::from_secs(2);

const EVENT_CAPACITY: usize = 256;

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Curtailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The user cancelled.
    User,
    /// A newer search replaced this one.
    Superseded,
    /// The provider reported the search as cancelled.
    Provider,
}

/// Notifications published to the rest of the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    Started {
        session: SessionId,
        query: String,
        path: PathBuf,
    },
    Progress {
        session: SessionId,
        stats: SearchStats,
        processing_time_ms: u64,
    },
    /// The result set (and highlight map) changed.
    ResultsUpdated { session: SessionId, files: usize },
    /// Terminal state reached with results: `Completed` or `Curtailed`.
    Finished {
        session: SessionId,
        state: SessionState,
        stats: SearchStats,
    },
    Cancelled {
        session: SessionId,
        reason: CancelReason,
    },
    Failed { session: SessionId, message: String },
    Cleared,
}

impl SearchEvent {
    /// Session the event belongs to; `Cleared` belongs to none.
    pub fn session(&self) -> Option<SessionId> {
        match self {
            Self::Started { session, .. }
            | Self::Progress { session, .. }
            | Self::ResultsUpdated { session, .. }
            | Self::Finished { session, .. }
            | Self::Cancelled { session, .. }
            | Self::Failed { session, .. } => Some(*session),
            Self::Cleared => None,
        }
    }
}

/// How a call to [`SearchCoordinator::start`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Empty query or no search path; nothing was sent.
    Ignored,
    Completed,
    Curtailed,
    Cancelled,
    /// The session was cancelled or superseded before its response arrived.
    Stale,
    Failed,
}

/// One search run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSession {
    pub id: SessionId,
    pub query: String,
    pub options: SearchOptions,
    pub path: PathBuf,
    pub timeout_secs: u64,
    pub state: SessionState,
    pub stats: SearchStats,
    pub processing_time_ms: u64,
}

struct CoordinatorState {
    session: Option<SearchSession>,
    results: Vec<SearchResult>,
    highlights: HighlightAggregator,
    history: SearchHistory,
    timeout_secs: u64,
    forwarders: Vec<JoinHandle<()>>,
    watchdog: Option<JoinHandle<()>>,
}

impl CoordinatorState {
    fn running_mut(&mut self, id: SessionId) -> Option<&mut SearchSession> {
        self.session
            .as_mut()
            .filter(|s| s.id == id && s.state == SessionState::Running)
    }

    fn running_id(&self) -> Option<SessionId> {
        self.session
            .as_ref()
            .filter(|s| s.state == SessionState::Running)
            .map(|s| s.id)
    }

    /// Stop the push-channel forwarders and the watchdog.
    fn teardown(&mut self, abort_watchdog: bool) {
        for task in self.forwarders.drain(..) {
            task.abort();
        }
        if let Some(watchdog) = self.watchdog.take() {
            if abort_watchdog {
                watchdog.abort();
            }
        }
    }
}

struct Inner {
    provider: Arc<dyn SearchProvider>,
    store: Arc<dyn KeyValueStore>,
    state: Mutex<CoordinatorState>,
    next_id: AtomicU64,
    events: broadcast::Sender<SearchEvent>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .teardown(true);
    }
}

#[derive(Clone)]
pub struct SearchCoordinator {
    inner: Arc<Inner>,
}

impl SearchCoordinator {
    /// Create a coordinator, loading history from `store`.
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        store: Arc<dyn KeyValueStore>,
        history_len: usize,
    ) -> Self {
        let history = SearchHistory::load(store.as_ref(), history_len);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                provider,
                store,
                state: Mutex::new(CoordinatorState {
                    session: None,
                    results: Vec::new(),
                    highlights: HighlightAggregator::new(),
                    history,
                    timeout_secs: DEFAULT_TIMEOUT_SECS,
                    forwarders: Vec::new(),
                    watchdog: None,
                }),
                next_id: AtomicU64::new(0),
                events,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SearchEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SearchEvent> {
        self.inner.events.subscribe()
    }

    // ── Session lifecycle ───────────────────────────────────────────────────

    /// Run a search for `query` under `path` and wait for it to end.
    ///
    /// A running search is cancelled first. Returns [`SearchOutcome::Stale`]
    /// if this session was itself cancelled or superseded before the
    /// provider answered.
    pub async fn start(
        &self,
        query: &str,
        options: SearchOptions,
        path: Option<&Path>,
    ) -> SearchOutcome {
        let Some(path) = path else {
            return SearchOutcome::Ignored;
        };
        if query.trim().is_empty() {
            return SearchOutcome::Ignored;
        }

        if self.cancel_running(CancelReason::Superseded) {
            self.abort_provider().await;
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        // Subscribe before issuing the request so no early push is missed.
        let channels = self.inner.provider.subscribe();

        let timeout_secs = {
            let mut state = self.state();
            let timeout_secs = state.timeout_secs;
            state.session = Some(SearchSession {
                id,
                query: query.to_string(),
                options,
                path: path.to_path_buf(),
                timeout_secs,
                state: SessionState::Running,
                stats: SearchStats::default(),
                processing_time_ms: 0,
            });
            state.results.clear();
            state.highlights.clear();
            state.forwarders = self.spawn_forwarders(id, channels);
            state.watchdog = Some(self.spawn_watchdog(id, timeout_secs));
            timeout_secs
        };

        tracing::info!(session = id, query, path = %path.display(), options = %options.label(), "search started");
        self.emit(SearchEvent::Started {
            session: id,
            query: query.to_string(),
            path: path.to_path_buf(),
        });

        let request = SearchRequest {
            search_id: id,
            path: path.to_path_buf(),
            query: query.to_string(),
            options,
            timeout_secs,
        };
        let result = self.inner.provider.search(request).await;
        self.on_final_response(id, result)
    }

    /// Apply the provider's final answer for session `id`.
    pub fn on_final_response(
        &self,
        id: SessionId,
        result: ProviderResult<SearchResponse>,
    ) -> SearchOutcome {
        let mut state = self.state();
        if state.running_mut(id).is_none() {
            tracing::debug!(session = id, "discarding stale search response");
            return SearchOutcome::Stale;
        }
        state.teardown(true);

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(session = id, error = %e, "search failed");
                if let Some(session) = state.session.as_mut() {
                    session.state = SessionState::Idle;
                }
                state.results.clear();
                state.highlights.clear();
                drop(state);
                self.emit(SearchEvent::Failed {
                    session: id,
                    message: e.to_string(),
                });
                return SearchOutcome::Failed;
            }
        };

        if response.cancelled {
            if let Some(session) = state.session.as_mut() {
                session.state = SessionState::Cancelled;
            }
            state.results.clear();
            state.highlights.clear();
            drop(state);
            self.emit(SearchEvent::Cancelled {
                session: id,
                reason: CancelReason::Provider,
            });
            return SearchOutcome::Cancelled;
        }

        let terminal = if response.curtailed {
            SessionState::Curtailed
        } else {
            SessionState::Completed
        };
        let mut results = response.results;
        for result in &mut results {
            result.normalize();
        }
        state.highlights.recompute(&results);
        state.results = results;
        let files = state.results.len();

        let (query, stats) = match state.session.as_mut() {
            Some(session) => {
                session.state = terminal;
                session.stats.merge_max(&response.stats);
                session.processing_time_ms = response.processing_time_ms;
                (session.query.clone(), session.stats)
            }
            None => return SearchOutcome::Stale,
        };
        let history = self.record_history(&mut state, &query);
        drop(state);

        history.save(self.inner.store.as_ref());
        tracing::info!(
            session = id,
            files,
            matches = stats.total_matches,
            curtailed = response.curtailed,
            "search finished"
        );
        self.emit(SearchEvent::ResultsUpdated { session: id, files });
        self.emit(SearchEvent::Finished {
            session: id,
            state: terminal,
            stats,
        });

        match terminal {
            SessionState::Curtailed => SearchOutcome::Curtailed,
            _ => SearchOutcome::Completed,
        }
    }

    fn record_history(&self, state: &mut CoordinatorState, query: &str) -> SearchHistory {
        state.history.push(query);
        state.history.clone()
    }

    /// Merge a progress update into session `id`'s counters.
    ///
    /// Counters take the elementwise maximum, so updates that arrive out of
    /// order never move them backwards. Updates tagged for another search
    /// are dropped. Returns whether the update applied.
    pub fn on_progress(&self, id: SessionId, update: &SearchProgress) -> bool {
        if !update.belongs_to(id) {
            tracing::debug!(session = id, tagged = ?update.search_id, "dropping foreign progress");
            return false;
        }
        let (stats, processing_time_ms) = {
            let mut state = self.state();
            let Some(session) = state.running_mut(id) else {
                return false;
            };
            session.stats.merge_max(&update.stats());
            session.processing_time_ms = update.processing_time_ms;
            (session.stats, session.processing_time_ms)
        };
        self.emit(SearchEvent::Progress {
            session: id,
            stats,
            processing_time_ms,
        });
        true
    }

    /// Replace session `id`'s provisional results with a cumulative batch.
    pub fn on_early_results(&self, id: SessionId, early: EarlyResults) -> bool {
        if !early.belongs_to(id) {
            tracing::debug!(session = id, tagged = ?early.search_id, "dropping foreign early results");
            return false;
        }
        let files = {
            let mut state = self.state();
            let Some(session) = state.running_mut(id) else {
                return false;
            };
            session.stats.merge_max(&early.stats);
            session.processing_time_ms = session.processing_time_ms.max(early.processing_time_ms);

            let mut results = early.results;
            for result in &mut results {
                result.normalize();
            }
            state.highlights.recompute(&results);
            state.results = results;
            state.results.len()
        };
        self.emit(SearchEvent::ResultsUpdated { session: id, files });
        true
    }

    /// Cancel the running session on the client side only.
    ///
    /// Results and highlights are cleared before this returns. Returns
    /// whether a session was running.
    pub fn cancel_local(&self) -> bool {
        self.cancel_running(CancelReason::User)
    }

    /// Cancel the running session, then ask the provider to stop its work.
    pub async fn cancel(&self) -> bool {
        if !self.cancel_local() {
            return false;
        }
        self.abort_provider().await;
        true
    }

    /// Ask the provider to stop whatever it is running. Failures are logged.
    pub async fn abort_provider(&self) {
        if let Err(e) = self.inner.provider.cancel().await {
            tracing::warn!(error = %e, "provider cancel failed");
        }
    }

    fn cancel_running(&self, reason: CancelReason) -> bool {
        let id = {
            let mut state = self.state();
            let Some(id) = state.running_id() else {
                return false;
            };
            state.teardown(true);
            if let Some(session) = state.session.as_mut() {
                session.state = SessionState::Cancelled;
            }
            state.results.clear();
            state.highlights.clear();
            id
        };
        tracing::info!(session = id, ?reason, "search cancelled");
        self.emit(SearchEvent::Cancelled {
            session: id,
            reason,
        });
        true
    }

    /// Give up on session `id` after its deadline: keep whatever early
    /// results arrived and mark it curtailed. Returns whether it applied.
    fn curtail(&self, id: SessionId) -> bool {
        let (stats, files, history) = {
            let mut state = self.state();
            let Some(session) = state.running_mut(id) else {
                return false;
            };
            session.state = SessionState::Curtailed;
            let stats = session.stats;
            let query = session.query.clone();
            // The watchdog is the caller; detach rather than abort it.
            state.teardown(false);
            let history = self.record_history(&mut state, &query);
            (stats, state.results.len(), history)
        };
        tracing::warn!(session = id, files, "search timed out on the client");
        history.save(self.inner.store.as_ref());

        self.emit(SearchEvent::Finished {
            session: id,
            state: SessionState::Curtailed,
            stats,
        });
        true
    }

    /// Drop results and highlights, cancelling a running search first.
    pub fn clear(&self) {
        self.cancel_local();
        {
            let mut state = self.state();
            state.results.clear();
            state.highlights.clear();
            state.session = None;
        }
        self.emit(SearchEvent::Cleared);
    }

    // ── Background tasks ────────────────────────────────────────────────────

    fn spawn_forwarders(&self, id: SessionId, channels: SearchChannels) -> Vec<JoinHandle<()>> {
        let SearchChannels {
            mut progress,
            mut early_results,
        } = channels;

        let weak = Arc::downgrade(&self.inner);
        let progress_task = tokio::spawn(async move {
            while let Some(update) = next_message(&mut progress, id).await {
                let Some(coordinator) = upgrade(&weak) else {
                    break;
                };
                coordinator.on_progress(id, &update);
            }
        });

        let weak = Arc::downgrade(&self.inner);
        let early_task = tokio::spawn(async move {
            while let Some(early) = next_message(&mut early_results, id).await {
                let Some(coordinator) = upgrade(&weak) else {
                    break;
                };
                coordinator.on_early_results(id, early);
            }
        });

        vec![progress_task, early_task]
    }

    fn spawn_watchdog(&self, id: SessionId, timeout_secs: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let deadline = Duration::from_secs(timeout_secs) + WATCHDOG_GRACE;
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            let Some(coordinator) = upgrade(&weak) else {
                return;
            };
            if coordinator.curtail(id) {
                coordinator.abort_provider().await;
            }
        })
    }

    // ── Settings and read access ────────────────────────────────────────────

    pub fn timeout_secs(&self) -> u64 {
        self.state().timeout_secs
    }

    /// Set the timeout for future searches, clamped to the valid range.
    pub fn set_timeout_secs(&self, secs: u64) {
        self.state().timeout_secs = secs.clamp(timeout::MIN_TIMEOUT_SECS, timeout::MAX_TIMEOUT_SECS);
    }

    pub fn session(&self) -> Option<SearchSession> {
        self.state().session.clone()
    }

    pub fn session_state(&self) -> SessionState {
        self.state()
            .session
            .as_ref()
            .map_or(SessionState::Idle, |s| s.state)
    }

    pub fn is_running(&self) -> bool {
        self.session_state() == SessionState::Running
    }

    pub fn stats(&self) -> SearchStats {
        self.state()
            .session
            .as_ref()
            .map(|s| s.stats)
            .unwrap_or_default()
    }

    pub fn results(&self) -> Vec<SearchResult> {
        self.state().results.clone()
    }

    pub fn highlights(&self) -> HighlightMap {
        self.state().highlights.map().clone()
    }

    /// Flip the UI-local disclosure flag of a highlighted path.
    pub fn toggle_highlight_expanded(&self, path: &Path) -> Option<bool> {
        self.state().highlights.toggle_expanded(path)
    }

    pub fn history(&self) -> Vec<String> {
        self.state().history.entries().to_vec()
    }

    pub fn clear_history(&self) {
        let history = {
            let mut state = self.state();
            state.history.clear();
            state.history.clone()
        };
        history.save(self.inner.store.as_ref());
    }
}

fn upgrade(weak: &Weak<Inner>) -> Option<SearchCoordinator> {
    weak.upgrade().map(|inner| SearchCoordinator { inner })
}

/// Next message from a provider channel; `None` once it closes.
async fn next_message<T: Clone>(rx: &mut broadcast::Receiver<T>, id: SessionId) -> Option<T> {
    loop {
        match rx.recv().await {
            Ok(message) => return Some(message),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(session = id, skipped, "search channel lagged");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}
