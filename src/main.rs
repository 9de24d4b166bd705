mod app;
mod components;
mod event;
mod handler;
mod theme;
mod tui;
mod ui;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::sync::mpsc;

use fm_search::config::{AppConfig, GeneralConfig, LogConfig, SearchConfig, WatcherConfig};
use fm_search::error::{AppError, Result};
use fm_search::fs::tree::{LoadOutcome, TreeCache};
use fm_search::logging;
use fm_search::provider::{FsProvider, LocalProvider};
use fm_search::search::coordinator::SearchCoordinator;
use fm_search::store::{self, JsonFileStore, KeyValueStore, MemoryStore, GROUP_DIRECTORIES_FIRST_KEY};

use crate::app::App;
use crate::event::{forward_fs_events, forward_search_events, Event, EventHandler};
use crate::tui::{install_panic_hook, Tui};

/// A terminal file manager with content search.
#[derive(Parser, Debug)]
#[command(name = "fm", version, about)]
struct Cli {
    /// Root path to display (defaults to the configured path or the current directory)
    path: Option<PathBuf>,

    /// Disable filesystem watcher (auto-refresh)
    #[arg(long)]
    no_watcher: bool,

    /// Show hidden files
    #[arg(long)]
    hidden: bool,

    /// Disable mouse capture
    #[arg(long)]
    no_mouse: bool,

    /// Search timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Path to a config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides the config file)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Partial config holding only what the flags set.
    fn overrides(&self) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                show_hidden: self.hidden.then_some(true),
                mouse: self.no_mouse.then_some(false),
                ..Default::default()
            },
            search: SearchConfig {
                default_timeout_secs: self.timeout,
                ..Default::default()
            },
            watcher: WatcherConfig {
                enabled: self.no_watcher.then_some(false),
                ..Default::default()
            },
            log: LogConfig {
                level: self.log_level.clone(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn open_store() -> Arc<dyn KeyValueStore> {
    match JsonFileStore::default_path() {
        Some(path) => Arc::new(JsonFileStore::open(path)),
        None => {
            tracing::warn!("no data directory, preferences will not persist");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Watch `root` and forward its changes. Returns the watched root, or
/// `None` with the watcher switched off when watching is unavailable.
fn start_watch(
    provider: &LocalProvider,
    root: &Path,
    app: &mut App,
    event_tx: &mpsc::UnboundedSender<Event>,
) -> Option<PathBuf> {
    match provider.watch(root) {
        Ok(rx) => {
            provider.set_watching(app.watcher_active);
            forward_fs_events(rx, event_tx.clone());
            Some(root.to_path_buf())
        }
        Err(e) => {
            tracing::warn!(error = %e, "watcher unavailable");
            app.watcher_active = false;
            app.set_status_message(format!("⚠ Watcher unavailable: {}", e), true);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()));

    logging::init(config.log_level(), config.log_file().as_deref())?;

    let requested = cli
        .path
        .clone()
        .or_else(|| config.general.default_path.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let path = requested
        .canonicalize()
        .map_err(|_| AppError::InvalidPath(format!("{} does not exist", requested.display())))?;

    tracing::info!(root = %path.display(), "starting");

    let store = open_store();
    let group_dirs_first = store::get_as::<bool>(store.as_ref(), GROUP_DIRECTORIES_FIRST_KEY)
        .unwrap_or_else(|| config.dirs_first());

    let provider = Arc::new(
        LocalProvider::new(config.watcher_ignore()).with_watch_debounce(config.watcher_debounce()),
    );
    let tree = TreeCache::new(provider.clone(), group_dirs_first);
    let search = SearchCoordinator::new(provider.clone(), store.clone(), config.history_len());

    install_panic_hook();

    let mut tui = Tui::new(config.mouse_enabled())?;
    let mut events = EventHandler::new(config.poll_interval());
    let event_tx = events.sender();

    forward_search_events(search.subscribe(), event_tx.clone());

    let mut app = App::new(&path, tree.clone(), search, store, &config, event_tx.clone());

    // Started even when disabled so it can be resumed at runtime.
    let mut watched_root = start_watch(&provider, &path, &mut app, &event_tx);

    if tree.load_root(&path).await == LoadOutcome::Failed {
        let message = tree
            .error()
            .map_or_else(|| "Failed to load directory".to_string(), |e| e.message);
        app.set_status_message(message, true);
    }
    app.on_tick(Instant::now());

    let theme = theme::dark_theme();

    loop {
        tui.draw(&mut app, &theme)?;

        match events.next().await? {
            Event::Key(key) => handler::handle_key_event(&mut app, key),
            Event::Mouse(mouse) => handler::handle_mouse_event(&mut app, mouse),
            Event::Tick => app.on_tick(Instant::now()),
            Event::Resize(_, _) => {}
            Event::Search(event) => app.handle_search_event(event),
            Event::FsChange(event) => app.handle_fs_change(event),
            Event::ExpansionDone => app.handle_expansion_done(),
            Event::OperationComplete { message, is_error } => {
                app.handle_operation_complete(message, is_error)
            }
            Event::RootLoaded { path, outcome } => app.handle_root_loaded(path, outcome),
            Event::FileLoaded { path, result } => app.handle_file_loaded(path, result),
        }

        // Follow navigation outside the watched tree.
        if let Some(ref root) = watched_root {
            if !app.root.starts_with(root) {
                provider.stop_watching();
                let root = app.root.clone();
                watched_root = start_watch(&provider, &root, &mut app, &event_tx);
            }
        }

        // Sync watcher pause/resume state
        if watched_root.is_some() && app.watcher_active != provider.is_watching() {
            provider.set_watching(app.watcher_active);
        }

        if app.should_quit {
            break;
        }
    }

    tui.restore()?;
    tracing::info!("exiting");
    Ok(())
}
