use std::path::PathBuf;
use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, MouseEvent};
use tokio::sync::{broadcast, mpsc};

use fm_search::error::{AppError, Result};
use fm_search::fs::tree::LoadOutcome;
use fm_search::provider::FsEvent;
use fm_search::search::coordinator::SearchEvent;

/// Application events.
#[derive(Debug)]
pub enum Event {
    /// A key press event.
    Key(KeyEvent),
    /// A mouse event.
    Mouse(MouseEvent),
    /// A periodic tick for rendering.
    Tick,
    /// Terminal resize event.
    #[allow(dead_code)]
    Resize(u16, u16),
    /// Search lifecycle notification.
    Search(SearchEvent),
    /// Filesystem change detected by the watcher.
    FsChange(FsEvent),
    /// Auto-expansion of matched ancestors has drained its loads.
    ExpansionDone,
    /// A create/delete finished: message and whether it failed.
    OperationComplete { message: String, is_error: bool },
    /// The listing of a new root arrived.
    RootLoaded { path: PathBuf, outcome: LoadOutcome },
    /// Content for the file pane, or the read error.
    FileLoaded {
        path: PathBuf,
        result: std::result::Result<String, String>,
    },
}

/// Async event handler that polls crossterm events and forwards them via a channel.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    /// Create a new EventHandler with the given tick rate.
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::spawn(async move {
            loop {
                if event::poll(tick_rate).unwrap_or(false) {
                    let forwarded = match event::read() {
                        Ok(CrosstermEvent::Key(key)) => event_tx.send(Event::Key(key)),
                        Ok(CrosstermEvent::Mouse(mouse)) => event_tx.send(Event::Mouse(mouse)),
                        Ok(CrosstermEvent::Resize(w, h)) => event_tx.send(Event::Resize(w, h)),
                        _ => Ok(()),
                    };
                    if forwarded.is_err() {
                        break;
                    }
                } else if event_tx.send(Event::Tick).is_err() {
                    break;
                }
            }
        });

        Self { rx, tx }
    }

    /// Get a sender clone for async tasks to report back.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Receive the next event (blocks until available).
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| AppError::Terminal("Event channel closed".into()))
    }
}

/// Forward coordinator notifications into the event loop.
pub fn forward_search_events(
    mut rx: broadcast::Receiver<SearchEvent>,
    tx: mpsc::UnboundedSender<Event>,
) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if tx.send(Event::Search(event)).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "search events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Forward watcher notifications into the event loop.
pub fn forward_fs_events(mut rx: mpsc::UnboundedReceiver<FsEvent>, tx: mpsc::UnboundedSender<Event>) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if tx.send(Event::FsChange(event)).is_err() {
                break;
            }
        }
    });
}
