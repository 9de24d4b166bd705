//! Interfaces to the external filesystem and search services.
//!
//! The tree cache and the search coordinator only ever talk to these traits;
//! `LocalProvider` is the bundled implementation on top of the local disk.

pub mod local;
pub mod pattern;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::error::ProviderResult;
use crate::fs::node::{Node, NodeKind};
use crate::search::types::{EarlyResults, SearchProgress, SearchRequest, SearchResponse};

pub use local::LocalProvider;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsEventKind {
    Created,
    Deleted,
    Modified,
    Renamed,
}

/// Whether a change notification concerns a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsTarget {
    File,
    Folder,
}

/// A push notification from a filesystem watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub target: FsTarget,
    pub path: PathBuf,
}

impl FsEvent {
    pub fn new(kind: FsEventKind, target: FsTarget, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            target,
            path: path.into(),
        }
    }

    /// Channel name used by the watch service, e.g. `folder-created`.
    pub fn channel_name(&self) -> &'static str {
        match (self.target, self.kind) {
            (FsTarget::File, FsEventKind::Created) => "file-created",
            (FsTarget::File, FsEventKind::Deleted) => "file-deleted",
            (FsTarget::File, FsEventKind::Modified) => "file-modified",
            (FsTarget::File, FsEventKind::Renamed) => "file-renamed",
            (FsTarget::Folder, FsEventKind::Created) => "folder-created",
            (FsTarget::Folder, FsEventKind::Deleted) => "folder-deleted",
            (FsTarget::Folder, FsEventKind::Modified) => "folder-modified",
            (FsTarget::Folder, FsEventKind::Renamed) => "folder-renamed",
        }
    }
}

/// Directory listing and mutation.
#[async_trait]
pub trait FsProvider: Send + Sync {
    /// Immediate children of `path`, in no particular order.
    async fn list_directory(&self, path: &Path) -> ProviderResult<Vec<Node>>;

    async fn delete_file(&self, path: &Path) -> ProviderResult<()>;

    async fn delete_directory(&self, path: &Path) -> ProviderResult<()>;

    /// Create `name` under `parent`; returns the new item's path.
    async fn create_item(&self, parent: &Path, name: &str, kind: NodeKind)
        -> ProviderResult<PathBuf>;

    async fn read_file(&self, path: &Path) -> ProviderResult<String>;

    /// Start watching `path` recursively. Events arrive on the returned
    /// channel until the provider is dropped.
    fn watch(&self, path: &Path) -> ProviderResult<mpsc::UnboundedReceiver<FsEvent>>;
}

/// Push channels a search provider publishes while a search runs.
#[derive(Debug)]
pub struct SearchChannels {
    pub progress: broadcast::Receiver<SearchProgress>,
    pub early_results: broadcast::Receiver<EarlyResults>,
}

/// Content search.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run a search to completion (or curtailment) and return the final response.
    async fn search(&self, request: SearchRequest) -> ProviderResult<SearchResponse>;

    /// Ask any running search to stop. Best effort.
    async fn cancel(&self) -> ProviderResult<()>;

    /// Subscribe to progress and early-result pushes.
    fn subscribe(&self) -> SearchChannels;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_follow_target_and_kind() {
        let e = FsEvent::new(FsEventKind::Created, FsTarget::Folder, "/a/b");
        assert_eq!(e.channel_name(), "folder-created");
        let e = FsEvent::new(FsEventKind::Deleted, FsTarget::File, "/a/b");
        assert_eq!(e.channel_name(), "file-deleted");
        let e = FsEvent::new(FsEventKind::Renamed, FsTarget::File, "/a/b");
        assert_eq!(e.channel_name(), "file-renamed");
    }

    #[test]
    fn fs_event_serializes_lowercase() {
        let e = FsEvent::new(FsEventKind::Modified, FsTarget::File, "/x");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "modified");
        assert_eq!(json["target"], "file");
        assert_eq!(json["path"], "/x");
    }
}
