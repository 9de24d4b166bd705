use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Type of filesystem node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

/// A file or directory entry in the mirrored tree.
///
/// `path` is the unique key. Nodes are handed out by value; the tree cache
/// keeps the authoritative copy of every children list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub path: PathBuf,
    pub kind: NodeKind,
    pub hidden: bool,
    pub size: u64,
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
}

impl Node {
    /// Create a node with no size or timestamps, deriving name and hidden flag from `path`.
    pub fn new(path: impl Into<PathBuf>, kind: NodeKind) -> Self {
        let path = path.into();
        let name = display_name(&path);
        let hidden = name.starts_with('.');
        Self {
            name,
            path,
            kind,
            hidden,
            size: 0,
            created: None,
            modified: None,
        }
    }

    /// Build a node from already-fetched metadata.
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        let kind = if metadata.is_dir() {
            NodeKind::Directory
        } else {
            NodeKind::File
        };
        Self {
            size: metadata.len(),
            created: metadata.created().ok(),
            modified: metadata.modified().ok(),
            ..Self::new(path, kind)
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// Final path component, or the whole path for roots like `/`.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::TempDir;

    #[test]
    fn node_new_derives_name_and_hidden() {
        let node = Node::new("/home/user/.bashrc", NodeKind::File);
        assert_eq!(node.name, ".bashrc");
        assert!(node.hidden);
        assert!(!node.is_dir());
    }

    #[test]
    fn node_new_root_uses_full_path() {
        let node = Node::new("/", NodeKind::Directory);
        assert_eq!(node.name, "/");
        assert!(node.is_dir());
    }

    #[test]
    fn node_from_metadata_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "hello").unwrap();
        let node = Node::from_metadata(&path, &fs::metadata(&path).unwrap());
        assert_eq!(node.kind, NodeKind::File);
        assert_eq!(node.size, 5);
        assert!(node.modified.is_some());
    }

    #[test]
    fn node_from_metadata_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub");
        fs::create_dir(&path).unwrap();
        File::create(path.join("x")).unwrap();
        let node = Node::from_metadata(&path, &fs::metadata(&path).unwrap());
        assert_eq!(node.kind, NodeKind::Directory);
        assert_eq!(node.name, "sub");
    }

    #[test]
    fn node_kind_serializes_lowercase() {
        let json = serde_json::to_string(&NodeKind::Directory).unwrap();
        assert_eq!(json, "\"directory\"");
    }
}
