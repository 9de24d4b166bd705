pub mod navigation;
pub mod node;
pub mod sort;
pub mod tree;
pub mod watcher;
