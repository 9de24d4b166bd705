//! Per-path match counts derived from a flat result list.
//!
//! Every matched file contributes its count to itself and to each ancestor
//! directory, so a collapsed directory can still advertise "N matches below".
//! The map is rebuilt from scratch whenever the result set changes and never
//! touches the tree's real expansion state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::search::types::SearchResult;

/// Highlight annotation for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightedPath {
    pub path: PathBuf,
    /// Matches in this path and everything below it.
    pub match_count: u64,
    /// UI-local disclosure flag, independent of the tree's expansion set.
    pub expanded: bool,
}

/// Highlight entries keyed by path. Only paths with at least one match are stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightMap {
    entries: BTreeMap<PathBuf, HighlightedPath>,
    files: BTreeSet<PathBuf>,
}

impl HighlightMap {
    /// Aggregate `results` into a fresh map.
    pub fn from_results(results: &[SearchResult]) -> Self {
        let mut map = Self::default();

        for result in results {
            let count = result.match_count();
            if count == 0 {
                continue;
            }
            map.files.insert(result.path.clone());
            map.add(&result.path, count);

            for ancestor in result.path.ancestors().skip(1) {
                if is_tree_root_sentinel(ancestor) {
                    break;
                }
                map.add(ancestor, count);
            }
        }

        map
    }

    fn add(&mut self, path: &Path, count: u64) {
        self.entries
            .entry(path.to_path_buf())
            .or_insert_with(|| HighlightedPath {
                path: path.to_path_buf(),
                match_count: 0,
                expanded: false,
            })
            .match_count += count;
    }

    pub fn get(&self, path: &Path) -> Option<&HighlightedPath> {
        self.entries.get(path)
    }

    pub fn match_count(&self, path: &Path) -> u64 {
        self.entries.get(path).map_or(0, |h| h.match_count)
    }

    /// Flip the UI-local `expanded` flag. Returns the new value, or `None`
    /// if the path has no highlight.
    pub fn toggle_expanded(&mut self, path: &Path) -> Option<bool> {
        let entry = self.entries.get_mut(path)?;
        entry.expanded = !entry.expanded;
        Some(entry.expanded)
    }

    /// Entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = &HighlightedPath> {
        self.entries.values()
    }

    /// Paths of the files that matched directly.
    pub fn matched_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The filesystem root (or an empty relative prefix) ends the ancestor walk.
fn is_tree_root_sentinel(path: &Path) -> bool {
    path.as_os_str().is_empty() || path.parent().is_none()
}

/// Timing of the last aggregation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationStats {
    pub elapsed: Duration,
    pub total_nodes: usize,
}

/// Owns the current highlight map and rebuilds it on every result-set change.
#[derive(Debug, Default)]
pub struct HighlightAggregator {
    map: HighlightMap,
    last_run: AggregationStats,
}

impl HighlightAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the map with one computed from `results`.
    pub fn recompute(&mut self, results: &[SearchResult]) {
        let started = Instant::now();
        self.map = HighlightMap::from_results(results);
        self.last_run = AggregationStats {
            elapsed: started.elapsed(),
            total_nodes: self.map.len(),
        };
        tracing::debug!(
            files = results.len(),
            nodes = self.map.len(),
            "highlight map rebuilt"
        );
    }

    pub fn clear(&mut self) {
        self.map = HighlightMap::default();
        self.last_run = AggregationStats::default();
    }

    pub fn map(&self) -> &HighlightMap {
        &self.map
    }

    pub fn toggle_expanded(&mut self, path: &Path) -> Option<bool> {
        self.map.toggle_expanded(path)
    }

    pub fn last_run(&self) -> AggregationStats {
        self.last_run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::types::Match;

    fn result(path: &str, ranges_per_line: &[usize]) -> SearchResult {
        SearchResult {
            path: path.into(),
            matches: ranges_per_line
                .iter()
                .enumerate()
                .map(|(i, &n)| Match {
                    line: i + 1,
                    content: "x".repeat(n * 2),
                    ranges: (0..n).map(|k| [k * 2, k * 2 + 1]).collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn counts_propagate_to_ancestors() {
        let results = vec![result("/a/b/file1", &[2, 1]), result("/a/c/file2", &[3])];
        let map = HighlightMap::from_results(&results);

        assert_eq!(map.match_count(Path::new("/a")), 6);
        assert_eq!(map.match_count(Path::new("/a/b")), 3);
        assert_eq!(map.match_count(Path::new("/a/b/file1")), 3);
        assert_eq!(map.match_count(Path::new("/a/c")), 3);
        assert_eq!(map.match_count(Path::new("/a/c/file2")), 3);
        assert_eq!(map.len(), 5);
    }

    #[test]
    fn filesystem_root_is_not_stored() {
        let map = HighlightMap::from_results(&[result("/a/file", &[1])]);
        assert!(map.get(Path::new("/")).is_none());
    }

    #[test]
    fn relative_paths_stop_at_empty_prefix() {
        let map = HighlightMap::from_results(&[result("proj/src/lib.rs", &[1])]);
        assert_eq!(map.match_count(Path::new("proj")), 1);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn zero_match_results_are_skipped() {
        let map = HighlightMap::from_results(&[result("/a/empty", &[]), result("/b/x", &[0])]);
        assert!(map.is_empty());
        assert_eq!(map.matched_files().count(), 0);
    }

    #[test]
    fn entries_start_collapsed_and_toggle_locally() {
        let mut map = HighlightMap::from_results(&[result("/a/b/f", &[1])]);
        assert!(map.iter().all(|h| !h.expanded));
        assert_eq!(map.toggle_expanded(Path::new("/a/b")), Some(true));
        assert_eq!(map.toggle_expanded(Path::new("/a/b")), Some(false));
        assert_eq!(map.toggle_expanded(Path::new("/nope")), None);
    }

    #[test]
    fn matched_files_lists_only_direct_hits() {
        let map = HighlightMap::from_results(&[result("/a/b/f", &[1]), result("/a/g", &[1])]);
        let files: Vec<_> = map.matched_files().cloned().collect();
        assert_eq!(files, vec![PathBuf::from("/a/b/f"), PathBuf::from("/a/g")]);
    }

    #[test]
    fn aggregator_recompute_replaces_wholesale() {
        let mut agg = HighlightAggregator::new();
        agg.recompute(&[result("/a/one", &[1])]);
        agg.toggle_expanded(Path::new("/a"));
        agg.recompute(&[result("/b/two", &[2])]);

        assert!(agg.map().get(Path::new("/a")).is_none());
        assert_eq!(agg.map().match_count(Path::new("/b")), 2);
        assert!(!agg.map().get(Path::new("/b")).unwrap().expanded);
        assert_eq!(agg.last_run().total_nodes, 2);
    }

    #[test]
    fn aggregator_clear_empties_map() {
        let mut agg = HighlightAggregator::new();
        agg.recompute(&[result("/a/one", &[1])]);
        agg.clear();
        assert!(agg.map().is_empty());
        assert_eq!(agg.last_run().total_nodes, 0);
    }
}
