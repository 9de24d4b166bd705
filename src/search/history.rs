use crate::store::{self, KeyValueStore, SEARCH_HISTORY_KEY};

/// Default number of remembered queries.
pub const DEFAULT_HISTORY_LEN: usize = 50;

/// Recent queries, most recent first, without duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHistory {
    entries: Vec<String>,
    capacity: usize,
}

impl Default for SearchHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl SearchHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Load from `store`, truncating to `capacity`.
    pub fn load(store: &dyn KeyValueStore, capacity: usize) -> Self {
        let mut history = Self::new(capacity);
        if let Some(entries) = store::get_as::<Vec<String>>(store, SEARCH_HISTORY_KEY) {
            for entry in entries.into_iter().rev() {
                history.push(&entry);
            }
        }
        history
    }

    pub fn save(&self, store: &dyn KeyValueStore) {
        if let Err(e) = store::set_as(store, SEARCH_HISTORY_KEY, &self.entries) {
            tracing::warn!(error = %e, "failed to save search history");
        }
    }

    /// Record `query` at the front. Blank queries are ignored; a repeated
    /// query moves to the front instead of appearing twice.
    pub fn push(&mut self, query: &str) -> bool {
        if query.trim().is_empty() {
            return false;
        }
        self.entries.retain(|e| e != query);
        self.entries.insert(0, query.to_string());
        self.entries.truncate(self.capacity);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn most_recent_first() {
        let mut h = SearchHistory::default();
        h.push("one");
        h.push("two");
        assert_eq!(h.entries(), &["two".to_string(), "one".to_string()]);
    }

    #[test]
    fn repeated_query_moves_to_front() {
        let mut h = SearchHistory::default();
        h.push("a");
        h.push("b");
        h.push("c");
        h.push("a");
        assert_eq!(h.entries(), &["a", "c", "b"].map(String::from));
    }

    #[test]
    fn blank_queries_are_ignored() {
        let mut h = SearchHistory::default();
        assert!(!h.push("   "));
        assert!(h.is_empty());
    }

    #[test]
    fn capped_at_capacity() {
        let mut h = SearchHistory::default();
        for i in 0..60 {
            h.push(&format!("q{}", i));
        }
        assert_eq!(h.len(), DEFAULT_HISTORY_LEN);
        assert_eq!(h.entries()[0], "q59");
        assert_eq!(h.entries()[49], "q10");
    }

    #[test]
    fn save_and_load_round_trip() {
        let store = MemoryStore::new();
        let mut h = SearchHistory::new(3);
        h.push("x");
        h.push("y");
        h.save(&store);

        let loaded = SearchHistory::load(&store, 3);
        assert_eq!(loaded.entries(), &["y", "x"].map(String::from));
    }

    #[test]
    fn load_truncates_to_new_capacity() {
        let store = MemoryStore::new();
        let mut h = SearchHistory::new(10);
        for q in ["a", "b", "c", "d"] {
            h.push(q);
        }
        h.save(&store);

        let loaded = SearchHistory::load(&store, 2);
        assert_eq!(loaded.entries(), &["d", "c"].map(String::from));
    }

    #[test]
    fn clear_empties() {
        let mut h = SearchHistory::default();
        h.push("a");
        h.clear();
        assert!(h.is_empty());
    }
}
