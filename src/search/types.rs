//! Search request/response types shared with the search provider.
//!
//! Field names follow the provider's wire format (`files_searched`,
//! `match_ranges`, ...), so these types deserialize straight from its JSON.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

/// Matching options for a search.
///
/// `regex` is mutually exclusive with `case_sensitive` and `whole_word`:
/// turning one side on turns the other side off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    regex: bool,
    case_sensitive: bool,
    whole_word: bool,
}

impl SearchOptions {
    pub fn regex(&self) -> bool {
        self.regex
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn whole_word(&self) -> bool {
        self.whole_word
    }

    pub fn set_regex(&mut self, on: bool) {
        self.regex = on;
        if on {
            self.case_sensitive = false;
            self.whole_word = false;
        }
    }

    pub fn set_case_sensitive(&mut self, on: bool) {
        self.case_sensitive = on;
        if on {
            self.regex = false;
        }
    }

    pub fn set_whole_word(&mut self, on: bool) {
        self.whole_word = on;
        if on {
            self.regex = false;
        }
    }

    pub fn with_regex(mut self, on: bool) -> Self {
        self.set_regex(on);
        self
    }

    pub fn with_case_sensitive(mut self, on: bool) -> Self {
        self.set_case_sensitive(on);
        self
    }

    pub fn with_whole_word(mut self, on: bool) -> Self {
        self.set_whole_word(on);
        self
    }

    /// Short flag string for status displays, e.g. `".* Aa"`.
    pub fn label(&self) -> String {
        let mut flags = Vec::new();
        if self.regex {
            flags.push(".*");
        }
        if self.case_sensitive {
            flags.push("Aa");
        }
        if self.whole_word {
            flags.push("\\b");
        }
        flags.join(" ")
    }
}

/// Cumulative counters for a search session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    #[serde(default)]
    pub files_searched: u64,
    #[serde(default)]
    pub directories_searched: u64,
    #[serde(default)]
    pub total_matches: u64,
}

impl SearchStats {
    /// Fold `other` in by elementwise maximum so counters never move backwards,
    /// even when updates arrive out of order.
    pub fn merge_max(&mut self, other: &SearchStats) {
        self.files_searched = self.files_searched.max(other.files_searched);
        self.directories_searched = self.directories_searched.max(other.directories_searched);
        self.total_matches = self.total_matches.max(other.total_matches);
    }
}

/// Payload of the provider's `progress` channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchProgress {
    /// Session the update belongs to, when the provider tags its pushes.
    #[serde(default)]
    pub search_id: Option<u64>,
    #[serde(default)]
    pub files_searched: u64,
    #[serde(default)]
    pub directories_searched: u64,
    #[serde(default)]
    pub total_matches: u64,
    #[serde(default)]
    pub processing_time_ms: u64,
}

impl SearchProgress {
    /// False when the update is tagged for a different search.
    pub fn belongs_to(&self, search_id: u64) -> bool {
        self.search_id.map_or(true, |id| id == search_id)
    }

    pub fn stats(&self) -> SearchStats {
        SearchStats {
            files_searched: self.files_searched,
            directories_searched: self.directories_searched,
            total_matches: self.total_matches,
        }
    }
}

/// One matching line within a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub line: usize,
    pub content: String,
    /// Half-open `[start, end)` byte ranges within `content`.
    #[serde(
        rename = "match_ranges",
        default,
        deserialize_with = "deserialize_ranges_lenient"
    )]
    pub ranges: Vec<[usize; 2]>,
}

impl Match {
    /// Sort ranges ascending and merge overlapping or touching ones.
    /// Inverted ranges (`start > end`) are dropped.
    pub fn normalize(&mut self) {
        self.ranges.retain(|[start, end]| start <= end);
        self.ranges.sort_by_key(|r| r[0]);

        let mut merged: Vec<[usize; 2]> = Vec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if range[0] <= last[1] => last[1] = last[1].max(range[1]),
                _ => merged.push(range),
            }
        }
        self.ranges = merged;
    }
}

/// All matches found in a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub path: PathBuf,
    #[serde(default)]
    pub matches: Vec<Match>,
}

impl SearchResult {
    /// Number of matched ranges across all lines.
    pub fn match_count(&self) -> u64 {
        self.matches.iter().map(|m| m.ranges.len() as u64).sum()
    }

    pub fn normalize(&mut self) {
        for m in &mut self.matches {
            m.normalize();
        }
    }
}

/// A search request as sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Echoed back on the provider's pushes for this search.
    pub search_id: u64,
    pub path: PathBuf,
    pub query: String,
    pub options: SearchOptions,
    pub timeout_secs: u64,
}

/// Final response of a provider search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub stats: SearchStats,
    /// The provider stopped because it was asked to.
    #[serde(default)]
    pub cancelled: bool,
    /// The provider stopped early on its own timeout or result cap.
    #[serde(default)]
    pub curtailed: bool,
    #[serde(default)]
    pub processing_time_ms: u64,
}

/// Payload of the provider's `early-results` channel: everything found so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarlyResults {
    #[serde(default)]
    pub search_id: Option<u64>,
    #[serde(default)]
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub stats: SearchStats,
    #[serde(default)]
    pub processing_time_ms: u64,
}

impl EarlyResults {
    /// False when the batch is tagged for a different search.
    pub fn belongs_to(&self, search_id: u64) -> bool {
        self.search_id.map_or(true, |id| id == search_id)
    }
}

/// Accept anything for `match_ranges`; malformed data becomes "no ranges"
/// so it counts as zero matches instead of failing the whole response.
fn deserialize_ranges_lenient<'de, D>(deserializer: D) -> Result<Vec<[usize; 2]>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn regex_turns_off_case_and_whole_word() {
        let mut opts = SearchOptions::default()
            .with_case_sensitive(true)
            .with_whole_word(true);
        opts.set_regex(true);
        assert!(opts.regex());
        assert!(!opts.case_sensitive());
        assert!(!opts.whole_word());
    }

    #[test]
    fn case_or_whole_word_turn_off_regex() {
        let mut opts = SearchOptions::default().with_regex(true);
        opts.set_case_sensitive(true);
        assert!(!opts.regex());
        assert!(opts.case_sensitive());

        let mut opts = SearchOptions::default().with_regex(true);
        opts.set_whole_word(true);
        assert!(!opts.regex());
        assert!(opts.whole_word());
    }

    #[test]
    fn turning_an_option_off_leaves_others_alone() {
        let mut opts = SearchOptions::default()
            .with_case_sensitive(true)
            .with_whole_word(true);
        opts.set_case_sensitive(false);
        assert!(opts.whole_word());
        assert!(!opts.regex());
    }

    #[test]
    fn options_label() {
        assert_eq!(SearchOptions::default().label(), "");
        let opts = SearchOptions::default()
            .with_case_sensitive(true)
            .with_whole_word(true);
        assert_eq!(opts.label(), "Aa \\b");
    }

    #[test]
    fn merge_max_never_regresses() {
        let mut stats = SearchStats {
            files_searched: 10,
            directories_searched: 2,
            total_matches: 5,
        };
        stats.merge_max(&SearchStats {
            files_searched: 8,
            directories_searched: 4,
            total_matches: 3,
        });
        assert_eq!(stats.files_searched, 10);
        assert_eq!(stats.directories_searched, 4);
        assert_eq!(stats.total_matches, 5);
    }

    #[test]
    fn normalize_sorts_and_merges_ranges() {
        let mut m = Match {
            line: 1,
            content: "abcdefghijklmnop".into(),
            ranges: vec![[8, 10], [0, 2], [1, 4], [4, 5], [12, 13]],
        };
        m.normalize();
        assert_eq!(m.ranges, vec![[0, 5], [8, 10], [12, 13]]);
    }

    #[test]
    fn normalize_drops_inverted_ranges() {
        let mut m = Match {
            line: 1,
            content: "abc".into(),
            ranges: vec![[2, 1], [0, 1]],
        };
        m.normalize();
        assert_eq!(m.ranges, vec![[0, 1]]);
    }

    #[test]
    fn match_count_sums_ranges_across_lines() {
        let result = SearchResult {
            path: "/a/b.txt".into(),
            matches: vec![
                Match {
                    line: 1,
                    content: "foo foo".into(),
                    ranges: vec![[0, 3], [4, 7]],
                },
                Match {
                    line: 9,
                    content: "foo".into(),
                    ranges: vec![[0, 3]],
                },
            ],
        };
        assert_eq!(result.match_count(), 3);
    }

    #[test]
    fn response_deserializes_from_wire_format() {
        let wire = json!({
            "results": [{
                "path": "/proj/src/main.rs",
                "matches": [{"line": 3, "content": "fn main()", "match_ranges": [[3, 7]]}]
            }],
            "stats": {"files_searched": 12, "directories_searched": 3, "total_matches": 1},
            "cancelled": false,
            "curtailed": true,
            "processing_time_ms": 42
        });
        let response: SearchResponse = serde_json::from_value(wire).unwrap();
        assert!(response.curtailed);
        assert_eq!(response.stats.files_searched, 12);
        assert_eq!(response.results[0].matches[0].ranges, vec![[3, 7]]);
    }

    #[test]
    fn malformed_ranges_count_as_zero() {
        let wire = json!({
            "path": "/proj/x.txt",
            "matches": [
                {"line": 1, "content": "a", "match_ranges": "oops"},
                {"line": 2, "content": "b", "match_ranges": [[0, 1], [2]]},
                {"line": 3, "content": "c"},
                {"line": 4, "content": "d", "match_ranges": [[0, 1]]}
            ]
        });
        let result: SearchResult = serde_json::from_value(wire).unwrap();
        assert_eq!(result.match_count(), 1);
    }

    #[test]
    fn untagged_pushes_belong_to_any_search() {
        let wire = json!({"files_searched": 4, "total_matches": 2});
        let update: SearchProgress = serde_json::from_value(wire).unwrap();
        assert_eq!(update.search_id, None);
        assert!(update.belongs_to(7));

        let tagged = SearchProgress {
            search_id: Some(3),
            ..update
        };
        assert!(tagged.belongs_to(3));
        assert!(!tagged.belongs_to(7));

        let early = EarlyResults {
            search_id: Some(3),
            ..Default::default()
        };
        assert!(!early.belongs_to(4));
    }
}
