use regex::Regex;

use crate::error::{ProviderError, ProviderResult};
use crate::search::types::SearchOptions;

/// Compile a query into a matcher.
///
/// Literal queries are escaped; `whole_word` wraps the pattern in `\b`
/// anchors; matching is case-insensitive unless `case_sensitive` is set.
pub fn build_pattern(query: &str, options: &SearchOptions) -> ProviderResult<Regex> {
    let mut pattern = if options.regex() {
        query.to_string()
    } else {
        regex::escape(query)
    };

    if options.whole_word() {
        pattern = format!(r"\b{}\b", pattern);
    }
    if !options.case_sensitive() {
        pattern = format!("(?i){}", pattern);
    }

    Regex::new(&pattern).map_err(|e| ProviderError::Search(format!("invalid pattern: {}", e)))
}
