use serde::{Deserialize, Serialize};

/// Default number of search results kept by the match cache
pub const DEFAULT_CACHE_CAPACITY: usize = 32768;
/// Default number of resolved end patterns kept compiled
pub const DEFAULT_END_PATTERN_CACHE_CAPACITY: usize = 1024;
/// Default depth limit when recursing through grouping nodes and injections
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// The options of a [`MatchEngine`](crate::MatchEngine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherOptions {
    pub(crate) cache_capacity: usize,
    pub(crate) end_pattern_cache_capacity: usize,
    pub(crate) max_depth: usize,
    pub(crate) early_exit: bool,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            end_pattern_cache_capacity: DEFAULT_END_PATTERN_CACHE_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
            early_exit: true,
        }
    }
}

impl MatcherOptions {
    /// Maximum number of entries in the match cache before the least recently used
    /// ones get evicted.
    pub fn cache_capacity(mut self, value: usize) -> Self {
        self.cache_capacity = value;
        self
    }

    /// Maximum number of compiled end patterns kept around.
    /// End patterns with backreferences produce one regex per distinct begin capture.
    pub fn end_pattern_cache_capacity(mut self, value: usize) -> Self {
        self.end_pattern_cache_capacity = value;
        self
    }

    /// How deep the search can go through grouping nodes and injections
    pub fn max_depth(mut self, value: usize) -> Self {
        self.max_depth = value;
        self
    }

    /// Stop scanning children once one matches right at the query offset.
    /// Turning it off never changes results, only makes the search slower.
    pub fn early_exit(mut self, value: bool) -> Self {
        self.early_exit = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let options: MatcherOptions = serde_json::from_str(r#"{"cache_capacity": 10}"#).unwrap();
        assert_eq!(options, MatcherOptions::default().cache_capacity(10));
    }
}
