use std::fmt;
use std::sync::{Arc, OnceLock};

use onig::{Region, SearchOptions};

use crate::error::{Error, MatcherResult};
use crate::grammars::MatchData;
use crate::text::StringWithId;

/// A regex wrapper holding its source and compiling lazily on first search
pub struct Regex {
    pattern: String,
    compiled: OnceLock<Result<Arc<onig::Regex>, String>>,
}

impl Clone for Regex {
    fn clone(&self) -> Self {
        // Create a new regex with the same pattern but fresh lazy compilation
        Regex::new(self.pattern.clone())
    }
}

impl fmt::Debug for Regex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

impl PartialEq for Regex {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for Regex {}

impl Regex {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            compiled: OnceLock::new(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn compiled(&self) -> MatcherResult<&Arc<onig::Regex>> {
        self.compiled
            .get_or_init(|| {
                onig::Regex::new(&self.pattern)
                    .map(Arc::new)
                    .map_err(|e| e.to_string())
            })
            .as_ref()
            .map_err(|message| Error::InvalidRegex {
                pattern: self.pattern.clone(),
                message: message.clone(),
            })
    }

    /// Searches `text` for the first match starting at or after `byte_offset`.
    pub fn search(&self, text: &StringWithId, byte_offset: usize) -> MatcherResult<MatchData> {
        let re = self.compiled()?;
        Ok(search_at(re, text.as_str(), byte_offset))
    }
}

fn search_at(re: &onig::Regex, text: &str, byte_offset: usize) -> MatchData {
    if byte_offset > text.len() || !text.is_char_boundary(byte_offset) {
        return MatchData::not_matched();
    }

    // We need to pass the full text rather than a slice since some regex do lookbehind
    let mut region = Region::new();
    if re
        .search_with_options(
            text,
            byte_offset,
            text.len(),
            SearchOptions::SEARCH_OPTION_NONE,
            Some(&mut region),
        )
        .is_none()
    {
        return MatchData::not_matched();
    }

    let groups = (0..region.len())
        .map(|i| region.pos(i).map_or(0..0, |(start, end)| start..end))
        .collect();
    MatchData::new(groups)
}

/// Resolved end patterns, compiled once per distinct text.
///
/// Patterns with backreferences become a new regex for every begin match so the map is
/// bounded: once full, it's simply emptied.
pub(crate) struct RegexCache {
    regexes: papaya::HashMap<String, Arc<Regex>>,
    capacity: usize,
}

impl RegexCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            regexes: papaya::HashMap::new(),
            capacity,
        }
    }

    pub(crate) fn get(&self, pattern: String) -> Arc<Regex> {
        let regexes = self.regexes.pin();
        if let Some(re) = regexes.get(&pattern) {
            return re.clone();
        }
        if regexes.len() >= self.capacity {
            #[cfg(feature = "debug")]
            log::debug!("[RegexCache] full with {} patterns, clearing", regexes.len());
            regexes.clear();
        }
        let re = Arc::new(Regex::new(pattern.clone()));
        regexes.get_or_insert(pattern, re).clone()
    }

    pub(crate) fn clear(&self) {
        self.regexes.pin().clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.regexes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn searches_from_byte_offset() {
        let text = StringWithId::new("ab ab ab");
        let re = Regex::new("ab");

        assert_eq!(re.search(&text, 0).unwrap().range(0), Some(0..2));
        assert_eq!(re.search(&text, 1).unwrap().range(0), Some(3..5));
        assert_eq!(re.search(&text, 7).unwrap(), MatchData::not_matched());
        assert_eq!(re.search(&text, 8).unwrap(), MatchData::not_matched());
        assert_eq!(re.search(&text, 100).unwrap(), MatchData::not_matched());
    }

    #[test]
    fn lookbehind_sees_text_before_offset() {
        let text = StringWithId::new("foo.bar");
        let re = Regex::new(r"(?<=\.)\w+");
        assert_eq!(re.search(&text, 4).unwrap().range(0), Some(4..7));
    }

    #[test]
    fn unmatched_optional_groups_are_empty() {
        let text = StringWithId::new("key");
        let re = Regex::new(r"(key)(=(\w+))?");
        let data = re.search(&text, 0).unwrap();

        assert_eq!(data.groups(), &[0..3, 0..3, 0..0, 0..0]);
    }

    #[test]
    fn reports_invalid_patterns_on_use() {
        let text = StringWithId::new("text");
        let re = Regex::new("(unclosed");

        match re.search(&text, 0) {
            Err(Error::InvalidRegex { pattern, .. }) => assert_eq!(pattern, "(unclosed"),
            other => panic!("expected an invalid regex error, got {other:?}"),
        }
    }

    #[test]
    fn offset_inside_a_char_does_not_match() {
        let text = StringWithId::new("é!");
        let re = Regex::new("!");
        assert!(!re.search(&text, 1).unwrap().matched());
        assert_eq!(re.search(&text, 2).unwrap().range(0), Some(2..3));
    }

    #[test]
    fn regex_cache_reuses_and_bounds() {
        let cache = RegexCache::new(2);
        let a = cache.get("a".to_owned());
        let again = cache.get("a".to_owned());
        assert!(Arc::ptr_eq(&a, &again));

        cache.get("b".to_owned());
        assert_eq!(cache.len(), 2);
        cache.get("c".to_owned());
        assert_eq!(cache.len(), 1);
    }
}
