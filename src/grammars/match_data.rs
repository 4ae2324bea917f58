use std::ops::Range;

/// The outcome of running one pattern against a string from some offset.
///
/// Group ranges are byte offsets into the searched string, group 0 being the whole match.
/// Optional groups that didn't participate are stored as `0..0`.
/// A failed match has no groups at all.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchData {
    groups: Vec<Range<usize>>,
}

impl MatchData {
    pub fn not_matched() -> Self {
        Self::default()
    }

    /// A successful match. `groups` must at least contain the whole match.
    pub fn new(groups: Vec<Range<usize>>) -> Self {
        debug_assert!(!groups.is_empty(), "a match needs at least group 0");
        Self { groups }
    }

    #[inline]
    pub fn matched(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Number of groups, including group 0. 0 when not matched.
    #[inline]
    pub fn count(&self) -> usize {
        self.groups.len()
    }

    pub fn range(&self, group: usize) -> Option<Range<usize>> {
        self.groups.get(group).cloned()
    }

    pub fn groups(&self) -> &[Range<usize>] {
        &self.groups
    }

    /// Where the whole match starts
    #[inline]
    pub fn start(&self) -> Option<usize> {
        self.groups.first().map(|r| r.start)
    }

    /// Whether the whole match is zero-width. Unmatched data counts as empty.
    #[inline]
    pub fn is_empty_match(&self) -> bool {
        self.groups.first().is_none_or(|r| r.is_empty())
    }

    /// The text captured by `group` in `source`
    pub fn text<'a>(&self, group: usize, source: &'a str) -> Option<&'a str> {
        self.groups.get(group).and_then(|r| source.get(r.clone()))
    }
}
