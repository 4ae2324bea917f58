//! Scoring injection selectors against the current scope path.

use std::fmt;

use crate::grammars::{Priority, parse_injection_selector};
use crate::scope::split_path;

/// Default number of `(selector, scope)` pairs remembered by [`CachingWeigher`]
pub const DEFAULT_WEIGH_CACHE_CAPACITY: usize = 4096;

/// How well a selector applies to a scope path.
/// A weight of 0 or less means it doesn't apply at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Weigh {
    pub weight: i32,
    pub priority: Priority,
}

impl Weigh {
    pub const NOT_APPLICABLE: Weigh = Weigh {
        weight: 0,
        priority: Priority::Normal,
    };

    pub fn new(weight: i32, priority: Priority) -> Self {
        Self { weight, priority }
    }

    #[inline]
    pub fn is_applicable(&self) -> bool {
        self.weight > 0
    }
}

/// Decides whether an injection applies to the current scope path, and with which priority
pub trait SelectorWeigher: Send + Sync {
    fn weigh(&self, selector: &str, scope: &str) -> Weigh;
}

impl<F> SelectorWeigher for F
where
    F: Fn(&str, &str) -> Weigh + Send + Sync,
{
    fn weigh(&self, selector: &str, scope: &str) -> Weigh {
        self(selector, scope)
    }
}

/// Weighs TextMate injection selectors (`L:source.js -comment, R:text.html`).
///
/// Each comma-separated alternative is scored against the path and the best one wins,
/// bringing its priority prefix along.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScopeSelectorWeigher;

impl SelectorWeigher for ScopeSelectorWeigher {
    fn weigh(&self, selector: &str, scope: &str) -> Weigh {
        let scopes = split_path(scope);
        let mut best = Weigh::NOT_APPLICABLE;
        for matcher in parse_injection_selector(selector) {
            if let Some(weight) = matcher.weigh(&scopes)
                && weight > best.weight
            {
                best = Weigh::new(weight, matcher.priority());
            }
        }
        best
    }
}

/// Memoizes another weigher.
///
/// The same few selectors get weighed against the same scope paths on every line so this
/// saves re-parsing selectors over and over.
pub struct CachingWeigher<W> {
    inner: W,
    cache: papaya::HashMap<(String, String), Weigh>,
    capacity: usize,
}

impl<W: SelectorWeigher> CachingWeigher<W> {
    pub fn new(inner: W) -> Self {
        Self::with_capacity(inner, DEFAULT_WEIGH_CACHE_CAPACITY)
    }

    /// Once `capacity` pairs are stored, the cache is emptied before storing new ones
    pub fn with_capacity(inner: W, capacity: usize) -> Self {
        Self {
            inner,
            cache: papaya::HashMap::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.len() == 0
    }
}

impl Default for CachingWeigher<ScopeSelectorWeigher> {
    fn default() -> Self {
        Self::new(ScopeSelectorWeigher)
    }
}

impl<W: SelectorWeigher> SelectorWeigher for CachingWeigher<W> {
    fn weigh(&self, selector: &str, scope: &str) -> Weigh {
        let key = (selector.to_owned(), scope.to_owned());
        let cache = self.cache.pin();
        if let Some(weigh) = cache.get(&key) {
            return *weigh;
        }

        let weigh = self.inner.weigh(selector, scope);
        if cache.len() >= self.capacity {
            cache.clear();
        }
        cache.insert(key, weigh);
        weigh
    }
}

impl<W> fmt::Debug for CachingWeigher<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CachingWeigher({} entries)", self.cache.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn weighs_with_priority_prefix() {
        let weigher = ScopeSelectorWeigher;
        let scope = "text.html.basic source.js.embedded.html";

        let left = weigher.weigh("L:source.js -comment", scope);
        assert!(left.is_applicable());
        assert_eq!(left.priority, Priority::High);

        let right = weigher.weigh("R:text.html", scope);
        assert!(right.is_applicable());
        assert_eq!(right.priority, Priority::Low);

        let plain = weigher.weigh("source.js", scope);
        assert_eq!(plain.priority, Priority::Normal);
    }

    #[test]
    fn not_applicable_when_nothing_matches() {
        let weigher = ScopeSelectorWeigher;
        assert_eq!(
            weigher.weigh("L:source.python", "source.js"),
            Weigh::NOT_APPLICABLE
        );
        assert_eq!(
            weigher.weigh("source.js -comment", "source.js comment.line"),
            Weigh::NOT_APPLICABLE
        );
        assert_eq!(weigher.weigh("", "source.js"), Weigh::NOT_APPLICABLE);
        assert_eq!(weigher.weigh("-comment", "source.js"), Weigh::NOT_APPLICABLE);
    }

    #[test]
    fn best_alternative_wins() {
        let weigher = ScopeSelectorWeigher;
        // `string` is deeper than `source.js` so its alternative decides the priority
        let weigh = weigher.weigh("L:source.js, R:string", "source.js string.quoted");
        assert_eq!(weigh.priority, Priority::Low);
    }

    #[test]
    fn caching_weigher_calls_inner_once_per_pair() {
        let calls = AtomicUsize::new(0);
        let counting = |selector: &str, scope: &str| {
            calls.fetch_add(1, Ordering::Relaxed);
            ScopeSelectorWeigher.weigh(selector, scope)
        };
        let weigher = CachingWeigher::new(counting);

        let first = weigher.weigh("L:source.js", "source.js");
        let second = weigher.weigh("L:source.js", "source.js");
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        weigher.weigh("L:source.js", "source.js string");
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(weigher.len(), 2);
    }

    #[test]
    fn caching_weigher_is_bounded() {
        let weigher = CachingWeigher::with_capacity(ScopeSelectorWeigher, 2);
        weigher.weigh("a", "a");
        weigher.weigh("b", "b");
        weigher.weigh("c", "c");
        assert_eq!(weigher.len(), 1);
    }
}
