use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::MatcherResult;
use crate::grammars::{NodeId, Priority};
use crate::matcher::LexerMatchState;
use crate::text::StringId;

/// Everything a search result depends on.
///
/// Node and string are compared by identity, so equal keys always describe the same
/// search over the same text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    pub node: NodeId,
    pub string: StringId,
    pub byte_offset: usize,
    pub priority: Priority,
    pub scope: Box<str>,
}

impl MatchKey {
    pub fn new(
        node: NodeId,
        string: StringId,
        byte_offset: usize,
        priority: Priority,
        scope: &str,
    ) -> Self {
        Self {
            node,
            string,
            byte_offset,
            priority,
            scope: scope.into(),
        }
    }
}

struct Entry {
    state: Arc<LexerMatchState>,
    last_used: AtomicU64,
}

/// Bounded concurrent cache of search results.
///
/// Reads and inserts don't lock. When the cache grows past its capacity, one thread
/// evicts the least recently used entries down to 3/4 of the capacity; other threads
/// keep going without waiting for it.
pub struct MatchStateCache {
    entries: papaya::HashMap<MatchKey, Entry>,
    capacity: usize,
    clock: AtomicU64,
    evicting: Mutex<()>,
}

impl MatchStateCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: papaya::HashMap::new(),
            capacity,
            clock: AtomicU64::new(0),
            evicting: Mutex::new(()),
        }
    }

    /// Returns the cached state for `key` or computes and stores it.
    ///
    /// Two threads missing the same key both compute it and the first stored state is
    /// the one everybody gets. Errors, including cancellation, are returned as is and
    /// never stored.
    pub fn get_or_compute<F>(
        &self,
        key: MatchKey,
        compute: F,
    ) -> MatcherResult<Arc<LexerMatchState>>
    where
        F: FnOnce() -> MatcherResult<Arc<LexerMatchState>>,
    {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);
        if let Some(entry) = self.entries.pin().get(&key) {
            entry.last_used.store(tick, Ordering::Relaxed);
            return Ok(entry.state.clone());
        }

        let state = compute()?;

        let state = self
            .entries
            .pin()
            .get_or_insert_with(key, || Entry {
                state,
                last_used: AtomicU64::new(tick),
            })
            .state
            .clone();

        if self.entries.len() > self.capacity {
            self.evict();
        }
        Ok(state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.pin().clear();
    }

    fn evict(&self) {
        // someone else is already on it
        let Ok(_guard) = self.evicting.try_lock() else {
            return;
        };

        let mut entries = self.entries.pin();
        let len = entries.len();
        let keep = self.capacity * 3 / 4;
        if len <= self.capacity || len <= keep {
            return;
        }

        let mut ticks: Vec<u64> = entries
            .iter()
            .map(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
            .collect();
        let excess = (len - keep).min(ticks.len());
        if excess == 0 {
            return;
        }
        let (_, threshold, _) = ticks.select_nth_unstable(excess - 1);
        let threshold = *threshold;
        entries.retain(|_, entry| entry.last_used.load(Ordering::Relaxed) > threshold);

        #[cfg(feature = "debug")]
        log::debug!(
            "[MatchStateCache] evicted {} entries, {} left",
            len - entries.len(),
            entries.len()
        );
    }
}

impl std::fmt::Debug for MatchStateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MatchStateCache({}/{} entries)",
            self.entries.len(),
            self.capacity
        )
    }
}
