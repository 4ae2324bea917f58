//! The best-match search: which rule of a syntax tree matches first at an offset.

use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::error::{Error, MatcherResult};
use crate::grammars::{MatchData, NodeId, Priority, RegexCache, RuleKind, RuleNode, SyntaxTree};
use crate::options::MatcherOptions;
use crate::text::StringWithId;
use crate::weigher::{CachingWeigher, ScopeSelectorWeigher, SelectorWeigher};

mod cache;
mod captures;

pub use cache::{MatchKey, MatchStateCache};
pub use captures::{
    CaptureMatchData, escape_regex, has_backreferences, match_captures, resolve_backreferences,
};

/// The result of a search: which rule matched where, and with which priority.
///
/// A state whose `match_data` didn't match is a valid result meaning nothing applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerMatchState {
    pub rule: NodeId,
    pub match_data: MatchData,
    pub priority: Priority,
    /// The string the match data points into. `None` for states that never ran a pattern.
    pub source: Option<StringWithId>,
}

impl LexerMatchState {
    pub fn new(
        rule: NodeId,
        match_data: MatchData,
        priority: Priority,
        source: StringWithId,
    ) -> Self {
        Self {
            rule,
            match_data,
            priority,
            source: Some(source),
        }
    }

    pub fn not_matched(rule: NodeId) -> Self {
        Self {
            rule,
            match_data: MatchData::not_matched(),
            priority: Priority::Normal,
            source: None,
        }
    }

    #[inline]
    pub fn matched(&self) -> bool {
        self.match_data.matched()
    }
}

/// Picks between the current best state and a new candidate.
///
/// The earliest match wins and on equal starts the strictly higher priority does.
/// Even then, a zero-width winner only replaces a non-empty `old` if its rule opens a
/// region with a begin pattern.
pub fn more_important(
    tree: &SyntaxTree,
    old: Arc<LexerMatchState>,
    new: Arc<LexerMatchState>,
) -> Arc<LexerMatchState> {
    let Some(new_start) = new.match_data.start() else {
        return old;
    };
    let Some(old_start) = old.match_data.start() else {
        return new;
    };

    let wins = new_start < old_start || (new_start == old_start && new.priority > old.priority);
    if wins
        && (!new.match_data.is_empty_match()
            || old.match_data.is_empty_match()
            || tree.get(new.rule).is_some_and(RuleNode::has_begin))
    {
        new
    } else {
        old
    }
}

/// What stays the same for every node visited by one search
#[derive(Clone, Copy)]
struct Search<'a> {
    string: &'a StringWithId,
    byte_offset: usize,
    scope: &'a str,
    cancel: &'a CancellationToken,
}

/// Searches a [`SyntaxTree`] for the rule matching first at an offset, remembering results.
///
/// The engine is `Send + Sync`: share it between the threads tokenizing different files.
pub struct MatchEngine<W = CachingWeigher<ScopeSelectorWeigher>> {
    tree: Arc<SyntaxTree>,
    weigher: W,
    cache: MatchStateCache,
    end_patterns: RegexCache,
    options: MatcherOptions,
}

impl MatchEngine {
    /// An engine weighing injection selectors with the TextMate selector syntax
    pub fn new(tree: Arc<SyntaxTree>, options: MatcherOptions) -> Self {
        Self::with_weigher(tree, CachingWeigher::default(), options)
    }
}

impl<W: SelectorWeigher> MatchEngine<W> {
    pub fn with_weigher(tree: Arc<SyntaxTree>, weigher: W, options: MatcherOptions) -> Self {
        Self {
            tree,
            weigher,
            cache: MatchStateCache::new(options.cache_capacity),
            end_patterns: RegexCache::new(options.end_pattern_cache_capacity),
            options,
        }
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    pub fn options(&self) -> &MatcherOptions {
        &self.options
    }

    pub fn weigher(&self) -> &W {
        &self.weigher
    }

    pub fn cache(&self) -> &MatchStateCache {
        &self.cache
    }

    /// Forgets every remembered search result and compiled end pattern
    pub fn clear_cache(&self) {
        self.cache.clear();
        self.end_patterns.clear();
    }

    /// Finds the state of the descendant of `node` matching first in `string` at or after
    /// `byte_offset`.
    ///
    /// `current_scope` is the scope path open at the offset (see
    /// [`scope_path`](crate::scope_path)), used to decide which injections apply.
    /// Not finding anything is not an error: the returned state just didn't match.
    ///
    /// Results are cached on the identities of `node` and `string` plus the other
    /// arguments so asking again for the same line is cheap.
    pub fn match_first(
        &self,
        node: NodeId,
        string: &StringWithId,
        byte_offset: usize,
        priority: Priority,
        current_scope: &str,
        cancel: &CancellationToken,
    ) -> MatcherResult<Arc<LexerMatchState>> {
        let search = Search {
            string,
            byte_offset,
            scope: current_scope,
            cancel,
        };
        self.match_first_at_depth(node, priority, search, 0)
    }

    /// Runs the end pattern of the rule that produced `state` against `string`.
    ///
    /// Backreferences in the end pattern are replaced with what the begin pattern captured,
    /// so `<<(\w+)` / `^\1$` only closes on the delimiter that opened the region.
    /// Rules without an end pattern never match.
    pub fn match_end_pattern(
        &self,
        state: &LexerMatchState,
        string: &StringWithId,
        byte_offset: usize,
    ) -> MatcherResult<MatchData> {
        let rule = self
            .tree
            .get(state.rule)
            .ok_or(Error::UnknownNode(state.rule))?;
        let Some(end) = rule.end_source.as_deref() else {
            return Ok(MatchData::not_matched());
        };

        let pattern = resolve_backreferences(end, state.source.as_ref(), &state.match_data);
        #[cfg(feature = "debug")]
        log::trace!("[match_end_pattern] rule {} end `{}` -> `{}`", *state.rule, end, pattern);

        self.end_patterns.get(pattern).search(string, byte_offset)
    }

    fn match_first_at_depth(
        &self,
        node: NodeId,
        priority: Priority,
        search: Search<'_>,
        depth: usize,
    ) -> MatcherResult<Arc<LexerMatchState>> {
        search.cancel.check()?;
        if depth > self.options.max_depth {
            #[cfg(feature = "debug")]
            log::debug!("[match_first] recursion limit reached at node {}", *node);
            return Err(Error::RecursionLimit {
                node,
                depth: self.options.max_depth,
            });
        }

        let key = MatchKey::new(
            node,
            search.string.id(),
            search.byte_offset,
            priority,
            search.scope,
        );
        self.cache.get_or_compute(key, || {
            self.match_first_uncached(node, priority, search, depth)
        })
    }

    fn match_first_uncached(
        &self,
        node: NodeId,
        priority: Priority,
        search: Search<'_>,
        depth: usize,
    ) -> MatcherResult<Arc<LexerMatchState>> {
        let rule = self.tree.get(node).ok_or(Error::UnknownNode(node))?;

        let mut best = Arc::new(LexerMatchState::not_matched(node));
        for (i, &child) in rule.children.iter().enumerate() {
            let candidate = self.match_first_child(child, priority, search, depth)?;
            best = more_important(&self.tree, best, candidate);
            // Nothing can start before the offset we search from. A later sibling can still
            // win at the same start with a higher priority, which only injections give.
            if self.options.early_exit
                && best.match_data.start() == Some(search.byte_offset)
                && (best.priority == Priority::High
                    || (best.priority >= priority
                        && !rule.children[i + 1..]
                            .iter()
                            .any(|&c| self.tree.may_raise_priority(c))))
            {
                break;
            }
        }

        let injected = self.match_injections(node, rule, search, depth)?;
        Ok(more_important(&self.tree, best, injected))
    }

    fn match_first_child(
        &self,
        child: NodeId,
        priority: Priority,
        search: Search<'_>,
        depth: usize,
    ) -> MatcherResult<Arc<LexerMatchState>> {
        let rule = self.tree.get(child).ok_or(Error::UnknownNode(child))?;
        match rule.kind() {
            RuleKind::Match(re) | RuleKind::Begin(re) => {
                let match_data = re.search(search.string, search.byte_offset)?;
                Ok(Arc::new(LexerMatchState::new(
                    child,
                    match_data,
                    priority,
                    search.string.clone(),
                )))
            }
            // An end only means something inside a region its host opened
            RuleKind::End => Ok(Arc::new(LexerMatchState::not_matched(child))),
            RuleKind::Group => self.match_first_at_depth(child, priority, search, depth + 1),
        }
    }

    fn match_injections(
        &self,
        node: NodeId,
        rule: &RuleNode,
        search: Search<'_>,
        depth: usize,
    ) -> MatcherResult<Arc<LexerMatchState>> {
        let mut best = Arc::new(LexerMatchState::not_matched(node));
        for injection in &rule.injections {
            let weigh = self.weigher.weigh(&injection.selector, search.scope);
            if !weigh.is_applicable() {
                continue;
            }
            let state =
                self.match_first_at_depth(injection.target, weigh.priority, search, depth + 1)?;
            best = more_important(&self.tree, best, state);
        }
        Ok(best)
    }
}

impl<W> std::fmt::Debug for MatchEngine<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchEngine")
            .field("nodes", &self.tree.len())
            .field("cache", &self.cache)
            .field("options", &self.options)
            .finish()
    }
}
