mod cancel;
mod error;
mod grammars;
mod matcher;
mod options;
mod scope;
mod text;
mod weigher;

pub use cancel::CancellationToken;
pub use error::Error;
pub use grammars::{
    Captures, CompiledInjectionMatcher, Injection, MatchData, NodeId, Priority, RawCapture,
    RawGrammar, RawRule, Regex, RuleKind, RuleNode, SelectorMatcher, SyntaxTree,
    SyntaxTreeBuilder, parse_injection_selector,
};
pub use matcher::{
    CaptureMatchData, LexerMatchState, MatchEngine, MatchKey, MatchStateCache, escape_regex,
    has_backreferences, match_captures, more_important, resolve_backreferences,
};
pub use options::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_END_PATTERN_CACHE_CAPACITY, DEFAULT_MAX_DEPTH, MatcherOptions,
};
pub use scope::scope_path;
pub use text::{StringId, StringWithId};
pub use weigher::{
    CachingWeigher, DEFAULT_WEIGH_CACHE_CAPACITY, ScopeSelectorWeigher, SelectorWeigher, Weigh,
};
