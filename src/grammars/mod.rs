mod compiled;
mod injections;
mod match_data;
mod raw;
mod regex;

pub use compiled::*;
pub use injections::{CompiledInjectionMatcher, Priority, SelectorMatcher, parse_injection_selector};
pub use match_data::MatchData;
pub use raw::{RawCapture, RawGrammar, RawRule};
pub(crate) use regex::RegexCache;
pub use regex::Regex;
