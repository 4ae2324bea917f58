use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::error::MatcherResult;

/// A capture group that assigns a scope name to matched text
///
/// # Examples
/// ```json
/// {
///   "1": { "name": "entity.name.function.js" },
///   "2": { "name": "punctuation.definition.parameters.begin.js" }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCapture {
    pub name: Option<String>,
}

/// A rule as written in a TextMate grammar.
///
/// The shape decides the kind: `match` rules, `begin`/`end` rules, `include` references and
/// plain containers of `patterns`.
///
/// ```json
/// {
///   "name": "string.quoted.double.js",
///   "begin": "\"",
///   "end": "\"",
///   "patterns": [{ "match": "\\\\.", "name": "constant.character.escape.js" }]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all(deserialize = "camelCase"))]
pub struct RawRule {
    pub name: Option<String>,
    pub content_name: Option<String>,
    #[serde(rename(deserialize = "match"))]
    pub match_: Option<String>,
    pub begin: Option<String>,
    /// Can reference begin captures with `\1`, `\2`...
    pub end: Option<String>,
    /// Used for both begin and end when they don't have their own
    pub captures: BTreeMap<String, RawCapture>,
    pub begin_captures: BTreeMap<String, RawCapture>,
    pub end_captures: BTreeMap<String, RawCapture>,
    pub patterns: Vec<RawRule>,
    /// - `#name`: repository entry, looked up from the innermost repository outward
    /// - `$self` / `$base`: the grammar root
    /// - `source.lang`: another grammar's root
    /// - `source.lang#name`: an entry of another grammar's top level repository
    pub include: Option<String>,
    pub repository: HashMap<String, RawRule>,
}

/// Top-level structure of a TextMate grammar
///
/// ```json
/// {
///   "name": "JavaScript",
///   "scopeName": "source.js",
///   "patterns": [{ "include": "#statements" }],
///   "repository": { "statements": { "patterns": [] } },
///   "injections": { "L:source.js -comment": { "patterns": [] } }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all(deserialize = "camelCase"))]
pub struct RawGrammar {
    pub name: String,
    pub scope_name: String,
    pub patterns: Vec<RawRule>,
    pub repository: HashMap<String, RawRule>,
    /// Selector -> rules injected into this grammar wherever the selector applies
    pub injections: BTreeMap<String, RawRule>,
    /// Where this grammar injects itself into the grammars listed in `inject_to`
    pub injection_selector: Option<String>,
    pub inject_to: Vec<String>,
}

impl RawGrammar {
    pub fn load_from_file(path: impl AsRef<Path>) -> MatcherResult<Self> {
        let file = File::open(path)?;
        let raw_grammar = serde_json::from_reader(BufReader::new(file))?;
        Ok(raw_grammar)
    }

    pub fn from_json(json: &str) -> MatcherResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
