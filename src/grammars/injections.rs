//! TextMate grammar injection selector parsing and matching.

use std::sync::LazyLock;

use onig::Regex;
use serde::{Deserialize, Serialize};

use crate::scope::{atom_count, is_prefix_of};

/// Tie-break tier of a candidate match, only consulted when two candidates start at the
/// same offset.
///
/// Injection selectors prefixed with `L:` get `High`, the ones prefixed with `R:` get `Low`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// One comma-separated alternative of an injection selector with its priority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInjectionMatcher {
    matcher: SelectorMatcher,
    priority: Priority,
}

impl CompiledInjectionMatcher {
    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn matcher(&self) -> &SelectorMatcher {
        &self.matcher
    }

    /// Weight of this alternative for the given scope path, `None` if it doesn't apply
    pub fn weigh(&self, scopes: &[&str]) -> Option<i32> {
        self.matcher.score(scopes)
    }
}

/// Selector expression evaluated against a scope path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorMatcher {
    /// Scopes that must appear in this order in the path (space-separated in the selector)
    Path(Vec<String>),
    /// All operands must match
    And(Vec<SelectorMatcher>),
    /// Any operand can match (`|` or `,` separated)
    Or(Vec<SelectorMatcher>),
    /// Operand must NOT match (`-` prefix)
    Not(Box<SelectorMatcher>),
}

impl SelectorMatcher {
    /// Deeper and more specific matches score higher. A bare negation scores 0.
    pub fn score(&self, scopes: &[&str]) -> Option<i32> {
        match self {
            SelectorMatcher::Path(path) => score_path(path, scopes),
            SelectorMatcher::And(matchers) => {
                let mut total = 0;
                for m in matchers {
                    total += m.score(scopes)?;
                }
                Some(total)
            }
            SelectorMatcher::Or(matchers) => matchers.iter().filter_map(|m| m.score(scopes)).max(),
            SelectorMatcher::Not(inner) => match inner.score(scopes) {
                Some(_) => None,
                None => Some(0),
            },
        }
    }
}

/// Matches the path right to left so each selector scope lands on the deepest scope it can
fn score_path(path: &[String], scopes: &[&str]) -> Option<i32> {
    let mut remaining = scopes.len();
    let mut score = 0;
    for selector in path.iter().rev() {
        let depth = scopes[..remaining]
            .iter()
            .rposition(|scope| is_prefix_of(selector, scope))?;
        score += (depth as i32 + 1) * 100 + atom_count(selector) as i32;
        remaining = depth;
    }
    Some(score)
}

/// Regex for tokenizing injection selectors (matches vscode-textmate except for \* added)
static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([LR]:|[\w.:]+[\w\*.:\-]*|[,|\-()])").expect("Invalid selector regex")
});

fn is_identifier(s: &str) -> bool {
    if s.is_empty() || s == "-" {
        return false;
    }

    s.chars().all(|c| {
        c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == ':' || c == '-' || c == '*'
    })
}

fn parse_inner_expression(tokens: &[&str], position: &mut usize) -> Option<SelectorMatcher> {
    let mut out = Vec::new();
    while let Some(m) = parse_conjunction(tokens, position) {
        if !out.contains(&m) {
            out.push(m);
        }
        if *position < tokens.len() && matches!(tokens[*position], "|" | ",") {
            *position += 1;
        } else {
            break;
        }
    }

    match out.len() {
        0 => None,
        1 => out.pop(),
        _ => Some(SelectorMatcher::Or(out)),
    }
}

fn parse_operand(tokens: &[&str], position: &mut usize) -> Option<SelectorMatcher> {
    if *position >= tokens.len() {
        return None;
    }

    match tokens[*position] {
        "-" => {
            *position += 1;
            let negated = parse_operand(tokens, position)?;
            Some(SelectorMatcher::Not(Box::new(negated)))
        }
        "(" => {
            *position += 1;
            let inner = parse_inner_expression(tokens, position);
            if *position < tokens.len() && tokens[*position] == ")" {
                *position += 1;
            }
            inner
        }
        _ => {
            let mut scopes = Vec::new();

            while *position < tokens.len() && is_identifier(tokens[*position]) {
                let token = tokens[*position];
                // `meta.tag.*.html` only keeps what is before the first wildcard
                let scope = match token.find(".*") {
                    Some(pos) => token[..pos].trim_end_matches('.'),
                    None => token,
                };
                scopes.push(scope.to_owned());
                *position += 1;
            }

            if scopes.is_empty() {
                None
            } else {
                Some(SelectorMatcher::Path(scopes))
            }
        }
    }
}

fn parse_conjunction(tokens: &[&str], position: &mut usize) -> Option<SelectorMatcher> {
    let mut matchers = Vec::new();

    while let Some(m) = parse_operand(tokens, position) {
        matchers.push(m);
    }

    match matchers.len() {
        0 => None,
        1 => matchers.pop(),
        _ => Some(SelectorMatcher::And(matchers)),
    }
}

/// Parse injection selector string into compiled matchers, one per comma-separated
/// alternative at the top level.
pub fn parse_injection_selector(selector: &str) -> Vec<CompiledInjectionMatcher> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Vec::new();
    }

    let tokens: Vec<_> = TOKEN_REGEX
        .find_iter(selector)
        .filter(|(start, end)| start != end)
        .map(|(start, end)| &selector[start..end])
        .collect();
    let mut position = 0;
    let mut res = Vec::new();

    let mut priority = Priority::Normal;
    while position < tokens.len() {
        match tokens[position] {
            "L:" => {
                priority = Priority::High;
                position += 1;
                continue;
            }
            "R:" => {
                priority = Priority::Low;
                position += 1;
                continue;
            }
            _ => (),
        };

        if let Some(matcher) = parse_conjunction(&tokens, &mut position) {
            res.push(CompiledInjectionMatcher { matcher, priority });
            priority = Priority::Normal;
            if position < tokens.len() && tokens[position] == "," {
                position += 1;
            } else {
                break;
            }
        } else {
            break;
        }
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    fn path(scopes: &[&str]) -> SelectorMatcher {
        SelectorMatcher::Path(scopes.iter().map(|s| s.to_string()).collect())
    }

    fn describe(matchers: &[CompiledInjectionMatcher]) -> String {
        fn inner(m: &SelectorMatcher) -> String {
            match m {
                SelectorMatcher::Path(scopes) => format!("[{}]", scopes.join(" ")),
                SelectorMatcher::And(ms) => {
                    format!("and({})", ms.iter().map(inner).collect::<Vec<_>>().join(", "))
                }
                SelectorMatcher::Or(ms) => {
                    format!("or({})", ms.iter().map(inner).collect::<Vec<_>>().join(", "))
                }
                SelectorMatcher::Not(m) => format!("not({})", inner(m)),
            }
        }
        matchers
            .iter()
            .map(|m| format!("{:?}:{}", m.priority(), inner(m.matcher())))
            .collect::<Vec<_>>()
            .join(" ; ")
    }

    #[test]
    fn parses_simple_selectors() {
        let res = parse_injection_selector("L:text.html.markdown");
        assert_eq!(
            res,
            vec![CompiledInjectionMatcher {
                matcher: path(&["text.html.markdown"]),
                priority: Priority::High,
            }]
        );

        let res = parse_injection_selector("source.js meta.embedded");
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].priority(), Priority::Normal);
        assert_eq!(res[0].matcher(), &path(&["source.js", "meta.embedded"]));
    }

    #[test]
    fn parses_negations_and_groups() {
        assert_snapshot!(
            describe(&parse_injection_selector("L:text.html -comment")),
            @"High:and([text.html], not([comment]))"
        );
        assert_snapshot!(
            describe(&parse_injection_selector(
                "L:(meta.script.svelte | meta.style.svelte) (meta.lang.js | meta.lang.javascript) - (meta source)"
            )),
            @"High:and(or([meta.script.svelte], [meta.style.svelte]), or([meta.lang.js], [meta.lang.javascript]), not([meta source]))"
        );
        assert_snapshot!(
            describe(&parse_injection_selector("R:text.html - (comment.block, meta.tag.*.*.html)")),
            @"Low:and([text.html], not(or([comment.block], [meta.tag])))"
        );
    }

    #[test]
    fn priority_applies_per_alternative() {
        assert_snapshot!(
            describe(&parse_injection_selector("L:source.css -comment, source.postcss, R:source.sass")),
            @"High:and([source.css], not([comment])) ; Normal:[source.postcss] ; Low:[source.sass]"
        );
    }

    #[test]
    fn empty_selector_has_no_matchers() {
        assert!(parse_injection_selector("").is_empty());
        assert!(parse_injection_selector("   ").is_empty());
    }

    #[test]
    fn scores_deeper_and_more_specific_matches_higher() {
        let scopes = ["source.js", "meta.embedded.block", "string.quoted"];

        let shallow = path(&["source"]).score(&scopes).unwrap();
        let specific = path(&["source.js"]).score(&scopes).unwrap();
        let deep = path(&["string"]).score(&scopes).unwrap();
        assert!(specific > shallow);
        assert!(deep > specific);

        assert_eq!(path(&["comment"]).score(&scopes), None);
        // order matters in a path
        assert_eq!(path(&["string", "source"]).score(&scopes), None);
        assert!(path(&["source", "string"]).score(&scopes).is_some());
    }

    #[test]
    fn negation_excludes() {
        let res = parse_injection_selector("source.js -string");
        let in_code = ["source.js", "meta.function"];
        let in_string = ["source.js", "string.quoted"];
        assert!(res[0].weigh(&in_code).unwrap() > 0);
        assert_eq!(res[0].weigh(&in_string), None);
        assert_eq!(path(&["x"]).score(&[]), None);
        assert_eq!(
            SelectorMatcher::Not(Box::new(path(&["x"]))).score(&in_code),
            Some(0)
        );
    }
}
