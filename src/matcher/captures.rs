use std::ops::Range;

use crate::grammars::{Captures, MatchData};
use crate::text::StringWithId;

/// A named capture group that captured something
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureMatchData<'a> {
    /// Byte range in the matched string
    pub range: Range<usize>,
    pub group: usize,
    pub name: &'a str,
}

/// Turns the groups of a match into named captures, ordered by group index.
///
/// Groups that are out of range, captured nothing or have an empty name are skipped.
pub fn match_captures<'a>(
    captures: &'a Captures,
    match_data: &MatchData,
) -> Vec<CaptureMatchData<'a>> {
    captures
        .iter()
        .filter_map(|(&group, name)| {
            let range = match_data.range(group)?;
            if name.is_empty() || range.is_empty() {
                return None;
            }
            Some(CaptureMatchData {
                range,
                group,
                name: name.as_str(),
            })
        })
        .collect()
}

/// Finds `\` followed by digits, returning the byte range of the token and the group index.
/// The index is `None` if it doesn't fit in a `usize`.
fn next_backreference(pattern: &str, from: usize) -> Option<(Range<usize>, Option<usize>)> {
    let bytes = pattern.as_bytes();
    let mut start = from;
    while let Some(pos) = pattern[start..].find('\\') {
        let slash = start + pos;
        let digits_end = bytes[slash + 1..]
            .iter()
            .position(|b| !b.is_ascii_digit())
            .map_or(bytes.len(), |p| slash + 1 + p);
        if digits_end > slash + 1 {
            let index = pattern[slash + 1..digits_end].parse::<usize>().ok();
            return Some((slash..digits_end, index));
        }
        start = slash + 1;
    }
    None
}

/// Whether the pattern contains a `\N` token
pub fn has_backreferences(pattern: &str) -> bool {
    next_backreference(pattern, 0).is_some()
}

/// Replaces `\N` tokens in `template` with the escaped text of group N of `match_data`.
///
/// Tokens referring to groups the match doesn't have are left as is. Without a source string
/// or a successful match, the template is returned unchanged.
///
/// Used for end patterns that must close exactly what their begin opened, eg a heredoc:
/// a begin of `<<(\w+)` matching `<<EOF` turns an end of `^\1$` into `^EOF$`.
pub fn resolve_backreferences(
    template: &str,
    source: Option<&StringWithId>,
    match_data: &MatchData,
) -> String {
    let Some(source) = source else {
        return template.to_owned();
    };
    if !match_data.matched() {
        return template.to_owned();
    }

    let mut result = String::with_capacity(template.len());
    let mut last = 0;
    let mut search_from = 0;
    while let Some((token, index)) = next_backreference(template, search_from) {
        search_from = token.end;
        let Some(text) = index.and_then(|i| match_data.text(i, source.as_str())) else {
            continue;
        };
        result.push_str(&template[last..token.start]);
        escape_regex(text, &mut result);
        last = token.end;
    }
    result.push_str(&template[last..]);
    result
}

/// Appends `text` to `out` so it matches literally in a pattern.
///
/// Letters, digits, spaces and non-ASCII characters are kept, control characters that have
/// an escape use it and every other ASCII character gets a backslash.
pub fn escape_regex(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == ' ' || c.is_ascii_alphanumeric() || !c.is_ascii() => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captures(entries: &[(usize, &str)]) -> Captures {
        entries.iter().map(|&(i, n)| (i, n.to_owned())).collect()
    }

    #[test]
    fn substitutes_captured_text() {
        let source = StringWithId::new("AB 12");
        let data = MatchData::new(vec![0..5, 0..2, 3..5]);

        assert_eq!(
            resolve_backreferences(r"end-\1-\2", Some(&source), &data),
            "end-AB-12"
        );
    }

    #[test]
    fn keeps_out_of_range_references() {
        let source = StringWithId::new("AB 12");
        let data = MatchData::new(vec![0..5, 0..2, 3..5]);

        assert_eq!(
            resolve_backreferences(r"\9-\2-\1", Some(&source), &data),
            r"\9-12-AB"
        );
        assert_eq!(
            resolve_backreferences(r"\99999999999999999999999", Some(&source), &data),
            r"\99999999999999999999999"
        );
    }

    #[test]
    fn multi_digit_and_whole_match_references() {
        let source = StringWithId::new("abcdefghijkl");
        let groups = (0..12).map(|i| i..i + 1).collect();
        let data = MatchData::new(groups);

        assert_eq!(resolve_backreferences(r"\11|\0|\1x", Some(&source), &data), "l|a|bx");
    }

    #[test]
    fn escapes_substituted_text() {
        let source = StringWithId::new("a.b*(c)");
        let data = MatchData::new(vec![0..7]);

        assert_eq!(
            resolve_backreferences(r"^\0$", Some(&source), &data),
            r"^a\.b\*\(c\)$"
        );
    }

    #[test]
    fn unchanged_without_source_or_match() {
        let source = StringWithId::new("AB");
        assert_eq!(
            resolve_backreferences(r"\1", None, &MatchData::new(vec![0..2, 0..2])),
            r"\1"
        );
        assert_eq!(
            resolve_backreferences(r"\1", Some(&source), &MatchData::not_matched()),
            r"\1"
        );
    }

    #[test]
    fn text_without_references_is_copied() {
        let source = StringWithId::new("x");
        let data = MatchData::new(vec![0..1]);
        assert_eq!(
            resolve_backreferences(r"\s*\w+\\", Some(&source), &data),
            r"\s*\w+\\"
        );
    }

    #[test]
    fn detects_backreferences() {
        assert!(has_backreferences(r"^\1$"));
        assert!(has_backreferences(r"\s*\12"));
        assert!(!has_backreferences(r"\s*\w+"));
        assert!(!has_backreferences(r"trailing\"));
    }

    #[test]
    fn escape_regex_keeps_words_and_unicode() {
        let mut out = String::new();
        escape_regex("hé llo\t$[x]-\n", &mut out);
        assert_eq!(out, r"hé llo\t\$\[x\]\-\n");
    }

    #[test]
    fn named_captures_sorted_and_filtered() {
        let data = MatchData::new(vec![0..10, 0..3, 4..4, 5..10]);
        let names = captures(&[
            (3, "entity.name"),
            (0, "meta.whole"),
            (1, ""),
            (2, "empty.capture"),
            (7, "out.of.range"),
        ]);

        let found = match_captures(&names, &data);
        assert_eq!(
            found,
            vec![
                CaptureMatchData {
                    range: 0..10,
                    group: 0,
                    name: "meta.whole",
                },
                CaptureMatchData {
                    range: 5..10,
                    group: 3,
                    name: "entity.name",
                },
            ]
        );
        assert!(match_captures(&names, &MatchData::not_matched()).is_empty());
    }
}
