//! Scope names and scope paths.
//!
//! A scope is a dot-separated name like `source.rust.meta.function`. A scope path is the
//! space-separated list of scopes currently open, outermost first, e.g.
//! `source.js meta.embedded string.quoted`.

/// Joins the open scope names into the path used by the search and the selector weigher.
/// Missing and empty names are skipped.
pub fn scope_path<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut out = String::new();
    for name in names.into_iter().flatten() {
        if name.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(name);
    }
    out
}

/// Splits a scope path back into its scopes
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split_whitespace().collect()
}

/// Whether `prefix` names `scope` or one of its parents, on atom boundaries:
/// `string` is a prefix of `string.quoted` but not of `strings`.
#[inline]
pub(crate) fn is_prefix_of(prefix: &str, scope: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match scope.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

/// Number of dot-separated atoms in a scope
#[inline]
pub(crate) fn atom_count(scope: &str) -> usize {
    scope.split('.').filter(|atom| !atom.is_empty()).count()
}
