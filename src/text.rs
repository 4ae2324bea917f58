//! Text with a stable identity.
//!
//! The match cache keys on the identity of the searched line, not on its content, so the
//! host must keep handing the same `StringWithId` for a line it is re-lexing to get hits.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STRING_ID: AtomicU64 = AtomicU64::new(0);

/// Identity token of a [`StringWithId`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StringId(u64);

/// An immutable string paired with an identity token.
///
/// Clones share the identity. Two strings built separately from the same content
/// get different identities.
#[derive(Clone)]
pub struct StringWithId {
    id: StringId,
    text: Arc<str>,
}

impl StringWithId {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self {
            id: StringId(NEXT_STRING_ID.fetch_add(1, Ordering::Relaxed)),
            text: text.into(),
        }
    }

    pub fn id(&self) -> StringId {
        self.id
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The text in the given byte range, if it is in bounds and on char boundaries
    pub fn slice(&self, range: Range<usize>) -> Option<&str> {
        self.text.get(range)
    }
}

impl PartialEq for StringWithId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StringWithId {}

impl Hash for StringWithId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl AsRef<str> for StringWithId {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Debug for StringWithId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringWithId(#{}, {:?})", self.id.0, &*self.text)
    }
}
