use std::fmt;
use std::io;

use crate::grammars::NodeId;

pub(crate) type MatcherResult<T> = Result<T, Error>;

/// Errors that can occur while loading grammars or searching for matches
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred when reading a grammar file
    Io(io::Error),

    /// JSON parsing failed when loading a grammar.
    Json(serde_json::Error),

    /// The host asked for the search to stop.
    /// Never cached: the same query can be retried later.
    Cancelled,

    /// A pattern failed to compile when it was first used.
    /// End patterns are built at runtime from begin captures so they can't all be
    /// validated ahead.
    #[allow(missing_docs)]
    InvalidRegex { pattern: String, message: String },

    /// A node handle that doesn't belong to the syntax tree was given to the engine
    UnknownNode(NodeId),

    /// Grouping nodes included each other deeper than the configured limit.
    /// Only happens with grammars containing an include cycle.
    #[allow(missing_docs)]
    RecursionLimit { node: NodeId, depth: usize },

    /// An `include` could not be resolved while loading a grammar
    UnresolvedInclude(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Json(err) => write!(f, "JSON parsing error: {}", err),
            Error::Cancelled => write!(f, "matching was cancelled"),
            Error::InvalidRegex { pattern, message } => {
                write!(f, "invalid regex '{}': {}", pattern, message)
            }
            Error::UnknownNode(id) => write!(f, "node {} is not part of the syntax tree", **id),
            Error::RecursionLimit { node, depth } => {
                write!(f, "recursion limit of {} reached at node {}", depth, **node)
            }
            Error::UnresolvedInclude(include) => write!(f, "unresolved include '{}'", include),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Cancelled
            | Error::InvalidRegex { .. }
            | Error::UnknownNode(_)
            | Error::RecursionLimit { .. }
            | Error::UnresolvedInclude(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl Error {
    /// Whether this error is the cooperative cancellation signal rather than a real failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
