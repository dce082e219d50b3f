//! Error type shared by the parser, the evaluator and the builder.
//!
//! Every failure is reported synchronously; nothing is retried. Entry points
//! that edit the caller's tree in place may leave the elements created before
//! the failing step attached (see [`crate::resolver`]).

use ensure_xpath_tree::TreeError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The expression starts with `/`; only relative paths are supported.
    #[error("absolute xPaths are not supported: '{0}'")]
    AbsolutePath(String),

    /// The expression uses a construct outside the supported subset.
    #[error("xPath is not supported: '{path}' (unmatched remainder '{remainder}')")]
    Grammar {
        /// Input from the point where matching stopped.
        remainder: String,
        /// Whole expression as given.
        path: String,
    },

    /// Structurally impossible path, or the path still does not resolve
    /// after creation.
    #[error("{0}")]
    Format(String),

    /// An element was requested but the path ends in an attribute.
    #[error("xPath must end in element, not attribute: '{0}'")]
    NotAnElement(String),

    /// A namespace prefix the resolver does not know.
    #[error("namespace prefix '{0}' is not defined")]
    UnknownPrefix(String),

    #[error("{what} exceeds the configured limit ({actual} > {limit})")]
    LimitExceeded {
        what: &'static str,
        limit: usize,
        actual: usize,
    },

    /// A node value that is not a timestamp.
    #[error("'{0}' is not a valid timestamp")]
    InvalidTimestamp(String),

    #[error(transparent)]
    Tree(#[from] TreeError),
}
