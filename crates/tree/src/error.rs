use thiserror::Error;

/// Failures of the tree model: reading, writing and structural edits.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The input text is not well-formed XML.
    #[error("XML parsing failed at byte {position}: {message}")]
    Parse { position: u64, message: String },

    /// Input bytes are not valid UTF-8.
    #[error("XML input is not valid UTF-8: {0}")]
    Utf8(String),

    /// The document contains no root element.
    #[error("document has no root element")]
    NoRootElement,

    /// A prefix is used without an in-scope declaration.
    #[error("namespace prefix '{0}' is not bound")]
    UnboundPrefix(String),

    /// An element already carries an attribute with this expanded name.
    #[error("duplicate attribute '{0}'")]
    DuplicateAttribute(String),

    /// A sibling operation was requested on a node without parent.
    #[error("node has no parent")]
    Detached,

    /// Writing XML text failed.
    #[error("XML serialization failed: {0}")]
    Serialize(String),
}
