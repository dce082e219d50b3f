use std::fmt;

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace of `xmlns` / `xmlns:*` declarations.
pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

/// Qualified name of an element or attribute.
///
/// Names compare by `(ns_uri, local)` through [`QName::matches`]; the prefix
/// is kept only so serialization can reproduce it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    /// Unqualified name without namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self { prefix: None, local: local.into(), ns_uri: None }
    }

    /// Name in `ns_uri`, without a preferred prefix.
    pub fn with_ns(ns_uri: impl Into<String>, local: impl Into<String>) -> Self {
        Self { prefix: None, local: local.into(), ns_uri: Some(ns_uri.into()) }
    }

    /// Name in an optional namespace; `None` or an empty URI means "no namespace".
    pub fn in_ns(ns_uri: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            ns_uri: ns_uri.filter(|uri| !uri.is_empty()).map(str::to_owned),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Split `prefix:local` lexically. No namespace is resolved.
    pub fn parse_lexical(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((prefix, local)) => {
                Self { prefix: Some(prefix.to_owned()), local: local.to_owned(), ns_uri: None }
            }
            None => Self::local(raw),
        }
    }

    /// Expanded-name equality.
    pub fn matches(&self, ns_uri: Option<&str>, local: &str) -> bool {
        self.local == local && self.ns_uri.as_deref() == ns_uri
    }

    pub fn same_expanded(&self, other: &QName) -> bool {
        self.matches(other.ns_uri.as_deref(), &other.local)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.prefix, &self.ns_uri) {
            (Some(prefix), _) => write!(f, "{prefix}:{}", self.local),
            (None, Some(ns)) => write!(f, "{{{ns}}}{}", self.local),
            (None, None) => f.write_str(&self.local),
        }
    }
}
