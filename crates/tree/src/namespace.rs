use std::collections::HashMap;

use crate::model::{XML_NS, XMLNS_NS};
use crate::node::XmlNode;

/// Maps namespace prefixes to URIs.
pub trait NamespaceResolver {
    /// URI bound to `prefix`, or `None` when the prefix is unknown.
    fn lookup_namespace(&self, prefix: &str) -> Option<String>;
}

/// Resolver that only knows the reserved `xml` and `xmlns` prefixes.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyResolver;

impl NamespaceResolver for EmptyResolver {
    fn lookup_namespace(&self, prefix: &str) -> Option<String> {
        reserved(prefix).map(str::to_owned)
    }
}

fn reserved(prefix: &str) -> Option<&'static str> {
    match prefix {
        "xml" => Some(XML_NS),
        "xmlns" => Some(XMLNS_NS),
        _ => None,
    }
}

/// Mutable prefix table, the usual way to hand prefixes to queries.
///
/// ```
/// use ensure_xpath_tree::{NamespaceManager, NamespaceResolver};
/// let ns = NamespaceManager::new().with("tva", "urn:tva:metadata:2010");
/// assert_eq!(ns.lookup_namespace("tva").as_deref(), Some("urn:tva:metadata:2010"));
/// assert!(ns.lookup_namespace("xml").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct NamespaceManager {
    bindings: HashMap<String, String>,
}

impl NamespaceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_namespace(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.bindings.insert(prefix.into(), uri.into());
    }

    pub fn with(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.add_namespace(prefix, uri);
        self
    }

    pub fn remove_namespace(&mut self, prefix: &str) -> Option<String> {
        self.bindings.remove(prefix)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl NamespaceResolver for NamespaceManager {
    fn lookup_namespace(&self, prefix: &str) -> Option<String> {
        reserved(prefix).map(str::to_owned).or_else(|| self.bindings.get(prefix).cloned())
    }
}

impl<S: std::hash::BuildHasher> NamespaceResolver for HashMap<String, String, S> {
    fn lookup_namespace(&self, prefix: &str) -> Option<String> {
        reserved(prefix).map(str::to_owned).or_else(|| self.get(prefix).cloned())
    }
}

/// Resolves against the declarations in scope at the node.
impl NamespaceResolver for XmlNode {
    fn lookup_namespace(&self, prefix: &str) -> Option<String> {
        reserved(prefix).map(str::to_owned).or_else(|| self.lookup_namespace_uri(Some(prefix)))
    }
}

impl<R: NamespaceResolver + ?Sized> NamespaceResolver for &R {
    fn lookup_namespace(&self, prefix: &str) -> Option<String> {
        (**self).lookup_namespace(prefix)
    }
}
