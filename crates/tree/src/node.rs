//! Mutable, order-preserving XML node handles.
//!
//! Focus:
//! - Identity semantics: two handles are equal only if they point at the same node
//! - In-place mutation (append, prepend, insert after, attribute upsert)
//! - Thread-safe (Arc + RwLock) so handles are `Send + Sync`
//! - Structural deep copy that shares nothing with the source
//!
//! Example:
//! ```
//! use ensure_xpath_tree::node::{elem, text, attr};
//!
//! // <root id="r"><child>Hello</child><child world="yes"/></root>
//! let root = elem("root")
//!     .attr(attr("id", "r"))
//!     .child(elem("child").child(text("Hello")))
//!     .child(elem("child").attr(attr("world", "yes")))
//!     .build();
//!
//! assert_eq!(root.local_name(), Some("root"));
//! assert_eq!(root.child_elements().len(), 2);
//! assert_eq!(root.string_value(), "Hello");
//! ```
//!
//! Copies have their own identity:
//! ```
//! use ensure_xpath_tree::node::elem;
//! let original = elem("root").child(elem("a")).build();
//! let copy = original.deep_clone();
//! assert_ne!(original, copy);
//! assert_eq!(original.to_xml_string().unwrap(), copy.to_xml_string().unwrap());
//! ```
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::error::TreeError;
use crate::model::{NodeKind, QName, XML_NS};

#[derive(Debug)]
pub(crate) struct Inner {
    kind: NodeKind,
    name: Option<QName>,
    value: RwLock<Option<String>>, // attribute / text / comment / PI / namespace content
    parent: RwLock<Option<Weak<Inner>>>,
    attributes: RwLock<Vec<XmlNode>>,
    namespaces: RwLock<Vec<XmlNode>>,
    children: RwLock<Vec<XmlNode>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Arc-backed handle to a node of an XML tree.
#[derive(Clone)]
pub struct XmlNode(pub(crate) Arc<Inner>);

impl PartialEq for XmlNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for XmlNode {}
impl std::hash::Hash for XmlNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for XmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlNode")
            .field("kind", &self.0.kind)
            .field("name", &self.0.name)
            .field("value", &*read(&self.0.value))
            .finish()
    }
}

impl fmt::Display for XmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let xml = self.to_xml_string().map_err(|_| fmt::Error)?;
        f.write_str(&xml)
    }
}

/// Which list of the parent a node lives in.
#[derive(Clone, Copy)]
enum Slot {
    Attribute,
    Namespace,
    Child,
}

impl Slot {
    fn of(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Attribute => Slot::Attribute,
            NodeKind::Namespace => Slot::Namespace,
            _ => Slot::Child,
        }
    }
}

impl XmlNode {
    fn new(kind: NodeKind, name: Option<QName>, value: Option<String>) -> Self {
        XmlNode(Arc::new(Inner {
            kind,
            name,
            value: RwLock::new(value),
            parent: RwLock::new(None),
            attributes: RwLock::new(Vec::new()),
            namespaces: RwLock::new(Vec::new()),
            children: RwLock::new(Vec::new()),
        }))
    }

    pub fn new_document() -> Self {
        Self::new(NodeKind::Document, None, None)
    }

    pub fn new_element(name: QName) -> Self {
        Self::new(NodeKind::Element, Some(name), None)
    }

    pub fn new_attribute(name: QName, value: impl Into<String>) -> Self {
        Self::new(NodeKind::Attribute, Some(name), Some(value.into()))
    }

    pub fn new_text(value: impl Into<String>) -> Self {
        Self::new(NodeKind::Text, None, Some(value.into()))
    }

    pub fn new_comment(value: impl Into<String>) -> Self {
        Self::new(NodeKind::Comment, None, Some(value.into()))
    }

    pub fn new_processing_instruction(target: &str, data: impl Into<String>) -> Self {
        Self::new(NodeKind::ProcessingInstruction, Some(QName::local(target)), Some(data.into()))
    }

    /// Namespace declaration node; `prefix == None` declares the default namespace.
    /// An empty `uri` on the default namespace undeclares it (`xmlns=""`).
    pub fn new_namespace(prefix: Option<&str>, uri: &str) -> Self {
        let name = QName {
            prefix: prefix.map(str::to_owned),
            local: prefix.unwrap_or_default().to_owned(),
            ns_uri: Some(uri.to_owned()),
        };
        Self::new(NodeKind::Namespace, Some(name), Some(uri.to_owned()))
    }

    pub fn kind(&self) -> NodeKind {
        self.0.kind
    }

    pub fn is_element(&self) -> bool {
        self.0.kind == NodeKind::Element
    }

    pub fn is_attribute(&self) -> bool {
        self.0.kind == NodeKind::Attribute
    }

    pub fn name(&self) -> Option<&QName> {
        self.0.name.as_ref()
    }

    pub fn local_name(&self) -> Option<&str> {
        self.0.name.as_ref().map(|name| name.local.as_str())
    }

    pub fn namespace_uri(&self) -> Option<&str> {
        self.0.name.as_ref().and_then(|name| name.ns_uri.as_deref())
    }

    /// Own content of attribute, text, comment, PI and namespace nodes.
    pub fn value(&self) -> Option<String> {
        read(&self.0.value).clone()
    }

    pub fn set_value(&self, value: impl Into<String>) {
        *write(&self.0.value) = Some(value.into());
    }

    /// XPath string value: own content for leaf nodes, concatenated descendant
    /// text for elements and documents.
    pub fn string_value(&self) -> String {
        match self.kind() {
            NodeKind::Element | NodeKind::Document => {
                fn collect(n: &XmlNode, out: &mut String) {
                    for c in read(&n.0.children).iter() {
                        match c.kind() {
                            NodeKind::Text => {
                                if let Some(v) = &*read(&c.0.value) {
                                    out.push_str(v);
                                }
                            }
                            NodeKind::Element => collect(c, out),
                            _ => {}
                        }
                    }
                }
                let mut out = String::new();
                collect(self, &mut out);
                out
            }
            _ => self.value().unwrap_or_default(),
        }
    }

    pub fn parent(&self) -> Option<Self> {
        read(&self.0.parent).as_ref().and_then(Weak::upgrade).map(XmlNode)
    }

    pub fn children(&self) -> Vec<Self> {
        read(&self.0.children).clone()
    }

    pub fn child_elements(&self) -> Vec<Self> {
        read(&self.0.children).iter().filter(|c| c.is_element()).cloned().collect()
    }

    pub fn child_elements_named(&self, ns_uri: Option<&str>, local: &str) -> Vec<Self> {
        read(&self.0.children)
            .iter()
            .filter(|c| c.is_element() && c.0.name.as_ref().is_some_and(|n| n.matches(ns_uri, local)))
            .cloned()
            .collect()
    }

    /// First element child of a document (or element).
    pub fn document_element(&self) -> Option<Self> {
        read(&self.0.children).iter().find(|c| c.is_element()).cloned()
    }

    /// Element descendants in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<Self> {
        let mut out = Vec::new();
        fn walk(n: &XmlNode, out: &mut Vec<XmlNode>) {
            for c in read(&n.0.children).iter().filter(|c| c.is_element()) {
                out.push(c.clone());
                walk(c, out);
            }
        }
        walk(self, &mut out);
        out
    }

    pub fn first_child(&self) -> Option<Self> {
        read(&self.0.children).first().cloned()
    }

    pub fn last_child(&self) -> Option<Self> {
        read(&self.0.children).last().cloned()
    }

    /// Position among the parent's children (or attributes / namespaces).
    pub fn index_in_parent(&self) -> Option<usize> {
        let parent = self.parent()?;
        let list = parent.slot(Slot::of(self.kind()));
        read(list).iter().position(|n| n == self)
    }

    pub fn next_sibling(&self) -> Option<Self> {
        let parent = self.parent()?;
        let idx = self.index_in_parent()?;
        read(parent.slot(Slot::of(self.kind()))).get(idx + 1).cloned()
    }

    pub fn previous_sibling(&self) -> Option<Self> {
        let parent = self.parent()?;
        let idx = self.index_in_parent()?;
        idx.checked_sub(1).and_then(|i| read(parent.slot(Slot::of(self.kind()))).get(i).cloned())
    }

    pub fn attributes(&self) -> Vec<Self> {
        read(&self.0.attributes).clone()
    }

    pub fn attribute(&self, ns_uri: Option<&str>, local: &str) -> Option<Self> {
        read(&self.0.attributes)
            .iter()
            .find(|a| a.0.name.as_ref().is_some_and(|n| n.matches(ns_uri, local)))
            .cloned()
    }

    pub fn attribute_value(&self, ns_uri: Option<&str>, local: &str) -> Option<String> {
        self.attribute(ns_uri, local).and_then(|a| a.value())
    }

    /// Attach a new attribute; fails if one with the same expanded name exists.
    pub fn add_attribute(&self, name: QName, value: impl Into<String>) -> Result<Self, TreeError> {
        if self.attribute(name.ns_uri.as_deref(), &name.local).is_some() {
            return Err(TreeError::DuplicateAttribute(name.to_string()));
        }
        let attr = XmlNode::new_attribute(name, value);
        self.adopt(&attr);
        write(&self.0.attributes).push(attr.clone());
        Ok(attr)
    }

    /// Update the attribute if present, otherwise append it.
    pub fn set_attribute(&self, name: QName, value: impl Into<String>) -> Self {
        if let Some(existing) = self.attribute(name.ns_uri.as_deref(), &name.local) {
            existing.set_value(value);
            return existing;
        }
        let attr = XmlNode::new_attribute(name, value);
        self.adopt(&attr);
        write(&self.0.attributes).push(attr.clone());
        attr
    }

    pub fn namespaces(&self) -> Vec<Self> {
        read(&self.0.namespaces).clone()
    }

    /// Declare (or redeclare) a namespace binding on this element.
    pub fn declare_namespace(&self, prefix: Option<&str>, uri: &str) {
        let mut list = write(&self.0.namespaces);
        list.retain(|n| n.0.name.as_ref().and_then(|q| q.prefix.as_deref()) != prefix);
        let decl = XmlNode::new_namespace(prefix, uri);
        *write(&decl.0.parent) = Some(Arc::downgrade(&self.0));
        list.push(decl);
    }

    /// Resolve a prefix (`None` = default namespace) by walking the ancestor
    /// chain, including self.
    pub fn lookup_namespace_uri(&self, prefix: Option<&str>) -> Option<String> {
        if prefix == Some("xml") {
            return Some(XML_NS.to_owned());
        }
        let mut cur = if self.is_element() { Some(self.clone()) } else { self.parent() };
        while let Some(n) = cur {
            for decl in read(&n.0.namespaces).iter() {
                let declared = decl.0.name.as_ref().and_then(|q| q.prefix.as_deref());
                if declared == prefix {
                    return decl.value().filter(|uri| !uri.is_empty());
                }
            }
            cur = n.parent();
        }
        None
    }

    fn slot(&self, slot: Slot) -> &RwLock<Vec<XmlNode>> {
        match slot {
            Slot::Attribute => &self.0.attributes,
            Slot::Namespace => &self.0.namespaces,
            Slot::Child => &self.0.children,
        }
    }

    fn adopt(&self, node: &XmlNode) {
        node.detach();
        *write(&node.0.parent) = Some(Arc::downgrade(&self.0));
    }

    /// Append as last child. A node that already has a parent is moved.
    pub fn append_child(&self, child: &XmlNode) {
        debug_assert!(matches!(Slot::of(child.kind()), Slot::Child));
        self.adopt(child);
        write(&self.0.children).push(child.clone());
    }

    /// Insert as first child. A node that already has a parent is moved.
    pub fn prepend_child(&self, child: &XmlNode) {
        debug_assert!(matches!(Slot::of(child.kind()), Slot::Child));
        self.adopt(child);
        write(&self.0.children).insert(0, child.clone());
    }

    /// Insert `sibling` immediately after `self` under the same parent.
    pub fn insert_after(&self, sibling: &XmlNode) -> Result<(), TreeError> {
        let parent = self.parent().ok_or(TreeError::Detached)?;
        if sibling == self {
            return Ok(());
        }
        parent.adopt(sibling);
        let mut children = write(&parent.0.children);
        let idx = children.iter().position(|n| n == self).ok_or(TreeError::Detached)?;
        children.insert(idx + 1, sibling.clone());
        Ok(())
    }

    /// Remove from the parent; no-op for detached nodes.
    pub fn detach(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        write(parent.slot(Slot::of(self.kind()))).retain(|n| n != self);
        *write(&self.0.parent) = None;
    }

    /// Recursive structural copy. The copy is detached and shares no node with
    /// the source.
    pub fn deep_clone(&self) -> Self {
        let copy = XmlNode::new(self.0.kind, self.0.name.clone(), self.value());
        for list in [Slot::Namespace, Slot::Attribute, Slot::Child] {
            let cloned: Vec<XmlNode> = read(self.slot(list))
                .iter()
                .map(|n| {
                    let c = n.deep_clone();
                    *write(&c.0.parent) = Some(Arc::downgrade(&copy.0));
                    c
                })
                .collect();
            *write(copy.slot(list)) = cloned;
        }
        copy
    }
}

pub struct XmlNodeBuilder {
    node: XmlNode,
    pending_children: Vec<XmlNode>,
    pending_attrs: Vec<XmlNode>,
    pending_ns: Vec<XmlNode>,
}

impl XmlNodeBuilder {
    fn new(node: XmlNode) -> Self {
        Self { node, pending_children: Vec::new(), pending_attrs: Vec::new(), pending_ns: Vec::new() }
    }

    pub fn child(mut self, child: impl Into<XmlNodeOrBuilder>) -> Self {
        self.pending_children.push(child.into().finish());
        self
    }

    pub fn attr(mut self, attr: XmlNode) -> Self {
        debug_assert!(attr.is_attribute());
        self.pending_attrs.push(attr);
        self
    }

    pub fn namespace(mut self, ns: XmlNode) -> Self {
        debug_assert!(ns.kind() == NodeKind::Namespace);
        self.pending_ns.push(ns);
        self
    }

    pub fn build(self) -> XmlNode {
        for n in &self.pending_ns {
            *write(&n.0.parent) = Some(Arc::downgrade(&self.node.0));
        }
        write(&self.node.0.namespaces).extend(self.pending_ns);
        for a in &self.pending_attrs {
            *write(&a.0.parent) = Some(Arc::downgrade(&self.node.0));
        }
        write(&self.node.0.attributes).extend(self.pending_attrs);
        for c in &self.pending_children {
            *write(&c.0.parent) = Some(Arc::downgrade(&self.node.0));
        }
        write(&self.node.0.children).extend(self.pending_children);
        self.node
    }
}

pub enum XmlNodeOrBuilder {
    Built(XmlNode),
    Builder(XmlNodeBuilder),
}

impl XmlNodeOrBuilder {
    fn finish(self) -> XmlNode {
        match self {
            XmlNodeOrBuilder::Built(n) => n,
            XmlNodeOrBuilder::Builder(b) => b.build(),
        }
    }
}

impl From<XmlNode> for XmlNodeOrBuilder {
    fn from(n: XmlNode) -> Self {
        XmlNodeOrBuilder::Built(n)
    }
}
impl From<XmlNodeBuilder> for XmlNodeOrBuilder {
    fn from(b: XmlNodeBuilder) -> Self {
        XmlNodeOrBuilder::Builder(b)
    }
}

// Convenience helpers for concise test code
pub fn doc() -> XmlNodeBuilder {
    XmlNodeBuilder::new(XmlNode::new_document())
}
/// Element with a lexical name (`prefix:local` keeps the prefix, no namespace).
pub fn elem(name: &str) -> XmlNodeBuilder {
    XmlNodeBuilder::new(XmlNode::new_element(QName::parse_lexical(name)))
}
pub fn elem_ns(ns_uri: &str, local: &str) -> XmlNodeBuilder {
    XmlNodeBuilder::new(XmlNode::new_element(QName::with_ns(ns_uri, local)))
}
pub fn attr(name: &str, value: &str) -> XmlNode {
    XmlNode::new_attribute(QName::local(name), value)
}
pub fn text(value: &str) -> XmlNode {
    XmlNode::new_text(value)
}
pub fn comment(value: &str) -> XmlNode {
    XmlNode::new_comment(value)
}
pub fn ns(prefix: Option<&str>, uri: &str) -> XmlNode {
    XmlNode::new_namespace(prefix, uri)
}
