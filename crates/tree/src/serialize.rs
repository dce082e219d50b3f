//! [`XmlNode`] trees to XML text with the quick-xml writer.
//!
//! Prefixes are chosen from the bindings in scope while writing: a node's own
//! prefix wins when it is bound to the right URI, then the default namespace,
//! then any other in-scope prefix; only if none fits is a declaration emitted.
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesPI, BytesStart, BytesText, Event};

use crate::error::TreeError;
use crate::model::{NodeKind, QName, XML_NS};
use crate::node::XmlNode;

impl XmlNode {
    /// Compact XML text of this node and its subtree.
    pub fn to_xml_string(&self) -> Result<String, TreeError> {
        let mut writer = Writer::new(Vec::new());
        let mut scope = Scope::default();
        write_node(&mut writer, self, &mut scope)?;
        String::from_utf8(writer.into_inner()).map_err(|e| TreeError::Serialize(e.to_string()))
    }
}

/// Stack of `(prefix, uri)` bindings; `uri == None` undeclares the default namespace.
#[derive(Default)]
struct Scope {
    bindings: Vec<(Option<String>, Option<String>)>,
    generated: usize,
}

impl Scope {
    fn lookup(&self, prefix: Option<&str>) -> Option<Option<&str>> {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_deref())
    }

    fn is_bound(&self, prefix: Option<&str>, uri: &str) -> bool {
        self.lookup(prefix) == Some(Some(uri))
    }

    /// Some non-default prefix currently bound to `uri`.
    fn prefix_for(&self, uri: &str) -> Option<String> {
        self.bindings
            .iter()
            .rev()
            .filter_map(|(p, u)| p.as_deref().filter(|_| u.as_deref() == Some(uri)))
            .find(|p| self.is_bound(Some(*p), uri))
            .map(str::to_owned)
    }

    fn fresh_prefix(&mut self) -> String {
        loop {
            self.generated += 1;
            let candidate = format!("ns{}", self.generated);
            if self.lookup(Some(&candidate)).is_none() {
                return candidate;
            }
        }
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode, scope: &mut Scope) -> Result<(), TreeError> {
    match node.kind() {
        NodeKind::Document => {
            for child in node.children() {
                write_node(writer, &child, scope)?;
            }
            Ok(())
        }
        NodeKind::Element => write_element(writer, node, scope),
        NodeKind::Text => emit(writer, Event::Text(BytesText::new(&node.string_value()))),
        NodeKind::Comment => emit(writer, Event::Comment(BytesText::from_escaped(node.string_value()))),
        NodeKind::ProcessingInstruction => {
            let target = node.local_name().unwrap_or_default();
            let content = node.value().unwrap_or_default();
            let body = if content.is_empty() { target.to_owned() } else { format!("{target} {content}") };
            emit(writer, Event::PI(BytesPI::new(body)))
        }
        // Standalone attribute / namespace nodes have no element syntax of their own.
        NodeKind::Attribute | NodeKind::Namespace => {
            emit(writer, Event::Text(BytesText::new(&node.string_value())))
        }
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, node: &XmlNode, scope: &mut Scope) -> Result<(), TreeError> {
    let mark = scope.bindings.len();
    let mut declarations: Vec<(String, String)> = Vec::new();

    for decl in node.namespaces() {
        let prefix = decl.name().and_then(|q| q.prefix.clone());
        let uri = decl.value().unwrap_or_default();
        let key = prefix.as_ref().map_or_else(|| "xmlns".to_owned(), |p| format!("xmlns:{p}"));
        declarations.push((key, uri.clone()));
        scope.bindings.push((prefix, Some(uri).filter(|u| !u.is_empty())));
    }

    let tag = match node.name() {
        Some(name) => element_tag(name, scope, &mut declarations),
        None => String::new(),
    };

    let mut attributes: Vec<(String, String)> = Vec::new();
    for attr in node.attributes() {
        let Some(name) = attr.name() else { continue };
        let key = attribute_key(name, scope, &mut declarations);
        attributes.push((key, attr.value().unwrap_or_default()));
    }

    let mut start = BytesStart::new(tag.as_str());
    for (key, value) in declarations.iter().chain(attributes.iter()) {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    let children = node.children();
    if children.is_empty() {
        emit(writer, Event::Empty(start))?;
    } else {
        emit(writer, Event::Start(start))?;
        for child in &children {
            write_node(writer, child, scope)?;
        }
        emit(writer, Event::End(BytesEnd::new(tag.as_str())))?;
    }

    scope.bindings.truncate(mark);
    Ok(())
}

fn element_tag(name: &QName, scope: &mut Scope, declarations: &mut Vec<(String, String)>) -> String {
    let Some(uri) = name.ns_uri.as_deref() else {
        if let Some(prefix) = name.prefix.as_deref() {
            // Lexical prefix without namespace, written as given.
            return format!("{prefix}:{}", name.local);
        }
        if matches!(scope.lookup(None), Some(Some(_))) {
            declarations.push(("xmlns".to_owned(), String::new()));
            scope.bindings.push((None, None));
        }
        return name.local.clone();
    };

    if let Some(prefix) = name.prefix.as_deref().filter(|p| scope.is_bound(Some(*p), uri)) {
        return format!("{prefix}:{}", name.local);
    }
    if scope.is_bound(None, uri) {
        return name.local.clone();
    }
    if let Some(prefix) = scope.prefix_for(uri) {
        return format!("{prefix}:{}", name.local);
    }
    match name.prefix.as_deref() {
        Some(prefix) => {
            declarations.push((format!("xmlns:{prefix}"), uri.to_owned()));
            scope.bindings.push((Some(prefix.to_owned()), Some(uri.to_owned())));
            format!("{prefix}:{}", name.local)
        }
        None => {
            declarations.push(("xmlns".to_owned(), uri.to_owned()));
            scope.bindings.push((None, Some(uri.to_owned())));
            name.local.clone()
        }
    }
}

fn attribute_key(name: &QName, scope: &mut Scope, declarations: &mut Vec<(String, String)>) -> String {
    let Some(uri) = name.ns_uri.as_deref() else {
        return match name.prefix.as_deref() {
            Some(prefix) => format!("{prefix}:{}", name.local),
            None => name.local.clone(),
        };
    };
    if uri == XML_NS {
        return format!("xml:{}", name.local);
    }
    // Attributes never use the default namespace.
    if let Some(prefix) = name.prefix.as_deref().filter(|p| scope.is_bound(Some(*p), uri)) {
        return format!("{prefix}:{}", name.local);
    }
    if let Some(prefix) = scope.prefix_for(uri) {
        return format!("{prefix}:{}", name.local);
    }
    let prefix = match name.prefix.as_deref() {
        Some(p) if scope.lookup(Some(p)).is_none() => p.to_owned(),
        _ => scope.fresh_prefix(),
    };
    declarations.push((format!("xmlns:{prefix}"), uri.to_owned()));
    scope.bindings.push((Some(prefix.clone()), Some(uri.to_owned())));
    format!("{prefix}:{}", name.local)
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), TreeError> {
    writer.write_event(event).map_err(|e| TreeError::Serialize(e.to_string()))
}
