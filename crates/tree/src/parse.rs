//! XML text to [`XmlNode`] trees on top of the quick-xml pull reader.
//!
//! Namespace prefixes are resolved while reading; whitespace-only text between
//! elements is dropped, the way a non-whitespace-preserving DOM load behaves.
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use crate::error::TreeError;
use crate::model::{NodeKind, QName};
use crate::node::XmlNode;

impl XmlNode {
    /// Parse a document and return its root element, detached.
    pub fn parse_str(xml: &str) -> Result<Self, TreeError> {
        parse_element(xml)
    }

    /// Like [`XmlNode::parse_str`] for UTF-8 bytes (a leading BOM is skipped).
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, TreeError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let xml = std::str::from_utf8(bytes).map_err(|e| TreeError::Utf8(e.to_string()))?;
        parse_element(xml)
    }

    /// Parse into a document node that owns the root element.
    pub fn parse_document(xml: &str) -> Result<Self, TreeError> {
        parse_document(xml)
    }
}

pub fn parse_element(xml: &str) -> Result<XmlNode, TreeError> {
    let document = parse_document(xml)?;
    let root = document.document_element().ok_or(TreeError::NoRootElement)?;
    root.detach();
    Ok(root)
}

pub fn parse_document(xml: &str) -> Result<XmlNode, TreeError> {
    let mut reader = Reader::from_str(xml);
    let document = XmlNode::new_document();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut pending_text = String::new();

    loop {
        let position = u64::try_from(reader.buffer_position()).unwrap_or(u64::MAX);
        let event = reader.read_event().map_err(|e| parse_error(position, e))?;
        if !matches!(event, Event::Text(_) | Event::CData(_) | Event::GeneralRef(_)) {
            flush_text(stack.last().unwrap_or(&document), &mut pending_text, position)?;
        }
        match event {
            Event::Start(start) => {
                let parent = stack.last().unwrap_or(&document);
                let element = open_element(&start, parent, position)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let parent = stack.last().unwrap_or(&document);
                open_element(&start, parent, position)?;
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(t) => {
                let raw = utf8(&t, position)?;
                let text = unescape(raw).map_err(|e| parse_error(position, e))?;
                pending_text.push_str(&text);
            }
            Event::CData(c) => pending_text.push_str(utf8(&c, position)?),
            Event::GeneralRef(r) => {
                let name = utf8(&r, position)?;
                let resolved = resolve_reference(name).ok_or_else(|| {
                    parse_error(position, format!("unknown entity reference '&{name};'"))
                })?;
                pending_text.push(resolved);
            }
            Event::Comment(c) => {
                let parent = stack.last().unwrap_or(&document);
                parent.append_child(&XmlNode::new_comment(utf8(&c, position)?));
            }
            Event::PI(pi) => {
                let parent = stack.last().unwrap_or(&document);
                let target = utf8(pi.target(), position)?;
                let content = utf8(pi.content(), position)?.trim_start();
                parent.append_child(&XmlNode::new_processing_instruction(target, content));
            }
            Event::Eof => {
                if let Some(open) = stack.last() {
                    let name = open.name().map(ToString::to_string).unwrap_or_default();
                    return Err(parse_error(position, format!("unclosed element '{name}'")));
                }
                break;
            }
            _ => {}
        }
    }

    let Some(root) = document.document_element() else {
        return Err(TreeError::NoRootElement);
    };
    tracing::trace!(root = %root.name().map(ToString::to_string).unwrap_or_default(), "parsed XML document");
    Ok(document)
}

fn open_element(start: &BytesStart<'_>, parent: &XmlNode, position: u64) -> Result<XmlNode, TreeError> {
    if parent.kind() == NodeKind::Document && parent.document_element().is_some() {
        return Err(parse_error(position, "more than one root element"));
    }

    let raw_name = utf8(start.name().as_ref(), position)?.to_owned();
    let mut declarations: Vec<(Option<String>, String)> = Vec::new();
    let mut plain: Vec<(String, String)> = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| parse_error(position, e))?;
        let key = utf8(attribute.key.as_ref(), position)?.to_owned();
        let value = unescape(utf8(&attribute.value, position)?)
            .map_err(|e| parse_error(position, e))?
            .into_owned();
        if key == "xmlns" {
            declarations.push((None, value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declarations.push((Some(prefix.to_owned()), value));
        } else {
            plain.push((key, value));
        }
    }

    let resolve = |prefix: Option<&str>| -> Option<String> {
        match declarations.iter().rev().find(|(p, _)| p.as_deref() == prefix) {
            Some((_, uri)) => Some(uri.clone()).filter(|uri| !uri.is_empty()),
            None => parent.lookup_namespace_uri(prefix),
        }
    };

    let mut name = QName::parse_lexical(&raw_name);
    name.ns_uri = match name.prefix.as_deref() {
        Some(prefix) => Some(resolve(Some(prefix)).ok_or_else(|| TreeError::UnboundPrefix(prefix.to_owned()))?),
        None => resolve(None),
    };

    let element = XmlNode::new_element(name);
    for (prefix, uri) in &declarations {
        element.declare_namespace(prefix.as_deref(), uri);
    }
    for (key, value) in plain {
        let mut attr_name = QName::parse_lexical(&key);
        if let Some(prefix) = attr_name.prefix.as_deref() {
            attr_name.ns_uri =
                Some(resolve(Some(prefix)).ok_or_else(|| TreeError::UnboundPrefix(prefix.to_owned()))?);
        }
        element.add_attribute(attr_name, value)?;
    }
    parent.append_child(&element);
    Ok(element)
}

fn flush_text(parent: &XmlNode, pending: &mut String, position: u64) -> Result<(), TreeError> {
    if pending.is_empty() {
        return Ok(());
    }
    let text = std::mem::take(pending);
    if text.trim().is_empty() {
        return Ok(());
    }
    if parent.kind() == NodeKind::Document {
        return Err(parse_error(position, "text outside the root element"));
    }
    parent.append_child(&XmlNode::new_text(text));
    Ok(())
}

/// Predefined entities and character references.
fn resolve_reference(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse::<u32>().ok()?,
            };
            char::from_u32(value)
        }
    }
}

fn utf8(bytes: &[u8], position: u64) -> Result<&str, TreeError> {
    std::str::from_utf8(bytes).map_err(|e| parse_error(position, e))
}

fn parse_error(position: u64, message: impl ToString) -> TreeError {
    TreeError::Parse { position, message: message.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::XML_NS;

    #[test]
    fn resolves_default_and_prefixed_namespaces() {
        let root = XmlNode::parse_str(
            "<Root xmlns='urn:edwin:bart' xmlns:abc='urn:abc'><Two/><abc:Two a='1' abc:b='2'/></Root>",
        )
        .unwrap();
        assert_eq!(root.namespace_uri(), Some("urn:edwin:bart"));
        let kids = root.child_elements();
        assert_eq!(kids[0].namespace_uri(), Some("urn:edwin:bart"));
        assert_eq!(kids[1].namespace_uri(), Some("urn:abc"));
        assert_eq!(kids[1].attribute_value(None, "a").as_deref(), Some("1"));
        assert_eq!(kids[1].attribute_value(Some("urn:abc"), "b").as_deref(), Some("2"));
    }

    #[test]
    fn text_with_references_is_merged() {
        let root = XmlNode::parse_str("<a>x &lt; y &#65;&#x42;</a>").unwrap();
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.string_value(), "x < y AB");
    }

    #[test]
    fn whitespace_between_elements_is_dropped() {
        let root = XmlNode::parse_str("<a>\n  <b/>\n  <c> </c>\n</a>").unwrap();
        assert_eq!(root.children().len(), 2);
        assert!(root.child_elements()[1].children().is_empty());
    }

    #[test]
    fn xml_prefix_is_predeclared() {
        let root = XmlNode::parse_str("<Title xml:lang='en-US'/>").unwrap();
        assert_eq!(root.attribute_value(Some(XML_NS), "lang").as_deref(), Some("en-US"));
    }

    #[test]
    fn unbound_prefix_fails() {
        assert_eq!(XmlNode::parse_str("<p:a/>"), Err(TreeError::UnboundPrefix("p".into())));
    }

    #[test]
    fn parsed_root_is_detached() {
        let root = XmlNode::parse_str("<?xml version='1.0'?><!-- c --><r/>").unwrap();
        assert!(root.parent().is_none());
    }

    #[test]
    fn empty_input_has_no_root() {
        assert_eq!(XmlNode::parse_document("  "), Err(TreeError::NoRootElement));
    }

    #[test]
    fn bytes_with_bom() {
        let root = XmlNode::parse_bytes(b"\xEF\xBB\xBF<r>v</r>").unwrap();
        assert_eq!(root.string_value(), "v");
    }
}
