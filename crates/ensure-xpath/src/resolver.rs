//! Path walking and node creation.
//!
//! Each step is looked up by evaluating the path text up to and including
//! that step against the starting node; the first match is reused, otherwise
//! the step is created under the current node. Elements get one attribute
//! per predicate, in predicate order, so the created element satisfies the
//! step it was made for.
//!
//! Creation is not transactional. If a later step fails, elements created for
//! earlier steps stay attached to the caller's tree. [`ensure_xpath`] only
//! ever edits a private copy, so it never leaves partial edits behind.
use ensure_xpath_tree::{EmptyResolver, NamespaceResolver, QName, XmlNode};
use tracing::{debug, trace};

use crate::error::Error;
use crate::parser::{AttributePredicate, PathExpression, Step, namespace_for, parse_path};
use crate::placement::insert_after;
use crate::query;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateMode {
    /// Reuse the first existing match of every step.
    #[default]
    CreateOnlyIfMissing,
    /// Create every step anew, even when a matching node exists.
    AlwaysCreateNew,
}

/// Where the element created for the first step goes.
#[derive(Debug, Clone, Copy, Default)]
pub enum Placement<'a> {
    /// Last child of the starting node.
    #[default]
    Append,
    /// After the latest present candidate, else first (see [`insert_after`]).
    After(&'a [&'a str]),
}

/// Walk `path` from `root`, creating what `mode` asks for. Returns the node
/// selected by the final step, an element or an attribute.
pub fn resolve(
    root: &XmlNode,
    path: &PathExpression,
    resolver: &dyn NamespaceResolver,
    mode: CreateMode,
    placement: Placement<'_>,
) -> Result<XmlNode, Error> {
    let mut current = root.clone();
    for (index, step) in path.steps().iter().enumerate() {
        let cumulative = path.cumulative(index);
        if current.is_attribute() {
            return Err(Error::Format(format!("the given xPath is not supported: '{cumulative}'")));
        }

        if mode == CreateMode::CreateOnlyIfMissing
            && let Some(existing) = query::evaluate_first(root, cumulative, resolver)?
        {
            trace!(path = cumulative, "reusing existing node");
            current = existing;
            continue;
        }

        current = match step {
            Step::Attribute { local, .. } => {
                let attribute = current.add_attribute(QName::local(local.as_str()), "")?;
                debug!(path = cumulative, attribute = %local, "created attribute");
                attribute
            }
            Step::Element { prefix, local, predicates, .. } => {
                let element = new_element(prefix.as_deref(), local, predicates, resolver)?;
                match placement {
                    Placement::After(candidates) if index == 0 => {
                        insert_after(&current, &element, candidates, Some(resolver))?;
                    }
                    _ => current.append_child(&element),
                }
                debug!(path = cumulative, element = %local, "created element");
                element
            }
        };
    }

    if !query::exists(root, path.as_str(), resolver)? {
        return Err(Error::Format(format!("the given xPath cannot be created: '{path}'")));
    }
    Ok(current)
}

fn new_element(
    prefix: Option<&str>,
    local: &str,
    predicates: &[AttributePredicate],
    resolver: &dyn NamespaceResolver,
) -> Result<XmlNode, Error> {
    let mut name = QName::in_ns(namespace_for(prefix, resolver)?.as_deref(), local);
    if let Some(prefix) = prefix {
        name = name.with_prefix(prefix);
    }
    let element = XmlNode::new_element(name);
    for predicate in predicates {
        let value = predicate.value.as_deref().unwrap_or_default();
        element.add_attribute(QName::local(predicate.name.as_str()), value)?;
    }
    Ok(element)
}

pub(crate) fn expect_element(node: XmlNode, path: &PathExpression) -> Result<XmlNode, Error> {
    if node.is_element() {
        Ok(node)
    } else {
        Err(Error::NotAnElement(path.to_string()))
    }
}

/// `root` itself when `path` already resolves against it; otherwise a deep
/// copy of `root` on which the path has been created.
pub(crate) fn ensure(
    root: &XmlNode,
    path: &PathExpression,
    resolver: &dyn NamespaceResolver,
) -> Result<XmlNode, Error> {
    if query::exists(root, path.as_str(), resolver)? {
        trace!(path = path.as_str(), "path already present");
        return Ok(root.clone());
    }
    let copy = root.deep_clone();
    resolve(&copy, path, resolver, CreateMode::CreateOnlyIfMissing, Placement::Append)?;
    debug!(path = path.as_str(), "path created on a copy");
    Ok(copy)
}

fn resolver_or_empty<'a>(ns: Option<&'a dyn NamespaceResolver>) -> &'a dyn NamespaceResolver {
    ns.unwrap_or(&EmptyResolver)
}

fn element_at(
    root: &XmlNode,
    path: &str,
    ns: Option<&dyn NamespaceResolver>,
    mode: CreateMode,
    placement: Placement<'_>,
) -> Result<XmlNode, Error> {
    let path = parse_path(path)?;
    let node = resolve(root, &path, resolver_or_empty(ns), mode, placement)?;
    expect_element(node, &path)
}

/// Always create the element at `path`, even when a matching one exists.
///
/// Fails with [`Error::NotAnElement`] if the path ends in an attribute.
pub fn create_element(root: &XmlNode, path: &str, ns: Option<&dyn NamespaceResolver>) -> Result<XmlNode, Error> {
    element_at(root, path, ns, CreateMode::AlwaysCreateNew, Placement::Append)
}

/// Element at `path`, creating only the missing steps.
///
/// ```
/// use ensure_xpath::get_or_create_element;
/// use ensure_xpath_tree::XmlNode;
///
/// let root = XmlNode::parse_str("<configuration/>").unwrap();
/// let add = get_or_create_element(&root, "appSettings/add[@key='name' and @value='x']", None).unwrap();
/// assert_eq!(
///     root.to_xml_string().unwrap(),
///     r#"<configuration><appSettings><add key="name" value="x"/></appSettings></configuration>"#
/// );
/// assert_eq!(get_or_create_element(&root, "appSettings/add[@key='name']", None).unwrap(), add);
/// ```
pub fn get_or_create_element(
    root: &XmlNode,
    path: &str,
    ns: Option<&dyn NamespaceResolver>,
) -> Result<XmlNode, Error> {
    element_at(root, path, ns, CreateMode::CreateOnlyIfMissing, Placement::Append)
}

/// Always create the element or attribute at `path`.
pub fn create_node(root: &XmlNode, path: &str, ns: Option<&dyn NamespaceResolver>) -> Result<XmlNode, Error> {
    let path = parse_path(path)?;
    resolve(root, &path, resolver_or_empty(ns), CreateMode::AlwaysCreateNew, Placement::Append)
}

/// Element or attribute at `path`, creating only the missing steps.
pub fn get_or_create_node(root: &XmlNode, path: &str, ns: Option<&dyn NamespaceResolver>) -> Result<XmlNode, Error> {
    let path = parse_path(path)?;
    resolve(root, &path, resolver_or_empty(ns), CreateMode::CreateOnlyIfMissing, Placement::Append)
}

/// Like [`get_or_create_element`], but a newly created first-step element is
/// placed with [`insert_after`] instead of being appended.
pub fn get_or_create_element_after(
    root: &XmlNode,
    path: &str,
    candidates: &[&str],
    ns: Option<&dyn NamespaceResolver>,
) -> Result<XmlNode, Error> {
    element_at(root, path, ns, CreateMode::CreateOnlyIfMissing, Placement::After(candidates))
}

/// Copy-on-write variant of [`get_or_create_node`].
///
/// Returns `root` itself (same identity) when `path` already resolves, and a
/// modified deep copy otherwise; `root` is never changed.
///
/// ```
/// use ensure_xpath::ensure_xpath;
/// use ensure_xpath_tree::XmlNode;
///
/// let root = XmlNode::parse_str("<Root><Element><Genre href='start'/></Element></Root>").unwrap();
/// assert_eq!(ensure_xpath(&root, "Element/Genre/@href", None).unwrap(), root);
///
/// let copy = ensure_xpath(&root, "Element/Genre/@lang", None).unwrap();
/// assert_ne!(copy, root);
/// assert!(!root.to_xml_string().unwrap().contains("lang"));
/// ```
pub fn ensure_xpath(root: &XmlNode, path: &str, ns: Option<&dyn NamespaceResolver>) -> Result<XmlNode, Error> {
    let path = parse_path(path)?;
    ensure(root, &path, resolver_or_empty(ns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn root(xml: &str) -> XmlNode {
        XmlNode::parse_str(xml).unwrap()
    }

    #[rstest]
    fn attribute_step_gets_an_empty_value() {
        let r = root("<Root><A/></Root>");
        let attribute = get_or_create_node(&r, "A/@x", None).unwrap();
        assert!(attribute.is_attribute());
        assert_eq!(attribute.value().as_deref(), Some(""));
        assert_eq!(attribute.parent(), r.first_child());
    }

    #[rstest]
    fn existing_attribute_is_returned() {
        let r = root("<Root><A x='1'/></Root>");
        let attribute = get_or_create_node(&r, "A/@x", None).unwrap();
        assert_eq!(attribute, r.first_child().unwrap().attribute(None, "x").unwrap());
    }

    #[rstest]
    fn lone_attribute_step_targets_the_root() {
        let r = root("<Root/>");
        let attribute = get_or_create_node(&r, "@id", None).unwrap();
        assert_eq!(attribute.parent(), Some(r));
    }

    #[rstest]
    fn element_entry_points_refuse_attribute_paths() {
        let r = root("<Root/>");
        assert_eq!(get_or_create_element(&r, "A/@x", None), Err(Error::NotAnElement("A/@x".into())));
        assert_eq!(create_element(&r, "@x", None), Err(Error::NotAnElement("@x".into())));
    }

    #[rstest]
    fn always_create_duplicates_the_whole_path() {
        let r = root("<Root><A><B/></A></Root>");
        let b = create_element(&r, "A/B", None).unwrap();
        assert_eq!(r.child_elements().len(), 2);
        assert_eq!(b.parent(), r.last_child());
    }

    #[rstest]
    fn always_create_cannot_repeat_an_attribute() {
        let r = root("<Root x=''/>");
        assert!(matches!(create_node(&r, "@x", None), Err(Error::Tree(_))));
    }

    #[rstest]
    fn only_the_first_step_is_placed() {
        let r = root("<Root><X/><A><Y/></A></Root>");
        let b = get_or_create_element_after(&r, "A/B", &["X"], None).unwrap();
        assert_eq!(b.previous_sibling().and_then(|n| n.local_name().map(str::to_owned)).as_deref(), Some("Y"));

        let c = get_or_create_element_after(&r, "C/D", &["X"], None).unwrap();
        let c_parent = c.parent().unwrap();
        assert_eq!(c_parent.previous_sibling(), r.first_child());
    }
}
