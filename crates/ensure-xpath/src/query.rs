//! Reduced path evaluator.
//!
//! Understands the same relative paths the builder accepts plus a trailing
//! `[last()]` on element steps. Steps select children in document order;
//! prefixes resolve through the supplied [`NamespaceResolver`] and unprefixed
//! names match elements without a namespace.
use ensure_xpath_tree::{NamespaceResolver, XmlNode};
use tracing::trace;

use crate::error::Error;
use crate::parser::{Rule, attribute_local, element_parts, namespace_for, parse_rule, reject_absolute};

/// All nodes selected by `expr` relative to `node`, in document order.
///
/// ```
/// use ensure_xpath::query::evaluate;
/// use ensure_xpath_tree::{EmptyResolver, XmlNode};
///
/// let root = XmlNode::parse_str("<r><a k='1'/><a k='2'/><a/></r>").unwrap();
/// assert_eq!(evaluate(&root, "a[@k]", &EmptyResolver).unwrap().len(), 2);
/// let last = evaluate(&root, "a[@k][last()]/@k", &EmptyResolver).unwrap();
/// assert_eq!(last[0].value().as_deref(), Some("2"));
/// ```
pub fn evaluate(node: &XmlNode, expr: &str, resolver: &dyn NamespaceResolver) -> Result<Vec<XmlNode>, Error> {
    reject_absolute(expr)?;
    let query = parse_rule(Rule::query, expr)?;

    let mut selected = vec![node.clone()];
    for pair in query.into_inner() {
        match pair.as_rule() {
            Rule::query_step => {
                let step = element_parts(pair);
                let ns = namespace_for(step.prefix.as_deref(), resolver)?;
                selected = selected
                    .iter()
                    .flat_map(|context| {
                        let mut hits: Vec<XmlNode> = context
                            .child_elements_named(ns.as_deref(), &step.local)
                            .into_iter()
                            .filter(|child| step.predicates.iter().all(|p| p.matches(child)))
                            .collect();
                        if step.last {
                            hits = hits.pop().into_iter().collect();
                        }
                        hits
                    })
                    .collect();
            }
            Rule::attribute_step => {
                let local = attribute_local(pair);
                selected = selected.iter().filter_map(|context| context.attribute(None, &local)).collect();
            }
            _ => {}
        }
        if selected.is_empty() {
            break;
        }
    }

    trace!(expr, matches = selected.len(), "evaluated path");
    Ok(selected)
}

/// First node selected by `expr`, if any.
pub fn evaluate_first(node: &XmlNode, expr: &str, resolver: &dyn NamespaceResolver) -> Result<Option<XmlNode>, Error> {
    Ok(evaluate(node, expr, resolver)?.into_iter().next())
}

pub fn exists(node: &XmlNode, expr: &str, resolver: &dyn NamespaceResolver) -> Result<bool, Error> {
    Ok(evaluate_first(node, expr, resolver)?.is_some())
}
