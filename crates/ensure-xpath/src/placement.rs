use ensure_xpath_tree::{EmptyResolver, NamespaceResolver, XmlNode};
use tracing::debug;

use crate::error::Error;
use crate::query;

/// Insert `new_child` under `parent` right after the last child matching the
/// latest candidate that matches at all; as first child when none does.
///
/// Candidate order is priority, not document position: with candidates
/// `["B", "C"]` and children `<C/><B/>` the new node lands after `C`.
///
/// ```
/// use ensure_xpath::insert_after;
/// use ensure_xpath_tree::{XmlNode, node::elem};
///
/// let parent = XmlNode::parse_str("<A><B/><C/></A>").unwrap();
/// insert_after(&parent, &elem("F").build(), &["B", "C", "D", "E"], None).unwrap();
/// assert_eq!(parent.to_xml_string().unwrap(), "<A><B/><C/><F/></A>");
/// ```
pub fn insert_after<S: AsRef<str>>(
    parent: &XmlNode,
    new_child: &XmlNode,
    candidates: &[S],
    ns: Option<&dyn NamespaceResolver>,
) -> Result<(), Error> {
    let resolver: &dyn NamespaceResolver = ns.unwrap_or(&EmptyResolver);
    for candidate in candidates.iter().rev().map(AsRef::as_ref) {
        let expr = format!("{candidate}[last()]");
        if let Some(anchor) = query::evaluate_first(parent, &expr, resolver)? {
            debug!(candidate, "inserting after last matching sibling");
            anchor.insert_after(new_child)?;
            return Ok(());
        }
    }
    debug!(candidates = candidates.len(), "no candidate sibling present, inserting as first child");
    parent.prepend_child(new_child);
    Ok(())
}
