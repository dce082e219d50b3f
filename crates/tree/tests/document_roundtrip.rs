use ensure_xpath_tree::{
    NamespaceManager, NamespaceResolver, NodeKind, TreeError, XmlNode, attr, comment, doc, elem, ns, text,
};
use rstest::{fixture, rstest};

const THREE_LEVEL_XML: &str = "
<Root xmlns='urn:edwin:bart' xmlns:abc='urn:abc'>
    <Level>
        <Two>Zwei</Two>
        <Two>Deux</Two>
        <abc:Two>TweeAbc</abc:Two>
    </Level>
    <Two>MinusTwo</Two>
    <abc:Two/>
</Root>";

#[fixture]
fn three_level() -> XmlNode {
    XmlNode::parse_document(THREE_LEVEL_XML).unwrap()
}

#[rstest]
fn document_owns_root(three_level: XmlNode) {
    assert_eq!(three_level.kind(), NodeKind::Document);
    let root = three_level.document_element().unwrap();
    assert_eq!(root.parent(), Some(three_level.clone()));
    assert_eq!(root.child_elements_named(Some("urn:edwin:bart"), "Two").len(), 1);
    assert_eq!(root.child_elements_named(Some("urn:abc"), "Two").len(), 1);
    assert_eq!(root.child_elements_named(None, "Two").len(), 0);
}

#[rstest]
fn clone_serializes_identically(three_level: XmlNode) {
    let root = three_level.document_element().unwrap();
    for element in root.descendants() {
        assert_eq!(element.to_xml_string().unwrap(), element.deep_clone().to_xml_string().unwrap());
    }
    assert_eq!(three_level.to_xml_string().unwrap(), three_level.deep_clone().to_xml_string().unwrap());
}

#[rstest]
fn detached_subtree_keeps_its_namespace(three_level: XmlNode) {
    let root = three_level.document_element().unwrap();
    let abc_two = root.child_elements_named(Some("urn:abc"), "Two").remove(0);
    let copy = abc_two.deep_clone();
    assert_eq!(copy.to_xml_string().unwrap(), r#"<abc:Two xmlns:abc="urn:abc"/>"#);
}

#[rstest]
#[case::unclosed("<a>")]
#[case::mismatched("<a></b>")]
#[case::two_roots("<a/><b/>")]
#[case::text_outside("<a/>oops")]
#[case::unknown_entity("<a>&nbsp;</a>")]
fn malformed_input_is_rejected(#[case] xml: &str) {
    assert!(matches!(XmlNode::parse_str(xml), Err(TreeError::Parse { .. })), "{xml}");
}

#[test]
fn node_resolves_in_scope_prefixes() {
    let root = elem("r").namespace(ns(Some("p"), "urn:p")).child(elem("c")).build();
    let child = root.first_child().unwrap();
    assert_eq!(child.lookup_namespace("p").as_deref(), Some("urn:p"));
    assert_eq!(child.lookup_namespace("q"), None);
}

#[test]
fn manager_knows_added_prefixes() {
    let mut manager = NamespaceManager::new();
    assert!(manager.is_empty());
    manager.add_namespace("tva", "urn:tva:metadata:2010");
    assert_eq!(manager.lookup_namespace("tva").as_deref(), Some("urn:tva:metadata:2010"));
    assert_eq!(manager.remove_namespace("tva").as_deref(), Some("urn:tva:metadata:2010"));
    assert_eq!(manager.lookup_namespace("tva"), None);
}

#[test]
fn comments_and_processing_instructions_survive() {
    let xml = "<r><!-- note --><?app run?><a/></r>";
    let root = XmlNode::parse_str(xml).unwrap();
    assert_eq!(root.children().len(), 3);
    assert_eq!(root.to_xml_string().unwrap(), xml);
}

#[test]
fn parsed_document_matches_the_built_one() {
    let parsed = XmlNode::parse_document("<r><!-- note --><a x='1'>t</a><b/></r>").unwrap();
    let built = doc()
        .child(
            elem("r")
                .child(comment(" note "))
                .child(elem("a").attr(attr("x", "1")).child(text("t")))
                .child(elem("b")),
        )
        .build();
    assert_eq!(built.kind(), NodeKind::Document);
    assert_eq!(built.document_element().and_then(|r| r.parent()), Some(built.clone()));
    assert_eq!(parsed.to_xml_string().unwrap(), built.to_xml_string().unwrap());
    assert_eq!(parsed.to_xml_string().unwrap(), r#"<r><!-- note --><a x="1">t</a><b/></r>"#);
}
