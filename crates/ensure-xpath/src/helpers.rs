//! Small utilities for reading typed documents.
//!
//! These sit next to the builder because documents edited through it are
//! usually read back with them: namespace-qualified child chains, text values,
//! timestamp and minute attributes, and inherited `xml:lang`.
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use ensure_xpath_tree::{XML_NS, XmlNode};

use crate::error::Error;

/// Follow `names` down from `node`, each step selecting the children named
/// `{ns}name`. An empty `ns` means no namespace.
///
/// ```
/// use ensure_xpath::helpers::ns_elements;
/// use ensure_xpath_tree::XmlNode;
///
/// let doc = XmlNode::parse_document("<Root xmlns='urn:x'><Level><Two/><Two/></Level></Root>").unwrap();
/// assert_eq!(ns_elements(&doc, "urn:x", &["Root", "Level", "Two"]).len(), 2);
/// ```
pub fn ns_elements(node: &XmlNode, ns: &str, names: &[&str]) -> Vec<XmlNode> {
    ns_elements_all(std::slice::from_ref(node), ns, names)
}

/// [`ns_elements`] applied to every node of `nodes`, results in order.
pub fn ns_elements_all(nodes: &[XmlNode], ns: &str, names: &[&str]) -> Vec<XmlNode> {
    let ns = Some(ns).filter(|uri| !uri.is_empty());
    names.iter().fold(nodes.to_vec(), |current, name| {
        current.iter().flat_map(|node| node.child_elements_named(ns, name)).collect()
    })
}

/// String value of every node.
pub fn values(nodes: &[XmlNode]) -> Vec<String> {
    nodes.iter().map(XmlNode::string_value).collect()
}

/// Parse a timestamp: RFC 3339, or an ISO 8601 date/date-time without
/// offset, which is taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().fixed_offset());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Timestamp held by the unqualified attribute `name`, if it parses.
pub fn time_from_attribute(element: &XmlNode, name: &str) -> Option<DateTime<FixedOffset>> {
    element.attribute_value(None, name).as_deref().and_then(parse_timestamp)
}

/// Whole minutes held by the unqualified attribute `name`, if it parses.
pub fn minutes_from_attribute(element: &XmlNode, name: &str) -> Option<TimeDelta> {
    let minutes: i64 = element.attribute_value(None, name)?.trim().parse().ok()?;
    TimeDelta::try_minutes(minutes)
}

/// Parse the string value of every node as a timestamp.
pub fn as_date_times(nodes: &[XmlNode]) -> Result<Vec<DateTime<FixedOffset>>, Error> {
    nodes.iter().map(node_as_date_time).collect()
}

pub fn attribute_as_date_time(attribute: &XmlNode) -> Result<DateTime<FixedOffset>, Error> {
    node_as_date_time(attribute)
}

fn node_as_date_time(node: &XmlNode) -> Result<DateTime<FixedOffset>, Error> {
    let value = node.string_value();
    parse_timestamp(&value).ok_or(Error::InvalidTimestamp(value))
}

/// `xml:lang` of the element or, failing that, of its nearest ancestor.
pub fn xml_language(element: &XmlNode) -> Option<String> {
    let mut current = Some(element.clone());
    while let Some(node) = current {
        if let Some(lang) = node.attribute_value(Some(XML_NS), "lang") {
            return Some(lang);
        }
        current = node.parent();
    }
    None
}

/// Whether the inherited `xml:lang` starts with `language`, ignoring case.
/// `None` when no language is declared.
pub fn is_language(element: &XmlNode, language: &str) -> Option<bool> {
    xml_language(element).map(|lang| lang.to_lowercase().starts_with(&language.to_lowercase()))
}

/// Keep only the items matching a predicate, unless none do.
pub trait Prefer: Iterator + Sized {
    /// Items for which `predicate` holds; every item when it holds for none.
    ///
    /// ```
    /// use ensure_xpath::helpers::Prefer;
    ///
    /// let upper: String = "abcDEF".chars().prefer(char::is_ascii_uppercase).collect();
    /// assert_eq!(upper, "DEF");
    /// let all: String = "abc".chars().prefer(char::is_ascii_uppercase).collect();
    /// assert_eq!(all, "abc");
    /// ```
    fn prefer<P>(self, predicate: P) -> std::vec::IntoIter<Self::Item>
    where
        P: FnMut(&Self::Item) -> bool;
}

impl<I: Iterator> Prefer for I {
    fn prefer<P>(self, mut predicate: P) -> std::vec::IntoIter<Self::Item>
    where
        P: FnMut(&Self::Item) -> bool,
    {
        let (preferred, rest): (Vec<_>, Vec<_>) = self.partition(|item| predicate(item));
        if preferred.is_empty() { rest.into_iter() } else { preferred.into_iter() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use rstest::{fixture, rstest};

    const TIME_XML: &str = "
<Root>
    <Time>2015-12-03T17:39:52.27Z</Time>
    <Attr start='2015-12-03T11:39:52.27Z' minutes='1440' notMinutes='twelve'/>
    <Level/>
    <Level start='2015-12-03T11:39:52.27Z'>
        <Two>2015-12-03T11:39:52.27Z</Two>
        <Two>NotADate</Two>
    </Level>
</Root>";

    #[fixture]
    fn times() -> XmlNode {
        XmlNode::parse_str(TIME_XML).unwrap()
    }

    const THREE_LEVEL_XML: &str = "
<Root xmlns='urn:edwin:bart' xmlns:abc='urn:abc'>
    <Level>
        <Two>Zwei</Two>
        <Two>Deux</Two>
        <abc:Two>TweeAbc</abc:Two>
    </Level>
    <Level>
        <Two>Dos</Two>
    </Level>
    <Two>MinusTwo</Two>
</Root>";

    #[fixture]
    fn three_level() -> XmlNode {
        XmlNode::parse_document(THREE_LEVEL_XML).unwrap()
    }

    #[rstest]
    #[case::levels("urn:edwin:bart", &["Root", "Level"], &["ZweiDeuxTweeAbc", "Dos"])]
    #[case::twos("urn:edwin:bart", &["Root", "Level", "Two"], &["Zwei", "Deux", "Dos"])]
    #[case::other_namespace("urn:abc", &["Root"], &[])]
    #[case::no_namespace("", &["Root", "Level"], &[])]
    fn ns_elements_values(
        three_level: XmlNode,
        #[case] ns: &str,
        #[case] names: &[&str],
        #[case] expected: &[&str],
    ) {
        assert_eq!(values(&ns_elements(&three_level, ns, names)), expected);
    }

    #[rstest]
    fn ns_elements_all_follows_every_start_node(three_level: XmlNode) {
        let levels = ns_elements(&three_level, "urn:edwin:bart", &["Root", "Level"]);
        assert_eq!(levels.len(), 2);
        assert_eq!(values(&ns_elements_all(&levels, "urn:edwin:bart", &["Two"])), ["Zwei", "Deux", "Dos"]);
        assert_eq!(values(&ns_elements_all(&levels, "urn:abc", &["Two"])), ["TweeAbc"]);
        assert!(ns_elements_all(&levels, "urn:edwin:bart", &[]).iter().eq(levels.iter()));
        assert!(ns_elements_all(&[], "urn:edwin:bart", &["Two"]).is_empty());
    }

    #[rstest]
    fn values_of_attributes_and_elements(times: XmlNode) {
        let attr = child(&times, "Attr");
        let nodes = [attr.attribute(None, "minutes").unwrap(), child(&times, "Time"), child(&times, "Level")];
        assert_eq!(values(&nodes), ["1440", "2015-12-03T17:39:52.27Z", ""]);
        assert!(values(&[]).is_empty());
    }

    fn child(root: &XmlNode, name: &str) -> XmlNode {
        root.child_elements_named(None, name).remove(0)
    }

    #[rstest]
    fn time_from_attribute_reads_utc(times: XmlNode) {
        let start = time_from_attribute(&child(&times, "Attr"), "start").unwrap();
        assert_eq!(start.offset().local_minus_utc(), 0);
        assert_eq!(start.year(), 2015);
        assert!(time_from_attribute(&child(&times, "Time"), "start").is_none());
    }

    #[rstest]
    #[case::present("minutes", Some(1440))]
    #[case::missing("minutez", None)]
    #[case::not_a_number("notMinutes", None)]
    fn minutes(times: XmlNode, #[case] name: &str, #[case] expected: Option<i64>) {
        let actual = minutes_from_attribute(&child(&times, "Attr"), name);
        assert_eq!(actual, expected.and_then(TimeDelta::try_minutes));
    }

    #[rstest]
    fn element_values_as_date_times(times: XmlNode) {
        let parsed = as_date_times(&times.child_elements_named(None, "Time")).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].year(), 2015);
        assert_eq!(parsed[0].hour(), 17);
    }

    #[rstest]
    fn bad_value_fails_the_whole_batch(times: XmlNode) {
        let twos = ns_elements(&times, "", &["Level", "Two"]);
        assert_eq!(twos.len(), 2);
        assert_eq!(as_date_times(&twos), Err(Error::InvalidTimestamp("NotADate".into())));
    }

    #[rstest]
    fn attribute_node_as_date_time(times: XmlNode) {
        let attribute = child(&times, "Attr").attribute(None, "start").unwrap();
        assert_eq!(attribute_as_date_time(&attribute).unwrap().minute(), 39);
    }

    #[rstest]
    #[case::rfc3339("2015-12-03T11:39:52+02:00", 2 * 3600)]
    #[case::no_offset("2015-12-03T11:39:52", 0)]
    #[case::date_only("2015-12-03", 0)]
    fn timestamp_forms(#[case] value: &str, #[case] offset: i32) {
        assert_eq!(parse_timestamp(value).unwrap().offset().local_minus_utc(), offset);
    }

    #[rstest]
    #[case::prefix_match("<Title xml:lang='en-US'/>", "en", Some(true))]
    #[case::other_region("<Title xml:lang='de-XX'/>", "de", Some(true))]
    #[case::other_language("<Title xml:lang='de-DE'/>", "en", Some(false))]
    #[case::undeclared("<Title/>", "en", None)]
    #[case::inherited("<Program xml:lang='en-US'><Title/></Program>", "en", Some(true))]
    #[case::inherited_other("<Program xml:lang='de-DE'><Title/></Program>", "en", Some(false))]
    #[case::case_insensitive("<Title xml:lang='EN-gb'/>", "en-GB", Some(true))]
    fn language(#[case] xml: &str, #[case] lang: &str, #[case] expected: Option<bool>) {
        let mut element = XmlNode::parse_str(xml).unwrap();
        while let Some(first) = element.child_elements().into_iter().next() {
            element = first;
        }
        assert_eq!(is_language(&element, lang), expected);
    }

    #[rstest]
    #[case("abcDEF", "DEF")]
    #[case("abc", "abc")]
    #[case("DEF", "DEF")]
    #[case("aDbEcF", "DEF")]
    fn prefer_uppercase(#[case] input: &str, #[case] expected: &str) {
        let actual: String = input.chars().prefer(char::is_ascii_uppercase).collect();
        assert_eq!(actual, expected);
    }
}
