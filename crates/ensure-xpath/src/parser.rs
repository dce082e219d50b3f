//! Step parser for the simplified path language.
//!
//! ```text
//! path           := step ('/' step)*
//! element-step   := (prefix ':')? name ('[' predicate ('and' predicate)* ']')?
//! attribute-step := '@' name            (final step only)
//! predicate      := '@' name ('=' "'" value "'")?
//! ```
//!
//! Whitespace is ignored around `/`, `[`, `]`, `and` and `=`. Every step keeps
//! the byte range it was matched from, so the text of the path up to any step
//! can be re-evaluated verbatim.
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use ensure_xpath_tree::{NamespaceResolver, XmlNode};
use pest::Parser;
use pest::error::InputLocation;
use pest::iterators::Pair;
use tracing::trace;

use crate::error::Error;
use crate::options::PathLimits;

#[derive(pest_derive::Parser)]
#[grammar = "path.pest"]
pub(crate) struct PathParser;

/// `@name` or `@name='value'` inside a step's bracket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePredicate {
    pub name: String,
    /// `None` only asserts that the attribute exists.
    pub value: Option<String>,
}

impl AttributePredicate {
    pub fn exists(name: impl Into<String>) -> Self {
        Self { name: name.into(), value: None }
    }

    pub fn equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: Some(value.into()) }
    }

    /// Whether `element` carries an unqualified attribute satisfying this predicate.
    pub fn matches(&self, element: &XmlNode) -> bool {
        match (element.attribute_value(None, &self.name), &self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == *expected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Element {
        prefix: Option<String>,
        local: String,
        predicates: Vec<AttributePredicate>,
        span: Range<usize>,
    },
    /// Always the last step of a path.
    Attribute { local: String, span: Range<usize> },
}

impl Step {
    /// Byte range of the step in the source expression.
    pub fn span(&self) -> &Range<usize> {
        match self {
            Step::Element { span, .. } | Step::Attribute { span, .. } => span,
        }
    }

    pub fn local(&self) -> &str {
        match self {
            Step::Element { local, .. } | Step::Attribute { local, .. } => local,
        }
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self, Step::Attribute { .. })
    }
}

/// Parsed path expression together with its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpression {
    source: String,
    steps: Vec<Step>,
}

impl PathExpression {
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Source text from the start through step `index`; the whole expression
    /// when `index` is out of range.
    pub fn cumulative(&self, index: usize) -> &str {
        let end = self.steps.get(index).map_or(self.source.len(), |step| step.span().end);
        &self.source[..end]
    }

    pub fn ends_in_attribute(&self) -> bool {
        self.steps.last().is_some_and(Step::is_attribute)
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for PathExpression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_path(s)
    }
}

/// Parse `input` under the default [`PathLimits`].
pub fn parse_path(input: &str) -> Result<PathExpression, Error> {
    parse_path_with(input, &PathLimits::default())
}

pub fn parse_path_with(input: &str, limits: &PathLimits) -> Result<PathExpression, Error> {
    reject_absolute(input)?;
    limits.check_len(input)?;

    let root = parse_rule(Rule::path, input)?;
    let mut steps = Vec::new();
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::element_step => {
                let span = pair.as_span().start()..pair.as_span().end();
                let parts = element_parts(pair);
                steps.push(Step::Element {
                    prefix: parts.prefix,
                    local: parts.local,
                    predicates: parts.predicates,
                    span,
                });
            }
            Rule::attribute_step => {
                let span = pair.as_span().start()..pair.as_span().end();
                steps.push(Step::Attribute { local: attribute_local(pair), span });
            }
            _ => {}
        }
    }
    limits.check_steps(steps.len())?;

    trace!(path = input, steps = steps.len(), "parsed path expression");
    Ok(PathExpression { source: input.to_owned(), steps })
}

pub(crate) fn reject_absolute(input: &str) -> Result<(), Error> {
    if input.starts_with('/') {
        return Err(Error::AbsolutePath(input.to_owned()));
    }
    Ok(())
}

/// Run `rule` over the whole input and return its top-level pair.
pub(crate) fn parse_rule(rule: Rule, input: &str) -> Result<Pair<'_, Rule>, Error> {
    let mut pairs = PathParser::parse(rule, input).map_err(|err| {
        let position = match err.location {
            InputLocation::Pos(pos) | InputLocation::Span((pos, _)) => pos,
        };
        grammar_error(input, position)
    })?;
    pairs.next().ok_or_else(|| grammar_error(input, 0))
}

fn grammar_error(input: &str, position: usize) -> Error {
    Error::Grammar { remainder: input.get(position..).unwrap_or_default().to_owned(), path: input.to_owned() }
}

/// Pieces of an `element_step` or `query_step` pair.
pub(crate) struct ElementParts {
    pub prefix: Option<String>,
    pub local: String,
    pub predicates: Vec<AttributePredicate>,
    pub last: bool,
}

pub(crate) fn element_parts(pair: Pair<'_, Rule>) -> ElementParts {
    let mut parts = ElementParts { prefix: None, local: String::new(), predicates: Vec::new(), last: false };
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::qname => {
                for name in inner.into_inner() {
                    match name.as_rule() {
                        Rule::prefix => parts.prefix = Some(name.as_str().to_owned()),
                        Rule::local => name.as_str().clone_into(&mut parts.local),
                        _ => {}
                    }
                }
            }
            Rule::predicates => {
                parts.predicates.extend(inner.into_inner().map(predicate));
            }
            Rule::last => parts.last = true,
            _ => {}
        }
    }
    parts
}

fn predicate(pair: Pair<'_, Rule>) -> AttributePredicate {
    let mut name = String::new();
    let mut value = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::attribute_name => name = attribute_local(inner),
            Rule::literal => {
                value = Some(inner.into_inner().next().map(|v| v.as_str().to_owned()).unwrap_or_default());
            }
            _ => {}
        }
    }
    AttributePredicate { name, value }
}

/// Local name of an `attribute_step` or `attribute_name` pair.
pub(crate) fn attribute_local(pair: Pair<'_, Rule>) -> String {
    pair.into_inner()
        .flatten()
        .find(|p| p.as_rule() == Rule::local)
        .map(|p| p.as_str().to_owned())
        .unwrap_or_default()
}

/// Namespace URI for an optional step prefix.
pub(crate) fn namespace_for(prefix: Option<&str>, resolver: &dyn NamespaceResolver) -> Result<Option<String>, Error> {
    match prefix {
        None => Ok(None),
        Some(prefix) => resolver
            .lookup_namespace(prefix)
            .filter(|uri| !uri.is_empty())
            .map(Some)
            .ok_or_else(|| Error::UnknownPrefix(prefix.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn element(
        prefix: Option<&str>,
        local: &str,
        predicates: Vec<AttributePredicate>,
    ) -> (Option<String>, String, Vec<AttributePredicate>) {
        (prefix.map(str::to_owned), local.to_owned(), predicates)
    }

    fn shape(path: &PathExpression) -> Vec<(Option<String>, String, Vec<AttributePredicate>)> {
        path.steps()
            .iter()
            .map(|step| match step {
                Step::Element { prefix, local, predicates, .. } => (prefix.clone(), local.clone(), predicates.clone()),
                Step::Attribute { local, .. } => (None, format!("@{local}"), Vec::new()),
            })
            .collect()
    }

    #[rstest]
    fn parses_prefixes_predicates_and_attribute() {
        let path = parse_path("configuration/ns:add[@key='name' and @attr]/@value").unwrap();
        assert_eq!(
            shape(&path),
            vec![
                element(None, "configuration", vec![]),
                element(
                    Some("ns"),
                    "add",
                    vec![AttributePredicate::equals("key", "name"), AttributePredicate::exists("attr")]
                ),
                element(None, "@value", vec![]),
            ]
        );
        assert!(path.ends_in_attribute());
    }

    #[rstest]
    fn whitespace_is_insignificant() {
        let spaced = parse_path("A [ @href ='link'\tand @type=  '65' ] /B").unwrap();
        let compact = parse_path("A[@href='link' and @type='65']/B").unwrap();
        assert_eq!(shape(&spaced), shape(&compact));
    }

    #[rstest]
    fn cumulative_paths_are_prefixes_of_the_source() {
        let source = "A [ @href ='link' ] /tva:B/@c";
        let path = parse_path(source).unwrap();
        assert_eq!(path.cumulative(0), "A [ @href ='link' ]");
        assert_eq!(path.cumulative(1), "A [ @href ='link' ] /tva:B");
        assert_eq!(path.cumulative(2), source);
        assert_eq!(path.cumulative(9), source);
    }

    #[rstest]
    fn values_keep_inner_whitespace_and_may_be_empty() {
        let path = parse_path("a[@x=' spaced  out ' and @y='']").unwrap();
        let Step::Element { predicates, .. } = &path.steps()[0] else { panic!("element step expected") };
        assert_eq!(predicates[0].value.as_deref(), Some(" spaced  out "));
        assert_eq!(predicates[1].value.as_deref(), Some(""));
    }

    #[rstest]
    fn unicode_names_are_accepted() {
        let path = parse_path("Größe/naïve_1").unwrap();
        assert_eq!(path.steps()[0].local(), "Größe");
        assert_eq!(path.steps()[1].local(), "naïve_1");
        assert_eq!(parse_path("Cafe\u{301}/x\u{0663}").unwrap().steps()[1].local(), "x\u{0663}");
    }

    #[rstest]
    #[case::superscript_digit("A\u{b2}")]
    #[case::roman_numeral("\u{216b}")]
    #[case::vulgar_fraction("A\u{bd}")]
    #[case::spacing_mark("A\u{903}")]
    #[case::enclosing_mark("A\u{20dd}")]
    fn names_are_limited_to_word_characters(#[case] input: &str) {
        assert!(matches!(parse_path(input), Err(Error::Grammar { .. })), "{input:?}");
    }

    #[rstest]
    #[case::root("/A/B")]
    #[case::descendant("//A")]
    #[case::root_attribute("/@x")]
    fn absolute_paths_are_rejected(#[case] input: &str) {
        assert_eq!(parse_path(input), Err(Error::AbsolutePath(input.to_owned())));
    }

    #[rstest]
    #[case::attribute_mid_path("A/@x/B", "/B")]
    #[case::positional("A[1]", "[1]")]
    #[case::last_function("A[last()]", "[last()]")]
    #[case::two_brackets("A[@x][@y]", "[@y]")]
    #[case::wildcard("A/*", "/*")]
    #[case::unclosed("A[@x", "[@x")]
    #[case::axis("child::A", "::A")]
    fn unsupported_constructs_report_the_remainder(#[case] input: &str, #[case] remainder: &str) {
        match parse_path(input) {
            Err(Error::Grammar { remainder: actual, path }) => {
                assert_eq!(path, input);
                assert!(input.ends_with(actual.as_str()), "{actual:?}");
                assert!(remainder.ends_with(actual.as_str()) || actual.ends_with(remainder), "{actual:?}");
            }
            other => panic!("expected grammar error for {input:?}, got {other:?}"),
        }
    }

    #[rstest]
    fn empty_input_is_a_grammar_error() {
        assert!(matches!(parse_path(""), Err(Error::Grammar { .. })));
    }

    #[rstest]
    fn limits_are_enforced() {
        let limits = PathLimits { max_path_len: 8, max_steps: 2 };
        assert!(matches!(
            parse_path_with("abcdefghij", &limits),
            Err(Error::LimitExceeded { what: "path length", limit: 8, actual: 10 })
        ));
        assert!(matches!(
            parse_path_with("a/b/c", &limits),
            Err(Error::LimitExceeded { what: "step count", limit: 2, actual: 3 })
        ));
    }
}
