// Element query and match rules used by ScopedDocument predicates

use crate::twiml::message::{Document, ElementKind, NodeId};

/// How element text is compared against a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch<'a> {
    Any,
    /// Substring of the trimmed inner text
    Contains(&'a str),
    /// Whole trimmed inner text
    Exact(&'a str),
}

impl TextMatch<'_> {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            TextMatch::Any => true,
            TextMatch::Contains(needle) => text.contains(needle),
            TextMatch::Exact(expected) => text == *expected,
        }
    }
}

/// How an attribute value is compared against a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeMatch<'a> {
    Present,
    Equals(&'a str),
    /// Equal after `normalize_url` on both sides
    SameUrl(&'a str),
}

impl AttributeMatch<'_> {
    pub fn matches(&self, value: Option<&str>) -> bool {
        match (self, value) {
            (_, None) => false,
            (AttributeMatch::Present, Some(_)) => true,
            (AttributeMatch::Equals(expected), Some(v)) => v == *expected,
            (AttributeMatch::SameUrl(expected), Some(v)) => {
                normalize_url(v) == normalize_url(expected)
            }
        }
    }
}

/// A structural query: element kind plus attribute and text constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ElementQuery<'a> {
    pub kind: ElementKind,
    pub attributes: Vec<(&'a str, AttributeMatch<'a>)>,
    pub text: TextMatch<'a>,
}

impl<'a> ElementQuery<'a> {
    pub fn new(kind: ElementKind) -> Self {
        ElementQuery {
            kind,
            attributes: Vec::new(),
            text: TextMatch::Any,
        }
    }

    pub fn attribute(mut self, name: &'a str, rule: AttributeMatch<'a>) -> Self {
        self.attributes.push((name, rule));
        self
    }

    pub fn text(mut self, rule: TextMatch<'a>) -> Self {
        self.text = rule;
        self
    }

    /// Check a single element of `doc` against this query
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let el = doc.get(id);
        if el.kind != self.kind {
            return false;
        }
        if !self
            .attributes
            .iter()
            .all(|(name, rule)| rule.matches(el.attribute(name)))
        {
            return false;
        }
        match self.text {
            TextMatch::Any => true,
            rule => rule.matches(&doc.inner_text(id)),
        }
    }
}

/// Normalize a URL for comparison: strip every trailing `.xml` format
/// suffix, both at the end of the whole URL and at the end of the path
/// before a query string or fragment. Idempotent.
pub fn normalize_url(url: &str) -> String {
    let url = strip_xml_suffixes(url.trim());
    let split = url.find(|c: char| c == '?' || c == '#').unwrap_or(url.len());
    let (path, tail) = url.split_at(split);
    let path = strip_xml_suffixes(path);
    let mut buf = String::with_capacity(path.len() + tail.len());
    buf.push_str(path);
    buf.push_str(tail);
    buf
}

fn strip_xml_suffixes(mut s: &str) -> &str {
    while let Some(stripped) = s.strip_suffix(".xml") {
        s = stripped;
    }
    s
}
