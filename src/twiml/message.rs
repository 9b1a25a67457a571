// Call-control document data model

use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;

/// Call-control verbs and nouns
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Response,
    Say,
    Play,
    Pause,
    Dial,
    Number,
    Sip,
    Gather,
    Record,
    Redirect,
    Hangup,
    Reject,
    Other(String),
}

impl ElementKind {
    /// Element names are case-sensitive; anything unknown is kept verbatim.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Response" => ElementKind::Response,
            "Say" => ElementKind::Say,
            "Play" => ElementKind::Play,
            "Pause" => ElementKind::Pause,
            "Dial" => ElementKind::Dial,
            "Number" => ElementKind::Number,
            "Sip" => ElementKind::Sip,
            "Gather" => ElementKind::Gather,
            "Record" => ElementKind::Record,
            "Redirect" => ElementKind::Redirect,
            "Hangup" => ElementKind::Hangup,
            "Reject" => ElementKind::Reject,
            other => ElementKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ElementKind::Response => "Response",
            ElementKind::Say => "Say",
            ElementKind::Play => "Play",
            ElementKind::Pause => "Pause",
            ElementKind::Dial => "Dial",
            ElementKind::Number => "Number",
            ElementKind::Sip => "Sip",
            ElementKind::Gather => "Gather",
            ElementKind::Record => "Record",
            ElementKind::Redirect => "Redirect",
            ElementKind::Hangup => "Hangup",
            ElementKind::Reject => "Reject",
            ElementKind::Other(name) => name,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single attribute (name-value pair), value already entity-decoded
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Index of an element inside its owning `Document`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// A parsed element. Children are stored as ids into the document arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    pub attributes: SmallVec<[Attribute; 4]>,
    /// Direct text content (concatenated, not including children)
    pub text: String,
    pub children: Vec<NodeId>,
}

impl Element {
    pub fn new(kind: ElementKind) -> Self {
        Element {
            kind,
            attributes: SmallVec::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Get an attribute value by exact (case-sensitive) name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing an existing one with the same name
    pub fn set_attribute(&mut self, name: &str, value: String) {
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn is(&self, kind: &ElementKind) -> bool {
        &self.kind == kind
    }
}

/// A parsed call-control document. Elements live in an arena; the first
/// element pushed is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    elements: Vec<Element>,
}

impl Document {
    pub(crate) fn from_elements(elements: Vec<Element>) -> Self {
        debug_assert!(!elements.is_empty());
        Document { elements }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn get(&self, id: NodeId) -> &Element {
        &self.elements[id.0]
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Direct children of `id`, in document order
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Element)> + '_ {
        self.get(id)
            .children
            .iter()
            .map(move |&child| (child, self.get(child)))
    }

    /// Text of the element and all of its descendants, trimmed
    pub fn inner_text(&self, id: NodeId) -> String {
        let mut buf = String::new();
        self.collect_text(id, &mut buf);
        buf.trim().to_string()
    }

    fn collect_text(&self, id: NodeId, buf: &mut String) {
        let el = self.get(id);
        buf.push_str(&el.text);
        for &child in &el.children {
            self.collect_text(child, buf);
        }
    }

    /// Flattened depth-first summary of the document
    pub fn outline(&self) -> Vec<OutlineEntry> {
        let mut out = Vec::with_capacity(self.elements.len());
        self.outline_into(self.root(), 0, &mut out);
        out
    }

    fn outline_into(&self, id: NodeId, depth: usize, out: &mut Vec<OutlineEntry>) {
        let el = self.get(id);
        let text = el.text.trim();
        out.push(OutlineEntry {
            depth,
            name: el.kind.to_string(),
            attributes: el
                .attributes
                .iter()
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect(),
            text: if text.is_empty() {
                None
            } else {
                Some(text.to_string())
            },
        });
        for &child in &el.children {
            self.outline_into(child, depth + 1, out);
        }
    }
}

/// One line of `Document::outline`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlineEntry {
    pub depth: usize,
    pub name: String,
    pub attributes: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}
