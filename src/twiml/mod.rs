pub mod message;
pub mod parser;
pub mod uri;

pub use message::{Document, Element, ElementKind, NodeId};
pub use parser::{parse_document, ParseError};
