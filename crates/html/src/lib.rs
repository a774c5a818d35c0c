//! Tolerant HTML parsing into a text/tail element tree, plus serialization and
//! traversal helpers.
pub mod traverse;

mod dom_builder;
mod entities;
mod serialize;
mod tokenizer;
mod types;

pub use crate::dom_builder::{MAX_OPEN_ELEMENTS, build_document};
pub use crate::entities::{decode_entities, escape_attr, escape_text};
pub use crate::serialize::{serialize_document, serialize_element};
pub use crate::tokenizer::{is_void_element, tokenize};
pub use crate::types::{Document, Element, Id, NodeId, Token};

/// Parses `input` into a document rooted at `html`.
pub fn parse(input: &str) -> Document {
    build_document(&tokenize(input))
}
