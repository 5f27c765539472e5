//! Output document - the tree that Construct and Attach render into.
//!
//! - [`document`] - Node arena with sibling navigation and mutation counting
//! - [`html`] - Normalizing HTML parser and serializer
//! - [`flags`] - Content-model classification of tags

pub mod document;
pub mod flags;
pub mod html;

pub use document::{Document, NodeId, NodeKind, NodeRange};
pub use flags::{element_kind, ElementKind};
pub use html::{inner_html, normalize, outer_html, parse_fragment, parse_into};
