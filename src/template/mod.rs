//! Template AST - what a view renders.
//!
//! - [`ast`] - Immutable node tree (elements, text, blocks, view references)
//! - [`expr`] - Binding expressions and the alias-aware evaluation context
//! - [`build`] - Builders used in place of a markup compiler

pub mod ast;
pub mod build;
pub mod expr;

pub use ast::{AttrPart, AttrValue, Attribute, Conditional, Each, Element, Node, Template, ViewRef};
pub use build::{each, el, expr, text, unless, view, when};
pub use expr::{to_text, truthy, EvalContext, Expr};
