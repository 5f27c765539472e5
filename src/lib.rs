//! # spark-view
//!
//! Component-based view rendering over an observable JSON model.
//!
//! ## Architecture
//!
//! One template AST is walked by a single [`renderer`] and materialized by
//! a pluggable sink:
//!
//! ```text
//! Template ──> Walker ──> HtmlSink      markup string, no bindings
//!                     ├─> ConstructSink new document fragment, live
//!                     └─> AttachSink    existing markup, live
//! ```
//!
//! Live renders subscribe to the [`Model`] paths their expressions read.
//! A `set` on the model synchronously updates text, attributes, and
//! structural regions (`if`/`unless`/`each`), creating and destroying
//! component instances as regions change.
//!
//! ## Modules
//!
//! - [`model`] - Observable JSON store with path-keyed subscriptions
//! - [`template`] - Template AST, expressions, and builders
//! - [`dom`] - Arena document, HTML serialization and parsing
//! - [`engine`] - Components, registry and stubs, binding scopes
//! - [`renderer`] - Strategies, sinks, bindings, and the [`Page`]
//! - [`harness`] - Test harness and the rendering equivalence checker

pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod harness;
pub mod model;
pub mod renderer;
pub mod template;

pub use config::RenderConfig;
pub use error::{EquivalenceError, ViewError, ViewResult};

pub use dom::{Document, NodeId};

pub use engine::{
    BindingScope, Component, ComponentId, Controller, Registry, StubSpec, Stubs, ViewDef,
};

pub use harness::{assert_renders, Harness};

pub use model::{Model, Subscription};

pub use renderer::{Page, Renderer, Strategy};

pub use template::{
    // AST
    AttrValue, Expr, Node, Template,
    // Builders
    each, el, expr, text, unless, view, when,
};
