//! Component engine - registry, instances, scopes.
//!
//! - [`registry`] - View definitions, stubs, name resolution
//! - [`component`] - Component instances, controllers, refs
//! - [`scope`] - Teardown scopes that own subscriptions and hooks
//! - [`position`] - Template-order keys for `asArray` collections
//!
//! Components are created by the renderer while it walks a template. The
//! renderer threads the owning component down explicitly, so there is no
//! global parent context.

pub mod component;
pub mod position;
pub mod registry;
pub mod scope;

pub use component::{AsAny, Component, ComponentId, Controller, Ref, Refs};
pub use position::Position;
pub use registry::{resolve, Registry, Resolved, StubSpec, Stubs, ViewDef};
pub use scope::{BindingScope, Cleanup};
