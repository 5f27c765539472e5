//! View Registry - What a `<view is="...">` resolves to.
//!
//! A [`Registry`] maps view names to [`ViewDef`]s (template plus optional
//! controller factory). [`Stubs`] override the registry for isolated
//! rendering: a stubbed view renders nothing and is exposed on the page so
//! tests can find it.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{ViewError, ViewResult};
use crate::template::Template;

use super::component::Controller;

type ControllerFactory = Rc<dyn Fn() -> Box<dyn Controller>>;

// =============================================================================
// View Definitions
// =============================================================================

/// A named view: its template and how to build its controller.
#[derive(Clone)]
pub struct ViewDef {
    is: String,
    template: Template,
    controller: Option<ControllerFactory>,
}

impl fmt::Debug for ViewDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewDef")
            .field("is", &self.is)
            .field("nodes", &self.template.nodes().len())
            .field("controller", &self.controller.is_some())
            .finish()
    }
}

impl ViewDef {
    pub fn new(is: &str) -> Self {
        Self {
            is: is.to_string(),
            template: Template::empty(),
            controller: None,
        }
    }

    pub fn template(mut self, template: impl Into<Template>) -> Self {
        self.template = template.into();
        self
    }

    /// Give every instance a fresh `T::default()` controller.
    pub fn controller<T: Controller + Default + 'static>(mut self) -> Self {
        self.controller = Some(Rc::new(|| Box::new(T::default()) as Box<dyn Controller>));
        self
    }

    /// Build controllers with a custom factory.
    pub fn controller_with(mut self, factory: impl Fn() -> Box<dyn Controller> + 'static) -> Self {
        self.controller = Some(Rc::new(factory));
        self
    }

    pub fn is(&self) -> &str {
        &self.is
    }

    pub fn view_template(&self) -> &Template {
        &self.template
    }

    pub(crate) fn make_controller(&self) -> Option<Box<dyn Controller>> {
        self.controller.as_ref().map(|factory| factory())
    }
}

/// All views available to a renderer.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    views: HashMap<String, Rc<ViewDef>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view, replacing any previous definition of the same name.
    pub fn register(&mut self, view: ViewDef) -> &mut Self {
        tracing::debug!(view = view.is.as_str(), "registered view");
        self.views.insert(view.is.clone(), Rc::new(view));
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, view: ViewDef) -> Self {
        self.register(view);
        self
    }

    pub fn get(&self, is: &str) -> Option<Rc<ViewDef>> {
        self.views.get(is).cloned()
    }

    pub fn contains(&self, is: &str) -> bool {
        self.views.contains_key(is)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

// =============================================================================
// Stubs
// =============================================================================

/// Replace view `is` with an empty stand-in.
///
/// The stub instance is exposed on the page under `as_name` (or under `is`
/// when neither name is given) and/or appended to the page array
/// `as_array`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubSpec {
    pub is: String,
    pub as_name: Option<String>,
    pub as_array: Option<String>,
}

impl StubSpec {
    pub fn new(is: &str) -> Self {
        Self {
            is: is.to_string(),
            as_name: None,
            as_array: None,
        }
    }

    pub fn as_name(mut self, name: &str) -> Self {
        self.as_name = Some(name.to_string());
        self
    }

    pub fn as_array(mut self, name: &str) -> Self {
        self.as_array = Some(name.to_string());
        self
    }

    /// Named ref the stub is exposed under, if any.
    pub fn exposed_name(&self) -> Option<&str> {
        match (&self.as_name, &self.as_array) {
            (Some(name), _) => Some(name.as_str()),
            (None, None) => Some(self.is.as_str()),
            (None, Some(_)) => None,
        }
    }
}

impl From<&str> for StubSpec {
    fn from(is: &str) -> Self {
        StubSpec::new(is)
    }
}

impl From<String> for StubSpec {
    fn from(is: String) -> Self {
        StubSpec::new(&is)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Stubs {
    specs: HashMap<String, StubSpec>,
}

impl Stubs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, spec: impl Into<StubSpec>) {
        let spec = spec.into();
        self.specs.insert(spec.is.clone(), spec);
    }

    pub fn get(&self, is: &str) -> Option<&StubSpec> {
        self.specs.get(is)
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// What a view name resolved to.
#[derive(Debug, Clone)]
pub enum Resolved {
    Stub(StubSpec),
    View(Rc<ViewDef>),
}

/// Stubs win over registered views. Anything else is an error.
pub fn resolve(registry: &Registry, stubs: &Stubs, is: &str) -> ViewResult<Resolved> {
    if let Some(stub) = stubs.get(is) {
        return Ok(Resolved::Stub(stub.clone()));
    }
    registry
        .get(is)
        .map(Resolved::View)
        .ok_or_else(|| ViewError::UnknownView { is: is.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{el, Node};

    #[derive(Default)]
    struct Clown;
    impl Controller for Clown {}

    #[test]
    fn test_register_and_get() {
        let registry = Registry::new()
            .with(ViewDef::new("clown").template(Node::from(el("div"))).controller::<Clown>());
        let def = registry.get("clown").unwrap();
        assert_eq!(def.is(), "clown");
        assert_eq!(def.view_template().nodes().len(), 1);
        assert!(def.make_controller().is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_stub_exposed_name() {
        assert_eq!(StubSpec::from("clown").exposed_name(), Some("clown"));
        assert_eq!(StubSpec::new("clown").as_name("bozo").exposed_name(), Some("bozo"));
        assert_eq!(StubSpec::new("clown").as_array("clowns").exposed_name(), None);
        assert_eq!(
            StubSpec::new("clown").as_name("bozo").as_array("clowns").exposed_name(),
            Some("bozo")
        );
    }

    #[test]
    fn test_stubs_win() {
        let registry = Registry::new().with(ViewDef::new("clown"));
        let mut stubs = Stubs::new();
        stubs.insert("clown");
        assert!(matches!(resolve(&registry, &stubs, "clown"), Ok(Resolved::Stub(_))));
        assert!(matches!(
            resolve(&registry, &Stubs::new(), "clown"),
            Ok(Resolved::View(_))
        ));
    }

    #[test]
    fn test_unknown_view() {
        let err = resolve(&Registry::new(), &Stubs::new(), "ghost").unwrap_err();
        assert!(matches!(err, ViewError::UnknownView { ref is } if is == "ghost"));
    }
}
