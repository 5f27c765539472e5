//! Component instances, controllers, and named references.
//!
//! A [`Component`] is one instantiation of a view at one place in a page.
//! It owns a private model scope, a table of [`Refs`] its template exposed
//! with `as` / `asArray`, and optionally a user [`Controller`] whose hooks
//! run at init, create, and destroy.

use std::any::Any;
use std::cell::{Ref as CellRef, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::dom::{Document, NodeId};
use crate::error::ViewResult;
use crate::model::Model;

use super::position::Position;

// =============================================================================
// Component Ids
// =============================================================================

/// Page-unique component id, shown as `c0`, `c1`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

// =============================================================================
// Controllers
// =============================================================================

/// Upcast to `Any` so controllers can be downcast to their concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// User behavior attached to a view.
///
/// `init` runs after attributes are set and before the template renders.
/// `create` runs after the template is live (Construct and Attach only).
/// `destroy` runs when the component's scope is torn down, for the same
/// components `create` ran for.
pub trait Controller: AsAny {
    fn init(&mut self, _component: &Component) -> ViewResult<()> {
        Ok(())
    }

    fn create(&mut self, _component: &Component) -> ViewResult<()> {
        Ok(())
    }

    fn destroy(&mut self, _component: &Component) {}
}

fn downcast<'a, T: 'static>(controller: &'a (dyn Controller + 'static)) -> Option<&'a T> {
    controller.as_any().downcast_ref::<T>()
}

fn downcast_mut<'a, T: 'static>(controller: &'a mut (dyn Controller + 'static)) -> Option<&'a mut T> {
    controller.as_any_mut().downcast_mut::<T>()
}

// =============================================================================
// Refs
// =============================================================================

/// Something a template exposed by name.
#[derive(Clone)]
pub enum Ref {
    Component(Rc<Component>),
    Node(NodeId),
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ref::Component(component) => write!(f, "Component({})", component.id()),
            Ref::Node(node) => write!(f, "Node({node})"),
        }
    }
}

/// Named and array references exposed on a component (or page).
#[derive(Default)]
pub struct Refs {
    named: RefCell<HashMap<String, Ref>>,
    arrays: RefCell<HashMap<String, Vec<Rc<Component>>>>,
}

impl Refs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Ref> {
        self.named.borrow().get(name).cloned()
    }

    pub fn component(&self, name: &str) -> Option<Rc<Component>> {
        match self.get(name)? {
            Ref::Component(component) => Some(component),
            Ref::Node(_) => None,
        }
    }

    pub fn node(&self, name: &str) -> Option<NodeId> {
        match self.get(name)? {
            Ref::Node(node) => Some(node),
            Ref::Component(_) => None,
        }
    }

    /// Members of an `asArray` collection in template order.
    pub fn array(&self, name: &str) -> Vec<Rc<Component>> {
        let mut members = self.arrays.borrow().get(name).cloned().unwrap_or_default();
        members.sort_by_cached_key(|component| component.position().key());
        members
    }

    pub(crate) fn set_component(&self, name: &str, component: Rc<Component>) {
        self.named
            .borrow_mut()
            .insert(name.to_string(), Ref::Component(component));
    }

    pub(crate) fn set_node(&self, name: &str, node: NodeId) {
        self.named.borrow_mut().insert(name.to_string(), Ref::Node(node));
    }

    /// Clear `name` if it still refers to `component`. A newer instance
    /// exposed under the same name stays.
    pub(crate) fn clear_component(&self, name: &str, component: &Rc<Component>) {
        let mut named = self.named.borrow_mut();
        if let Some(Ref::Component(current)) = named.get(name) {
            if Rc::ptr_eq(current, component) {
                named.remove(name);
            }
        }
    }

    pub(crate) fn clear_node(&self, name: &str, node: NodeId) {
        let mut named = self.named.borrow_mut();
        if let Some(Ref::Node(current)) = named.get(name) {
            if *current == node {
                named.remove(name);
            }
        }
    }

    pub(crate) fn push_array(&self, name: &str, component: Rc<Component>) {
        self.arrays
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push(component);
    }

    pub(crate) fn remove_from_array(&self, name: &str, component: &Rc<Component>) {
        let mut arrays = self.arrays.borrow_mut();
        if let Some(members) = arrays.get_mut(name) {
            members.retain(|member| !Rc::ptr_eq(member, component));
            if members.is_empty() {
                arrays.remove(name);
            }
        }
    }
}

impl fmt::Debug for Refs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut named: Vec<String> = self.named.borrow().keys().cloned().collect();
        named.sort();
        let mut arrays: Vec<String> = self.arrays.borrow().keys().cloned().collect();
        arrays.sort();
        f.debug_struct("Refs")
            .field("named", &named)
            .field("arrays", &arrays)
            .finish()
    }
}

// =============================================================================
// Component
// =============================================================================

pub struct Component {
    id: ComponentId,
    view: String,
    model: Model,
    refs: Rc<Refs>,
    controller: RefCell<Option<Box<dyn Controller>>>,
    stub: bool,
    position: Position,
    document: Rc<RefCell<Document>>,
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("view", &self.view)
            .field("stub", &self.stub)
            .field("position", &self.position)
            .finish()
    }
}

pub(crate) struct ComponentParts {
    pub id: ComponentId,
    pub view: String,
    pub model: Model,
    pub controller: Option<Box<dyn Controller>>,
    pub stub: bool,
    pub position: Position,
    pub document: Rc<RefCell<Document>>,
}

impl Component {
    pub(crate) fn new(parts: ComponentParts) -> Self {
        Self {
            id: parts.id,
            view: parts.view,
            model: parts.model,
            refs: Rc::new(Refs::new()),
            controller: RefCell::new(parts.controller),
            stub: parts.stub,
            position: parts.position,
            document: parts.document,
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Name of the view this instantiates.
    pub fn view(&self) -> &str {
        &self.view
    }

    /// Private model scope. Attribute values are written here.
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn refs(&self) -> &Rc<Refs> {
        &self.refs
    }

    pub fn is_stub(&self) -> bool {
        self.stub
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// The document this component's nodes live in.
    pub fn document(&self) -> &Rc<RefCell<Document>> {
        &self.document
    }

    /// Whether the controller is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.controller
            .borrow()
            .as_ref()
            .is_some_and(|controller| downcast::<T>(&**controller).is_some())
    }

    pub fn controller<T: 'static>(&self) -> Option<CellRef<'_, T>> {
        CellRef::filter_map(self.controller.borrow(), |controller| {
            controller
                .as_ref()
                .and_then(|controller| downcast::<T>(&**controller))
        })
        .ok()
    }

    pub fn controller_mut<T: 'static>(&self) -> Option<RefMut<'_, T>> {
        RefMut::filter_map(self.controller.borrow_mut(), |controller| {
            controller
                .as_mut()
                .and_then(|controller| downcast_mut::<T>(&mut **controller))
        })
        .ok()
    }

    /// Child component exposed with `as="name"`.
    pub fn child(&self, name: &str) -> Option<Rc<Component>> {
        self.refs.component(name)
    }

    /// Child components exposed with `asArray="name"`, in template order.
    pub fn children(&self, name: &str) -> Vec<Rc<Component>> {
        self.refs.array(name)
    }

    /// Element exposed with `as="name"`.
    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.refs.node(name)
    }

    // Hooks take the controller out while running so it can freely read
    // the component (including `controller::<T>()` returning `None`).

    pub(crate) fn run_init(&self) -> ViewResult<()> {
        self.with_controller(|controller, component| controller.init(component))
            .unwrap_or(Ok(()))
    }

    pub(crate) fn run_create(&self) -> ViewResult<()> {
        self.with_controller(|controller, component| controller.create(component))
            .unwrap_or(Ok(()))
    }

    pub(crate) fn run_destroy(&self) {
        self.with_controller(|controller, component| controller.destroy(component));
    }

    fn with_controller<R>(&self, hook: impl FnOnce(&mut (dyn Controller + 'static), &Component) -> R) -> Option<R> {
        let mut controller = self.controller.borrow_mut().take()?;
        let result = hook(&mut *controller, self);
        *self.controller.borrow_mut() = Some(controller);
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Counter {
        inits: usize,
        seen_self: Cell<bool>,
    }

    impl Controller for Counter {
        fn init(&mut self, component: &Component) -> ViewResult<()> {
            self.inits += 1;
            // The controller is out of its cell while the hook runs.
            self.seen_self.set(component.controller::<Counter>().is_none());
            component.model().set("ready", true)
        }
    }

    struct Other;
    impl Controller for Other {}

    fn component(id: usize, position: Position, controller: Option<Box<dyn Controller>>) -> Rc<Component> {
        Rc::new(Component::new(ComponentParts {
            id: ComponentId(id),
            view: "test".to_string(),
            model: Model::new().scope(&format!("_components.c{id}")),
            controller,
            stub: false,
            position,
            document: Rc::new(RefCell::new(Document::new())),
        }))
    }

    #[test]
    fn test_id_display() {
        assert_eq!(ComponentId(7).to_string(), "c7");
    }

    #[test]
    fn test_controller_downcast() {
        let c = component(0, Position::root(), Some(Box::new(Counter::default())));
        assert!(c.is::<Counter>());
        assert!(!c.is::<Other>());
        assert!(c.controller::<Other>().is_none());

        c.run_init().unwrap();
        let counter = c.controller::<Counter>().unwrap();
        assert_eq!(counter.inits, 1);
        assert!(counter.seen_self.get());
        assert_eq!(c.model().get("ready"), serde_json::json!(true));
    }

    #[test]
    fn test_no_controller() {
        let c = component(0, Position::root(), None);
        assert!(!c.is::<Counter>());
        assert!(c.run_init().is_ok());
        c.run_destroy();
    }

    #[test]
    fn test_clear_only_same_instance() {
        let refs = Refs::new();
        let old = component(0, Position::root(), None);
        let new = component(1, Position::root(), None);
        refs.set_component("clown", old.clone());
        refs.set_component("clown", new.clone());
        refs.clear_component("clown", &old);
        assert_eq!(refs.component("clown").unwrap().id(), ComponentId(1));
        refs.clear_component("clown", &new);
        assert!(refs.get("clown").is_none());
    }

    #[test]
    fn test_array_sorted_by_position() {
        let refs = Refs::new();
        let root = Position::root();
        let late = component(0, root.child(2), None);
        let early = component(1, root.child(0), None);
        refs.push_array("clowns", late.clone());
        refs.push_array("clowns", early);
        let ids: Vec<String> = refs.array("clowns").iter().map(|c| c.id().to_string()).collect();
        assert_eq!(ids, vec!["c1", "c0"]);

        refs.remove_from_array("clowns", &late);
        assert_eq!(refs.array("clowns").len(), 1);
    }

    #[test]
    fn test_node_refs() {
        let refs = Refs::new();
        let mut doc = Document::new();
        let node = doc.create_element("div");
        refs.set_node("box", node);
        assert_eq!(refs.node("box"), Some(node));
        assert!(refs.component("box").is_none());
        refs.clear_node("box", node);
        assert!(refs.node("box").is_none());
    }
}
