//! Component Instance Manager - `<view is="...">` to live component.
//!
//! Creation order:
//! 1. resolve the view (stubs first, then the registry)
//! 2. create the component with its private model and scope
//! 3. copy attributes into the model, keeping bound ones live
//! 4. controller `init`
//! 5. expose on the page / owner refs
//! 6. render the template with the component as owner
//! 7. controller `create` (live sinks only)
//!
//! Destruction is the component scope stopping: bindings and children go
//! first, then the destroy hook (live sinks only), ref removal, and model
//! cleanup. A destroyed root component stops being the page component.

use std::rc::Rc;

use crate::engine::component::ComponentParts;
use crate::engine::{resolve, BindingScope, Component, ComponentId, Position, Resolved, StubSpec, ViewDef};
use crate::error::ViewResult;
use crate::model::path;
use crate::template::{Attribute, EvalContext, ViewRef};

use super::walk::{Frame, Walker};

/// `show-happy` -> `showHappy`.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

pub(crate) fn instantiate(
    walker: &mut Walker<'_>,
    frame: &Frame,
    view: &ViewRef,
    position: &Position,
) -> ViewResult<Rc<Component>> {
    let env = &frame.env;
    let resolved = resolve(&env.registry, &env.stubs, &view.is)?;
    let (def, stub) = match resolved {
        Resolved::View(def) => (Some(def), None),
        Resolved::Stub(spec) => (None, Some(spec)),
    };

    let id = ComponentId(env.next_component.get());
    env.next_component.set(id.0 + 1);
    let model_path = path::join(&env.config.components_path, &id.to_string());
    let component = Rc::new(Component::new(ComponentParts {
        id,
        view: view.is.clone(),
        model: env.root_model.scope(&model_path),
        controller: def.as_ref().and_then(|def| def.make_controller()),
        stub: stub.is_some(),
        position: position.clone(),
        document: env.document.clone(),
    }));
    tracing::debug!(
        component = %id,
        view = view.is.as_str(),
        stub = stub.is_some(),
        "creating component"
    );

    let scope = frame.scope.child();
    // Registered first so it runs after everything else in the scope.
    on_destroy(frame, view, stub.as_ref(), &component, &scope, walker.sink.is_live());

    let result = populate(walker, frame, view, stub.as_ref(), def.as_deref(), &component, &scope, position);
    match result {
        Ok(()) => Ok(component),
        Err(err) => {
            tracing::debug!(component = %id, error = %err, "component failed to render");
            scope.stop();
            Err(err)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn populate(
    walker: &mut Walker<'_>,
    frame: &Frame,
    view: &ViewRef,
    stub: Option<&StubSpec>,
    def: Option<&ViewDef>,
    component: &Rc<Component>,
    scope: &BindingScope,
    position: &Position,
) -> ViewResult<()> {
    let env = &frame.env;
    set_attributes(frame, &view.attrs, component, scope, walker.sink.is_live())?;
    component.run_init()?;
    expose(frame, view, stub, component);

    if frame.owner.is_none() {
        let mut root = env.root_component.borrow_mut();
        if root.is_none() {
            *root = Some(component.clone());
        }
    }

    if let Some(def) = def {
        let child = Frame {
            env: env.clone(),
            owner: Some(component.clone()),
            refs: component.refs().clone(),
            ctx: EvalContext::new(component.model().clone()),
            scope: scope.clone(),
        };
        walker.render_nodes(&child, def.view_template().nodes(), position)?;
    }

    if walker.sink.is_live() {
        component.run_create()?;
    }
    Ok(())
}

/// Copy view attributes into the component model. Bound attributes in a
/// live render follow the parent model.
fn set_attributes(
    frame: &Frame,
    attrs: &[Attribute],
    component: &Rc<Component>,
    scope: &BindingScope,
    live: bool,
) -> ViewResult<()> {
    for attr in attrs {
        let key = camel_case(&attr.name);
        let Some(value) = &attr.value else {
            component.model().set(&key, true)?;
            continue;
        };
        component.model().set(&key, value.value(&frame.ctx))?;

        if !live || !value.is_bound() {
            continue;
        }
        let mut dependencies = Vec::new();
        value.dependencies(&frame.ctx, &mut dependencies);
        for dependency in dependencies {
            let model = component.model().clone();
            let ctx = frame.ctx.clone();
            let key = key.clone();
            let value = value.clone();
            let subscription = frame
                .env
                .root_model
                .subscribe(&dependency, move |_| model.set(&key, value.value(&ctx)));
            scope.track(subscription);
        }
    }
    Ok(())
}

fn expose(frame: &Frame, view: &ViewRef, stub: Option<&StubSpec>, component: &Rc<Component>) {
    if let Some(spec) = stub {
        let page = &frame.env.page_refs;
        if let Some(name) = spec.exposed_name() {
            page.set_component(name, component.clone());
        }
        if let Some(array) = &spec.as_array {
            page.push_array(array, component.clone());
        }
    }
    if let Some(name) = &view.as_name {
        frame.refs.set_component(name, component.clone());
    }
    if let Some(array) = &view.as_array {
        frame.refs.push_array(array, component.clone());
    }
}

fn on_destroy(
    frame: &Frame,
    view: &ViewRef,
    stub: Option<&StubSpec>,
    component: &Rc<Component>,
    scope: &BindingScope,
    live: bool,
) {
    let env = frame.env.clone();
    let component = component.clone();
    let owner_refs = frame.refs.clone();
    let page_refs = frame.env.page_refs.clone();
    let view = view.clone();
    let stub = stub.cloned();

    scope.on_dispose(move || {
        // Html renders never run `create`, so they skip `destroy` too.
        if live {
            component.run_destroy();
        }

        let mut root = env.root_component.borrow_mut();
        if root.as_ref().is_some_and(|root| Rc::ptr_eq(root, &component)) {
            *root = None;
        }
        drop(root);

        if let Some(spec) = &stub {
            if let Some(name) = spec.exposed_name() {
                page_refs.clear_component(name, &component);
            }
            if let Some(array) = &spec.as_array {
                page_refs.remove_from_array(array, &component);
            }
        }
        if let Some(name) = &view.as_name {
            owner_refs.clear_component(name, &component);
        }
        if let Some(array) = &view.as_array {
            owner_refs.remove_from_array(array, &component);
        }

        if let Err(err) = component.model().del("") {
            tracing::warn!(component = %component.id(), error = %err, "failed to clear component model");
        }
        tracing::debug!(component = %component.id(), view = component.view(), "destroyed component");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("show-happy"), "showHappy");
        assert_eq!(camel_case("expression"), "expression");
        assert_eq!(camel_case("data-item-id"), "dataItemId");
    }
}
