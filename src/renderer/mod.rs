//! Renderer - one template, three materializations.
//!
//! ```text
//! Template AST ──> Walker ──> Sink ──> HtmlSink      (markup string)
//!                    │              ├─> ConstructSink (new fragment, live)
//!                    │              └─> AttachSink    (existing nodes, live)
//!                    └─> bindings / instances (live sinks only subscribe)
//! ```
//!
//! A render returns a [`Page`], which owns the root [`BindingScope`]. Dropping
//! the page (or calling [`Page::destroy`]) tears down every component and
//! subscription the render created.

pub mod bindings;
pub mod instance;
pub mod sink;
pub mod walk;

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::config::RenderConfig;
use crate::dom::{html, Document, NodeId};
use crate::engine::{BindingScope, Component, Position, Refs, Registry, Stubs};
use crate::error::ViewResult;
use crate::model::Model;
use crate::template::{EvalContext, Template};

pub use instance::camel_case;
pub use sink::{AttachSink, ConstructSink, HtmlSink, Sink, SpanMark};

use walk::{Env, Frame, Walker};

// =============================================================================
// Strategy
// =============================================================================

/// How a render materializes its output.
#[derive(Clone)]
pub enum Strategy {
    /// Markup string, no live bindings.
    Html,
    /// New nodes in a fresh document fragment.
    Construct,
    /// Bind to markup already under `container`.
    Attach {
        document: Rc<RefCell<Document>>,
        container: NodeId,
    },
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Html => "html",
            Strategy::Construct => "construct",
            Strategy::Attach { .. } => "attach",
        }
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Attach { container, .. } => write!(f, "Attach({container})"),
            other => f.write_str(other.name()),
        }
    }
}

// =============================================================================
// Renderer
// =============================================================================

#[derive(Clone)]
pub struct Renderer {
    registry: Rc<Registry>,
    stubs: Rc<Stubs>,
    config: Rc<RenderConfig>,
}

impl Renderer {
    pub fn new(registry: Rc<Registry>) -> Self {
        Self {
            registry,
            stubs: Rc::new(Stubs::new()),
            config: Rc::new(RenderConfig::default()),
        }
    }

    pub fn with_stubs(mut self, stubs: Stubs) -> Self {
        self.stubs = Rc::new(stubs);
        self
    }

    pub fn with_config(mut self, config: RenderConfig) -> Self {
        self.config = Rc::new(config);
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render `template` against `model`.
    ///
    /// On failure everything created so far is torn down before the error
    /// is returned.
    pub fn render(&self, template: &Template, model: &Model, strategy: Strategy) -> ViewResult<Page> {
        let name = strategy.name();
        tracing::debug!(strategy = name, "render start");

        let document = match &strategy {
            Strategy::Attach { document, .. } => document.clone(),
            _ => Rc::new(RefCell::new(Document::new())),
        };
        let env = Rc::new(Env {
            registry: self.registry.clone(),
            stubs: self.stubs.clone(),
            config: self.config.clone(),
            document: document.clone(),
            page_refs: Rc::new(Refs::new()),
            root_model: model.root(),
            next_component: Cell::new(0),
            root_component: RefCell::new(None),
        });
        let scope = BindingScope::new();
        let frame = Frame {
            env: env.clone(),
            owner: None,
            refs: env.page_refs.clone(),
            ctx: EvalContext::new(model.clone()),
            scope: scope.clone(),
        };
        let root = Position::root();

        let output = match strategy {
            Strategy::Html => {
                let mut sink = HtmlSink::new();
                Walker::new(&mut sink)
                    .render_nodes(&frame, template.nodes(), &root)
                    .map(|()| Output::Html(sink.finish()))
            }
            Strategy::Construct => {
                let fragment = document.borrow_mut().create_fragment();
                let mut sink = ConstructSink::new(document.clone(), fragment, None);
                Walker::new(&mut sink)
                    .render_nodes(&frame, template.nodes(), &root)
                    .map(|()| Output::Nodes(fragment))
            }
            Strategy::Attach { container, .. } => {
                let mut sink = AttachSink::new(document.clone(), container, self.config.strict_attach_attributes);
                Walker::new(&mut sink)
                    .render_nodes(&frame, template.nodes(), &root)
                    .and_then(|()| sink.finish())
                    .map(|()| Output::Nodes(container))
            }
        };

        match output {
            Ok(output) => {
                tracing::debug!(strategy = name, "render done");
                Ok(Page {
                    env,
                    scope,
                    output,
                    model: model.clone(),
                })
            }
            Err(err) => {
                tracing::debug!(strategy = name, error = %err, "render failed");
                scope.stop();
                Err(err)
            }
        }
    }
}

// =============================================================================
// Page
// =============================================================================

enum Output {
    Html(String),
    Nodes(NodeId),
}

/// The result of one render: root component, output, page-level refs.
pub struct Page {
    env: Rc<Env>,
    scope: BindingScope,
    output: Output,
    model: Model,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("component", &self.component().map(|c| c.id()))
            .field("fragment", &self.fragment())
            .field("refs", &self.env.page_refs)
            .finish()
    }
}

impl Page {
    /// The first component instantiated at the root of the template.
    pub fn component(&self) -> Option<Rc<Component>> {
        self.env.root_component.borrow().clone()
    }

    /// Constructed fragment, or the attach container.
    pub fn fragment(&self) -> Option<NodeId> {
        match self.output {
            Output::Nodes(node) => Some(node),
            Output::Html(_) => None,
        }
    }

    /// Markup produced by an HTML render.
    pub fn html(&self) -> Option<&str> {
        match &self.output {
            Output::Html(html) => Some(html),
            Output::Nodes(_) => None,
        }
    }

    /// Current markup of the page, whatever the strategy.
    pub fn fragment_html(&self) -> String {
        match &self.output {
            Output::Html(html) => html.clone(),
            Output::Nodes(node) => html::inner_html(&self.env.document.borrow(), *node),
        }
    }

    pub fn document(&self) -> &Rc<RefCell<Document>> {
        &self.env.document
    }

    /// Shorthand for borrowing the document.
    pub fn doc(&self) -> Ref<'_, Document> {
        self.env.document.borrow()
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Page-level refs (stubs and root-template `as` names).
    pub fn refs(&self) -> &Rc<Refs> {
        &self.env.page_refs
    }

    /// Named component on the page, or on the root component.
    pub fn child(&self, name: &str) -> Option<Rc<Component>> {
        self.env
            .page_refs
            .component(name)
            .or_else(|| self.component().and_then(|root| root.child(name)))
    }

    /// Array of components on the page, or on the root component.
    pub fn children(&self, name: &str) -> Vec<Rc<Component>> {
        let page = self.env.page_refs.array(name);
        if !page.is_empty() {
            return page;
        }
        self.component()
            .map(|root| root.children(name))
            .unwrap_or_default()
    }

    /// Named element on the page, or on the root component.
    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.env
            .page_refs
            .node(name)
            .or_else(|| self.component().and_then(|root| root.node(name)))
    }

    /// Tear down every component and binding now.
    pub fn destroy(self) {}
}

impl Drop for Page {
    fn drop(&mut self) {
        self.scope.stop();
        self.env.root_component.borrow_mut().take();
    }
}
