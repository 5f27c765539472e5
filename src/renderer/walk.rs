//! Template walker - one AST traversal for every sink.
//!
//! The walker decides what to emit; the sink decides what emitting means.
//! When the sink is live, the walker also wires each bound attribute, text
//! interpolation, and block into the binding graph.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::Value;

use crate::config::RenderConfig;
use crate::dom::Document;
use crate::engine::{BindingScope, Component, Position, Refs, Registry, Stubs};
use crate::error::ViewResult;
use crate::model::Model;
use crate::template::{to_text, Conditional, Each, Element, EvalContext, Node};

use super::bindings::{AttributeBinding, ConditionalRegion, EachItem, EachRegion, EarlySubscription, TextBinding};
use super::instance::instantiate;
use super::sink::Sink;

/// Alias an each block without `as` uses for its item.
pub(crate) const DEFAULT_ALIAS: &str = "#this";

/// Per-render environment shared by every frame of a page.
pub(crate) struct Env {
    pub registry: Rc<Registry>,
    pub stubs: Rc<Stubs>,
    pub config: Rc<RenderConfig>,
    pub document: Rc<RefCell<Document>>,
    pub page_refs: Rc<Refs>,
    /// Root handle onto the page's store; subscriptions use absolute paths.
    pub root_model: Model,
    pub next_component: Cell<usize>,
    pub root_component: RefCell<Option<Rc<Component>>>,
}

/// Where a subtree renders: who owns it, where its refs go, what its
/// expressions read, and which scope owns its bindings.
#[derive(Clone)]
pub(crate) struct Frame {
    pub env: Rc<Env>,
    pub owner: Option<Rc<Component>>,
    pub refs: Rc<Refs>,
    pub ctx: EvalContext,
    pub scope: BindingScope,
}

impl Frame {
    pub fn with_scope(&self, scope: BindingScope) -> Frame {
        Frame {
            scope,
            ..self.clone()
        }
    }

    pub fn with_context(&self, ctx: EvalContext, scope: BindingScope) -> Frame {
        Frame {
            ctx,
            scope,
            ..self.clone()
        }
    }
}

/// Item alias for an each block.
pub(crate) fn alias_name(block: &Each) -> &str {
    block.alias.as_deref().unwrap_or(DEFAULT_ALIAS)
}

/// Identity of each item: the key field's text, or the index. Duplicates
/// keep their first occurrence.
pub(crate) fn keyed_items(block: &Each, collection: &Value) -> Vec<(String, usize)> {
    let Value::Array(items) = collection else {
        return Vec::new();
    };
    let mut seen = std::collections::HashSet::new();
    let mut keyed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let key = match &block.key {
            Some(field) => to_text(item.get(field.as_str()).unwrap_or(&Value::Null)),
            None => index.to_string(),
        };
        if !seen.insert(key.clone()) {
            tracing::warn!(
                path = block.path.as_str(),
                key = key.as_str(),
                "duplicate each key, item skipped"
            );
            continue;
        }
        keyed.push((key, index));
    }
    keyed
}

pub(crate) struct Walker<'a> {
    pub sink: &'a mut dyn Sink,
}

impl<'a> Walker<'a> {
    pub fn new(sink: &'a mut dyn Sink) -> Self {
        Self { sink }
    }

    pub fn render_nodes(&mut self, frame: &Frame, nodes: &[Node], position: &Position) -> ViewResult<()> {
        for (index, node) in nodes.iter().enumerate() {
            self.render_node(frame, node, &position.child(index))?;
        }
        Ok(())
    }

    fn render_node(&mut self, frame: &Frame, node: &Node, position: &Position) -> ViewResult<()> {
        match node {
            Node::Element(element) => self.render_element(frame, element, position),
            Node::Text(content) => self.sink.text(content).map(|_| ()),
            Node::Expr(expr) => {
                let value = to_text(&expr.evaluate(&frame.ctx));
                if let Some(node) = self.sink.text(&value)? {
                    TextBinding::bind(frame, node, expr.clone(), value);
                }
                Ok(())
            }
            Node::If(block) => self.render_conditional(frame, block, position),
            Node::Each(block) => self.render_each(frame, block, position),
            Node::View(view) => instantiate(self, frame, view, position).map(|_| ()),
        }
    }

    fn render_element(&mut self, frame: &Frame, element: &Element, position: &Position) -> ViewResult<()> {
        let attrs: Vec<(String, String)> = element
            .attrs
            .iter()
            .filter_map(|attr| match &attr.value {
                None => Some((attr.name.clone(), String::new())),
                Some(value) => value.render(&frame.ctx).map(|text| (attr.name.clone(), text)),
            })
            .collect();

        if let Some(node) = self.sink.open_element(&element.tag, &attrs)? {
            for attr in &element.attrs {
                if let Some(value) = attr.value.as_ref().filter(|value| value.is_bound()) {
                    let initial = attrs
                        .iter()
                        .find(|(name, _)| *name == attr.name)
                        .map(|(_, text)| text.clone());
                    AttributeBinding::bind(frame, node, &attr.name, value.clone(), initial);
                }
            }
            if let Some(name) = &element.as_name {
                frame.refs.set_node(name, node);
                let refs = frame.refs.clone();
                let name = name.clone();
                frame.scope.on_dispose(move || refs.clear_node(&name, node));
            }
        }

        self.render_nodes(frame, &element.children, position)?;
        self.sink.close_element(&element.tag)
    }

    fn render_conditional(&mut self, frame: &Frame, block: &Conditional, position: &Position) -> ViewResult<()> {
        let label = block.label();
        let start = self.sink.comment(label)?;
        let early = start.map(|_| {
            EarlySubscription::subscribe(frame, &ConditionalRegion::dependencies(frame, block))
        });

        let branch = block.branch(&frame.ctx);
        let scope = frame.scope.child();
        if let Some(branch) = branch {
            if let Some(nodes) = block.branch_nodes(branch) {
                self.render_nodes(&frame.with_scope(scope.clone()), nodes, &position.child(branch))?;
            }
        }

        let end = self.sink.comment(&format!("/{label}"))?;
        if let (Some(start), Some(end), Some(early)) = (start, end, early) {
            early.resolve(ConditionalRegion::new(
                frame,
                block.clone(),
                position.clone(),
                start,
                end,
                branch,
                scope,
            ));
        }
        Ok(())
    }

    fn render_each(&mut self, frame: &Frame, block: &Each, position: &Position) -> ViewResult<()> {
        let start = self.sink.comment("each")?;
        let early = start.map(|_| EarlySubscription::subscribe(frame, &EachRegion::dependencies(frame, block)));

        let collection = frame.ctx.get(&block.path);
        let keyed = keyed_items(block, &collection);
        let mut items = Vec::with_capacity(keyed.len());
        let mut otherwise = None;

        if !keyed.is_empty() {
            for (key, index) in keyed {
                let cell = Rc::new(Cell::new(index));
                let scope = frame.scope.child();
                let ctx = frame.ctx.with_alias(alias_name(block), &block.path, cell.clone());
                let mark = self.sink.mark();
                self.render_nodes(
                    &frame.with_context(ctx, scope.clone()),
                    &block.body,
                    &position.child_cell(cell.clone()),
                )?;
                items.push(EachItem {
                    key,
                    index: cell,
                    scope,
                    range: self.sink.span(mark),
                });
            }
        } else if let Some(nodes) = &block.otherwise {
            let scope = frame.scope.child();
            let mark = self.sink.mark();
            self.render_nodes(&frame.with_scope(scope.clone()), nodes, &position.child(0))?;
            otherwise = Some((scope, self.sink.span(mark)));
        }

        let end = self.sink.comment("/each")?;
        if let (Some(end), Some(early)) = (end, early) {
            early.resolve(EachRegion::new(frame, block.clone(), position.clone(), end, items, otherwise));
        }
        Ok(())
    }
}
