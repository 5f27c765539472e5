//! Binding Graph - live links from model paths to output nodes.
//!
//! Leaf bindings (text and attributes) keep the last value they wrote and
//! touch the document only when a re-evaluation differs. Structural
//! regions sit between a pair of comment markers and own a child
//! [`BindingScope`] per branch or item, so tearing a branch down also tears
//! down every binding and component inside it.
//!
//! Every binding subscribes to the absolute paths its expressions read and
//! puts the subscriptions in its frame's scope.

use std::cell::{Cell, OnceCell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::dom::{Document, NodeId, NodeRange};
use crate::engine::{BindingScope, Position};
use crate::error::ViewResult;
use crate::template::{to_text, AttrValue, Conditional, Each, EvalContext, Expr};

use super::sink::{ConstructSink, Sink as _};
use super::walk::{alias_name, keyed_items, Frame, Walker};

fn subscribe_all(frame: &Frame, dependencies: &[String], update: Rc<dyn Fn() -> ViewResult<()>>) {
    for dependency in dependencies {
        let update = update.clone();
        let subscription = frame
            .env
            .root_model
            .subscribe(dependency, move |_| update());
        frame.scope.track(subscription);
    }
}

/// A structural region, updated when its dependencies change.
pub(crate) trait Region {
    fn update(&self) -> ViewResult<()>;
}

/// Region subscription taken before the region's content renders.
///
/// Subscriptions are notified in creation order, so this makes a region
/// hear about a change before any binding inside it does. Item bindings
/// then read through already-updated alias indexes.
pub(crate) struct EarlySubscription {
    target: Rc<OnceCell<Rc<dyn Region>>>,
}

impl EarlySubscription {
    pub fn subscribe(frame: &Frame, dependencies: &[String]) -> Self {
        let target: Rc<OnceCell<Rc<dyn Region>>> = Rc::new(OnceCell::new());
        let listener = target.clone();
        subscribe_all(
            frame,
            dependencies,
            Rc::new(move || match listener.get() {
                Some(region) => region.update(),
                None => Ok(()),
            }),
        );
        Self { target }
    }

    pub fn resolve(self, region: Rc<dyn Region>) {
        let resolved = self.target.set(region).is_ok();
        debug_assert!(resolved, "region subscription resolved twice");
    }
}

/// Serializes region updates. A notification that arrives while the
/// region is already updating is folded into one more pass afterwards.
#[derive(Default)]
struct Reentry {
    busy: Cell<bool>,
    pending: Cell<bool>,
}

impl Reentry {
    fn run(&self, mut apply: impl FnMut() -> ViewResult<()>) -> ViewResult<()> {
        if self.busy.replace(true) {
            self.pending.set(true);
            return Ok(());
        }
        let result = loop {
            let result = apply();
            if result.is_err() || !self.pending.replace(false) {
                break result;
            }
        };
        self.pending.set(false);
        self.busy.set(false);
        result
    }
}

// =============================================================================
// Leaf bindings
// =============================================================================

pub(crate) struct TextBinding {
    document: Rc<RefCell<Document>>,
    node: NodeId,
    expr: Expr,
    ctx: EvalContext,
    last: RefCell<String>,
}

impl TextBinding {
    pub fn bind(frame: &Frame, node: NodeId, expr: Expr, initial: String) {
        let mut dependencies = Vec::new();
        expr.dependencies(&frame.ctx, &mut dependencies);
        if dependencies.is_empty() {
            return;
        }
        let binding = Rc::new(TextBinding {
            document: frame.env.document.clone(),
            node,
            expr,
            ctx: frame.ctx.clone(),
            last: RefCell::new(initial),
        });
        subscribe_all(frame, &dependencies, Rc::new(move || binding.update()));
    }

    fn update(&self) -> ViewResult<()> {
        let value = to_text(&self.expr.evaluate(&self.ctx));
        if *self.last.borrow() == value {
            return Ok(());
        }
        tracing::trace!(node = %self.node, text = value.as_str(), "text binding write");
        self.document.borrow_mut().set_text(self.node, &value);
        *self.last.borrow_mut() = value;
        Ok(())
    }
}

pub(crate) struct AttributeBinding {
    document: Rc<RefCell<Document>>,
    node: NodeId,
    name: String,
    value: AttrValue,
    ctx: EvalContext,
    last: RefCell<Option<String>>,
}

impl AttributeBinding {
    pub fn bind(frame: &Frame, node: NodeId, name: &str, value: AttrValue, initial: Option<String>) {
        let mut dependencies = Vec::new();
        value.dependencies(&frame.ctx, &mut dependencies);
        if dependencies.is_empty() {
            return;
        }
        let binding = Rc::new(AttributeBinding {
            document: frame.env.document.clone(),
            node,
            name: name.to_string(),
            value,
            ctx: frame.ctx.clone(),
            last: RefCell::new(initial),
        });
        subscribe_all(frame, &dependencies, Rc::new(move || binding.update()));
    }

    fn update(&self) -> ViewResult<()> {
        let next = self.value.render(&self.ctx);
        if *self.last.borrow() == next {
            return Ok(());
        }
        tracing::trace!(
            node = %self.node,
            attribute = self.name.as_str(),
            value = ?next,
            "attribute binding write"
        );
        {
            let mut doc = self.document.borrow_mut();
            match &next {
                Some(text) => doc.set_attribute(self.node, &self.name, text),
                None => doc.remove_attribute(self.node, &self.name),
            }
        }
        *self.last.borrow_mut() = next;
        Ok(())
    }
}

// =============================================================================
// Conditional regions
// =============================================================================

/// `<!--if-->...<!--/if-->` (or `unless`): at most one branch rendered.
pub(crate) struct ConditionalRegion {
    block: Conditional,
    frame: Frame,
    position: Position,
    start: NodeId,
    end: NodeId,
    branch: Cell<Option<usize>>,
    current: RefCell<Option<BindingScope>>,
    reentry: Reentry,
}

impl ConditionalRegion {
    pub fn dependencies(frame: &Frame, block: &Conditional) -> Vec<String> {
        let mut dependencies = Vec::new();
        block.cond.dependencies(&frame.ctx, &mut dependencies);
        dependencies
    }

    pub fn new(
        frame: &Frame,
        block: Conditional,
        position: Position,
        start: NodeId,
        end: NodeId,
        branch: Option<usize>,
        scope: BindingScope,
    ) -> Rc<Self> {
        Rc::new(ConditionalRegion {
            block,
            frame: frame.clone(),
            position,
            start,
            end,
            branch: Cell::new(branch),
            current: RefCell::new(Some(scope)),
            reentry: Reentry::default(),
        })
    }

    fn apply(&self) -> ViewResult<()> {
        if self.frame.scope.is_stopped() {
            return Ok(());
        }
        let branch = self.block.branch(&self.frame.ctx);
        let previous = self.branch.get();
        if branch == previous {
            return Ok(());
        }
        tracing::trace!(
            region = self.block.label(),
            from = ?previous,
            to = ?branch,
            "conditional region switch"
        );

        self.clear();
        self.branch.set(branch);

        let Some((branch, nodes)) = branch.and_then(|b| self.block.branch_nodes(b).map(|n| (b, n.clone()))) else {
            return Ok(());
        };
        let document = &self.frame.env.document;
        let Some(parent) = document.borrow().parent(self.end) else {
            return Ok(());
        };

        let scope = self.frame.scope.child();
        *self.current.borrow_mut() = Some(scope.clone());
        let mut sink = ConstructSink::new(document.clone(), parent, Some(self.end));
        let result = Walker::new(&mut sink).render_nodes(
            &self.frame.with_scope(scope),
            &nodes,
            &self.position.child(branch),
        );
        if let Err(err) = result {
            tracing::debug!(region = self.block.label(), error = %err, "branch failed, region left empty");
            self.clear();
            self.branch.set(None);
            return Err(err);
        }
        Ok(())
    }

    /// Stop the current branch and remove its nodes.
    fn clear(&self) {
        if let Some(scope) = self.current.borrow_mut().take() {
            scope.stop();
        }
        self.frame
            .env
            .document
            .borrow_mut()
            .remove_between(self.start, self.end);
    }
}

impl Region for ConditionalRegion {
    fn update(&self) -> ViewResult<()> {
        self.reentry.run(|| self.apply())
    }
}

// =============================================================================
// Each regions
// =============================================================================

/// One rendered item of an each block.
pub(crate) struct EachItem {
    pub key: String,
    /// Live collection index, read by the item's alias and position.
    pub index: Rc<Cell<usize>>,
    pub scope: BindingScope,
    /// Top-level nodes, `None` when the item rendered nothing.
    pub range: Option<NodeRange>,
}

/// `<!--each-->...<!--/each-->`: one keyed item per collection entry.
pub(crate) struct EachRegion {
    block: Each,
    frame: Frame,
    position: Position,
    end: NodeId,
    items: RefCell<Vec<EachItem>>,
    otherwise: RefCell<Option<(BindingScope, Option<NodeRange>)>>,
    reentry: Reentry,
}

impl EachRegion {
    pub fn dependencies(frame: &Frame, block: &Each) -> Vec<String> {
        vec![frame.ctx.dependency(&block.path)]
    }

    pub fn new(
        frame: &Frame,
        block: Each,
        position: Position,
        end: NodeId,
        items: Vec<EachItem>,
        otherwise: Option<(BindingScope, Option<NodeRange>)>,
    ) -> Rc<Self> {
        Rc::new(EachRegion {
            block,
            frame: frame.clone(),
            position,
            end,
            items: RefCell::new(items),
            otherwise: RefCell::new(otherwise),
            reentry: Reentry::default(),
        })
    }

    fn document(&self) -> &Rc<RefCell<Document>> {
        &self.frame.env.document
    }

    fn apply(&self) -> ViewResult<()> {
        if self.frame.scope.is_stopped() {
            return Ok(());
        }
        let collection = self.frame.ctx.get(&self.block.path);
        let keyed = keyed_items(&self.block, &collection);
        let old = std::mem::take(&mut *self.items.borrow_mut());

        // Destroy removed items, in their old order.
        let wanted: HashSet<&str> = keyed.iter().map(|(key, _)| key.as_str()).collect();
        let mut kept: HashMap<String, EachItem> = HashMap::new();
        for item in old {
            if wanted.contains(item.key.as_str()) {
                kept.insert(item.key.clone(), item);
            } else {
                tracing::trace!(path = self.block.path.as_str(), key = item.key.as_str(), "each item removed");
                self.destroy(item.scope, item.range);
            }
        }

        if keyed.is_empty() {
            return self.show_otherwise();
        }
        if let Some((scope, range)) = self.otherwise.borrow_mut().take() {
            self.destroy(scope, range);
        }

        // Keep or render every wanted item. New items render into detached
        // fragments and are placed below.
        let mut next = Vec::with_capacity(keyed.len());
        let mut fragments = Vec::new();
        let mut first_error = None;
        for (key, index) in keyed {
            if let Some(item) = kept.remove(&key) {
                item.index.set(index);
                next.push(item);
                continue;
            }
            let fragment = self.document().borrow_mut().create_fragment();
            fragments.push(fragment);
            match self.render_item(fragment, key, index) {
                Ok(item) => next.push(item),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        self.place(&next);
        {
            let mut doc = self.document().borrow_mut();
            for fragment in fragments {
                doc.remove(fragment);
            }
        }
        *self.items.borrow_mut() = next;
        first_error.map_or(Ok(()), Err)
    }

    fn render_item(&self, fragment: NodeId, key: String, index: usize) -> ViewResult<EachItem> {
        tracing::trace!(path = self.block.path.as_str(), key = key.as_str(), "each item added");
        let cell = Rc::new(Cell::new(index));
        let scope = self.frame.scope.child();
        let ctx = self
            .frame
            .ctx
            .with_alias(alias_name(&self.block), &self.block.path, cell.clone());
        let mut sink = ConstructSink::new(self.document().clone(), fragment, None);
        let mark = sink.mark();
        let result = Walker::new(&mut sink).render_nodes(
            &self.frame.with_context(ctx, scope.clone()),
            &self.block.body,
            &self.position.child_cell(cell.clone()),
        );
        if let Err(err) = result {
            scope.stop();
            return Err(err);
        }
        Ok(EachItem {
            key,
            index: cell,
            scope,
            range: sink.span(mark),
        })
    }

    /// Walk items backwards from the end marker, moving each one only if
    /// it is not already right before the item that follows it.
    fn place(&self, items: &[EachItem]) {
        let mut doc = self.document().borrow_mut();
        let Some(parent) = doc.parent(self.end) else {
            return;
        };
        let mut anchor = self.end;
        for item in items.iter().rev() {
            let Some(range) = item.range else { continue };
            if doc.next_sibling(range.last) != Some(anchor) {
                for node in doc.range_nodes(range) {
                    doc.insert_before(parent, node, Some(anchor));
                }
            }
            anchor = range.first;
        }
    }

    fn show_otherwise(&self) -> ViewResult<()> {
        let Some(nodes) = self.block.otherwise.clone() else {
            return Ok(());
        };
        if self.otherwise.borrow().is_some() {
            return Ok(());
        }
        let Some(parent) = self.document().borrow().parent(self.end) else {
            return Ok(());
        };
        let scope = self.frame.scope.child();
        let mut sink = ConstructSink::new(self.document().clone(), parent, Some(self.end));
        let mark = sink.mark();
        let result = Walker::new(&mut sink).render_nodes(
            &self.frame.with_scope(scope.clone()),
            &nodes,
            &self.position.child(0),
        );
        let range = sink.span(mark);
        if let Err(err) = result {
            self.destroy(scope, range);
            return Err(err);
        }
        *self.otherwise.borrow_mut() = Some((scope, range));
        Ok(())
    }

    fn destroy(&self, scope: BindingScope, range: Option<NodeRange>) {
        scope.stop();
        if let Some(range) = range {
            self.document().borrow_mut().remove_range(range);
        }
    }
}

impl Region for EachRegion {
    fn update(&self) -> ViewResult<()> {
        self.reentry.run(|| self.apply())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewError;

    #[test]
    fn test_reentry_folds_nested_updates() {
        let reentry = Rc::new(Reentry::default());
        let runs = Rc::new(Cell::new(0));

        let inner = reentry.clone();
        let counter = runs.clone();
        reentry
            .run(|| {
                counter.set(counter.get() + 1);
                if counter.get() == 1 {
                    // Nested notification while busy: deferred, not recursive.
                    inner.run(|| panic!("must not run nested")).unwrap();
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_reentry_stops_on_error() {
        let reentry = Reentry::default();
        let result = reentry.run(|| Err(ViewError::UnknownView { is: "x".into() }));
        assert!(result.is_err());
        assert!(reentry.run(|| Ok(())).is_ok());
    }
}
