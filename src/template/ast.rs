//! Template AST - the compiled, immutable structure of a view.
//!
//! Child lists are `Rc<[Node]>` so structural regions can keep a handle on
//! the nodes they re-render without copying the tree.

use std::rc::Rc;

use serde_json::Value;

use super::expr::{to_text, truthy, EvalContext, Expr};

// =============================================================================
// Attribute values
// =============================================================================

/// One piece of an attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrPart {
    Text(String),
    Expr(Expr),
    /// `{{if cond}}then{{else}}otherwise{{/if}}` inside an attribute.
    If {
        cond: Expr,
        then: Vec<AttrPart>,
        otherwise: Vec<AttrPart>,
    },
}

/// An attribute value: static text interleaved with bound parts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttrValue {
    parts: Vec<AttrPart>,
}

impl AttrValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(AttrPart::Text(text.into()));
        self
    }

    pub fn expr(mut self, expr: impl Into<Expr>) -> Self {
        self.parts.push(AttrPart::Expr(expr.into()));
        self
    }

    /// Append `{{if cond}}then{{/if}}`.
    pub fn when(self, cond: impl Into<Expr>, then: impl Into<AttrValue>) -> Self {
        self.when_else(cond, then, AttrValue::new())
    }

    /// Append `{{if cond}}then{{else}}otherwise{{/if}}`.
    pub fn when_else(
        mut self,
        cond: impl Into<Expr>,
        then: impl Into<AttrValue>,
        otherwise: impl Into<AttrValue>,
    ) -> Self {
        self.parts.push(AttrPart::If {
            cond: cond.into(),
            then: then.into().parts,
            otherwise: otherwise.into().parts,
        });
        self
    }

    pub fn parts(&self) -> &[AttrPart] {
        &self.parts
    }

    /// Whether any part reads the model.
    pub fn is_bound(&self) -> bool {
        fn bound(parts: &[AttrPart]) -> bool {
            parts.iter().any(|part| match part {
                AttrPart::Text(_) => false,
                AttrPart::Expr(_) | AttrPart::If { .. } => true,
            })
        }
        bound(&self.parts)
    }

    /// Rendered attribute text, or `None` when the attribute is absent.
    ///
    /// A value that is exactly one expression is absent when it evaluates
    /// to null or false, and empty when it evaluates to true.
    pub fn render(&self, ctx: &EvalContext) -> Option<String> {
        if let [AttrPart::Expr(expr)] = self.parts.as_slice() {
            return match expr.evaluate(ctx) {
                Value::Null | Value::Bool(false) => None,
                Value::Bool(true) => Some(String::new()),
                other => Some(to_text(&other)),
            };
        }
        let mut out = String::new();
        concat(&self.parts, ctx, &mut out);
        Some(out)
    }

    /// Value handed to a component attribute. A lone expression passes
    /// its raw value, anything else becomes a string.
    pub fn value(&self, ctx: &EvalContext) -> Value {
        if let [AttrPart::Expr(expr)] = self.parts.as_slice() {
            return expr.evaluate(ctx);
        }
        let mut out = String::new();
        concat(&self.parts, ctx, &mut out);
        Value::String(out)
    }

    pub fn dependencies(&self, ctx: &EvalContext, out: &mut Vec<String>) {
        fn collect(parts: &[AttrPart], ctx: &EvalContext, out: &mut Vec<String>) {
            for part in parts {
                match part {
                    AttrPart::Text(_) => {}
                    AttrPart::Expr(expr) => expr.dependencies(ctx, out),
                    AttrPart::If {
                        cond,
                        then,
                        otherwise,
                    } => {
                        cond.dependencies(ctx, out);
                        collect(then, ctx, out);
                        collect(otherwise, ctx, out);
                    }
                }
            }
        }
        collect(&self.parts, ctx, out);
    }
}

fn concat(parts: &[AttrPart], ctx: &EvalContext, out: &mut String) {
    for part in parts {
        match part {
            AttrPart::Text(text) => out.push_str(text),
            AttrPart::Expr(expr) => out.push_str(&to_text(&expr.evaluate(ctx))),
            AttrPart::If {
                cond,
                then,
                otherwise,
            } => {
                if truthy(&cond.evaluate(ctx)) {
                    concat(then, ctx, out);
                } else {
                    concat(otherwise, ctx, out);
                }
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(text: &str) -> Self {
        AttrValue::new().text(text)
    }
}

impl From<String> for AttrValue {
    fn from(text: String) -> Self {
        AttrValue::new().text(text)
    }
}

impl From<Expr> for AttrValue {
    fn from(expr: Expr) -> Self {
        AttrValue::new().expr(expr)
    }
}

/// `name` or `name="value"`. A valueless attribute is a flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<AttrValue>,
}

// =============================================================================
// Nodes
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<Attribute>,
    /// `as="name"`: expose the live node on the owning component.
    pub as_name: Option<String>,
    pub children: Rc<[Node]>,
}

/// `{{if}}` / `{{unless}}` block with an optional `{{else}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub cond: Expr,
    pub negate: bool,
    pub then: Rc<[Node]>,
    pub otherwise: Option<Rc<[Node]>>,
}

impl Conditional {
    /// Which branch the current model selects: 0 for then, 1 for else,
    /// `None` when nothing should render.
    pub fn branch(&self, ctx: &EvalContext) -> Option<usize> {
        if truthy(&self.cond.evaluate(ctx)) != self.negate {
            Some(0)
        } else if self.otherwise.is_some() {
            Some(1)
        } else {
            None
        }
    }

    pub fn branch_nodes(&self, branch: usize) -> Option<&Rc<[Node]>> {
        match branch {
            0 => Some(&self.then),
            _ => self.otherwise.as_ref(),
        }
    }

    pub fn label(&self) -> &'static str {
        if self.negate { "unless" } else { "if" }
    }
}

/// `{{each path as #alias}}` block with optional item key and `{{else}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Each {
    pub path: String,
    pub alias: Option<String>,
    /// Field of each item that identifies it across updates. Items are
    /// identified by index when absent.
    pub key: Option<String>,
    pub body: Rc<[Node]>,
    pub otherwise: Option<Rc<[Node]>>,
}

/// `<view is="...">` reference to a registered component.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRef {
    pub is: String,
    pub as_name: Option<String>,
    pub as_array: Option<String>,
    pub attrs: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    /// `{{expr}}` text interpolation.
    Expr(Expr),
    If(Conditional),
    Each(Each),
    View(ViewRef),
}

/// A compiled view template: a shared, immutable list of root nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Rc<[Node]>,
}

impl Template {
    pub fn new(nodes: impl IntoIterator<Item = Node>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::new([])
    }

    pub fn nodes(&self) -> &Rc<[Node]> {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<Node>> for Template {
    fn from(nodes: Vec<Node>) -> Self {
        Self::new(nodes)
    }
}

impl From<Node> for Template {
    fn from(node: Node) -> Self {
        Self::new([node])
    }
}
