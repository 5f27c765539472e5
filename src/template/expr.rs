//! Binding expressions and their evaluation context.
//!
//! Expressions are deliberately small: model paths, literals, negation and
//! equality. Every path an expression reads is reported by
//! [`Expr::dependencies`] so bindings can subscribe to exactly those paths.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::Value;

use crate::model::{path, Model};

/// A compiled binding expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Model path relative to the current component, or `#alias.rest`.
    Path(String),
    /// Constant value.
    Literal(Value),
    /// Boolean negation of the inner expression's truthiness.
    Not(Box<Expr>),
    /// JSON equality of two expressions.
    Equals(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn path(path: impl Into<String>) -> Self {
        Expr::Path(path.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn equals(self, other: impl Into<Expr>) -> Self {
        Expr::Equals(Box::new(self), Box::new(other.into()))
    }

    /// Evaluate against the current model state.
    pub fn evaluate(&self, ctx: &EvalContext) -> Value {
        match self {
            Expr::Path(path) => ctx.get(path),
            Expr::Literal(value) => value.clone(),
            Expr::Not(inner) => Value::Bool(!truthy(&inner.evaluate(ctx))),
            Expr::Equals(left, right) => Value::Bool(left.evaluate(ctx) == right.evaluate(ctx)),
        }
    }

    /// Append the absolute store paths this expression reads.
    pub fn dependencies(&self, ctx: &EvalContext, out: &mut Vec<String>) {
        match self {
            Expr::Path(path) => {
                let dependency = ctx.dependency(path);
                if !out.contains(&dependency) {
                    out.push(dependency);
                }
            }
            Expr::Literal(_) => {}
            Expr::Not(inner) => inner.dependencies(ctx, out),
            Expr::Equals(left, right) => {
                left.dependencies(ctx, out);
                right.dependencies(ctx, out);
            }
        }
    }
}

impl From<&str> for Expr {
    fn from(path: &str) -> Self {
        Expr::Path(path.to_string())
    }
}

impl From<String> for Expr {
    fn from(path: String) -> Self {
        Expr::Path(path)
    }
}

/// Template truthiness: null, false, 0, "" and [] are falsy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// Text rendering of a value. Null renders empty; containers render as JSON.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// Evaluation Context
// =============================================================================

struct AliasFrame {
    name: String,
    collection: String,
    index: Rc<Cell<usize>>,
    outer: Option<Rc<AliasFrame>>,
}

/// Where expressions read from: a model handle plus the `#alias` frames of
/// enclosing each blocks.
///
/// Alias indexes are live cells. When an each block reorders its items it
/// updates the cell, and every later read through the alias follows.
#[derive(Clone)]
pub struct EvalContext {
    model: Model,
    aliases: Option<Rc<AliasFrame>>,
}

impl EvalContext {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            aliases: None,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Context where `name` refers to item `index` of `collection`.
    ///
    /// `collection` is written in this context, so it may itself go through
    /// an outer alias.
    pub fn with_alias(&self, name: &str, collection: &str, index: Rc<Cell<usize>>) -> Self {
        Self {
            model: self.model.clone(),
            aliases: Some(Rc::new(AliasFrame {
                name: name.to_string(),
                collection: collection.to_string(),
                index,
                outer: self.aliases.clone(),
            })),
        }
    }

    /// Current value at a path as written in a template.
    pub fn get(&self, path: &str) -> Value {
        let (value_path, _) = resolve(self.aliases.as_ref(), path);
        self.model.get(&value_path)
    }

    /// Absolute store path a binding on `path` must subscribe to.
    ///
    /// Paths through an alias depend on the root collection, since the
    /// concrete index can change under them.
    pub fn dependency(&self, path: &str) -> String {
        let (_, dependency) = resolve(self.aliases.as_ref(), path);
        self.model.absolute(&dependency)
    }
}

fn resolve(frame: Option<&Rc<AliasFrame>>, path: &str) -> (String, String) {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, rest),
        None => (path, ""),
    };
    let mut current = frame;
    while let Some(alias) = current {
        if alias.name == head {
            let (collection, dependency) = resolve(alias.outer.as_ref(), &alias.collection);
            let item = path::join(&collection, &alias.index.get().to_string());
            return (path::join(&item, rest), dependency);
        }
        current = alias.outer.as_ref();
    }
    (path.to_string(), path.to_string())
}
