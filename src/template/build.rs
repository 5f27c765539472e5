//! Builders for template ASTs.
//!
//! Stands in for the markup compiler front-end. The markup
//!
//! ```text
//! <div class="box">{{unless hideClown}}<view is="clown" />{{/unless}}</div>
//! ```
//!
//! is built as
//!
//! ```ignore
//! el("div").attr("class", "box").child(unless("hideClown", nodes![view("clown")]))
//! ```

use std::rc::Rc;

use super::ast::{AttrValue, Attribute, Conditional, Each, Element, Node, Template, ViewRef};
use super::expr::Expr;

/// Collect heterogeneous builders into a `Vec<Node>`.
#[macro_export]
macro_rules! nodes {
    ($($node:expr),* $(,)?) => {
        vec![$($crate::template::Node::from($node)),*]
    };
}

fn shared(nodes: impl IntoIterator<Item = Node>) -> Rc<[Node]> {
    nodes.into_iter().collect()
}

// =============================================================================
// Elements
// =============================================================================

pub struct ElementBuilder {
    tag: String,
    attrs: Vec<Attribute>,
    as_name: Option<String>,
    children: Vec<Node>,
}

/// Start an element.
pub fn el(tag: &str) -> ElementBuilder {
    ElementBuilder {
        tag: tag.to_ascii_lowercase(),
        attrs: Vec::new(),
        as_name: None,
        children: Vec::new(),
    }
}

impl ElementBuilder {
    pub fn attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.push(Attribute {
            name: name.to_string(),
            value: Some(value.into()),
        });
        self
    }

    /// Valueless attribute, e.g. `disabled`.
    pub fn flag(mut self, name: &str) -> Self {
        self.attrs.push(Attribute {
            name: name.to_string(),
            value: None,
        });
        self
    }

    pub fn as_name(mut self, name: &str) -> Self {
        self.as_name = Some(name.to_string());
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(nodes);
        self
    }
}

impl From<ElementBuilder> for Node {
    fn from(builder: ElementBuilder) -> Self {
        Node::Element(Element {
            tag: builder.tag,
            attrs: builder.attrs,
            as_name: builder.as_name,
            children: shared(builder.children),
        })
    }
}

/// Static text.
pub fn text(content: &str) -> Node {
    Node::Text(content.to_string())
}

/// `{{expr}}` interpolation.
pub fn expr(expr: impl Into<Expr>) -> Node {
    Node::Expr(expr.into())
}

// =============================================================================
// Blocks
// =============================================================================

pub struct ConditionalBuilder {
    block: Conditional,
}

/// `{{if cond}}...{{/if}}`
pub fn when(cond: impl Into<Expr>, then: impl IntoIterator<Item = Node>) -> ConditionalBuilder {
    ConditionalBuilder {
        block: Conditional {
            cond: cond.into(),
            negate: false,
            then: shared(then),
            otherwise: None,
        },
    }
}

/// `{{unless cond}}...{{/unless}}`
pub fn unless(cond: impl Into<Expr>, then: impl IntoIterator<Item = Node>) -> ConditionalBuilder {
    let mut builder = when(cond, then);
    builder.block.negate = true;
    builder
}

impl ConditionalBuilder {
    /// `{{else}}` branch.
    pub fn otherwise(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.block.otherwise = Some(shared(nodes));
        self
    }
}

impl From<ConditionalBuilder> for Node {
    fn from(builder: ConditionalBuilder) -> Self {
        Node::If(builder.block)
    }
}

pub struct EachBuilder {
    block: Each,
}

/// `{{each path}}...{{/each}}`
pub fn each(path: &str, body: impl IntoIterator<Item = Node>) -> EachBuilder {
    EachBuilder {
        block: Each {
            path: path.to_string(),
            alias: None,
            key: None,
            body: shared(body),
            otherwise: None,
        },
    }
}

impl EachBuilder {
    /// `as #alias`. The leading `#` is added when missing.
    pub fn alias(mut self, alias: &str) -> Self {
        let alias = if alias.starts_with('#') {
            alias.to_string()
        } else {
            format!("#{alias}")
        };
        self.block.alias = Some(alias);
        self
    }

    /// Identify items by this field instead of by index.
    pub fn key(mut self, field: &str) -> Self {
        self.block.key = Some(field.to_string());
        self
    }

    pub fn otherwise(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.block.otherwise = Some(shared(nodes));
        self
    }
}

impl From<EachBuilder> for Node {
    fn from(builder: EachBuilder) -> Self {
        Node::Each(builder.block)
    }
}

// =============================================================================
// Views
// =============================================================================

pub struct ViewBuilder {
    view: ViewRef,
}

/// `<view is="...">`
pub fn view(is: &str) -> ViewBuilder {
    ViewBuilder {
        view: ViewRef {
            is: is.to_string(),
            as_name: None,
            as_array: None,
            attrs: Vec::new(),
        },
    }
}

impl ViewBuilder {
    pub fn as_name(mut self, name: &str) -> Self {
        self.view.as_name = Some(name.to_string());
        self
    }

    pub fn as_array(mut self, name: &str) -> Self {
        self.view.as_array = Some(name.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.view.attrs.push(Attribute {
            name: name.to_string(),
            value: Some(value.into()),
        });
        self
    }

    /// Valueless attribute; the component sees `true`.
    pub fn flag(mut self, name: &str) -> Self {
        self.view.attrs.push(Attribute {
            name: name.to_string(),
            value: None,
        });
        self
    }
}

impl From<ViewBuilder> for Node {
    fn from(builder: ViewBuilder) -> Self {
        Node::View(builder.view)
    }
}

// A single builder is a one-node template.
macro_rules! template_from_builder {
    ($($builder:ty),*) => {
        $(impl From<$builder> for Template {
            fn from(builder: $builder) -> Self {
                Template::from(Node::from(builder))
            }
        })*
    };
}

template_from_builder!(ElementBuilder, ConditionalBuilder, EachBuilder, ViewBuilder);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_builder() {
        let node: Node = el("DIV")
            .attr("class", "box")
            .flag("hidden")
            .as_name("container")
            .child(text("hi"))
            .into();
        let Node::Element(element) = node else {
            panic!("expected element");
        };
        assert_eq!(element.tag, "div");
        assert_eq!(element.attrs.len(), 2);
        assert!(element.attrs[1].value.is_none());
        assert_eq!(element.as_name.as_deref(), Some("container"));
        assert_eq!(element.children.len(), 1);
    }

    #[test]
    fn test_nodes_macro_mixes_builders() {
        let list = nodes![el("b"), text("x"), view("clown"), when("open", [])];
        assert_eq!(list.len(), 4);
        assert!(matches!(list[2], Node::View(_)));
    }

    #[test]
    fn test_unless_and_otherwise() {
        let node: Node = unless("hide", nodes![text("a")])
            .otherwise(nodes![text("b")])
            .into();
        let Node::If(block) = node else {
            panic!("expected conditional");
        };
        assert!(block.negate);
        assert!(block.otherwise.is_some());
    }

    #[test]
    fn test_each_alias_prefix() {
        let node: Node = each("items", []).alias("item").key("id").into();
        let Node::Each(block) = node else {
            panic!("expected each");
        };
        assert_eq!(block.alias.as_deref(), Some("#item"));
        assert_eq!(block.key.as_deref(), Some("id"));
    }

    #[test]
    fn test_view_builder() {
        let node: Node = view("clown")
            .as_array("clowns")
            .attr("expression", "happy")
            .flag("show-happy")
            .into();
        let Node::View(view) = node else {
            panic!("expected view");
        };
        assert_eq!(view.is, "clown");
        assert_eq!(view.as_array.as_deref(), Some("clowns"));
        assert_eq!(view.attrs.len(), 2);
    }
}
