//! Component test harness and rendering equivalence checker.
//!
//! A [`Harness`] renders one root template against a registry, with
//! optional stubs, under each strategy. [`assert_renders`] checks that
//! the three strategies agree:
//!
//! ```text
//! Html ──> expected ──normalize──> Construct fragment == ?
//!             │                    Attach(parse(html)) container == ?
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::config::RenderConfig;
use crate::dom::{html, Document, NodeId};
use crate::engine::{Registry, StubSpec, Stubs};
use crate::error::{EquivalenceError, ViewResult};
use crate::model::Model;
use crate::renderer::{Page, Renderer, Strategy};
use crate::template::Template;

pub struct Harness {
    registry: Rc<Registry>,
    template: Template,
    stubs: Stubs,
    config: RenderConfig,
    data: Value,
}

impl Harness {
    pub fn new(registry: Registry, root: impl Into<Template>) -> Self {
        Self {
            registry: Rc::new(registry),
            template: root.into(),
            stubs: Stubs::new(),
            config: RenderConfig::default(),
            data: Value::Object(Default::default()),
        }
    }

    pub fn with_config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    /// Initial data for the model each render starts from.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Render `is` as an empty stub instead of its registered view.
    pub fn stub_component(&mut self, spec: impl Into<StubSpec>) -> &mut Self {
        self.stubs.insert(spec);
        self
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    fn renderer(&self) -> Renderer {
        Renderer::new(self.registry.clone())
            .with_stubs(self.stubs.clone())
            .with_config(self.config.clone())
    }

    fn render(&self, strategy: Strategy) -> ViewResult<Page> {
        let model = Model::with_data(self.data.clone());
        self.renderer().render(&self.template, &model, strategy)
    }

    pub fn render_html(&self) -> ViewResult<Page> {
        self.render(Strategy::Html)
    }

    pub fn render_dom(&self) -> ViewResult<Page> {
        self.render(Strategy::Construct)
    }

    pub fn attach_to(&self, document: Rc<RefCell<Document>>, container: NodeId) -> ViewResult<Page> {
        self.render(Strategy::Attach { document, container })
    }

    /// See [`assert_renders`].
    pub fn assert_renders(&self, expected: Option<&str>) -> Result<(), EquivalenceError> {
        let html = self
            .render_html()
            .map_err(|source| EquivalenceError::Render {
                strategy: "html",
                source,
            })?
            .fragment_html();

        if let Some(expected) = expected {
            if html != expected {
                return Err(EquivalenceError::Diverged {
                    strategy: "html",
                    expected: expected.to_string(),
                    actual: html,
                });
            }
        }
        let expected = html::normalize(expected.unwrap_or(&html));

        let constructed = self
            .render_dom()
            .map_err(|source| EquivalenceError::Render {
                strategy: "construct",
                source,
            })?
            .fragment_html();
        if constructed != expected {
            return Err(EquivalenceError::Diverged {
                strategy: "construct",
                expected,
                actual: constructed,
            });
        }

        let mut doc = Document::new();
        let container = html::parse_fragment(&mut doc, &html);
        let document = Rc::new(RefCell::new(doc));
        let attached = self
            .attach_to(document.clone(), container)
            .map_err(|source| EquivalenceError::Attach { source })?;
        let actual = html::inner_html(&document.borrow(), container);
        drop(attached);
        if actual != expected {
            return Err(EquivalenceError::Diverged {
                strategy: "attach",
                expected,
                actual,
            });
        }

        tracing::debug!(html = html.as_str(), "strategies agree");
        Ok(())
    }
}

/// Check that the Html, Construct, and Attach strategies render `harness`
/// equivalently. With `expected`, the HTML output must also match it
/// exactly.
pub fn assert_renders(harness: &Harness, expected: Option<&str>) -> Result<(), EquivalenceError> {
    harness.assert_renders(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ViewDef;
    use crate::nodes;
    use crate::template::{el, expr, text, view, when};
    use serde_json::json;

    fn registry() -> Registry {
        Registry::new()
            .with(ViewDef::new("box").template(nodes![el("div").attr("class", "box").child(view("clown"))]))
            .with(ViewDef::new("clown").template(nodes![el("i").child(text("honk"))]))
    }

    #[test]
    fn test_each_render_starts_fresh() {
        let harness = Harness::new(Registry::new(), el("b").child(expr("n"))).with_data(json!({"n": 1}));
        let first = harness.render_dom().unwrap();
        first.model().set("n", 2).unwrap();
        let second = harness.render_dom().unwrap();
        assert_eq!(first.fragment_html(), "<b>2</b>");
        assert_eq!(second.fragment_html(), "<b>1</b>");
    }

    #[test]
    fn test_stub_component() {
        let mut harness = Harness::new(registry(), view("box"));
        harness.stub_component("clown");
        let page = harness.render_html().unwrap();
        assert_eq!(page.html(), Some("<div class=\"box\"></div>"));
        assert!(page.child("clown").is_some());
    }

    #[test]
    fn test_agreeing_strategies_pass() {
        let harness = Harness::new(registry(), view("box"));
        assert!(harness.assert_renders(None).is_ok());
        assert!(assert_renders(&harness, Some("<div class=\"box\"><i>honk</i></div>")).is_ok());
    }

    #[test]
    fn test_expected_html_mismatch() {
        let harness = Harness::new(registry(), view("clown"));
        let err = harness.assert_renders(Some("<i>quack</i>")).unwrap_err();
        assert!(matches!(err, EquivalenceError::Diverged { strategy: "html", .. }));
    }

    #[test]
    fn test_invalid_nesting_diverges() {
        let harness = Harness::new(Registry::new(), el("p").child(el("div")));
        let err = harness.assert_renders(None).unwrap_err();
        assert!(matches!(err, EquivalenceError::Diverged { strategy: "construct", .. }));
    }

    #[test]
    fn test_render_failure_names_strategy() {
        let harness = Harness::new(Registry::new(), when("x", nodes![view("ghost")]).otherwise(nodes![view("ghost")]));
        let err = harness.assert_renders(None).unwrap_err();
        assert!(matches!(err, EquivalenceError::Render { strategy: "html", .. }));
    }
}
