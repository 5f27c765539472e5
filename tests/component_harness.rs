//! Component harness scenarios: pages, refs, stubs, and rendering
//! equivalence across strategies.

use std::rc::Rc;

use serde_json::{json, Value};
use spark_view::{
    assert_renders, each, el, expr, nodes, text, unless, view, when, AttrValue, Component,
    Controller, EquivalenceError, Expr, Harness, Registry, StubSpec, Template, ViewDef,
    ViewError, ViewResult,
};

#[derive(Default)]
struct BoxView;

impl Controller for BoxView {}

#[derive(Default)]
struct Clown {
    created: bool,
}

impl Controller for Clown {
    fn create(&mut self, _component: &Component) -> ViewResult<()> {
        self.created = true;
        Ok(())
    }
}

fn clown() -> ViewDef {
    ViewDef::new("clown")
        .template(nodes![el("span").attr("class", "clown").child(expr("expression"))])
        .controller::<Clown>()
}

fn registry(root: ViewDef) -> Registry {
    Registry::new().with(root).with(clown())
}

fn expressions(clowns: &[Rc<Component>]) -> Vec<Value> {
    clowns.iter().map(|c| c.model().get("expression")).collect()
}

// =============================================================================
// Pages
// =============================================================================

#[test]
fn test_page_exposes_root_component() {
    let harness = Harness::new(
        registry(
            ViewDef::new("box")
                .template(nodes![el("div").attr("class", "box")])
                .controller::<BoxView>(),
        ),
        view("box"),
    );
    let page = harness.render_dom().unwrap();

    let root = page.component().unwrap();
    assert_eq!(root.view(), "box");
    assert!(root.is::<BoxView>());
    assert!(!root.is::<Clown>());
    assert_eq!(page.fragment_html(), "<div class=\"box\"></div>");
}

#[test]
fn test_named_child_component() {
    let harness = Harness::new(
        registry(ViewDef::new("box").template(nodes![el("div").child(
            view("clown").as_name("myClown").attr("expression", "happy")
        )])),
        view("box"),
    );
    let page = harness.render_dom().unwrap();

    let clown = page.child("myClown").unwrap();
    assert!(Rc::ptr_eq(&clown, &page.component().unwrap().child("myClown").unwrap()));
    assert!(clown.controller::<Clown>().unwrap().created);
    assert_eq!(
        page.fragment_html(),
        "<div><span class=\"clown\">happy</span></div>"
    );
}

#[test]
fn test_class_binding_updates_node_in_place() {
    let harness = Harness::new(
        registry(ViewDef::new("card").template(nodes![el("div")
            .attr("class", AttrValue::from("box ").when("open", "open"))
            .as_name("container")])),
        view("card"),
    );
    let page = harness.render_dom().unwrap();

    let node = page.node("container").unwrap();
    assert_eq!(page.doc().class_name(node), "box ");

    page.component().unwrap().model().set("open", true).unwrap();
    assert_eq!(page.node("container"), Some(node));
    assert_eq!(page.doc().class_name(node), "box open");
    assert_eq!(page.fragment_html(), "<div class=\"box open\"></div>");
}

// =============================================================================
// Conditional components
// =============================================================================

#[test]
fn test_conditional_component_lifecycle() {
    let harness = Harness::new(
        registry(ViewDef::new("circus").template(nodes![when(
            "showClown",
            nodes![view("clown").as_name("clown").attr("expression", "happy")]
        )])),
        view("circus"),
    );
    let page = harness.render_dom().unwrap();
    let circus = page.component().unwrap();
    assert!(page.child("clown").is_none());

    circus.model().set("showClown", true).unwrap();
    let clown = page.child("clown").unwrap();
    assert!(clown.is::<Clown>());
    assert_eq!(page.fragment_html(), "<!--if--><span class=\"clown\">happy</span><!--/if-->");
    let id = clown.id().to_string();
    assert_ne!(page.model().get(&format!("_components.{id}")), Value::Null);
    drop(clown);

    circus.model().set("showClown", false).unwrap();
    assert!(page.child("clown").is_none());
    assert_eq!(page.model().get(&format!("_components.{id}")), Value::Null);
    assert_eq!(page.fragment_html(), "<!--if--><!--/if-->");
}

#[test]
fn test_array_refs_follow_region_order() {
    let harness = Harness::new(
        registry(ViewDef::new("duo").template(nodes![
            when("first", nodes![view("clown").as_array("clowns").attr("expression", "happy")]),
            when("second", nodes![view("clown").as_array("clowns").attr("expression", "sad")]),
        ])),
        view("duo"),
    );
    let page = harness.render_dom().unwrap();
    let duo = page.component().unwrap();
    assert!(page.children("clowns").is_empty());

    duo.model().set("second", true).unwrap();
    assert_eq!(expressions(&page.children("clowns")), vec![json!("sad")]);

    duo.model().set("first", true).unwrap();
    assert_eq!(
        expressions(&page.children("clowns")),
        vec![json!("happy"), json!("sad")]
    );

    duo.model().set("first", false).unwrap();
    assert_eq!(expressions(&page.children("clowns")), vec![json!("sad")]);

    duo.model().set("first", true).unwrap();
    duo.model().set("second", false).unwrap();
    assert_eq!(expressions(&page.children("clowns")), vec![json!("happy")]);
}

// =============================================================================
// Stubs
// =============================================================================

#[test]
fn test_stub_named_ref_removed_with_region() {
    let mut harness = Harness::new(
        registry(ViewDef::new("box").template(nodes![el("div")
            .attr("class", "box")
            .child(unless("hideClown", nodes![view("clown")]))])),
        view("box"),
    );
    harness.stub_component("clown");
    let page = harness.render_dom().unwrap();

    let stub = page.child("clown").unwrap();
    assert!(stub.is_stub());
    assert!(!stub.is::<Clown>());
    assert_eq!(
        page.fragment_html(),
        "<div class=\"box\"><!--unless--><!--/unless--></div>"
    );
    drop(stub);

    page.component().unwrap().model().set("hideClown", true).unwrap();
    assert!(page.child("clown").is_none());
}

#[test]
fn test_stub_array_collects_instances() {
    let mut harness = Harness::new(
        registry(ViewDef::new("box").template(nodes![
            view("clown").flag("show-happy"),
            when("showSad", nodes![view("clown").attr("expression", "sad")]),
        ])),
        view("box"),
    );
    harness.stub_component(StubSpec::new("clown").as_array("clowns"));
    let page = harness.render_dom().unwrap();

    let clowns = page.children("clowns");
    assert_eq!(clowns.len(), 1);
    assert_eq!(clowns[0].model().get("showHappy"), json!(true));
    assert!(page.child("clown").is_none());

    page.component().unwrap().model().set("showSad", true).unwrap();
    let clowns = page.children("clowns");
    assert_eq!(clowns.len(), 2);
    assert_eq!(clowns[1].model().get("expression"), json!("sad"));
}

// =============================================================================
// Equivalence
// =============================================================================

fn rich_registry() -> Registry {
    registry(ViewDef::new("box").template(nodes![el("div")
        .attr("class", AttrValue::from("box ").when("open", "open"))
        .child(text("Hello "))
        .child(expr("name"))
        .child(when("open", nodes![view("clown").attr("expression", "happy")]))
        .child(el("ul").child(
            each("items", nodes![el("li").child(expr("#item.label"))])
                .alias("item")
                .key("id")
                .otherwise(nodes![el("li").child(text("none"))]),
        ))]))
}

#[test]
fn test_render_assertion_passes() {
    let harness = Harness::new(rich_registry(), view("box"));
    assert!(assert_renders(&harness, None).is_ok());

    let harness = Harness::new(
        registry(ViewDef::new("box").template(nodes![el("div").attr("class", "box")])),
        view("box"),
    );
    assert!(assert_renders(&harness, Some("<div class=\"box\"></div>")).is_ok());
}

#[test]
fn test_render_assertion_with_model_data() {
    let harness = Harness::new(
        Registry::new(),
        Template::new(nodes![
            el("p").child(text("Hi ")).child(expr("name")),
            each("items", nodes![el("b").child(expr("#item.label"))])
                .alias("item")
                .key("id"),
        ]),
    )
    .with_data(json!({
        "name": "Ann",
        "items": [{"id": 1, "label": "a"}, {"id": 2, "label": "b"}],
    }));
    assert!(harness.assert_renders(None).is_ok());
    assert_eq!(
        harness.render_html().unwrap().html(),
        Some("<p>Hi Ann</p><!--each--><b>a</b><b>b</b><!--/each-->")
    );
}

#[test]
fn test_block_inside_paragraph_fails() {
    let harness = Harness::new(Registry::new(), el("p").child(el("div")));
    assert!(matches!(
        assert_renders(&harness, None),
        Err(EquivalenceError::Diverged { strategy: "construct", .. })
    ));
    assert!(matches!(
        assert_renders(&harness, Some("<p><div></div></p>")),
        Err(EquivalenceError::Diverged { .. })
    ));
}

#[test]
fn test_table_without_tbody_fails() {
    let harness = Harness::new(
        Registry::new(),
        el("table").child(el("tr").child(el("td").child(text("x")))),
    );
    let err = assert_renders(&harness, None).unwrap_err();
    let EquivalenceError::Diverged { expected, .. } = err else {
        panic!("expected divergence");
    };
    assert_eq!(expected, "<table><tbody><tr><td>x</td></tr></tbody></table>");
}

#[test]
fn test_expected_html_mismatch_fails() {
    let harness = Harness::new(Registry::new(), el("div").attr("class", "box"));
    assert!(matches!(
        assert_renders(&harness, Some("<div class=\"other\"></div>")),
        Err(EquivalenceError::Diverged { strategy: "html", .. })
    ));
}

#[test]
fn test_blank_view_renders_empty() {
    let harness = Harness::new(Registry::new().with(ViewDef::new("blank")), view("blank"));
    assert_eq!(harness.render_html().unwrap().html(), Some(""));
    assert!(assert_renders(&harness, Some("")).is_ok());
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_repeated_renders_match() {
    let harness = Harness::new(rich_registry(), view("box")).with_data(json!({"name": "x"}));
    let first = harness.render_dom().unwrap().fragment_html();
    let second = harness.render_dom().unwrap().fragment_html();
    assert_eq!(first, second);
}

#[test]
fn test_dropping_page_releases_subscriptions() {
    let harness = Harness::new(rich_registry(), view("box"));
    let page = harness.render_dom().unwrap();
    page.component().unwrap().model().set("open", true).unwrap();
    let model = page.model().clone();
    assert!(model.subscription_count() > 0);

    drop(page);
    assert_eq!(model.subscription_count(), 0);
    assert_eq!(model.get("_components"), json!({}));
}

#[test]
fn test_keyed_reorder_preserves_instances() {
    let harness = Harness::new(
        registry(ViewDef::new("list").template(nodes![each(
            "clowns",
            nodes![view("clown")
                .as_array("clowns")
                .attr("expression", Expr::path("#c.mood"))]
        )
        .alias("c")
        .key("id")])),
        view("list"),
    );
    let page = harness.render_dom().unwrap();
    let list = page.component().unwrap();
    list.model()
        .set("clowns", json!([{"id": "a", "mood": "happy"}, {"id": "b", "mood": "sad"}]))
        .unwrap();
    let before = page.children("clowns");
    assert_eq!(expressions(&before), vec![json!("happy"), json!("sad")]);

    list.model()
        .set("clowns", json!([{"id": "b", "mood": "sad"}, {"id": "a", "mood": "happy"}]))
        .unwrap();
    let after = page.children("clowns");
    assert_eq!(expressions(&after), vec![json!("sad"), json!("happy")]);
    assert!(Rc::ptr_eq(&after[0], &before[1]));
    assert!(Rc::ptr_eq(&after[1], &before[0]));
    assert_eq!(
        page.fragment_html(),
        "<!--each--><span class=\"clown\">sad</span><span class=\"clown\">happy</span><!--/each-->"
    );
}

#[test]
fn test_unknown_view_is_an_error() {
    let harness = Harness::new(Registry::new(), view("ghost"));
    assert!(matches!(
        harness.render_dom(),
        Err(ViewError::UnknownView { ref is }) if is == "ghost"
    ));
    assert!(matches!(
        assert_renders(&harness, None),
        Err(EquivalenceError::Render { strategy: "html", .. })
    ));
}
