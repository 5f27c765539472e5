//! Output sinks - the three backends the template walker drives.
//!
//! | Sink            | Output                       | Live |
//! |-----------------|------------------------------|------|
//! | [`HtmlSink`]    | markup string                | no   |
//! | [`ConstructSink`] | new nodes in a [`Document`] | yes  |
//! | [`AttachSink`]  | existing nodes, verified     | yes  |
//!
//! Live sinks return the node each call produced or matched so the walker
//! can bind it. Sinks borrow the document only for the duration of each
//! call, so controller hooks run by the walker may use it too.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dom::html::{end_tag, escape_text, start_tag};
use crate::dom::{Document, NodeId, NodeKind, NodeRange};
use crate::error::{ViewError, ViewResult};

/// Where a run of output started, for recovering the nodes it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanMark {
    /// String output has no nodes.
    Html,
    /// Output starts after this sibling (or at the first child).
    After(Option<NodeId>),
    /// Output starts at this child index of the current parent.
    Index(usize),
}

pub trait Sink {
    /// Whether output nodes exist to bind.
    fn is_live(&self) -> bool;

    fn open_element(&mut self, tag: &str, attrs: &[(String, String)]) -> ViewResult<Option<NodeId>>;

    fn close_element(&mut self, tag: &str) -> ViewResult<()>;

    fn text(&mut self, content: &str) -> ViewResult<Option<NodeId>>;

    fn comment(&mut self, content: &str) -> ViewResult<Option<NodeId>>;

    /// Remember the current output position.
    fn mark(&self) -> SpanMark;

    /// Top-level nodes produced since `mark`, if any.
    fn span(&self, mark: SpanMark) -> Option<NodeRange>;
}

// =============================================================================
// Html
// =============================================================================

#[derive(Debug, Default)]
pub struct HtmlSink {
    out: String,
}

impl HtmlSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> String {
        self.out
    }
}

impl Sink for HtmlSink {
    fn is_live(&self) -> bool {
        false
    }

    fn open_element(&mut self, tag: &str, attrs: &[(String, String)]) -> ViewResult<Option<NodeId>> {
        self.out.push_str(&start_tag(tag, attrs));
        Ok(None)
    }

    fn close_element(&mut self, tag: &str) -> ViewResult<()> {
        self.out.push_str(&end_tag(tag));
        Ok(())
    }

    fn text(&mut self, content: &str) -> ViewResult<Option<NodeId>> {
        self.out.push_str(&escape_text(content));
        Ok(None)
    }

    fn comment(&mut self, content: &str) -> ViewResult<Option<NodeId>> {
        self.out.push_str("<!--");
        self.out.push_str(content);
        self.out.push_str("-->");
        Ok(None)
    }

    fn mark(&self) -> SpanMark {
        SpanMark::Html
    }

    fn span(&self, _mark: SpanMark) -> Option<NodeRange> {
        None
    }
}

// =============================================================================
// Construct
// =============================================================================

/// Builds new nodes. Top-level output goes under `parent` before `before`;
/// nested output is appended to the open element.
pub struct ConstructSink {
    document: Rc<RefCell<Document>>,
    parent: NodeId,
    before: Option<NodeId>,
    stack: Vec<NodeId>,
}

impl ConstructSink {
    pub fn new(document: Rc<RefCell<Document>>, parent: NodeId, before: Option<NodeId>) -> Self {
        Self {
            document,
            parent,
            before,
            stack: Vec::new(),
        }
    }

    fn insertion_point(&self) -> (NodeId, Option<NodeId>) {
        match self.stack.last() {
            Some(&open) => (open, None),
            None => (self.parent, self.before),
        }
    }

    fn insert(&mut self, node: NodeId) {
        let (parent, before) = self.insertion_point();
        self.document.borrow_mut().insert_before(parent, node, before);
    }
}

impl Sink for ConstructSink {
    fn is_live(&self) -> bool {
        true
    }

    fn open_element(&mut self, tag: &str, attrs: &[(String, String)]) -> ViewResult<Option<NodeId>> {
        let node = self.document.borrow_mut().create_element_with(tag, attrs.to_vec());
        self.insert(node);
        self.stack.push(node);
        Ok(Some(node))
    }

    fn close_element(&mut self, _tag: &str) -> ViewResult<()> {
        self.stack.pop();
        Ok(())
    }

    fn text(&mut self, content: &str) -> ViewResult<Option<NodeId>> {
        let node = self.document.borrow_mut().create_text(content);
        self.insert(node);
        Ok(Some(node))
    }

    fn comment(&mut self, content: &str) -> ViewResult<Option<NodeId>> {
        let node = self.document.borrow_mut().create_comment(content);
        self.insert(node);
        Ok(Some(node))
    }

    fn mark(&self) -> SpanMark {
        let (parent, before) = self.insertion_point();
        let doc = self.document.borrow();
        SpanMark::After(match before {
            Some(before) => doc.prev_sibling(before),
            None => doc.last_child(parent),
        })
    }

    fn span(&self, mark: SpanMark) -> Option<NodeRange> {
        let SpanMark::After(after) = mark else {
            return None;
        };
        let (parent, before) = self.insertion_point();
        let doc = self.document.borrow();
        let first = match after {
            Some(after) => doc.next_sibling(after)?,
            None => doc.first_child(parent)?,
        };
        if Some(first) == before {
            return None;
        }
        let last = match before {
            Some(before) => doc.prev_sibling(before)?,
            None => doc.last_child(parent)?,
        };
        Some(NodeRange { first, last })
    }
}

// =============================================================================
// Attach
// =============================================================================

/// Walks existing children of `container` in lock-step with the template.
///
/// Text the parser merged is split back apart, and empty text nodes (which
/// markup cannot express) are inserted. Everything else must match exactly.
pub struct AttachSink {
    document: Rc<RefCell<Document>>,
    strict: bool,
    /// Open parents and the index of the next child to match in each.
    stack: Vec<(NodeId, usize)>,
}

impl AttachSink {
    pub fn new(document: Rc<RefCell<Document>>, container: NodeId, strict: bool) -> Self {
        Self {
            document,
            strict,
            stack: vec![(container, 0)],
        }
    }

    fn cursor(&self) -> (NodeId, usize) {
        // The container entry is never popped.
        self.stack[self.stack.len() - 1]
    }

    fn advance(&mut self) {
        let last = self.stack.len() - 1;
        self.stack[last].1 += 1;
    }

    fn current(&self) -> Option<NodeId> {
        let (parent, index) = self.cursor();
        self.document.borrow().children(parent).get(index).copied()
    }

    fn mismatch(&self, expected: String) -> ViewError {
        let found = self.document.borrow().describe(self.current());
        tracing::debug!(expected = expected.as_str(), found = found.as_str(), "attach mismatch");
        ViewError::mismatch(expected, found)
    }

    /// All of `container` must have been matched.
    pub fn finish(self) -> ViewResult<()> {
        if self.current().is_some() {
            return Err(self.mismatch("end of container".to_string()));
        }
        Ok(())
    }
}

fn sorted(attrs: &[(String, String)]) -> Vec<(String, String)> {
    let mut attrs = attrs.to_vec();
    attrs.sort();
    attrs
}

impl Sink for AttachSink {
    fn is_live(&self) -> bool {
        true
    }

    fn open_element(&mut self, tag: &str, attrs: &[(String, String)]) -> ViewResult<Option<NodeId>> {
        let matched = self.current().filter(|&node| {
            let doc = self.document.borrow();
            let same = match doc.kind(node) {
                Some(NodeKind::Element { tag: found, attrs: found_attrs }) => {
                    found == tag && (!self.strict || sorted(found_attrs) == sorted(attrs))
                }
                _ => false,
            };
            same
        });
        let Some(node) = matched else {
            return Err(self.mismatch(start_tag(tag, attrs)));
        };
        self.advance();
        self.stack.push((node, 0));
        Ok(Some(node))
    }

    fn close_element(&mut self, tag: &str) -> ViewResult<()> {
        if self.current().is_some() {
            return Err(self.mismatch(format!("</{tag}>")));
        }
        if self.stack.len() > 1 {
            self.stack.pop();
        }
        Ok(())
    }

    fn text(&mut self, content: &str) -> ViewResult<Option<NodeId>> {
        let (parent, _) = self.cursor();
        let current = self.current();

        if content.is_empty() {
            let mut doc = self.document.borrow_mut();
            let node = doc.create_text("");
            doc.insert_before(parent, node, current);
            drop(doc);
            self.advance();
            return Ok(Some(node));
        }

        let found = current.and_then(|node| match self.document.borrow().kind(node) {
            Some(NodeKind::Text(found)) => Some((node, found.clone())),
            _ => None,
        });
        match found {
            Some((node, found)) if found == content => {
                self.advance();
                Ok(Some(node))
            }
            Some((node, found)) if found.starts_with(content) => {
                self.document.borrow_mut().split_text(node, content.len());
                self.advance();
                Ok(Some(node))
            }
            _ => Err(self.mismatch(format!("text {content:?}"))),
        }
    }

    fn comment(&mut self, content: &str) -> ViewResult<Option<NodeId>> {
        let matched = self.current().filter(|&node| {
            matches!(self.document.borrow().kind(node), Some(NodeKind::Comment(found)) if found == content)
        });
        let Some(node) = matched else {
            return Err(self.mismatch(format!("comment <!--{content}-->")));
        };
        self.advance();
        Ok(Some(node))
    }

    fn mark(&self) -> SpanMark {
        SpanMark::Index(self.cursor().1)
    }

    fn span(&self, mark: SpanMark) -> Option<NodeRange> {
        let SpanMark::Index(start) = mark else {
            return None;
        };
        let (parent, end) = self.cursor();
        if end <= start {
            return None;
        }
        let doc = self.document.borrow();
        let children = doc.children(parent);
        Some(NodeRange {
            first: *children.get(start)?,
            last: *children.get(end - 1)?,
        })
    }
}
