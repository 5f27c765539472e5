//! Document - An index-based arena of output nodes.
//!
//! Nodes are indices into a slot vector, not objects. Freed slots go to a
//! free pool and are reused, so a `NodeId` must not be kept past the
//! removal of its node.

use std::fmt;

/// Handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Fragment,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A contiguous run of sibling nodes, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRange {
    pub first: NodeId,
    pub last: NodeId,
}

#[derive(Debug, Default)]
pub struct Document {
    nodes: Vec<Option<NodeData>>,
    free: Vec<usize>,
    mutations: usize,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Creation
    // =========================================================================

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let data = NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = Some(data);
                NodeId(index)
            }
            None => {
                self.nodes.push(Some(data));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.alloc(NodeKind::Fragment)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.create_element_with(tag, Vec::new())
    }

    pub fn create_element_with(&mut self, tag: &str, attrs: Vec<(String, String)>) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.to_string(),
            attrs,
        })
    }

    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.alloc(NodeKind::Text(content.to_string()))
    }

    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.alloc(NodeKind::Comment(content.to_string()))
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn data_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Whether `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.data(id).is_some()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.data(id).map(|data| &data.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).and_then(|data| data.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.data(id)
            .map(|data| data.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    fn index_in_parent(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let index = self.children(parent).iter().position(|&child| child == id)?;
        Some((parent, index))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, index) = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, index) = self.index_in_parent(id)?;
        index
            .checked_sub(1)
            .and_then(|prev| self.children(parent).get(prev).copied())
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    /// Content of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(content) | NodeKind::Comment(content) => Some(content.as_str()),
            _ => None,
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(attr, _)| attr == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    /// The `class` attribute, empty when absent.
    pub fn class_name(&self, id: NodeId) -> &str {
        self.attribute(id, "class").unwrap_or("")
    }

    /// Siblings from `range.first` to `range.last`, inclusive.
    pub fn range_nodes(&self, range: NodeRange) -> Vec<NodeId> {
        let mut nodes = vec![range.first];
        let mut current = range.first;
        while current != range.last {
            match self.next_sibling(current) {
                Some(next) => {
                    nodes.push(next);
                    current = next;
                }
                None => break,
            }
        }
        nodes
    }

    /// Siblings strictly between `start` and `end`.
    pub fn nodes_between(&self, start: NodeId, end: NodeId) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        let mut current = self.next_sibling(start);
        while let Some(node) = current {
            if node == end {
                break;
            }
            nodes.push(node);
            current = self.next_sibling(node);
        }
        nodes
    }

    /// Short description used in mismatch reports.
    pub fn describe(&self, id: Option<NodeId>) -> String {
        match id.and_then(|id| self.kind(id)) {
            None => "nothing".to_string(),
            Some(NodeKind::Fragment) => "fragment".to_string(),
            Some(NodeKind::Element { tag, .. }) => format!("<{tag}>"),
            Some(NodeKind::Text(content)) => format!("text {content:?}"),
            Some(NodeKind::Comment(content)) => format!("comment <!--{content}-->"),
        }
    }

    /// Live node count.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// Number of writes to attached structure or content so far.
    pub fn mutation_count(&self) -> usize {
        self.mutations
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` under `parent` before `before`, or last when `before`
    /// is `None` or not a child of `parent`. Moves `child` if already placed.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return;
        }
        self.detach(child);
        let index = before.and_then(|before| {
            self.children(parent).iter().position(|&node| node == before)
        });
        if let Some(data) = self.data_mut(parent) {
            match index {
                Some(index) => data.children.insert(index, child),
                None => data.children.push(child),
            }
        }
        if let Some(data) = self.data_mut(child) {
            data.parent = Some(parent);
        }
        self.mutations += 1;
    }

    /// Unlink a node from its parent, keeping it alive.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else { return };
        if let Some(data) = self.data_mut(parent) {
            data.children.retain(|&child| child != id);
        }
        if let Some(data) = self.data_mut(id) {
            data.parent = None;
        }
        self.mutations += 1;
    }

    /// Unlink and free a node and its whole subtree.
    pub fn remove(&mut self, id: NodeId) {
        if !self.contains(id) {
            return;
        }
        self.detach(id);
        let mut pending = vec![id];
        while let Some(node) = pending.pop() {
            if let Some(data) = self.nodes.get_mut(node.0).and_then(Option::take) {
                pending.extend(data.children);
                self.free.push(node.0);
            }
        }
    }

    pub fn remove_range(&mut self, range: NodeRange) {
        for node in self.range_nodes(range) {
            self.remove(node);
        }
    }

    pub fn remove_between(&mut self, start: NodeId, end: NodeId) {
        for node in self.nodes_between(start, end) {
            self.remove(node);
        }
    }

    pub fn set_text(&mut self, id: NodeId, content: &str) {
        if let Some(NodeData {
            kind: NodeKind::Text(current) | NodeKind::Comment(current),
            ..
        }) = self.data_mut(id)
        {
            *current = content.to_string();
            self.mutations += 1;
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(NodeData {
            kind: NodeKind::Element { attrs, .. },
            ..
        }) = self.data_mut(id)
        {
            match attrs.iter_mut().find(|(attr, _)| attr == name) {
                Some((_, current)) => *current = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
            self.mutations += 1;
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(NodeData {
            kind: NodeKind::Element { attrs, .. },
            ..
        }) = self.data_mut(id)
        {
            attrs.retain(|(attr, _)| attr != name);
            self.mutations += 1;
        }
    }

    /// Split a text node at byte `offset`. The node keeps the head; the
    /// tail moves to a new text node inserted right after it.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Option<NodeId> {
        let tail = match self.kind(id)? {
            NodeKind::Text(content) => content.get(offset..)?.to_string(),
            _ => return None,
        };
        let head_len = offset;
        if let Some(NodeData {
            kind: NodeKind::Text(content),
            ..
        }) = self.data_mut(id)
        {
            content.truncate(head_len);
        }
        let tail_node = self.create_text(&tail);
        if let Some(parent) = self.parent(id) {
            let next = self.next_sibling(id);
            self.insert_before(parent, tail_node, next);
        }
        Some(tail_node)
    }
}
