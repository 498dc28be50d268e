//! In-memory page model.
//!
//! A `Document` is an arena of element and text nodes rooted at `<html>`.
//! It carries exactly what field identification and highlighting need:
//! attributes, class lists, text content, layout rectangles, tree-order
//! queries, and a structural mutation subscription.

mod mutation;

pub use mutation::{MutationRecord, MutationWatch};

use mutation::WatcherSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type NodeId = usize;

/// Bounding box in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attributes: HashMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    rect: Rect,
}

#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    watchers: WatcherSet,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty `<html><head></head><body></body></html>` document.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: 0,
            head: 0,
            body: 0,
            watchers: WatcherSet::default(),
        };
        doc.root = doc.create_element("html");
        doc.head = doc.create_element("head");
        doc.body = doc.create_element("body");
        doc.link(doc.root, doc.head, None);
        doc.link(doc.root, doc.body, None);
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    // ============================================================
    // Construction
    // ============================================================

    /// Create a detached element. Tag names are stored lowercase.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: HashMap::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    /// Create an element with attributes and append it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.create_element(tag);
        for (name, value) in attrs {
            self.set_attribute(id, name, value);
        }
        self.append_child(parent, id);
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.create_text(text);
        self.append_child(parent, id);
        id
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
            rect: Rect::default(),
        });
        self.nodes.len() - 1
    }

    // ============================================================
    // Tree mutation
    // ============================================================

    /// Append `child` as the last child of `parent`, detaching it first.
    /// Returns false when the insertion would create a cycle.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.insert(parent, child, None)
    }

    /// Insert `child` before `reference` under `parent`. A reference that is
    /// not a child of `parent` appends instead.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) -> bool {
        self.insert(parent, child, Some(reference))
    }

    /// Detach `id` from its parent.
    pub fn remove(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let was_connected = self.is_connected(parent);
        self.unlink(id);
        if was_connected {
            self.watchers.notify(MutationRecord {
                target: parent,
                added: vec![],
                removed: vec![id],
            });
        }
    }

    fn insert(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> bool {
        if parent >= self.nodes.len() || child >= self.nodes.len() || self.is_text(parent) {
            return false;
        }
        if self.is_inclusive_ancestor(child, parent) {
            return false;
        }
        if self.parent(child).is_some() {
            self.remove(child);
        }
        self.link(parent, child, reference);
        if self.is_connected(parent) {
            self.watchers.notify(MutationRecord {
                target: parent,
                added: vec![child],
                removed: vec![],
            });
        }
        true
    }

    fn link(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let siblings = &mut self.nodes[parent].children;
        let position = reference
            .and_then(|r| siblings.iter().position(|&c| c == r))
            .unwrap_or(siblings.len());
        siblings.insert(position, child);
        self.nodes[child].parent = Some(parent);
    }

    fn unlink(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    // ============================================================
    // Navigation
    // ============================================================

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the node is attached beneath the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root, id)
    }

    /// Descendants of `id` in tree order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Every connected element in tree order, starting with the root.
    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .filter(|&id| self.is_element(id))
    }

    /// Nearest inclusive ancestor element with the given tag.
    pub fn closest(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.tag(node) == Some(tag) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    // ============================================================
    // Element data
    // ============================================================

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id).map(|n| &n.data),
            Some(NodeData::Element { .. })
        )
    }

    fn is_text(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id).map(|n| &n.data),
            Some(NodeData::Text(_))
        )
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(id).map(|n| &n.data) {
            Some(NodeData::Element { tag, .. }) => Some(tag.as_str()),
            _ => None,
        }
    }

    /// Attribute names are case-insensitive, stored lowercase.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.nodes.get(id).map(|n| &n.data) {
            Some(NodeData::Element { attributes, .. }) => attributes
                .get(&name.to_ascii_lowercase())
                .map(String::as_str),
            _ => None,
        }
    }

    /// Attribute value, treating an empty value as absent.
    pub fn non_empty_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attribute(id, name).filter(|v| !v.is_empty())
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(NodeData::Element { attributes, .. }) = self.nodes.get_mut(id).map(|n| &mut n.data)
        {
            attributes.insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(NodeData::Element { attributes, .. }) = self.nodes.get_mut(id).map(|n| &mut n.data)
        {
            attributes.remove(&name.to_ascii_lowercase());
        }
    }

    pub fn class_list(&self, id: NodeId) -> Vec<&str> {
        self.attribute(id, "class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.class_list(id).contains(&class)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) || !self.is_element(id) {
            return;
        }
        let mut classes: Vec<String> = self.class_list(id).into_iter().map(String::from).collect();
        classes.push(class.to_string());
        self.set_attribute(id, "class", &classes.join(" "));
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if !self.has_class(id, class) {
            return;
        }
        let remaining: Vec<String> = self
            .class_list(id)
            .into_iter()
            .filter(|c| *c != class)
            .map(String::from)
            .collect();
        if remaining.is_empty() {
            self.remove_attribute(id, "class");
        } else {
            self.set_attribute(id, "class", &remaining.join(" "));
        }
    }

    pub fn rect(&self, id: NodeId) -> Rect {
        self.nodes.get(id).map(|n| n.rect).unwrap_or_default()
    }

    pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.rect = rect;
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        self.collect_text(id, None)
    }

    /// Like `text_content`, but skipping the subtree rooted at `excluded`.
    pub fn text_content_excluding(&self, id: NodeId, excluded: NodeId) -> String {
        self.collect_text(id, Some(excluded))
    }

    fn collect_text(&self, id: NodeId, excluded: Option<NodeId>) -> String {
        let mut out = String::new();
        if let Some(NodeData::Text(text)) = self.nodes.get(id).map(|n| &n.data) {
            out.push_str(text);
            return out;
        }
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if Some(next) == excluded {
                continue;
            }
            match &self.nodes[next].data {
                NodeData::Text(text) => out.push_str(text),
                NodeData::Element { .. } => stack.extend(self.children(next).iter().rev()),
            }
        }
        out
    }

    // ============================================================
    // Queries (tree order, connected nodes only)
    // ============================================================

    /// First element whose `id` attribute equals `value`.
    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        self.first_with_attribute("id", value)
    }

    pub fn first_with_attribute(&self, name: &str, value: &str) -> Option<NodeId> {
        self.elements()
            .find(|&id| self.attribute(id, name) == Some(value))
    }

    pub fn elements_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.elements().filter(move |&id| self.tag(id) == Some(tag))
    }

    // ============================================================
    // Observation
    // ============================================================

    /// Subscribe to node additions and removals anywhere in the document.
    pub fn watch(&mut self) -> MutationWatch {
        self.watchers.subscribe()
    }

    /// Number of live mutation subscriptions.
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }
}
