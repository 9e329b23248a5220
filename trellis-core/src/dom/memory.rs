//! In-memory host tree.
//!
//! `MemoryHost` is a small arena-backed tree implementing [`Host`]. It is the
//! reference host for tests and headless rendering, and counts every mutation
//! so callers can assert that an update touched exactly what it should.
//!
//! Nodes are never freed. A removed node stays addressable and its id is
//! never reused, so the arena grows with every node created. Regions that
//! render plain values inside lists create fresh text nodes on each run, so
//! a long-running headless session keeps every one of them. The host is
//! meant for tests and bounded headless runs.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::HostError;

use super::host::{EventHandler, Host, HostEvent};

/// Handle to a node in a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryNode(usize);

impl MemoryNode {
    /// Get the raw index value.
    pub fn raw(&self) -> usize {
        self.0
    }
}

impl fmt::Display for MemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Element(String),
    Text,
    Marker,
}

struct NodeData {
    kind: NodeKind,
    text: String,
    parent: Option<MemoryNode>,
    children: Vec<MemoryNode>,
    attributes: IndexMap<String, String>,
    styles: IndexMap<String, String>,
    listeners: Vec<(String, EventHandler)>,
}

impl NodeData {
    fn new(kind: NodeKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
            parent: None,
            children: Vec::new(),
            attributes: IndexMap::new(),
            styles: IndexMap::new(),
            listeners: Vec::new(),
        }
    }
}

/// Mutation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationStats {
    /// Nodes created, of any kind.
    pub created: usize,
    /// Detached nodes inserted into a parent.
    pub inserted: usize,
    /// Attached nodes moved to a new position.
    pub moved: usize,
    /// Nodes detached from their parent.
    pub removed: usize,
    /// Text content writes.
    pub text_writes: usize,
    /// Attribute and style writes, including removals.
    pub attribute_writes: usize,
}

#[derive(Default)]
struct Tree {
    nodes: Vec<NodeData>,
    stats: MutationStats,
}

impl Tree {
    fn node(&self, id: MemoryNode) -> Result<&NodeData, HostError> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| HostError::UnknownNode(id.to_string()))
    }

    fn node_mut(&mut self, id: MemoryNode) -> Result<&mut NodeData, HostError> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| HostError::UnknownNode(id.to_string()))
    }

    fn create(&mut self, kind: NodeKind, text: &str) -> MemoryNode {
        let id = MemoryNode(self.nodes.len());
        self.nodes.push(NodeData::new(kind, text));
        self.stats.created += 1;
        id
    }

    fn detach(&mut self, id: MemoryNode) -> Result<bool, HostError> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(false);
        };
        self.node_mut(parent)?.children.retain(|child| *child != id);
        self.node_mut(id)?.parent = None;
        Ok(true)
    }

    fn is_ancestor(&self, candidate: MemoryNode, of: MemoryNode) -> Result<bool, HostError> {
        let mut current = Some(of);
        while let Some(node) = current {
            if node == candidate {
                return Ok(true);
            }
            current = self.node(node)?.parent;
        }
        Ok(false)
    }
}

/// An in-memory [`Host`]. Clones share the same tree.
#[derive(Clone, Default)]
pub struct MemoryHost {
    tree: Rc<RefCell<Tree>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever created, attached or not.
    pub fn node_count(&self) -> usize {
        self.tree.borrow().nodes.len()
    }

    /// Mutation counters since creation or the last reset.
    pub fn stats(&self) -> MutationStats {
        self.tree.borrow().stats
    }

    pub fn reset_stats(&self) {
        self.tree.borrow_mut().stats = MutationStats::default();
    }

    /// Tag name of an element node.
    pub fn tag(&self, node: &MemoryNode) -> Option<String> {
        match &self.tree.borrow().node(*node).ok()?.kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn is_marker(&self, node: &MemoryNode) -> bool {
        matches!(
            self.tree.borrow().node(*node).map(|data| data.kind.clone()),
            Ok(NodeKind::Marker)
        )
    }

    pub fn style(&self, node: &MemoryNode, property: &str) -> Option<String> {
        self.tree.borrow().node(*node).ok()?.styles.get(property).cloned()
    }

    /// Children of `parent`, skipping region markers.
    pub fn content_children(&self, parent: &MemoryNode) -> Vec<MemoryNode> {
        self.children(parent)
            .into_iter()
            .filter(|child| !self.is_marker(child))
            .collect()
    }

    /// Concatenated text of all text descendants of `node`.
    pub fn text_content(&self, node: &MemoryNode) -> String {
        let tree = self.tree.borrow();
        let mut out = String::new();
        collect_text(&tree, *node, &mut out);
        out
    }

    /// Invoke every listener for `event.name` on `node`.
    ///
    /// Returns how many listeners ran.
    pub fn dispatch(&self, node: &MemoryNode, event: &HostEvent) -> usize {
        let handlers: Vec<EventHandler> = match self.tree.borrow().node(*node) {
            Ok(data) => data
                .listeners
                .iter()
                .filter(|(name, _)| *name == event.name)
                .map(|(_, handler)| handler.clone())
                .collect(),
            Err(_) => return 0,
        };
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    /// Serialize `node` and its descendants as HTML-like markup.
    ///
    /// Markers are omitted; empty text nodes render as nothing.
    pub fn to_html(&self, node: &MemoryNode) -> String {
        let tree = self.tree.borrow();
        let mut out = String::new();
        write_html(&tree, *node, &mut out);
        out
    }
}

fn collect_text(tree: &Tree, node: MemoryNode, out: &mut String) {
    let Ok(data) = tree.node(node) else {
        return;
    };
    match data.kind {
        NodeKind::Text => out.push_str(&data.text),
        NodeKind::Marker => {}
        NodeKind::Element(_) => {
            for child in &data.children {
                collect_text(tree, *child, out);
            }
        }
    }
}

fn write_html(tree: &Tree, node: MemoryNode, out: &mut String) {
    let Ok(data) = tree.node(node) else {
        return;
    };
    match &data.kind {
        NodeKind::Text => out.push_str(&data.text),
        NodeKind::Marker => {}
        NodeKind::Element(tag) => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in &data.attributes {
                out.push_str(&format!(" {name}=\"{value}\""));
            }
            if !data.styles.is_empty() {
                let style: Vec<String> = data
                    .styles
                    .iter()
                    .map(|(property, value)| format!("{property}: {value}"))
                    .collect();
                out.push_str(&format!(" style=\"{}\"", style.join("; ")));
            }
            out.push('>');
            for child in &data.children {
                write_html(tree, *child, out);
            }
            out.push_str(&format!("</{tag}>"));
        }
    }
}

impl Host for MemoryHost {
    type Node = MemoryNode;

    fn create_element(&self, tag: &str) -> MemoryNode {
        self.tree.borrow_mut().create(NodeKind::Element(tag.to_string()), "")
    }

    fn create_text(&self, text: &str) -> MemoryNode {
        self.tree.borrow_mut().create(NodeKind::Text, text)
    }

    fn create_marker(&self, label: &str) -> MemoryNode {
        self.tree.borrow_mut().create(NodeKind::Marker, label)
    }

    fn set_text(&self, node: &MemoryNode, text: &str) -> Result<(), HostError> {
        let mut tree = self.tree.borrow_mut();
        tree.node_mut(*node)?.text = text.to_string();
        tree.stats.text_writes += 1;
        Ok(())
    }

    fn text(&self, node: &MemoryNode) -> Option<String> {
        let tree = self.tree.borrow();
        let data = tree.node(*node).ok()?;
        match data.kind {
            NodeKind::Element(_) => None,
            _ => Some(data.text.clone()),
        }
    }

    fn insert_before(
        &self,
        parent: &MemoryNode,
        child: &MemoryNode,
        reference: Option<&MemoryNode>,
    ) -> Result<(), HostError> {
        if reference == Some(child) {
            return Ok(());
        }

        let mut tree = self.tree.borrow_mut();
        tree.node(*child)?;
        if tree.is_ancestor(*child, *parent)? {
            return Err(HostError::WouldCycle {
                parent: parent.to_string(),
                node: child.to_string(),
            });
        }
        if let Some(reference) = reference {
            if tree.node(*reference)?.parent != Some(*parent) {
                return Err(HostError::NotAChild {
                    parent: parent.to_string(),
                    child: reference.to_string(),
                });
            }
        }

        let was_attached = tree.detach(*child)?;
        let index = match reference {
            Some(reference) => tree
                .node(*parent)?
                .children
                .iter()
                .position(|c| c == reference)
                .ok_or_else(|| HostError::NotAChild {
                    parent: parent.to_string(),
                    child: reference.to_string(),
                })?,
            None => tree.node(*parent)?.children.len(),
        };
        tree.node_mut(*parent)?.children.insert(index, *child);
        tree.node_mut(*child)?.parent = Some(*parent);

        if was_attached {
            tree.stats.moved += 1;
        } else {
            tree.stats.inserted += 1;
        }
        Ok(())
    }

    fn remove(&self, node: &MemoryNode) -> Result<(), HostError> {
        let mut tree = self.tree.borrow_mut();
        if tree.detach(*node)? {
            tree.stats.removed += 1;
        }
        Ok(())
    }

    fn parent(&self, node: &MemoryNode) -> Option<MemoryNode> {
        self.tree.borrow().node(*node).ok()?.parent
    }

    fn next_sibling(&self, node: &MemoryNode) -> Option<MemoryNode> {
        let tree = self.tree.borrow();
        let parent = tree.node(*node).ok()?.parent?;
        let siblings = &tree.node(parent).ok()?.children;
        let index = siblings.iter().position(|c| c == node)?;
        siblings.get(index + 1).copied()
    }

    fn children(&self, parent: &MemoryNode) -> Vec<MemoryNode> {
        self.tree
            .borrow()
            .node(*parent)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    fn set_attribute(&self, node: &MemoryNode, name: &str, value: &str) -> Result<(), HostError> {
        let mut tree = self.tree.borrow_mut();
        tree.node_mut(*node)?
            .attributes
            .insert(name.to_string(), value.to_string());
        tree.stats.attribute_writes += 1;
        Ok(())
    }

    fn remove_attribute(&self, node: &MemoryNode, name: &str) -> Result<(), HostError> {
        let mut tree = self.tree.borrow_mut();
        if tree.node_mut(*node)?.attributes.shift_remove(name).is_some() {
            tree.stats.attribute_writes += 1;
        }
        Ok(())
    }

    fn attribute(&self, node: &MemoryNode, name: &str) -> Option<String> {
        self.tree.borrow().node(*node).ok()?.attributes.get(name).cloned()
    }

    fn set_style(
        &self,
        node: &MemoryNode,
        property: &str,
        value: Option<&str>,
    ) -> Result<(), HostError> {
        let mut tree = self.tree.borrow_mut();
        let styles = &mut tree.node_mut(*node)?.styles;
        let changed = match value {
            Some(value) => styles.insert(property.to_string(), value.to_string()).as_deref() != Some(value),
            None => styles.shift_remove(property).is_some(),
        };
        if changed {
            tree.stats.attribute_writes += 1;
        }
        Ok(())
    }

    fn add_listener(
        &self,
        node: &MemoryNode,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HostError> {
        self.tree
            .borrow_mut()
            .node_mut(*node)?
            .listeners
            .push((event.to_string(), handler));
        Ok(())
    }
}
