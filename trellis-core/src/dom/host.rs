//! The host-tree boundary.
//!
//! The runtime never owns the tree it updates. A [`Host`] hands out cheap,
//! cloneable node handles and performs synchronous mutations on them. The
//! only structural promise the reconciler relies on is that a node keeps its
//! identity when it is moved with [`Host::insert_before`].

use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use crate::error::HostError;

/// An event delivered to a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEvent {
    pub name: String,
    pub detail: Option<String>,
}

impl HostEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A listener attached to a host node.
pub type EventHandler = Rc<dyn Fn(&HostEvent)>;

/// A mutable tree of nodes with stable identity.
pub trait Host: Clone + 'static {
    /// Handle to one node. Equality is node identity.
    type Node: Clone + Eq + Hash + Debug + 'static;

    fn create_element(&self, tag: &str) -> Self::Node;

    fn create_text(&self, text: &str) -> Self::Node;

    /// Create an invisible marker node used to bound dynamic regions.
    fn create_marker(&self, label: &str) -> Self::Node;

    fn set_text(&self, node: &Self::Node, text: &str) -> Result<(), HostError>;

    /// Text content of a text or marker node.
    fn text(&self, node: &Self::Node) -> Option<String>;

    /// Insert `child` under `parent` before `reference`, or last when
    /// `reference` is `None`. An attached `child` is moved, keeping its
    /// identity.
    fn insert_before(
        &self,
        parent: &Self::Node,
        child: &Self::Node,
        reference: Option<&Self::Node>,
    ) -> Result<(), HostError>;

    /// Detach `node` from its parent. Detached nodes are left alone.
    fn remove(&self, node: &Self::Node) -> Result<(), HostError>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    fn children(&self, parent: &Self::Node) -> Vec<Self::Node>;

    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str) -> Result<(), HostError>;

    fn remove_attribute(&self, node: &Self::Node, name: &str) -> Result<(), HostError>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Set (`Some`) or clear (`None`) one style property.
    fn set_style(&self, node: &Self::Node, property: &str, value: Option<&str>)
        -> Result<(), HostError>;

    fn add_listener(
        &self,
        node: &Self::Node,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HostError>;

    fn append_child(&self, parent: &Self::Node, child: &Self::Node) -> Result<(), HostError> {
        self.insert_before(parent, child, None)
    }

    /// Whether `node` is `ancestor` or lies somewhere below it.
    fn contains(&self, ancestor: &Self::Node, node: &Self::Node) -> bool {
        let mut current = Some(node.clone());
        while let Some(candidate) = current {
            if &candidate == ancestor {
                return true;
            }
            current = self.parent(&candidate);
        }
        false
    }

    /// Class names currently on `node`, in order.
    fn class_list(&self, node: &Self::Node) -> Vec<String> {
        self.attribute(node, "class")
            .map(|classes| classes.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn add_class(&self, node: &Self::Node, class: &str) -> Result<(), HostError> {
        let mut classes = self.class_list(node);
        if classes.iter().any(|existing| existing == class) {
            return Ok(());
        }
        classes.push(class.to_string());
        self.set_attribute(node, "class", &classes.join(" "))
    }

    fn remove_class(&self, node: &Self::Node, class: &str) -> Result<(), HostError> {
        let classes = self.class_list(node);
        if !classes.iter().any(|existing| existing == class) {
            return Ok(());
        }
        let remaining: Vec<String> = classes.into_iter().filter(|c| c != class).collect();
        if remaining.is_empty() {
            self.remove_attribute(node, "class")
        } else {
            self.set_attribute(node, "class", &remaining.join(" "))
        }
    }
}
