//! Host Tree Binding
//!
//! This module connects the reactive graph to a mutable tree of nodes.
//!
//! - [`Host`] is the boundary: anything that can create nodes, move them
//!   without losing identity and mutate their text and attributes.
//! - [`MemoryHost`] is an in-memory implementation used for tests and
//!   headless rendering.
//! - [`bind_dynamic_children`] keeps a marker-bounded span of a parent's
//!   children in sync with a producer, matching children by [`Key`].
//! - [`ElementBuilder`] creates elements whose attributes, classes, styles
//!   and children may be reactive. Lifecycle hooks are called explicitly when
//!   an element is attached or detached by a region or by [`mount`].

mod element;
mod host;
mod memory;
mod reconcile;
mod view;

pub use element::{mount, unmount, AttributeValue, Element, ElementBuilder, NodeRef};
pub use host::{EventHandler, Host, HostEvent};
pub use memory::{MemoryHost, MemoryNode, MutationStats};
pub use reconcile::{bind_dynamic_children, DynamicRegion};
pub use view::{Key, View};
