//! Keyed Reconciliation
//!
//! A dynamic region is a span of a parent's children bounded by two marker
//! nodes. One computation drives it: every run calls the producer, flattens
//! the result and patches the span in place.
//!
//! # Algorithm
//!
//! 1. The producer runs first. If it fails, nothing below happens and the
//!    region keeps its last good children.
//!
//! 2. A single text result over a single previously produced text node only
//!    rewrites that node's text.
//!
//! 3. Otherwise every leaf becomes a target slot. A keyed element whose key
//!    was mounted last time reuses the mounted slot (the fresh candidate is
//!    dropped along with its bindings). Text leaves get new text nodes.
//!
//! 4. A target that contains the parent fails the pass before any
//!    mutation.
//!
//! 5. Previously mounted nodes that are not targets are detached.
//!
//! 6. Targets are placed left to right behind the start marker, moving a
//!    node only when the node already sitting at that position differs. If
//!    the host fails halfway, the slot list is rebuilt from the nodes that
//!    are actually between the markers.
//!
//! Lifecycle hooks of region children fire only while the region's parent
//! is attached. Regions created by [`ElementBuilder::child_dyn`] start
//! detached and follow their element's `mount`/`unmount`.
//!
//! [`ElementBuilder::child_dyn`]: super::ElementBuilder::child_dyn
//!
//! Keys live in the region's own slots; host nodes are never tagged.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::error::{HostError, Result};
use crate::graph::{Computation, ComputationKind};
use crate::reactive::Runtime;

use super::element::Element;
use super::host::Host;
use super::view::{Key, View};

/// One mounted child of a region.
struct Slot<H: Host> {
    key: Option<Key>,
    node: H::Node,
    element: Option<Element<H>>,
    /// A text node created by the region for a plain value.
    synthetic_text: bool,
}

impl<H: Host> Clone for Slot<H> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            node: self.node.clone(),
            element: self.element.clone(),
            synthetic_text: self.synthetic_text,
        }
    }
}

/// Side effects collected while the region state is borrowed and released
/// afterwards.
struct Transition<H: Host> {
    mounted: Vec<Element<H>>,
    unmounted: Vec<Element<H>>,
    retired: Vec<Slot<H>>,
    discarded: Vec<Element<H>>,
    error: Option<HostError>,
}

impl<H: Host> Default for Transition<H> {
    fn default() -> Self {
        Self {
            mounted: Vec::new(),
            unmounted: Vec::new(),
            retired: Vec::new(),
            discarded: Vec::new(),
            error: None,
        }
    }
}

impl<H: Host> Transition<H> {
    /// Fire hooks and release dropped elements. Returns the host error that
    /// cut the pass short, if any.
    fn finish(self) -> Option<HostError> {
        for element in &self.unmounted {
            element.fire_unmount();
        }
        for element in &self.mounted {
            element.fire_mount();
        }
        // Dropped elements dispose their bindings here, outside the borrow
        drop(self.retired);
        drop(self.discarded);
        self.error
    }
}

struct RegionState<H: Host> {
    host: H,
    parent: H::Node,
    start: H::Node,
    end: H::Node,
    mounted: Vec<Slot<H>>,
    /// Whether `parent` is attached. Hooks of the region's children only
    /// fire while it is.
    live: bool,
}

impl<H: Host> RegionState<H> {
    fn reconcile(&mut self, view: View<H>) -> Transition<H> {
        let leaves = view.flatten();
        let mut transition = Transition::default();

        if let ([View::Text(text)], [slot]) = (leaves.as_slice(), self.mounted.as_slice()) {
            if slot.synthetic_text {
                if self.host.text(&slot.node).as_deref() != Some(text.as_str()) {
                    transition.error = self.host.set_text(&slot.node, text).err();
                }
                return transition;
            }
        }

        let targets = self.match_targets(leaves, &mut transition);

        // A target that contains the parent can never be placed. Refuse the
        // whole pass before touching the tree.
        let cycle = targets
            .iter()
            .find(|slot| self.host.contains(&slot.node, &self.parent))
            .map(|slot| format!("{:?}", slot.node));
        if let Some(node) = cycle {
            transition.error = Some(HostError::WouldCycle {
                parent: format!("{:?}", self.parent),
                node,
            });
            transition.retired = targets;
            return transition;
        }

        let current = match self.patch(&targets) {
            Ok(()) => targets,
            Err(err) => {
                transition.error = Some(err);
                self.resync(targets, &mut transition)
            }
        };

        if self.live {
            let current_nodes: HashSet<&H::Node> = current.iter().map(|slot| &slot.node).collect();
            let previous_nodes: HashSet<&H::Node> = self.mounted.iter().map(|slot| &slot.node).collect();
            transition.unmounted.extend(
                self.mounted
                    .iter()
                    .filter(|slot| !current_nodes.contains(&slot.node))
                    .filter_map(|slot| slot.element.clone()),
            );
            transition.mounted.extend(
                current
                    .iter()
                    .filter(|slot| !previous_nodes.contains(&slot.node))
                    .filter_map(|slot| slot.element.clone()),
            );
        }

        transition.retired.extend(std::mem::replace(&mut self.mounted, current));
        transition
    }

    /// Detach stale nodes, then place `targets` in order behind the start
    /// marker.
    fn patch(&self, targets: &[Slot<H>]) -> std::result::Result<(), HostError> {
        let target_nodes: HashSet<&H::Node> = targets.iter().map(|slot| &slot.node).collect();
        for slot in &self.mounted {
            if !target_nodes.contains(&slot.node) {
                self.host.remove(&slot.node)?;
            }
        }

        let mut cursor = self.start.clone();
        let mut moves = 0usize;
        for slot in targets {
            let next = self.host.next_sibling(&cursor);
            if next.as_ref() != Some(&slot.node) {
                self.host.insert_before(&self.parent, &slot.node, next.as_ref())?;
                moves += 1;
            }
            cursor = slot.node.clone();
        }

        tracing::debug!(
            parent = ?self.parent,
            previous = self.mounted.len(),
            current = targets.len(),
            moves,
            "reconciled dynamic region"
        );
        Ok(())
    }

    /// Rebuild the slot list from what actually sits between the markers
    /// after a patch failed halfway.
    fn resync(&self, targets: Vec<Slot<H>>, transition: &mut Transition<H>) -> Vec<Slot<H>> {
        let mut known: HashMap<H::Node, Slot<H>> = self
            .mounted
            .iter()
            .map(|slot| (slot.node.clone(), slot.clone()))
            .collect();
        for slot in targets {
            known.insert(slot.node.clone(), slot);
        }

        let mut actual = Vec::new();
        let mut cursor = self.host.next_sibling(&self.start);
        while let Some(node) = cursor {
            if node == self.end {
                break;
            }
            cursor = self.host.next_sibling(&node);
            if let Some(slot) = known.remove(&node) {
                actual.push(slot);
            }
        }

        tracing::warn!(
            parent = ?self.parent,
            attached = actual.len(),
            "dynamic region patch failed, keeping the children still attached"
        );
        transition.retired.extend(known.into_values());
        actual
    }

    /// Turn leaves into target slots, reusing mounted slots by key.
    fn match_targets(&self, leaves: Vec<View<H>>, transition: &mut Transition<H>) -> Vec<Slot<H>> {
        let previous_keyed: HashMap<&Key, &Slot<H>> = self
            .mounted
            .iter()
            .filter_map(|slot| slot.key.as_ref().map(|key| (key, slot)))
            .collect();
        let warn_duplicates = Runtime::config().warn_duplicate_keys;

        let mut seen_keys: HashSet<Key> = HashSet::new();
        let mut seen_nodes: HashSet<H::Node> = HashSet::new();
        let mut targets = Vec::with_capacity(leaves.len());

        for leaf in leaves {
            let slot = match leaf {
                View::Text(text) => Slot {
                    key: None,
                    node: self.host.create_text(&text),
                    element: None,
                    synthetic_text: true,
                },
                View::Node(node) => Slot {
                    key: None,
                    node,
                    element: None,
                    synthetic_text: false,
                },
                View::Element(element) => {
                    let key = match element.key() {
                        Some(key) if !seen_keys.insert(key.clone()) => {
                            if warn_duplicates {
                                tracing::warn!(%key, "duplicate key in dynamic region, treating it as unkeyed");
                            }
                            None
                        }
                        other => other.cloned(),
                    };
                    match key.as_ref().and_then(|key| previous_keyed.get(key)) {
                        Some(existing) => {
                            let existing = (*existing).clone();
                            let same = matches!(&existing.element, Some(kept) if kept.ptr_eq(&element));
                            if !same {
                                transition.discarded.push(element);
                            }
                            existing
                        }
                        None => Slot {
                            key,
                            node: element.node().clone(),
                            element: Some(element),
                            synthetic_text: false,
                        },
                    }
                }
                View::Empty | View::List(_) => continue,
            };

            if !seen_nodes.insert(slot.node.clone()) {
                tracing::warn!(node = ?slot.node, "node produced twice in one render, keeping the first");
                continue;
            }
            targets.push(slot);
        }
        targets
    }
}

/// Handle to a dynamic child region.
///
/// Dropping the last handle stops the region from updating. The nodes it
/// mounted stay where they are.
#[must_use = "dropping a DynamicRegion stops it from updating"]
pub struct DynamicRegion<H: Host> {
    computation: Computation,
    state: Rc<RefCell<RegionState<H>>>,
}

impl<H: Host> DynamicRegion<H> {
    /// The computation that re-runs the producer.
    pub fn computation(&self) -> &Computation {
        &self.computation
    }

    /// Nodes currently mounted in the region, in order, excluding markers.
    pub fn mounted_nodes(&self) -> Vec<H::Node> {
        self.state
            .borrow()
            .mounted
            .iter()
            .map(|slot| slot.node.clone())
            .collect()
    }

    /// Keys of the mounted children, `None` for unkeyed ones.
    pub fn mounted_keys(&self) -> Vec<Option<Key>> {
        self.state
            .borrow()
            .mounted
            .iter()
            .map(|slot| slot.key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().mounted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn start_marker(&self) -> H::Node {
        self.state.borrow().start.clone()
    }

    pub fn end_marker(&self) -> H::Node {
        self.state.borrow().end.clone()
    }

    /// Stop updating. Mounted nodes are left in place.
    pub fn dispose(&self) {
        self.computation.dispose();
    }

    /// The region's parent was attached: mount the children it holds.
    pub(crate) fn fire_mount(&self) {
        for element in self.set_live(true) {
            element.fire_mount();
        }
    }

    /// The region's parent was detached: unmount the children it holds.
    pub(crate) fn fire_unmount(&self) {
        for element in self.set_live(false) {
            element.fire_unmount();
        }
    }

    fn set_live(&self, live: bool) -> Vec<Element<H>> {
        let mut state = self.state.borrow_mut();
        state.live = live;
        state
            .mounted
            .iter()
            .filter_map(|slot| slot.element.clone())
            .collect()
    }
}

impl<H: Host> Clone for DynamicRegion<H> {
    fn clone(&self) -> Self {
        Self {
            computation: self.computation.clone(),
            state: self.state.clone(),
        }
    }
}

impl<H: Host> fmt::Debug for DynamicRegion<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicRegion")
            .field("computation", &self.computation)
            .field("mounted", &self.len())
            .finish()
    }
}

/// Append a dynamic region to `parent` and keep it in sync with `producer`.
///
/// The producer runs once right away and again whenever a signal it read
/// changes. A failing run is reported through [`Runtime::report`] and leaves
/// the region as it was. Fails only if the region's markers cannot be
/// attached to `parent`.
///
/// `parent` is treated as attached: children fire their mount hooks as soon
/// as the region places them.
///
/// ```rust
/// use trellis_core::dom::{bind_dynamic_children, ElementBuilder, Host, MemoryHost};
/// use trellis_core::reactive::Signal;
/// use trellis_core::Runtime;
///
/// let host = MemoryHost::new();
/// let list = host.create_element("ul");
/// let rows = Signal::new(vec![1, 2, 3]);
///
/// let (reader, h) = (rows.clone(), host.clone());
/// let region = bind_dynamic_children(&host, &list, move || {
///     reader.with(|rows| {
///         rows.iter()
///             .map(|id| ElementBuilder::new(&h, "li").key(*id).text(&id.to_string()).build())
///             .collect::<Result<Vec<_>, _>>()
///             .unwrap_or_default()
///     })
/// })
/// .unwrap();
///
/// rows.set(vec![3, 1]);
/// Runtime::flush();
/// assert_eq!(host.text_content(&list), "31");
/// assert_eq!(region.len(), 2);
/// ```
pub fn bind_dynamic_children<H, F, V>(
    host: &H,
    parent: &H::Node,
    producer: F,
) -> Result<DynamicRegion<H>>
where
    H: Host,
    F: FnMut() -> V + 'static,
    V: Into<View<H>>,
{
    bind_region(host, parent, producer, true)
}

/// Like [`bind_dynamic_children`], with `live` telling whether `parent` is
/// already attached.
pub(crate) fn bind_region<H, F, V>(
    host: &H,
    parent: &H::Node,
    mut producer: F,
    live: bool,
) -> Result<DynamicRegion<H>>
where
    H: Host,
    F: FnMut() -> V + 'static,
    V: Into<View<H>>,
{
    let start = host.create_marker("region-start");
    let end = host.create_marker("region-end");
    host.append_child(parent, &start)?;
    host.append_child(parent, &end)?;

    let state = Rc::new(RefCell::new(RegionState {
        host: host.clone(),
        parent: parent.clone(),
        start,
        end,
        mounted: Vec::new(),
        live,
    }));

    let body_state = state.clone();
    let computation = Computation::new(ComputationKind::Region, move || {
        let view = producer().into();
        let transition = body_state.borrow_mut().reconcile(view);
        match transition.finish() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    });

    if let Err(err) = computation.run() {
        Runtime::report(&err);
    }

    Ok(DynamicRegion { computation, state })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
