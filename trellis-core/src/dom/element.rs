//! Element construction.
//!
//! [`ElementBuilder`] creates one host element and wires everything attached
//! to it: static attributes, reactive bindings, listeners, children and
//! lifecycle hooks. The resulting [`Element`] owns its bindings and dynamic
//! regions, so they live exactly as long as some handle to the element does.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::{HostError, ReactiveError, Result};
use crate::graph::{Computation, ComputationKind};
use crate::reactive::untracked;

use super::host::{Host, HostEvent};
use super::reconcile::{bind_region, DynamicRegion};
use super::view::{Key, View};

type Hook<H> = Rc<dyn Fn(&<H as Host>::Node)>;

/// Values that can be written as an attribute or style property.
///
/// `None` (and `false`) remove the attribute; `true` sets it to the empty
/// string.
pub trait AttributeValue {
    fn into_attribute(self) -> Option<String>;
}

impl AttributeValue for String {
    fn into_attribute(self) -> Option<String> {
        Some(self)
    }
}

impl AttributeValue for &str {
    fn into_attribute(self) -> Option<String> {
        Some(self.to_string())
    }
}

impl AttributeValue for bool {
    fn into_attribute(self) -> Option<String> {
        self.then(String::new)
    }
}

impl<T: AttributeValue> AttributeValue for Option<T> {
    fn into_attribute(self) -> Option<String> {
        self.and_then(AttributeValue::into_attribute)
    }
}

macro_rules! attribute_from_display {
    ($($ty:ty),*) => {
        $(
            impl AttributeValue for $ty {
                fn into_attribute(self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

attribute_from_display!(char, i32, i64, u32, u64, usize, f32, f64);

struct ElementState<H: Host> {
    host: H,
    bindings: Vec<Computation>,
    regions: Vec<DynamicRegion<H>>,
    children: Vec<Element<H>>,
    on_mount: Vec<Hook<H>>,
    on_unmount: Vec<Hook<H>>,
    mounted: Cell<bool>,
}

/// A built host element together with everything that keeps it reactive.
///
/// Clones share state. When the last clone is dropped the element's
/// bindings and regions are disposed; the host node itself is left to the
/// host.
pub struct Element<H: Host> {
    node: H::Node,
    key: Option<Key>,
    state: Rc<ElementState<H>>,
}

impl<H: Host> Element<H> {
    pub fn node(&self) -> &H::Node {
        &self.node
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Attach a reconciliation key after construction.
    pub fn keyed(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn host(&self) -> &H {
        &self.state.host
    }

    /// Get the number of reactive bindings owned by this element.
    pub fn binding_count(&self) -> usize {
        self.state.bindings.len()
    }

    pub fn regions(&self) -> &[DynamicRegion<H>] {
        &self.state.regions
    }

    pub fn is_mounted(&self) -> bool {
        self.state.mounted.get()
    }

    /// Append this element to `parent` and fire its mount hooks.
    pub fn mount(&self, parent: &H::Node) -> std::result::Result<(), HostError> {
        self.state.host.append_child(parent, &self.node)?;
        self.fire_mount();
        Ok(())
    }

    /// Detach this element from its parent and fire its unmount hooks.
    pub fn unmount(&self) -> std::result::Result<(), HostError> {
        self.state.host.remove(&self.node)?;
        self.fire_unmount();
        Ok(())
    }

    /// Children, static ones and those held by regions, are notified before
    /// their parent.
    pub(crate) fn fire_mount(&self) {
        if self.state.mounted.replace(true) {
            return;
        }
        for child in &self.state.children {
            child.fire_mount();
        }
        for region in &self.state.regions {
            region.fire_mount();
        }
        untracked(|| {
            for hook in &self.state.on_mount {
                hook(&self.node);
            }
        });
    }

    /// The parent is notified before its children.
    pub(crate) fn fire_unmount(&self) {
        if !self.state.mounted.replace(false) {
            return;
        }
        untracked(|| {
            for hook in &self.state.on_unmount {
                hook(&self.node);
            }
        });
        for child in &self.state.children {
            child.fire_unmount();
        }
        for region in &self.state.regions {
            region.fire_unmount();
        }
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl<H: Host> Clone for Element<H> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            key: self.key.clone(),
            state: self.state.clone(),
        }
    }
}

impl<H: Host> fmt::Debug for Element<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("node", &self.node)
            .field("key", &self.key)
            .field("bindings", &self.state.bindings.len())
            .field("regions", &self.state.regions.len())
            .field("mounted", &self.state.mounted.get())
            .finish()
    }
}

/// Attach `element` under `parent` and fire its mount hooks.
pub fn mount<H: Host>(parent: &H::Node, element: &Element<H>) -> Result<()> {
    element.mount(parent)?;
    Ok(())
}

/// Detach `element` and fire its unmount hooks.
pub fn unmount<H: Host>(element: &Element<H>) -> Result<()> {
    element.unmount()?;
    Ok(())
}

/// Builds one [`Element`].
///
/// Builder methods never fail; the first host error is kept and returned
/// from [`build`](Self::build).
///
/// ```rust
/// use trellis_core::dom::{ElementBuilder, Host, MemoryHost};
/// use trellis_core::reactive::Signal;
/// use trellis_core::Runtime;
///
/// let host = MemoryHost::new();
/// let count = Signal::new(1);
/// let reader = count.clone();
///
/// let label = ElementBuilder::new(&host, "span")
///     .attr("id", "counter")
///     .attr_dyn("data-count", move || reader.get())
///     .build()
///     .unwrap();
///
/// count.set(2);
/// Runtime::flush();
/// assert_eq!(host.attribute(label.node(), "data-count").as_deref(), Some("2"));
/// ```
pub struct ElementBuilder<H: Host> {
    host: H,
    node: H::Node,
    key: Option<Key>,
    bindings: Vec<Computation>,
    regions: Vec<DynamicRegion<H>>,
    children: Vec<Element<H>>,
    on_mount: Vec<Hook<H>>,
    on_unmount: Vec<Hook<H>>,
    error: Option<ReactiveError>,
}

impl<H: Host> ElementBuilder<H> {
    pub fn new(host: &H, tag: &str) -> Self {
        Self {
            host: host.clone(),
            node: host.create_element(tag),
            key: None,
            bindings: Vec::new(),
            regions: Vec::new(),
            children: Vec::new(),
            on_mount: Vec::new(),
            on_unmount: Vec::new(),
            error: None,
        }
    }

    /// The node being built.
    pub fn node(&self) -> &H::Node {
        &self.node
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: &str, value: impl AttributeValue) -> Self {
        let result = apply_attribute(&self.host, &self.node, name, value.into_attribute());
        self.record(result);
        self
    }

    /// Bind an attribute to a reactive getter.
    pub fn attr_dyn<F, V>(mut self, name: &str, mut value: F) -> Self
    where
        F: FnMut() -> V + 'static,
        V: AttributeValue,
    {
        let (host, node, name) = (self.host.clone(), self.node.clone(), name.to_string());
        self.bind(move || {
            apply_attribute(&host, &node, &name, value().into_attribute())?;
            Ok(())
        });
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        let result = self.host.add_class(&self.node, class);
        self.record(result);
        self
    }

    /// Toggle one class on a reactive condition.
    pub fn class_toggle<F>(mut self, class: &str, mut enabled: F) -> Self
    where
        F: FnMut() -> bool + 'static,
    {
        let (host, node, class) = (self.host.clone(), self.node.clone(), class.to_string());
        self.bind(move || {
            if enabled() {
                host.add_class(&node, &class)?;
            } else {
                host.remove_class(&node, &class)?;
            }
            Ok(())
        });
        self
    }

    /// Bind a set of classes to a reactive getter.
    ///
    /// Each run adds the classes that appeared and removes the ones that
    /// disappeared since the previous run. Classes added elsewhere are left
    /// alone.
    pub fn class_dyn<F, I>(mut self, mut classes: F) -> Self
    where
        F: FnMut() -> I + 'static,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let (host, node) = (self.host.clone(), self.node.clone());
        let mut applied: Vec<String> = Vec::new();
        self.bind(move || {
            let mut desired: Vec<String> = Vec::new();
            for class in classes() {
                let class = class.into();
                if !class.is_empty() && !desired.contains(&class) {
                    desired.push(class);
                }
            }
            for stale in applied.iter().filter(|class| !desired.contains(class)) {
                host.remove_class(&node, stale)?;
            }
            for fresh in desired.iter().filter(|class| !applied.contains(class)) {
                host.add_class(&node, fresh)?;
            }
            applied = desired;
            Ok(())
        });
        self
    }

    pub fn style(mut self, property: &str, value: impl AttributeValue) -> Self {
        let result = self
            .host
            .set_style(&self.node, property, value.into_attribute().as_deref());
        self.record(result);
        self
    }

    /// Bind a style property to a reactive getter. `None` clears it.
    pub fn style_dyn<F, V>(mut self, property: &str, mut value: F) -> Self
    where
        F: FnMut() -> V + 'static,
        V: AttributeValue,
    {
        let (host, node, property) = (self.host.clone(), self.node.clone(), property.to_string());
        self.bind(move || {
            host.set_style(&node, &property, value().into_attribute().as_deref())?;
            Ok(())
        });
        self
    }

    /// Attach an event listener. The handler runs untracked.
    pub fn on<F>(mut self, event: &str, handler: F) -> Self
    where
        F: Fn(&HostEvent) + 'static,
    {
        let result = self.host.add_listener(
            &self.node,
            event,
            Rc::new(move |event: &HostEvent| untracked(|| handler(event))),
        );
        self.record(result);
        self
    }

    /// Hand the node to `f` right away.
    pub fn node_ref(self, f: impl FnOnce(&H::Node)) -> Self {
        f(&self.node);
        self
    }

    pub fn on_mount(mut self, hook: impl Fn(&H::Node) + 'static) -> Self {
        self.on_mount.push(Rc::new(hook));
        self
    }

    pub fn on_unmount(mut self, hook: impl Fn(&H::Node) + 'static) -> Self {
        self.on_unmount.push(Rc::new(hook));
        self
    }

    /// Append a static text child.
    pub fn text(mut self, text: &str) -> Self {
        let text = self.host.create_text(text);
        let result = self.host.append_child(&self.node, &text);
        self.record(result);
        self
    }

    /// Append a static child element. The child is kept alive by this one.
    pub fn child(mut self, child: Element<H>) -> Self {
        let result = self.host.append_child(&self.node, child.node());
        self.record(result);
        self.children.push(child);
        self
    }

    /// Append a dynamic region driven by `producer`.
    ///
    /// Children the region produces fire their mount hooks once this element
    /// is mounted, and their unmount hooks when it is unmounted.
    pub fn child_dyn<F, V>(mut self, producer: F) -> Self
    where
        F: FnMut() -> V + 'static,
        V: Into<View<H>>,
    {
        match bind_region(&self.host, &self.node, producer, false) {
            Ok(region) => self.regions.push(region),
            Err(err) => self.fail(err),
        }
        self
    }

    pub fn build(self) -> Result<Element<H>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(Element {
            node: self.node,
            key: self.key,
            state: Rc::new(ElementState {
                host: self.host,
                bindings: self.bindings,
                regions: self.regions,
                children: self.children,
                on_mount: self.on_mount,
                on_unmount: self.on_unmount,
                mounted: Cell::new(false),
            }),
        })
    }

    fn bind(&mut self, body: impl FnMut() -> Result<()> + 'static) {
        let computation = Computation::new(ComputationKind::Binding, body);
        if let Err(err) = computation.run() {
            self.fail(err);
        }
        self.bindings.push(computation);
    }

    fn record(&mut self, result: std::result::Result<(), HostError>) {
        if let Err(err) = result {
            self.fail(err.into());
        }
    }

    fn fail(&mut self, err: ReactiveError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

fn apply_attribute<H: Host>(
    host: &H,
    node: &H::Node,
    name: &str,
    value: Option<String>,
) -> std::result::Result<(), HostError> {
    match value {
        Some(value) if host.attribute(node, name).as_deref() == Some(value.as_str()) => Ok(()),
        Some(value) => host.set_attribute(node, name, &value),
        None => host.remove_attribute(node, name),
    }
}

/// Shared slot for a node captured with [`ElementBuilder::node_ref`].
pub type NodeRef<N> = Rc<RefCell<Option<N>>>;
