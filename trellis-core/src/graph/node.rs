//! Computation Nodes
//!
//! A [`Computation`] is a re-runnable unit of work. While its body runs it is
//! the current entry of the [`ReactiveContext`], so every signal it reads
//! registers an edge back to it. Before each run it removes itself from every
//! subscriber set it joined last time, which keeps conditional reads from
//! leaving stale subscriptions behind.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::error::{ReactiveError, Result};
use crate::reactive::{ComputationId, ReactiveContext, Runtime, SubscriberSet};

use super::scheduler::UpdateScheduler;

/// What a computation was created for. Used for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputationKind {
    /// A side-effecting computation created by `effect` / `use_effect`.
    Effect,

    /// A derived value created by `computed`.
    Memo,

    /// A reactive attribute, class or style binding on an element.
    Binding,

    /// A dynamic child region driven by the keyed reconciler.
    Region,
}

/// Lifecycle state of a computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Idle,
    Running,
    Disposed,
}

type Body = Box<dyn FnMut() -> Result<()>>;
type Disposer = Box<dyn FnOnce()>;

struct NodeInner {
    id: ComputationId,
    kind: ComputationKind,
    /// Taken out while running so the body is never borrowed across user code.
    body: RefCell<Option<Body>>,
    /// Every subscriber set this computation is currently registered in.
    sources: RefCell<SmallVec<[Weak<SubscriberSet>; 4]>>,
    state: Cell<NodeState>,
    run_count: Cell<usize>,
    disposers: RefCell<Vec<Disposer>>,
}

impl NodeInner {
    fn unsubscribe_all(&self) {
        let sources = std::mem::take(&mut *self.sources.borrow_mut());
        for source in sources {
            if let Some(set) = source.upgrade() {
                set.remove(self.id);
            }
        }
    }

    fn run_disposers(&self) {
        let disposers = std::mem::take(&mut *self.disposers.borrow_mut());
        for disposer in disposers {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(disposer)) {
                Runtime::report(&ReactiveError::from_panic(self.id, payload));
            }
        }
    }
}

impl Drop for NodeInner {
    fn drop(&mut self) {
        if self.state.get() != NodeState::Disposed {
            self.state.set(NodeState::Disposed);
            self.unsubscribe_all();
            self.run_disposers();
        }
    }
}

/// A node in the dependency graph.
///
/// Cloning a `Computation` yields another handle to the same node. The node
/// is disposed when [`dispose`](Self::dispose) is called or when the last
/// handle is dropped; signals and the scheduler only hold weak references.
#[derive(Clone)]
pub struct Computation {
    inner: Rc<NodeInner>,
}

impl Computation {
    /// Create a computation without running it.
    pub fn new<F>(kind: ComputationKind, body: F) -> Self
    where
        F: FnMut() -> Result<()> + 'static,
    {
        Self {
            inner: Rc::new(NodeInner {
                id: ComputationId::new(),
                kind,
                body: RefCell::new(Some(Box::new(body))),
                sources: RefCell::new(SmallVec::new()),
                state: Cell::new(NodeState::Idle),
                run_count: Cell::new(0),
                disposers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Get the computation's unique ID.
    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    /// Get the computation's kind.
    pub fn kind(&self) -> ComputationKind {
        self.inner.kind
    }

    /// Run the body inside a fresh tracking context.
    ///
    /// Old dependencies are dropped first; the ones read during this run
    /// replace them. A panic inside the body is caught and returned as
    /// [`ReactiveError::ComputationPanicked`]; the tracking context is
    /// restored either way. Running a disposed computation is a no-op.
    pub fn run(&self) -> Result<()> {
        let inner = &self.inner;
        match inner.state.get() {
            NodeState::Disposed => return Ok(()),
            NodeState::Running => return Err(ReactiveError::ReentrantRun { id: inner.id }),
            NodeState::Idle => {}
        }

        let Some(mut body) = inner.body.borrow_mut().take() else {
            return Ok(());
        };

        inner.unsubscribe_all();
        inner.state.set(NodeState::Running);
        tracing::trace!(id = %inner.id, kind = ?inner.kind, "running computation");

        let outcome = {
            let _ctx = ReactiveContext::enter(self.clone());
            panic::catch_unwind(AssertUnwindSafe(|| body()))
        };

        inner.run_count.set(inner.run_count.get() + 1);
        if inner.state.get() == NodeState::Disposed {
            // Disposed from inside its own body: forget what it just read.
            inner.unsubscribe_all();
            drop(body);
        } else {
            inner.state.set(NodeState::Idle);
            *inner.body.borrow_mut() = Some(body);
        }

        match outcome {
            Ok(result) => result,
            Err(payload) => Err(ReactiveError::from_panic(inner.id, payload)),
        }
    }

    /// Queue this computation on the update scheduler.
    pub fn schedule(&self) {
        UpdateScheduler::schedule(self);
    }

    /// Dispose of the computation.
    ///
    /// Removes it from every signal it depends on and from the scheduler
    /// queue, then runs its registered disposers. Idempotent.
    pub fn dispose(&self) {
        let inner = &self.inner;
        let was_running = match inner.state.get() {
            NodeState::Disposed => return,
            NodeState::Running => true,
            NodeState::Idle => false,
        };

        inner.state.set(NodeState::Disposed);
        inner.unsubscribe_all();
        UpdateScheduler::cancel(inner.id);
        if !was_running {
            let body = inner.body.borrow_mut().take();
            drop(body);
        }
        inner.run_disposers();
        tracing::trace!(id = %inner.id, "disposed computation");
    }

    /// Check if the computation has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.state.get() == NodeState::Disposed
    }

    /// Check if the computation's body is currently executing.
    pub fn is_running(&self) -> bool {
        self.inner.state.get() == NodeState::Running
    }

    /// Get the number of times the body has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of signals this computation currently depends on.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .sources
            .borrow()
            .iter()
            .filter(|source| source.strong_count() > 0)
            .count()
    }

    /// Register a callback to run once when the computation is disposed.
    ///
    /// Runs immediately if the computation is already disposed.
    pub fn on_dispose(&self, disposer: impl FnOnce() + 'static) {
        if self.is_disposed() {
            disposer();
        } else {
            self.inner.disposers.borrow_mut().push(Box::new(disposer));
        }
    }

    /// Record a mutual edge between this computation and a signal's
    /// subscriber set.
    pub(crate) fn track(&self, set: &Rc<SubscriberSet>) {
        if self.is_disposed() {
            return;
        }
        if set.insert(self.inner.id, self.downgrade()) {
            self.inner.sources.borrow_mut().push(Rc::downgrade(set));
            tracing::trace!(id = %self.inner.id, "registered dependency");
        }
    }

    pub(crate) fn downgrade(&self) -> WeakComputation {
        WeakComputation {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Check if two handles refer to the same computation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("state", &self.inner.state.get())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Non-owning handle held by signals and the scheduler.
#[derive(Clone)]
pub(crate) struct WeakComputation {
    inner: Weak<NodeInner>,
}

impl WeakComputation {
    pub(crate) fn upgrade(&self) -> Option<Computation> {
        self.inner.upgrade().map(|inner| Computation { inner })
    }
}
