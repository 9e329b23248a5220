//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is scheduled and re-runs on the
//!    next flush.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution.
//!
//! # Dependency-gated effects
//!
//! [`use_effect`] takes an explicit dependency getter. The getter is tracked;
//! the body is not. The body runs on creation and afterwards only when the
//! getter's snapshot differs from the previous one under [`SameValue`].
//!
//! # Cleanup
//!
//! An effect body may return a [`Cleanup`]. It runs right before the next
//! run of the body and once when the effect is disposed or dropped.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::graph::{Computation, ComputationKind, UpdateScheduler};

use super::context::untracked;
use super::runtime::Runtime;
use super::same_value::SameValue;
use super::ComputationId;

/// A callback run before an effect's next run, or when it is disposed.
pub struct Cleanup(Box<dyn FnOnce()>);

impl Cleanup {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Box::new(f))
    }

    fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup")
    }
}

/// Values an effect body may return.
pub trait IntoCleanup {
    fn into_cleanup(self) -> Option<Cleanup>;
}

impl IntoCleanup for () {
    fn into_cleanup(self) -> Option<Cleanup> {
        None
    }
}

impl IntoCleanup for Cleanup {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(self)
    }
}

impl IntoCleanup for Option<Cleanup> {
    fn into_cleanup(self) -> Option<Cleanup> {
        self
    }
}

/// The pending cleanup of one effect. Once the effect is disposed, a
/// cleanup handed in runs right away instead of being stored.
#[derive(Default)]
struct CleanupSlot {
    pending: RefCell<Option<Cleanup>>,
    disposed: Cell<bool>,
}

impl CleanupSlot {
    /// Run the stored cleanup, if any, without tracking its reads.
    fn run_pending(&self) {
        let cleanup = self.pending.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            untracked(|| cleanup.run());
        }
    }

    fn store(&self, next: Option<Cleanup>) {
        if self.disposed.get() {
            if let Some(cleanup) = next {
                untracked(|| cleanup.run());
            }
        } else {
            *self.pending.borrow_mut() = next;
        }
    }

    fn dispose(&self) {
        self.disposed.set(true);
        self.run_pending();
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Effect, Runtime, Signal};
///
/// let count = Signal::new(0);
/// let reader = count.clone();
///
/// let effect = Effect::new(move || {
///     println!("Count is: {}", reader.get());
/// });
///
/// count.set(5);
/// Runtime::flush(); // Prints: "Count is: 5"
/// assert_eq!(effect.run_count(), 2);
/// ```
#[must_use = "dropping an Effect disposes it"]
#[derive(Clone)]
pub struct Effect {
    computation: Computation,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F, R>(run: F) -> Self
    where
        F: FnMut() -> R + 'static,
        R: IntoCleanup,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create a new effect without running it immediately.
    ///
    /// It has no dependencies until it first runs, either through
    /// [`execute`](Self::execute) or [`schedule`](Self::schedule).
    pub fn new_lazy<F, R>(mut run: F) -> Self
    where
        F: FnMut() -> R + 'static,
        R: IntoCleanup,
    {
        let slot = Rc::new(CleanupSlot::default());
        let body_slot = slot.clone();
        Self::from_parts(slot, move || {
            body_slot.run_pending();
            // The body may dispose its own effect
            body_slot.store(run().into_cleanup());
        })
    }

    fn from_parts(slot: Rc<CleanupSlot>, mut body: impl FnMut() + 'static) -> Self {
        let computation = Computation::new(ComputationKind::Effect, move || {
            body();
            Ok(())
        });
        computation.on_dispose(move || slot.dispose());
        Self { computation }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> ComputationId {
        self.computation.id()
    }

    /// The computation backing this effect.
    pub fn computation(&self) -> &Computation {
        &self.computation
    }

    /// Run the effect now, reporting any failure.
    pub fn execute(&self) {
        if let Err(err) = self.computation.run() {
            Runtime::report(&err);
        }
    }

    /// Queue the effect for the next flush.
    pub fn schedule(&self) {
        UpdateScheduler::schedule(&self.computation);
    }

    /// Dispose of the effect.
    ///
    /// Runs the pending cleanup once. After disposal, the effect will not
    /// run again.
    pub fn dispose(&self) {
        self.computation.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.computation.is_disposed()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.computation.run_count()
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.computation.dependency_count()
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an [`Effect`] that tracks whatever `run` reads.
pub fn effect<F, R>(run: F) -> Effect
where
    F: FnMut() -> R + 'static,
    R: IntoCleanup,
{
    Effect::new(run)
}

/// Create an effect gated on an explicit dependency snapshot.
///
/// `deps` is tracked and evaluated on every run. `run` executes untracked on
/// the first run and then only when the snapshot changes element-wise.
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use trellis_core::reactive::{use_effect, Runtime, Signal};
///
/// let a = Signal::new(1);
/// let b = Signal::new("x".to_string());
/// let calls = Rc::new(Cell::new(0));
///
/// let (a2, b2, calls2) = (a.clone(), b.clone(), calls.clone());
/// let _effect = use_effect(move || (a2.get(), b2.get()), move || calls2.set(calls2.get() + 1));
///
/// a.set(2);
/// Runtime::flush();
/// assert_eq!(calls.get(), 2);
/// ```
pub fn use_effect<D, Deps, F, R>(mut deps: Deps, mut run: F) -> Effect
where
    D: SameValue + 'static,
    Deps: FnMut() -> D + 'static,
    F: FnMut() -> R + 'static,
    R: IntoCleanup,
{
    let slot = Rc::new(CleanupSlot::default());
    let body_slot = slot.clone();
    let mut previous: Option<D> = None;

    let effect = Effect::from_parts(slot, move || {
        let current = deps();
        if let Some(previous) = &previous {
            if previous.same_value(&current) {
                return;
            }
        }
        body_slot.run_pending();
        body_slot.store(untracked(|| run().into_cleanup()));
        previous = Some(current);
    });
    effect.execute();
    effect
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn effect_runs_on_creation() {
        let (run_count, run_count_clone) = counter();

        let _effect = Effect::new(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        });

        // Effect should have run once on creation
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let (run_count, run_count_clone) = counter();

        let effect = Effect::new_lazy(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        });

        assert_eq!(run_count.get(), 0);
        assert_eq!(effect.run_count(), 0);

        effect.schedule();
        UpdateScheduler::flush();
        assert_eq!(run_count.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let signal = Signal::new(0);
        let observed = Rc::new(Cell::new(-1));
        let (reader, observed_clone) = (signal.clone(), observed.clone());

        let effect = Effect::new(move || observed_clone.set(reader.get()));
        assert_eq!(observed.get(), 0);
        assert_eq!(effect.dependency_count(), 1);

        signal.set(42);
        UpdateScheduler::flush();
        assert_eq!(observed.get(), 42);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn cleanup_runs_before_next_run_and_on_dispose() {
        let signal = Signal::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let (reader, log_clone) = (signal.clone(), log.clone());

        let effect = Effect::new(move || {
            let value = reader.get();
            log_clone.borrow_mut().push(format!("run {value}"));
            let log = log_clone.clone();
            Cleanup::new(move || log.borrow_mut().push(format!("cleanup {value}")))
        });

        signal.set(1);
        UpdateScheduler::flush();
        effect.dispose();
        effect.dispose();

        assert_eq!(
            *log.borrow(),
            vec!["run 0", "cleanup 0", "run 1", "cleanup 1"]
        );
    }

    #[test]
    fn dropping_effect_runs_cleanup_and_stops_it() {
        let signal = Signal::new(0);
        let (runs, runs_clone) = counter();
        let cleaned = Rc::new(Cell::new(false));
        let (reader, cleaned_clone) = (signal.clone(), cleaned.clone());

        let effect = Effect::new(move || {
            reader.get();
            runs_clone.set(runs_clone.get() + 1);
            let cleaned = cleaned_clone.clone();
            Some(Cleanup::new(move || cleaned.set(true)))
        });
        drop(effect);
        assert!(cleaned.get());

        signal.set(1);
        UpdateScheduler::flush();
        assert_eq!(runs.get(), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let signal = Signal::new(0);
        let (run_count, run_count_clone) = counter();
        let reader = signal.clone();

        let effect = Effect::new(move || {
            reader.get();
            run_count_clone.set(run_count_clone.get() + 1);
        });

        // Write first, dispose before the flush
        signal.set(1);
        effect.dispose();
        assert!(effect.is_disposed());

        UpdateScheduler::flush();
        effect.execute();
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = Effect::new(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        effect1.execute();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }

    #[test]
    fn use_effect_runs_only_when_snapshot_changes() {
        let tracked = Signal::new(1);
        let other = Signal::new(10);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (deps_reader, body_reader, seen_clone) = (tracked.clone(), other.clone(), seen.clone());

        let effect = use_effect(
            move || deps_reader.get() % 2,
            move || seen_clone.borrow_mut().push(body_reader.get()),
        );

        // Reads in the body are not dependencies
        other.set(11);
        assert!(!UpdateScheduler::has_pending());

        // Same parity: deps re-evaluated, body skipped
        tracked.set(3);
        UpdateScheduler::flush();
        assert_eq!(*seen.borrow(), vec![10]);

        tracked.set(4);
        UpdateScheduler::flush();
        assert_eq!(*seen.borrow(), vec![10, 11]);
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn use_effect_cleanup_follows_body_runs() {
        let dep = Signal::new(0);
        let cleanups = Rc::new(Cell::new(0));
        let (reader, cleanups_clone) = (dep.clone(), cleanups.clone());

        let effect = use_effect(
            move || reader.get(),
            move || {
                let cleanups = cleanups_clone.clone();
                Cleanup::new(move || cleanups.set(cleanups.get() + 1))
            },
        );

        dep.set(1);
        UpdateScheduler::flush();
        assert_eq!(cleanups.get(), 1);

        effect.dispose();
        assert_eq!(cleanups.get(), 2);
    }

    #[test]
    fn effect_disposed_by_its_own_body_still_cleans_up() {
        let (cleanups, cleanups_clone) = counter();
        let handle: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));
        let handle_clone = handle.clone();

        let effect = Effect::new_lazy(move || {
            if let Some(me) = handle_clone.borrow().as_ref() {
                me.dispose();
            }
            let cleanups = cleanups_clone.clone();
            Cleanup::new(move || cleanups.set(cleanups.get() + 1))
        });
        *handle.borrow_mut() = Some(effect.clone());

        effect.execute();
        assert!(effect.is_disposed());
        assert_eq!(cleanups.get(), 1);

        handle.borrow_mut().take();
        drop(effect);
        assert_eq!(cleanups.get(), 1);
    }

    #[test]
    fn use_effect_disposed_by_its_own_body_still_cleans_up() {
        let dep = Signal::new(0);
        let (cleanups, cleanups_clone) = counter();
        let handle: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));
        let (reader, handle_clone) = (dep.clone(), handle.clone());

        let effect = use_effect(
            move || reader.get(),
            move || {
                // Unset during the first run, which happens inside use_effect
                if let Some(me) = handle_clone.borrow().as_ref() {
                    me.dispose();
                }
                let cleanups = cleanups_clone.clone();
                Cleanup::new(move || cleanups.set(cleanups.get() + 1))
            },
        );
        *handle.borrow_mut() = Some(effect.clone());

        dep.set(1);
        UpdateScheduler::flush();
        assert!(effect.is_disposed());
        // One for the first run, one for the run that disposed the effect
        assert_eq!(cleanups.get(), 2);

        handle.borrow_mut().take();
        drop(effect);
        assert_eq!(cleanups.get(), 2);
    }
}
