//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    signal registers that context as a subscriber, and the context records
//!    a back-reference to the signal's subscriber set.
//!
//! 2. When a write changes the value, every current subscriber is handed to
//!    the scheduler. Nothing runs synchronously.
//!
//! 3. Writes that compare equal under [`SameValue`] are ignored.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique ID (8 bytes)
//! - The value, behind a shared `RefCell`
//! - A subscriber set (grows with number of dependents)
//! - The equality function used by `set`

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;

use crate::graph::UpdateScheduler;

use super::context::ReactiveContext;
use super::same_value::SameValue;
use super::subscriber::SubscriberSet;

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    thread_local! {
        static SIGNAL_ID_COUNTER: Cell<u64> = const { Cell::new(0) };
    }
    SIGNAL_ID_COUNTER.with(|counter| {
        let id = counter.get();
        counter.set(id + 1);
        id
    })
}

struct SignalInner<T> {
    id: u64,
    value: RefCell<T>,
    subscribers: Rc<SubscriberSet>,
    equals: fn(&T, &T) -> bool,
}

/// A reactive signal holding a value of type T.
///
/// Clones share the same value and subscribers.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// count.update(|v| v + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T: SameValue + 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self::with_equality(value, T::same_value)
    }
}

impl<T: 'static> Signal<T> {
    /// Create a signal that uses `equals` to detect changes.
    pub fn with_equality(value: T, equals: fn(&T, &T) -> bool) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: next_signal_id(),
                value: RefCell::new(value),
                subscribers: Rc::new(SubscriberSet::default()),
                equals,
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Register the current computation, if any, as a subscriber.
    pub fn track(&self) {
        if let Some(current) = ReactiveContext::current() {
            current.track(&self.inner.subscribers);
        }
    }

    /// Borrow the current value, tracking the read.
    ///
    /// Writing to this signal from inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&*self.inner.value.borrow())
    }

    /// Borrow the current value without tracking the read.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.value.borrow())
    }

    /// Set a new value.
    ///
    /// If it equals the stored value nothing happens. Otherwise the value is
    /// stored and every subscriber is scheduled.
    pub fn set(&self, value: T) {
        let unchanged = (self.inner.equals)(&*self.inner.value.borrow(), &value);
        if unchanged {
            tracing::trace!(signal = self.inner.id, "write ignored: value unchanged");
            return;
        }

        // The old value is dropped after the borrow ends: dropping it may
        // dispose computations that read this signal.
        let old = std::mem::replace(&mut *self.inner.value.borrow_mut(), value);
        drop(old);
        self.notify();
    }

    /// Compute the next value from the current one, then [`set`](Self::set) it.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&*self.inner.value.borrow());
        self.set(next);
    }

    /// Mutate the value in place and notify subscribers unconditionally.
    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        f(&mut *self.inner.value.borrow_mut());
        self.notify();
    }

    /// Schedule every current subscriber.
    fn notify(&self) {
        let subscribers = self.inner.subscribers.snapshot();
        tracing::trace!(
            signal = self.inner.id,
            subscribers = subscribers.len(),
            "signal changed"
        );
        for subscriber in &subscribers {
            UpdateScheduler::schedule(subscriber);
        }
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Check if the given computation currently depends on this signal.
    pub fn has_subscriber(&self, id: super::ComputationId) -> bool {
        self.inner.subscribers.contains(id)
    }

    /// Split into read and write halves sharing this signal.
    pub fn split(self) -> (ReadSignal<T>, WriteSignal<T>) {
        (
            ReadSignal {
                signal: self.clone(),
            },
            WriteSignal { signal: self },
        )
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// The getter half of a signal.
pub struct ReadSignal<T: 'static> {
    signal: Signal<T>,
}

impl<T: 'static> ReadSignal<T> {
    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.signal.subscriber_count()
    }
}

impl<T: Clone + 'static> ReadSignal<T> {
    /// Get the current value, tracking the read.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }
}

impl<T: 'static> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

/// The setter half of a signal.
pub struct WriteSignal<T: 'static> {
    signal: Signal<T>,
}

impl<T: 'static> WriteSignal<T> {
    /// Set a new value; see [`Signal::set`].
    pub fn set(&self, value: T) {
        self.signal.set(value);
    }

    /// Apply an updater to the current value; see [`Signal::update`].
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        self.signal.update(f);
    }

    /// Mutate in place and notify; see [`Signal::modify`].
    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        self.signal.modify(f);
    }
}

impl<T: 'static> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

/// Create a signal and return its getter and setter.
pub fn create_signal<T: SameValue + 'static>(value: T) -> (ReadSignal<T>, WriteSignal<T>) {
    Signal::new(value).split()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Computation, ComputationKind};

    fn reader(signal: &Signal<i32>, count: &Rc<Cell<usize>>) -> Computation {
        let signal = signal.clone();
        let count = count.clone();
        Computation::new(ComputationKind::Effect, move || {
            signal.get();
            count.set(count.get() + 1);
            Ok(())
        })
    }

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn read_outside_computation_registers_nothing() {
        let signal = Signal::new(1);
        signal.get();
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn read_inside_computation_registers_both_edges() {
        let signal = Signal::new(1);
        let count = Rc::new(Cell::new(0));
        let computation = reader(&signal, &count);

        computation.run().unwrap();
        assert!(signal.has_subscriber(computation.id()));
        assert_eq!(computation.dependency_count(), 1);

        // Re-running does not duplicate the edge
        computation.run().unwrap();
        assert_eq!(signal.subscriber_count(), 1);
        assert_eq!(computation.dependency_count(), 1);
    }

    #[test]
    fn set_schedules_instead_of_running() {
        let signal = Signal::new(1);
        let count = Rc::new(Cell::new(0));
        let computation = reader(&signal, &count);
        computation.run().unwrap();

        signal.set(2);
        assert_eq!(count.get(), 1);
        assert!(UpdateScheduler::has_pending());

        UpdateScheduler::flush();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn equal_write_is_a_no_op() {
        let signal = Signal::new(7);
        let count = Rc::new(Cell::new(0));
        let computation = reader(&signal, &count);
        computation.run().unwrap();

        signal.set(7);
        signal.update(|v| *v);
        assert!(!UpdateScheduler::has_pending());
        assert_eq!(computation.run_count(), 1);
    }

    #[test]
    fn float_signals_use_same_value() {
        let signal = Signal::new(f64::NAN);
        let computation = Computation::new(ComputationKind::Effect, {
            let signal = signal.clone();
            move || {
                signal.get();
                Ok(())
            }
        });
        computation.run().unwrap();

        signal.set(f64::NAN);
        assert!(!UpdateScheduler::has_pending());

        signal.set(0.0);
        UpdateScheduler::flush();
        signal.set(-0.0);
        assert!(UpdateScheduler::has_pending());
        UpdateScheduler::flush();
    }

    #[test]
    fn custom_equality_and_modify() {
        let signal = Signal::with_equality(vec![1, 2], |a: &Vec<i32>, b: &Vec<i32>| a.len() == b.len());
        let count = Rc::new(Cell::new(0));
        let computation = Computation::new(ComputationKind::Effect, {
            let signal = signal.clone();
            let count = count.clone();
            move || {
                signal.with(|v| v.len());
                count.set(count.get() + 1);
                Ok(())
            }
        });
        computation.run().unwrap();

        signal.set(vec![3, 4]);
        assert!(!UpdateScheduler::has_pending());
        assert_eq!(signal.get_untracked(), vec![1, 2]);

        signal.modify(|v| v[0] = 9);
        UpdateScheduler::flush();
        assert_eq!(count.get(), 2);
        assert_eq!(signal.get_untracked(), vec![9, 2]);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
        assert_eq!(signal1.id(), signal2.id());
    }

    #[test]
    fn split_halves_share_state() {
        let (read, write) = create_signal(String::from("a"));
        write.set("b".to_string());
        assert_eq!(read.get(), "b");
        write.update(|s| format!("{s}c"));
        assert_eq!(read.get_untracked(), "bc");
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);
        let s3 = Signal::new(0);

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }
}
