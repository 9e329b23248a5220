//! Memo Implementation
//!
//! A Memo is a derived value. It wraps its function in a computation that
//! writes the result into a private signal on every run; reading the memo
//! reads that signal.
//!
//! # How Memos Work
//!
//! 1. On creation, the function runs once inside a tracking context and the
//!    result seeds the private signal.
//!
//! 2. When a dependency changes, the computation is scheduled like any other
//!    and re-runs on the next flush.
//!
//! 3. The new result is written with `set`, so an unchanged result (by
//!    [`SameValue`]) does not wake the memo's own dependents.
//!
//! Reading a memo inside another computation creates a dependency edge
//! exactly as reading a plain signal would.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use crate::error::{ReactiveError, Result};
use crate::graph::{Computation, ComputationKind};

use super::same_value::SameValue;
use super::signal::Signal;

/// A derived value that recomputes when its dependencies change.
///
/// Clones share the same computation. Dropping the last clone disposes it.
pub struct Memo<T: 'static> {
    signal: Signal<T>,
    computation: Computation,
}

impl<T> Memo<T>
where
    T: SameValue + 'static,
{
    /// Create a memo, running `compute` once to obtain the initial value.
    ///
    /// Fails if that first run fails; later failures are reported through
    /// the runtime and keep the last good value.
    pub fn new<F>(mut compute: F) -> Result<Self>
    where
        F: FnMut() -> T + 'static,
    {
        let slot: Rc<RefCell<Option<Signal<T>>>> = Rc::new(RefCell::new(None));
        let body_slot = slot.clone();

        let computation = Computation::new(ComputationKind::Memo, move || {
            let value = compute();
            let existing = body_slot.borrow().clone();
            match existing {
                Some(signal) => signal.set(value),
                None => *body_slot.borrow_mut() = Some(Signal::new(value)),
            }
            Ok(())
        });

        computation.run()?;
        let signal = slot.borrow().clone().ok_or_else(|| ReactiveError::ComputationPanicked {
            id: computation.id(),
            message: "memo produced no initial value".to_string(),
        })?;

        Ok(Self {
            signal,
            computation,
        })
    }
}

impl<T: 'static> Memo<T> {
    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    /// The computation backing this memo.
    pub fn computation(&self) -> &Computation {
        &self.computation
    }

    /// Stop recomputing. The last value stays readable.
    pub fn dispose(&self) {
        self.computation.dispose();
    }

    /// Get the number of dependents.
    pub fn dependent_count(&self) -> usize {
        self.signal.subscriber_count()
    }
}

impl<T: Clone + 'static> Memo<T> {
    /// Get the current value.
    ///
    /// Inside a computation this registers a dependency on the memo.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }
}

impl<T: 'static> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            computation: self.computation.clone(),
        }
    }
}

impl<T: Debug + 'static> Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("value", &self.signal)
            .field("computation", &self.computation)
            .finish()
    }
}

/// Create a [`Memo`] from `compute`.
pub fn computed<T, F>(compute: F) -> Result<Memo<T>>
where
    T: SameValue + 'static,
    F: FnMut() -> T + 'static,
{
    Memo::new(compute)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
