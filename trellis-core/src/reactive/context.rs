//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (e.g., running a memo or effect), we push
//! the computation onto the stack. When the guard drops, we pop it, so the
//! previous computation is restored on every exit path including panics.
//!
//! An `untracked` section pushes an empty entry: reads inside it register
//! nothing, and the enclosing computation is restored afterwards.

use std::cell::RefCell;

use crate::graph::Computation;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Option<Computation>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    depth: usize,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given computation.
    ///
    /// While this context is active, any signals that are read will
    /// register the computation as a dependent.
    pub fn enter(computation: Computation) -> Self {
        Self::push(Some(computation))
    }

    /// Enter a context in which reads are not tracked.
    pub fn suspend() -> Self {
        Self::push(None)
    }

    fn push(entry: Option<Computation>) -> Self {
        let depth = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(entry);
            stack.len()
        });
        Self { depth }
    }

    /// Check if reads are currently being tracked.
    pub fn is_tracking() -> bool {
        CONTEXT_STACK.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
    }

    /// Get the computation currently being tracked, if any.
    pub fn current() -> Option<Computation> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned().flatten())
    }

    /// Number of nested contexts on this thread.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // The popped handle is dropped outside the borrow: it may be the
        // last reference, and disposal code can read signals.
        let popped = CONTEXT_STACK.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.len(),
                self.depth,
                "ReactiveContext mismatch: expected depth {}, got {}",
                self.depth,
                stack.len()
            );
            stack.pop()
        });
        drop(popped);
    }
}

/// Run `f` without registering any signal reads with the current computation.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::suspend();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ComputationKind;

    fn computation() -> Computation {
        Computation::new(ComputationKind::Effect, || Ok(()))
    }

    #[test]
    fn context_tracks_computation() {
        let c = computation();

        assert!(!ReactiveContext::is_tracking());
        assert!(ReactiveContext::current().is_none());

        {
            let _ctx = ReactiveContext::enter(c.clone());

            assert!(ReactiveContext::is_tracking());
            assert_eq!(ReactiveContext::current().map(|c| c.id()), Some(c.id()));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_tracking());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn nested_contexts() {
        let c1 = computation();
        let c2 = computation();

        {
            let _ctx1 = ReactiveContext::enter(c1.clone());
            assert_eq!(ReactiveContext::current().map(|c| c.id()), Some(c1.id()));

            {
                let _ctx2 = ReactiveContext::enter(c2.clone());
                assert_eq!(ReactiveContext::current().map(|c| c.id()), Some(c2.id()));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current().map(|c| c.id()), Some(c1.id()));
        }

        assert!(ReactiveContext::current().is_none());
    }

    #[test]
    fn untracked_hides_the_current_computation() {
        let c = computation();
        let _ctx = ReactiveContext::enter(c.clone());

        let inside = untracked(|| ReactiveContext::current().map(|c| c.id()));
        assert_eq!(inside, None);
        assert_eq!(ReactiveContext::current().map(|c| c.id()), Some(c.id()));
    }

    #[test]
    fn context_restored_after_panic() {
        let outer = computation();
        let inner = computation();
        let _ctx = ReactiveContext::enter(outer.clone());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ReactiveContext::enter(inner.clone());
            panic!("test panic");
        }));

        assert!(result.is_err());
        assert_eq!(ReactiveContext::current().map(|c| c.id()), Some(outer.id()));
        assert_eq!(ReactiveContext::depth(), 1);
    }
}
