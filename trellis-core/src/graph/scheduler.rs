//! Update Scheduler
//!
//! The scheduler collects computations invalidated by signal writes and runs
//! them once per flush, deduplicated.
//!
//! # Algorithm
//!
//! 1. `schedule` appends a computation to the pending queue unless it is
//!    already there. The first addition after a flush wakes the driver.
//! 2. `flush` takes the whole queue as one pass and runs it in
//!    first-scheduled order. Each run is isolated: a failure is reported and
//!    the rest of the pass continues.
//! 3. Writes made during a pass schedule into the next pass of the same
//!    flush. A computation still waiting in the current pass is not queued
//!    again.
//! 4. Passes repeat until the queue is empty, bounded by
//!    `RuntimeConfig::max_flush_passes`.
//!
//! # Driving
//!
//! A host loop can call [`UpdateScheduler::flush`] at its own yield points.
//! Under tokio, spawn [`UpdateScheduler::drive`] on a `LocalSet` instead: it
//! sleeps until something is scheduled and flushes at the next task-yield
//! point, so every synchronous stretch of writes coalesces into one flush.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;
use tokio::sync::Notify;

use crate::error::ReactiveError;
use crate::reactive::{ComputationId, Runtime};

use super::node::{Computation, WeakComputation};

#[derive(Default)]
struct SchedulerState {
    /// Computations waiting for the next pass, in first-scheduled order.
    pending: IndexMap<ComputationId, WeakComputation>,
    /// Computations of the running pass that have not run yet.
    in_pass: HashSet<ComputationId>,
    flushing: bool,
    waker: Option<Rc<Notify>>,
}

thread_local! {
    static SCHEDULER: RefCell<SchedulerState> = RefCell::new(SchedulerState::default());
}

/// Outcome of one [`UpdateScheduler::flush`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Computations that ran to completion.
    pub ran: usize,
    /// Passes executed, including cascades triggered during the flush.
    pub passes: usize,
    /// Failures raised during the flush, already reported.
    pub errors: Vec<ReactiveError>,
}

impl FlushReport {
    /// Number of computations that failed.
    pub fn failed(&self) -> usize {
        self.errors
            .iter()
            .filter(|err| !matches!(err, ReactiveError::FlushLimitExceeded { .. }))
            .count()
    }
}

/// Resets the flushing flag on every exit path.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let _ = SCHEDULER.try_with(|state| {
            let mut state = state.borrow_mut();
            state.flushing = false;
            state.in_pass.clear();
        });
    }
}

/// The per-thread update scheduler.
pub struct UpdateScheduler;

impl UpdateScheduler {
    /// Queue a computation for the next flush.
    ///
    /// Scheduling the same computation twice before it runs queues it once.
    /// Disposed computations are ignored.
    pub fn schedule(computation: &Computation) {
        if computation.is_disposed() {
            return;
        }
        let id = computation.id();

        let wake = SCHEDULER.with(|state| {
            let mut state = state.borrow_mut();
            if state.in_pass.contains(&id) || state.pending.contains_key(&id) {
                return None;
            }
            let first = state.pending.is_empty();
            state.pending.insert(id, computation.downgrade());
            tracing::trace!(%id, pending = state.pending.len(), "scheduled computation");

            if first && !state.flushing {
                state.waker.clone()
            } else {
                None
            }
        });

        if let Some(waker) = wake {
            waker.notify_one();
        }
    }

    /// Remove a computation from the queue, if present.
    pub fn cancel(id: ComputationId) {
        let _ = SCHEDULER.try_with(|state| {
            if let Ok(mut state) = state.try_borrow_mut() {
                state.pending.shift_remove(&id);
                state.in_pass.remove(&id);
            }
        });
    }

    /// Check if any computation is waiting to run.
    pub fn has_pending() -> bool {
        SCHEDULER.with(|state| !state.borrow().pending.is_empty())
    }

    /// Number of computations waiting to run.
    pub fn pending_count() -> usize {
        SCHEDULER.with(|state| state.borrow().pending.len())
    }

    /// Check if a flush is in progress on this thread.
    pub fn is_flushing() -> bool {
        SCHEDULER.with(|state| state.borrow().flushing)
    }

    /// Run every pending computation, draining cascades to a fixed point.
    ///
    /// Calling `flush` from inside a running computation does nothing: the
    /// active flush already drains whatever that computation schedules.
    pub fn flush() -> FlushReport {
        let already_flushing =
            SCHEDULER.with(|state| std::mem::replace(&mut state.borrow_mut().flushing, true));
        if already_flushing {
            tracing::warn!("flush requested while a flush is running; deferring to the active flush");
            return FlushReport::default();
        }
        let _guard = FlushGuard;

        let max_passes = Runtime::config().max_flush_passes;
        let mut report = FlushReport::default();

        loop {
            let batch = SCHEDULER.with(|state| {
                let mut state = state.borrow_mut();
                let batch = std::mem::take(&mut state.pending);
                state.in_pass = batch.keys().copied().collect();
                batch
            });
            if batch.is_empty() {
                break;
            }

            if report.passes == max_passes {
                let err = ReactiveError::FlushLimitExceeded {
                    passes: max_passes,
                    dropped: batch.len(),
                };
                Runtime::report(&err);
                report.errors.push(err);
                break;
            }
            report.passes += 1;

            for (id, weak) in batch {
                let still_queued = SCHEDULER.with(|state| state.borrow_mut().in_pass.remove(&id));
                if !still_queued {
                    continue;
                }
                let Some(computation) = weak.upgrade() else {
                    continue;
                };
                if computation.is_disposed() {
                    continue;
                }

                match computation.run() {
                    Ok(()) => report.ran += 1,
                    Err(err) => {
                        Runtime::report(&err);
                        report.errors.push(err);
                    }
                }
            }
        }

        tracing::debug!(
            ran = report.ran,
            passes = report.passes,
            failed = report.errors.len(),
            "flush complete"
        );
        report
    }

    /// Flush whenever something is scheduled.
    ///
    /// Runs forever; spawn it with `tokio::task::spawn_local`. The first
    /// `schedule` after a flush wakes the driver, which flushes once the
    /// scheduling task yields.
    pub async fn drive() {
        let waker = SCHEDULER.with(|state| {
            state
                .borrow_mut()
                .waker
                .get_or_insert_with(|| Rc::new(Notify::new()))
                .clone()
        });

        loop {
            if !Self::has_pending() {
                waker.notified().await;
            }
            Self::flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::graph::ComputationKind;

    fn counting(count: &Rc<Cell<usize>>) -> Computation {
        let count = count.clone();
        Computation::new(ComputationKind::Effect, move || {
            count.set(count.get() + 1);
            Ok(())
        })
    }

    #[test]
    fn scheduling_twice_runs_once() {
        let count = Rc::new(Cell::new(0));
        let computation = counting(&count);

        UpdateScheduler::schedule(&computation);
        UpdateScheduler::schedule(&computation);
        assert_eq!(UpdateScheduler::pending_count(), 1);

        let report = UpdateScheduler::flush();
        assert_eq!(count.get(), 1);
        assert_eq!(report.ran, 1);
        assert_eq!(report.passes, 1);
        assert!(!UpdateScheduler::has_pending());
    }

    #[test]
    fn runs_in_first_scheduled_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let make = |name: &'static str| {
            let order = order.clone();
            Computation::new(ComputationKind::Effect, move || {
                order.borrow_mut().push(name);
                Ok(())
            })
        };
        let a = make("a");
        let b = make("b");
        let c = make("c");

        UpdateScheduler::schedule(&b);
        UpdateScheduler::schedule(&c);
        UpdateScheduler::schedule(&a);
        UpdateScheduler::schedule(&b);
        UpdateScheduler::flush();

        assert_eq!(*order.borrow(), vec!["b", "c", "a"]);
    }

    #[test]
    fn failures_are_isolated() {
        let count = Rc::new(Cell::new(0));
        let failing = Computation::new(ComputationKind::Effect, || panic!("first fails"));
        let healthy = counting(&count);

        UpdateScheduler::schedule(&failing);
        UpdateScheduler::schedule(&healthy);
        let report = UpdateScheduler::flush();

        assert_eq!(count.get(), 1);
        assert_eq!(report.ran, 1);
        assert_eq!(report.failed(), 1);
        assert!(!UpdateScheduler::is_flushing());
    }

    #[test]
    fn disposed_entries_are_skipped() {
        let count = Rc::new(Cell::new(0));
        let computation = counting(&count);

        UpdateScheduler::schedule(&computation);
        computation.dispose();
        assert_eq!(UpdateScheduler::pending_count(), 0);

        UpdateScheduler::schedule(&computation);
        UpdateScheduler::flush();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn dropped_entries_are_skipped() {
        let count = Rc::new(Cell::new(0));
        let computation = counting(&count);

        UpdateScheduler::schedule(&computation);
        drop(computation);

        let report = UpdateScheduler::flush();
        assert_eq!(count.get(), 0);
        assert_eq!(report.ran, 0);
    }

    #[test]
    fn scheduling_during_flush_runs_in_a_second_pass() {
        let count = Rc::new(Cell::new(0));
        let follower = counting(&count);
        let follower_clone = follower.clone();

        let leader = Computation::new(ComputationKind::Effect, move || {
            UpdateScheduler::schedule(&follower_clone);
            Ok(())
        });

        UpdateScheduler::schedule(&leader);
        let report = UpdateScheduler::flush();

        assert_eq!(count.get(), 1);
        assert_eq!(report.passes, 2);
        assert_eq!(report.ran, 2);
    }

    #[test]
    fn entry_still_pending_in_the_pass_is_not_requeued() {
        let count = Rc::new(Cell::new(0));
        let follower = counting(&count);
        let follower_clone = follower.clone();

        let leader = Computation::new(ComputationKind::Effect, move || {
            UpdateScheduler::schedule(&follower_clone);
            Ok(())
        });

        UpdateScheduler::schedule(&leader);
        UpdateScheduler::schedule(&follower);
        let report = UpdateScheduler::flush();

        assert_eq!(count.get(), 1);
        assert_eq!(report.passes, 1);
    }

    #[test]
    fn runaway_cascade_is_bounded() {
        let slot: Rc<RefCell<Option<Computation>>> = Rc::new(RefCell::new(None));
        let slot_clone = slot.clone();
        let looping = Computation::new(ComputationKind::Effect, move || {
            if let Some(me) = slot_clone.borrow().as_ref() {
                me.schedule();
            }
            Ok(())
        });
        *slot.borrow_mut() = Some(looping.clone());

        looping.schedule();
        let report = UpdateScheduler::flush();

        let max = Runtime::config().max_flush_passes;
        assert_eq!(report.passes, max);
        assert_eq!(report.ran, max);
        assert!(matches!(
            report.errors.last(),
            Some(ReactiveError::FlushLimitExceeded { dropped: 1, .. })
        ));
        // Hitting the bound is not a computation failure
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.failed(), 0);
        assert!(!UpdateScheduler::has_pending());
        slot.borrow_mut().take();
    }

    #[test]
    fn nested_flush_is_ignored() {
        let inner_report = Rc::new(RefCell::new(None));
        let inner_clone = inner_report.clone();
        let computation = Computation::new(ComputationKind::Effect, move || {
            *inner_clone.borrow_mut() = Some(UpdateScheduler::flush());
            Ok(())
        });

        computation.schedule();
        UpdateScheduler::flush();
        assert_eq!(inner_report.borrow().as_ref(), Some(&FlushReport::default()));
    }
}
