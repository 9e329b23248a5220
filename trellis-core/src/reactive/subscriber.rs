//! Subscriber identity and subscriber sets.
//!
//! A subscriber is any computation that depends on reactive values: effects,
//! memos, element bindings and dynamic child regions. Each signal owns one
//! [`SubscriberSet`]; each computation keeps weak back-references to every
//! set it is registered in so it can remove itself before its next run.

use std::cell::{Cell, RefCell};
use std::fmt;

use indexmap::IndexMap;

use crate::graph::{Computation, WeakComputation};

/// Unique identifier for a computation.
///
/// Each subscriber gets a unique ID when created. The ID is used to
/// deduplicate subscriptions and scheduled runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputationId(u64);

impl ComputationId {
    /// Generate a new unique computation ID.
    ///
    /// The counter is per thread, matching the single-threaded graph.
    pub fn new() -> Self {
        thread_local! {
            static COUNTER: Cell<u64> = const { Cell::new(0) };
        }
        COUNTER.with(|counter| {
            let id = counter.get();
            counter.set(id + 1);
            Self(id)
        })
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ComputationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ComputationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// The set of computations currently depending on one signal.
///
/// Entries are weak: a signal never keeps a computation alive. Insertion
/// order is kept so notifications schedule in subscription order.
#[derive(Default)]
pub(crate) struct SubscriberSet {
    entries: RefCell<IndexMap<ComputationId, WeakComputation>>,
}

impl SubscriberSet {
    /// Register a subscriber. Returns `true` if the edge is new.
    pub(crate) fn insert(&self, id: ComputationId, subscriber: WeakComputation) -> bool {
        let mut entries = self.entries.borrow_mut();
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(id, subscriber);
        true
    }

    pub(crate) fn remove(&self, id: ComputationId) {
        self.entries.borrow_mut().shift_remove(&id);
    }

    pub(crate) fn contains(&self, id: ComputationId) -> bool {
        self.entries.borrow().contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Live subscribers at this instant, pruning entries whose computation
    /// has been dropped.
    ///
    /// Returns a copy so callers may schedule (and thereby mutate the graph)
    /// while iterating.
    pub(crate) fn snapshot(&self) -> Vec<Computation> {
        let mut live = Vec::new();
        self.entries.borrow_mut().retain(|_, weak| match weak.upgrade() {
            Some(computation) => {
                live.push(computation);
                true
            }
            None => false,
        });
        live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ComputationKind;

    #[test]
    fn computation_ids_are_unique() {
        let id1 = ComputationId::new();
        let id2 = ComputationId::new();
        let id3 = ComputationId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
        assert!(id1 < id2);
        assert_eq!(format!("{}", id1), format!("c{}", id1.raw()));
    }

    #[test]
    fn insert_is_deduplicated() {
        let set = SubscriberSet::default();
        let computation = Computation::new(ComputationKind::Effect, || Ok(()));

        assert!(set.insert(computation.id(), computation.downgrade()));
        assert!(!set.insert(computation.id(), computation.downgrade()));
        assert_eq!(set.len(), 1);

        set.remove(computation.id());
        assert!(!set.contains(computation.id()));
    }

    #[test]
    fn snapshot_prunes_dropped_subscribers() {
        let set = SubscriberSet::default();
        let kept = Computation::new(ComputationKind::Effect, || Ok(()));
        let dropped = Computation::new(ComputationKind::Effect, || Ok(()));

        set.insert(kept.id(), kept.downgrade());
        set.insert(dropped.id(), dropped.downgrade());
        drop(dropped);

        let live = set.snapshot();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id(), kept.id());
        assert_eq!(set.len(), 1);
    }
}
