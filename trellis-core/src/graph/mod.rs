//! Dependency Graph
//!
//! This module holds the two moving parts of the dependency graph: the
//! computation nodes and the scheduler that re-runs them.
//!
//! # Overview
//!
//! Edges are not stored in a central table. Each signal owns the set of
//! computations that read it during their last run, and each computation
//! keeps weak back-references to those sets:
//!
//! - Signal -> subscribers: who to schedule when the value changes
//! - Computation -> sources: which sets to leave before the next run
//!
//! # Design Decisions
//!
//! 1. Edges are rebuilt on every run. A computation unsubscribes from all of
//!    its sources, then re-registers whatever it reads. Conditional reads
//!    therefore never leave stale edges.
//!
//! 2. Signals and the scheduler hold weak references only. A computation lives
//!    exactly as long as its owner (an effect, a memo, an element binding or a
//!    dynamic region) keeps a handle to it.
//!
//! 3. Everything is single-threaded and per thread. No locks are needed, but
//!    every iteration over shared state works on a snapshot so computations
//!    may schedule, subscribe and dispose while others are being notified.

mod node;
mod scheduler;

pub use node::{Computation, ComputationKind};
pub(crate) use node::WeakComputation;
pub use scheduler::{FlushReport, UpdateScheduler};
