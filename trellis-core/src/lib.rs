//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - A dependency graph with automatic subscription tracking
//! - A batching update scheduler with per-computation failure isolation
//! - A keyed reconciler that patches dynamic child regions of a host tree
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `graph`: Computation nodes and the update scheduler
//! - `dom`: The host-tree boundary, element construction and reconciliation
//! - `error` / `config`: Error taxonomy and runtime configuration
//!
//! The graph is single-threaded. Every thread has its own tracking context,
//! scheduler queue and configuration.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use trellis_core::{computed, create_signal, effect, Runtime};
//!
//! // Create a signal
//! let (count, set_count) = create_signal(0);
//!
//! // Create a derived value
//! let doubled = computed(move || count.get() * 2).unwrap();
//!
//! // Create an effect
//! let seen = Rc::new(Cell::new(0));
//! let seen_clone = seen.clone();
//! let reader = doubled.clone();
//! let _effect = effect(move || seen_clone.set(reader.get()));
//!
//! // Update the signal, then let the scheduler run dependents
//! set_count.set(5);
//! Runtime::flush();
//! assert_eq!(seen.get(), 10);
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::RuntimeConfig;
pub use dom::{bind_dynamic_children, mount, unmount, ElementBuilder, Host, Key, MemoryHost, View};
pub use error::{HostError, ReactiveError, Result};
pub use graph::{FlushReport, UpdateScheduler};
pub use reactive::{
    computed, create_signal, effect, untracked, use_effect, Cleanup, Effect, Memo, ReadSignal,
    Runtime, Signal, WriteSignal,
};
