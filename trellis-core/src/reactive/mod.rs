//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, and effects.
//! These primitives form the foundation of Trellis's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal automatically
//! registers that context as a dependent. When the signal's value changes, all
//! dependents are scheduled.
//!
//! ## Memos
//!
//! A Memo is a derived value backed by a private signal. It re-evaluates when
//! one of its dependencies changes and only wakes its own dependents when the
//! result actually differs.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its dependencies
//! change. Effects are used to synchronize reactive state with external systems,
//! such as updating the host tree or logging.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a signal is read, we check if there is an active
//! tracking context and, if so, register the dependency.
//!
//! Updates are never applied synchronously: writes schedule dependents, and
//! [`Runtime::flush`] (or the async driver) runs them once per batch.

mod context;
mod effect;
mod memo;
mod runtime;
mod same_value;
mod signal;
mod subscriber;

pub use context::{untracked, ReactiveContext};
pub use effect::{effect, use_effect, Cleanup, Effect, IntoCleanup};
pub use memo::{computed, Memo};
pub use runtime::Runtime;
pub use same_value::SameValue;
pub use signal::{create_signal, ReadSignal, Signal, WriteSignal};
pub use subscriber::ComputationId;
pub(crate) use subscriber::SubscriberSet;
