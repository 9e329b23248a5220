//! Error types for the reactive runtime and the host-tree boundary.
//!
//! Every failure here is recoverable: the runtime isolates it at the
//! computation that raised it and reports it through
//! [`Runtime::report`](crate::reactive::Runtime::report).

use thiserror::Error;

use crate::reactive::ComputationId;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Failures raised while tracking, flushing or reconciling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    #[error("computation {id} panicked: {message}")]
    ComputationPanicked { id: ComputationId, message: String },

    #[error("computation {id} attempted to run while already running")]
    ReentrantRun { id: ComputationId },

    #[error("flush exceeded {passes} passes; dropped {dropped} pending computations")]
    FlushLimitExceeded { passes: usize, dropped: usize },

    #[error("host operation failed: {0}")]
    Host(#[from] HostError),

    #[error("invalid runtime configuration: {0}")]
    Config(String),
}

impl ReactiveError {
    /// Build a `ComputationPanicked` from a caught panic payload.
    pub(crate) fn from_panic(id: ComputationId, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        ReactiveError::ComputationPanicked { id, message }
    }
}

/// Failures reported by a [`Host`](crate::dom::Host) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("unknown node {0}")]
    UnknownNode(String),

    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: String, child: String },

    #[error("inserting {node} under {parent} would create a cycle")]
    WouldCycle { parent: String, node: String },
}
