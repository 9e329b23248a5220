//! Reactive Runtime
//!
//! The runtime is the per-thread facade over configuration, the error
//! channel and the scheduler's flush entry points.
//!
//! # Error channel
//!
//! Failures inside computations never propagate to the signal write that
//! triggered them. They are caught at the computation boundary and passed to
//! [`Runtime::report`], which logs them with `tracing` and forwards them to
//! the handler installed with [`Runtime::set_error_handler`], if any.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::RuntimeConfig;
use crate::error::ReactiveError;
use crate::graph::{FlushReport, UpdateScheduler};

type ErrorHandler = Rc<dyn Fn(&ReactiveError)>;

#[derive(Default)]
struct RuntimeState {
    config: RuntimeConfig,
    error_handler: Option<ErrorHandler>,
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::default());
}

/// The reactive runtime of the current thread.
pub struct Runtime;

impl Runtime {
    /// Install a configuration for this thread.
    pub fn configure(config: RuntimeConfig) {
        tracing::debug!(?config, "runtime configured");
        RUNTIME.with(|runtime| runtime.borrow_mut().config = config);
    }

    /// The configuration in effect on this thread.
    pub fn config() -> RuntimeConfig {
        RUNTIME
            .try_with(|runtime| runtime.borrow().config.clone())
            .unwrap_or_default()
    }

    /// Install a handler that observes every reported failure.
    pub fn set_error_handler(handler: impl Fn(&ReactiveError) + 'static) {
        RUNTIME.with(|runtime| runtime.borrow_mut().error_handler = Some(Rc::new(handler)));
    }

    /// Remove the error handler. Failures are still logged.
    pub fn clear_error_handler() {
        RUNTIME.with(|runtime| runtime.borrow_mut().error_handler = None);
    }

    /// Report a recovered failure.
    pub fn report(err: &ReactiveError) {
        tracing::error!(error = %err, "reactive computation failed");

        let handler = RUNTIME
            .try_with(|runtime| runtime.borrow().error_handler.clone())
            .ok()
            .flatten();
        if let Some(handler) = handler {
            handler(err);
        }
    }

    /// Run every pending computation now.
    pub fn flush() -> FlushReport {
        UpdateScheduler::flush()
    }

    /// Check if any computation is waiting for a flush.
    pub fn has_pending() -> bool {
        UpdateScheduler::has_pending()
    }
}
