//! Thread confinement for lifecycle-bound callbacks
//!
//! Guard operations are only valid on the thread that owns the lifecycle
//! (typically a UI or main thread). [`Confinement`] captures that thread when
//! the lifecycle source is created and lets callers verify the invariant at
//! runtime: [`Confinement::check`] as a non-panicking probe,
//! [`Confinement::assert`] as the fail-fast precondition used throughout the
//! guard. Violations are programmer errors, never retried.

use std::thread::{self, ThreadId};
use thiserror::Error;

/// A guard operation was invoked from a thread other than the confined one
///
/// The message names the offending operation and both threads so the
/// violating call site is identifiable from the panic alone.
#[derive(Clone, Debug, Error)]
#[error("cannot invoke `{operation}` from {actual}; confined to {expected}")]
pub struct ConfinementError {
    /// The operation that was invoked off the confined thread
    pub operation: &'static str,
    /// Description of the confined thread
    pub expected: String,
    /// Description of the thread that made the call
    pub actual: String,
}

/// Handle to the single thread a component is confined to
///
/// Cheap to clone; comparing is by [`ThreadId`], so a `Confinement` stays
/// valid for the lifetime of the process regardless of what the thread is
/// later renamed to.
#[derive(Clone, Debug)]
pub struct Confinement {
    thread: ThreadId,
    name: Option<String>,
}

impl Confinement {
    /// Capture the calling thread as the confined thread
    #[must_use]
    pub fn current() -> Self {
        let current = thread::current();
        Self {
            thread: current.id(),
            name: current.name().map(String::from),
        }
    }

    /// Whether the calling thread is the confined thread
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread
    }

    /// Verify that the calling thread is the confined thread
    ///
    /// # Errors
    ///
    /// Returns [`ConfinementError`] naming `operation` when called from any
    /// other thread.
    pub fn check(&self, operation: &'static str) -> Result<(), ConfinementError> {
        let current = thread::current();
        if current.id() == self.thread {
            return Ok(());
        }
        Err(ConfinementError {
            operation,
            expected: describe(self.thread, self.name.as_deref()),
            actual: describe(current.id(), current.name()),
        })
    }

    /// Fail-fast variant of [`check`](Self::check)
    ///
    /// # Panics
    ///
    /// Panics with the [`ConfinementError`] message when called from a
    /// non-confined thread. This is the precondition enforcement used by
    /// [`LifecycleGuard`](crate::LifecycleGuard); the violation is surfaced
    /// before any side effect runs.
    pub fn assert(&self, operation: &'static str) {
        if let Err(e) = self.check(operation) {
            panic!("{e}");
        }
    }
}

fn describe(id: ThreadId, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("thread {id:?} ({name})"),
        None => format!("thread {id:?}"),
    }
}
