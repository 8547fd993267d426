//! Error types for call-guard
//!
//! The crate surfaces two failure classes: thread-confinement violations
//! (programmer errors, normally raised as panics by
//! [`Confinement::assert`](crate::Confinement::assert) but available here for
//! callers probing with [`Confinement::check`](crate::Confinement::check))
//! and I/O errors propagated unchanged from a request body write.

use thiserror::Error;

use crate::confinement::ConfinementError;

/// Result type alias for call-guard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for call-guard
#[derive(Debug, Error)]
pub enum Error {
    /// An operation ran on a thread other than the confined one
    #[error(transparent)]
    Confinement(#[from] ConfinementError),

    /// I/O error while writing a request body
    ///
    /// Write errors pass through untouched; progress already reported for
    /// bytes written before the failure stands.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
