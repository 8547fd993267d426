//! # call-guard
//!
//! Lifecycle-bound request cancellation and upload progress reporting for
//! HTTP client stacks.
//!
//! Two small components share one design pattern — observe an external
//! signal, fire a side effect exactly once, release the observation:
//!
//! - [`LifecycleGuard`] binds a cancellable operation handle and a
//!   result-delivery delegate to an external lifecycle (a UI component's
//!   active/destroyed state). Delegate events are forwarded while the
//!   lifecycle is alive; when it is destroyed the in-flight operation is
//!   cancelled and the guard detaches, exactly once, race-free.
//! - [`ProgressBody`] decorates an outbound request body, counting every
//!   byte written and reporting progress (including a terminal "done"
//!   signal) without altering the bytes delivered downstream.
//!
//! The crate deliberately stops there: request construction, serialization,
//! retries, and connection pooling belong to the HTTP transport collaborator
//! that originates the operation handle and drives the callbacks.
//!
//! ## Quick Start
//!
//! ```
//! use call_guard::{Callback, Lifecycle, LifecycleEvent, LifecycleGuard, OperationHandle};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! struct Call {
//!     cancelled: AtomicBool,
//! }
//!
//! impl OperationHandle for Call {
//!     fn cancel(&self) {
//!         self.cancelled.store(true, Ordering::SeqCst);
//!     }
//! }
//!
//! struct Screen;
//!
//! impl Callback for Screen {
//!     type Response = String;
//!     type Error = std::io::Error;
//!     fn on_start(&self) {}
//!     fn on_response(&self, response: String) {
//!         println!("rendered: {response}");
//!     }
//!     fn on_failure(&self, _error: std::io::Error) {}
//!     fn on_completed(&self) {}
//! }
//!
//! // On the UI thread: bind the in-flight call to the screen's lifecycle.
//! let lifecycle = Arc::new(Lifecycle::new());
//! let call = Arc::new(Call { cancelled: AtomicBool::new(false) });
//! let guard = LifecycleGuard::bind(Arc::clone(&call), Screen, &lifecycle);
//!
//! // The screen goes away before the response arrives:
//! lifecycle.dispatch(LifecycleEvent::Destroyed);
//! assert!(call.cancelled.load(Ordering::SeqCst));
//!
//! // Late transport events are swallowed, never rendered:
//! guard.on_response("stale".to_string());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Thread confinement enforcement
pub mod confinement;
/// Error types
pub mod error;
/// Lifecycle-bound request cancellation
pub mod guard;
/// Lifecycle sources, events, and observers
pub mod lifecycle;
/// Upload progress reporting for request bodies
pub mod progress;

// Re-export commonly used types
pub use confinement::{Confinement, ConfinementError};
pub use error::{Error, Result};
pub use guard::{Callback, LifecycleGuard, OperationHandle};
pub use lifecycle::{
    Lifecycle, LifecycleEvent, LifecycleObserver, LifecycleSource, ObserverId,
};
pub use progress::{BytesBody, ProgressBody, RequestBody, UploadListener};
