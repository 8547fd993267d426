//! Lifecycle-bound request cancellation
//!
//! [`LifecycleGuard`] sits between an HTTP transport and application code. It
//! forwards delegate callbacks while the bound lifecycle is alive, and when
//! the lifecycle is destroyed it cancels the in-flight operation and detaches
//! itself. Whichever of "operation completed" and "lifecycle destroyed"
//! happens first wins; the other is a silent no-op, so the delegate never
//! hears from a request whose owner is already gone and the operation is
//! cancelled at most once.
//!
//! All guard operations are confined to the lifecycle's thread and enforced
//! at runtime; see [`crate::confinement`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use crate::confinement::Confinement;
use crate::lifecycle::{LifecycleEvent, LifecycleObserver, LifecycleSource, ObserverId};

/// Handle to a cancellable in-flight operation
///
/// Collaborator contract: `cancel` must be idempotent, safe to call from any
/// thread, and a no-op once the operation has finished. Cancelling an
/// already-completed operation is never an error.
pub trait OperationHandle: Send + Sync {
    /// Cancel the in-flight operation
    fn cancel(&self);
}

impl<T: OperationHandle + ?Sized> OperationHandle for Arc<T> {
    fn cancel(&self) {
        (**self).cancel();
    }
}

/// Result-delivery sink for an in-flight call
///
/// The transport invokes these in order: `on_start` once when the request is
/// dispatched, then exactly one of `on_response` / `on_failure`, then
/// `on_completed`. All invocations happen on the confined thread.
pub trait Callback: Send + Sync {
    /// Successful response payload
    type Response;
    /// Failure payload
    type Error;

    /// The request was handed to the transport
    fn on_start(&self);

    /// A response arrived
    fn on_response(&self, response: Self::Response);

    /// The request failed
    fn on_failure(&self, error: Self::Error);

    /// Terminal event: no further callbacks follow
    fn on_completed(&self);
}

impl<C: Callback + ?Sized> Callback for Arc<C> {
    type Response = C::Response;
    type Error = C::Error;

    fn on_start(&self) {
        (**self).on_start();
    }

    fn on_response(&self, response: Self::Response) {
        (**self).on_response(response);
    }

    fn on_failure(&self, error: Self::Error) {
        (**self).on_failure(error);
    }

    fn on_completed(&self) {
        (**self).on_completed();
    }
}

/// Binds an in-flight call and its delegate to an external lifecycle
///
/// Created when a request is dispatched on behalf of a lifecycle-bound
/// caller. The guard owns the operation handle exclusively, owns the
/// delegate, and holds only a weak back reference to the lifecycle source
/// (used to register and unregister observation, never to keep the source
/// alive).
///
/// The `fired` flag is the exactly-once latch: once it is set, no delegate
/// event is forwarded and the operation has been (or is being) cancelled. It
/// stays a real atomic even though the guard is thread-confined, documenting
/// the intended single-winner semantics and keeping them correct should
/// dispatch ever become cross-thread.
///
/// # Examples
///
/// ```
/// use call_guard::{Callback, Lifecycle, LifecycleEvent, LifecycleGuard, OperationHandle};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Call {
///     cancelled: AtomicBool,
/// }
///
/// impl OperationHandle for Call {
///     fn cancel(&self) {
///         self.cancelled.store(true, Ordering::SeqCst);
///     }
/// }
///
/// struct Ui;
///
/// impl Callback for Ui {
///     type Response = String;
///     type Error = std::io::Error;
///     fn on_start(&self) {}
///     fn on_response(&self, _response: String) {}
///     fn on_failure(&self, _error: std::io::Error) {}
///     fn on_completed(&self) {}
/// }
///
/// let lifecycle = Arc::new(Lifecycle::new());
/// let call = Arc::new(Call { cancelled: AtomicBool::new(false) });
/// let guard = LifecycleGuard::bind(Arc::clone(&call), Ui, &lifecycle);
///
/// // The transport delivers events through the guard:
/// guard.on_start();
/// guard.on_response("hello".to_string());
/// guard.on_completed();
///
/// // Teardown after normal completion is a no-op:
/// lifecycle.dispatch(LifecycleEvent::Destroyed);
/// assert!(!call.cancelled.load(Ordering::SeqCst));
/// ```
pub struct LifecycleGuard<H, C, S: ?Sized> {
    handle: H,
    delegate: C,
    source: Weak<S>,
    fired: AtomicBool,
    confinement: Confinement,
    observer_id: OnceLock<ObserverId>,
}

impl<H, C, S> LifecycleGuard<H, C, S>
where
    H: OperationHandle + 'static,
    C: Callback + 'static,
    S: LifecycleSource + 'static,
{
    /// Bind `handle` and `delegate` to `source`
    ///
    /// Must run on the source's confined thread. If the source is already
    /// destroyed the guard cancels the handle synchronously and registers no
    /// observer: registering on a dead source would never deliver the
    /// terminal event, which would leak the observation and keep a doomed
    /// request running.
    ///
    /// # Panics
    ///
    /// Panics when called from a non-confined thread.
    pub fn bind(handle: H, delegate: C, source: &Arc<S>) -> Arc<Self> {
        let confinement = source.confinement();
        confinement.assert("LifecycleGuard::bind");

        let guard = Arc::new(Self {
            handle,
            delegate,
            source: Arc::downgrade(source),
            fired: AtomicBool::new(false),
            confinement,
            observer_id: OnceLock::new(),
        });

        if source.is_destroyed() {
            tracing::debug!("lifecycle already destroyed at bind; cancelling call");
            guard.fired.store(true, Ordering::SeqCst);
            guard.handle.cancel();
        } else {
            let id = source.add_observer(
                Arc::downgrade(&guard) as Weak<dyn LifecycleObserver>
            );
            // Set before bind returns; transitions cannot interleave on the
            // confined thread.
            let _ = guard.observer_id.set(id);
        }

        guard
    }

    /// Whether the guard has fired
    ///
    /// True once the terminal lifecycle transition has won (or the source was
    /// already destroyed at bind). A fired guard forwards nothing.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    fn unregister(&self) {
        if let (Some(source), Some(id)) = (self.source.upgrade(), self.observer_id.get()) {
            source.remove_observer(*id);
        }
    }
}

impl<H, C, S> Callback for LifecycleGuard<H, C, S>
where
    H: OperationHandle + 'static,
    C: Callback + 'static,
    S: LifecycleSource + 'static,
{
    type Response = C::Response;
    type Error = C::Error;

    fn on_start(&self) {
        self.confinement.assert("on_start");
        if !self.fired.load(Ordering::SeqCst) {
            self.delegate.on_start();
        }
    }

    fn on_response(&self, response: Self::Response) {
        self.confinement.assert("on_response");
        if !self.fired.load(Ordering::SeqCst) {
            self.delegate.on_response(response);
        }
    }

    fn on_failure(&self, error: Self::Error) {
        self.confinement.assert("on_failure");
        if !self.fired.load(Ordering::SeqCst) {
            self.delegate.on_failure(error);
        }
    }

    fn on_completed(&self) {
        self.confinement.assert("on_completed");
        if !self.fired.load(Ordering::SeqCst) {
            self.delegate.on_completed();
            // Finished normally; nothing left to watch for. Note the flag is
            // NOT set here: once unregistered and completed no further event
            // can reach this guard.
            self.unregister();
        }
    }
}

impl<H, C, S> LifecycleObserver for LifecycleGuard<H, C, S>
where
    H: OperationHandle + 'static,
    C: Callback + 'static,
    S: LifecycleSource + 'static,
{
    fn on_transition(&self, event: LifecycleEvent) {
        self.confinement.assert("on_transition");
        if event.is_terminal()
            && self
                .fired
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            tracing::debug!("lifecycle destroyed; cancelling in-flight call");
            self.handle.cancel();
            self.unregister();
        }
    }
}
