//! Lifecycle sources, events, and observer registration
//!
//! A [`LifecycleSource`] models the external lifecycle a request is bound to:
//! a UI component that is created, becomes active, and is eventually
//! destroyed. Observers register to receive [`LifecycleEvent`] transitions
//! through an explicit [`LifecycleObserver::on_transition`] method; the
//! terminal `Destroyed` event is the signal
//! [`LifecycleGuard`](crate::LifecycleGuard) acts on.
//!
//! [`Lifecycle`] is the crate's in-memory implementation. It is confined to
//! the thread that created it: all transitions must be dispatched from that
//! thread, which is what makes observer notification deterministic.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, Weak};

use crate::confinement::Confinement;

/// Event emitted when a lifecycle source changes state
///
/// Mirrors the usual UI component lifecycle. Only [`Destroyed`]
/// (`LifecycleEvent::Destroyed`) is terminal; every other event is forwarded
/// to observers and otherwise ignored by the guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Component constructed, not yet visible
    Created,
    /// Component became visible
    Started,
    /// Component is in the foreground and interactive
    Resumed,
    /// Component lost foreground
    Paused,
    /// Component is no longer visible
    Stopped,
    /// Component torn down; terminal, no further events follow
    Destroyed,
}

impl LifecycleEvent {
    /// Whether this event ends the lifecycle
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleEvent::Destroyed)
    }
}

/// Identifier returned by [`LifecycleSource::add_observer`]
///
/// Used to unregister the observation later. Ids are unique per source and
/// never reused.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ObserverId(pub u64);

impl ObserverId {
    /// Create a new ObserverId
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiver of lifecycle transitions
///
/// One explicit method rather than per-event callbacks: observers that only
/// care about the terminal transition (like the guard) match on the event.
pub trait LifecycleObserver: Send + Sync {
    /// Called on the confined thread for every state change of the source
    fn on_transition(&self, event: LifecycleEvent);
}

/// An observable external lifecycle
///
/// Implementations must deliver events on their confined thread and must
/// answer [`is_destroyed`](Self::is_destroyed) synchronously: registering on
/// an already-destroyed source would never yield the terminal event, so
/// callers short-circuit on the predicate instead.
pub trait LifecycleSource: Send + Sync {
    /// The thread this source (and everything bound to it) is confined to
    fn confinement(&self) -> Confinement;

    /// Whether the source has already reached its terminal state
    fn is_destroyed(&self) -> bool;

    /// Register an observer; returns the id needed to unregister it
    ///
    /// Observers are held weakly, so a dropped observer is pruned rather
    /// than leaked.
    fn add_observer(&self, observer: Weak<dyn LifecycleObserver>) -> ObserverId;

    /// Unregister a previously added observer
    ///
    /// Removing an id that is absent (already removed, never added) is a
    /// no-op.
    fn remove_observer(&self, id: ObserverId);
}

/// In-memory lifecycle source confined to its creating thread
///
/// # Examples
///
/// ```
/// use call_guard::{Lifecycle, LifecycleEvent, LifecycleSource};
///
/// let lifecycle = Lifecycle::new();
/// assert!(!lifecycle.is_destroyed());
///
/// lifecycle.dispatch(LifecycleEvent::Started);
/// lifecycle.dispatch(LifecycleEvent::Destroyed);
/// assert!(lifecycle.is_destroyed());
/// ```
pub struct Lifecycle {
    confinement: Confinement,
    destroyed: AtomicBool,
    next_id: AtomicU64,
    observers: Mutex<Vec<(ObserverId, Weak<dyn LifecycleObserver>)>>,
}

impl Lifecycle {
    /// Create a lifecycle source confined to the calling thread
    #[must_use]
    pub fn new() -> Self {
        Self {
            confinement: Confinement::current(),
            destroyed: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Dispatch a state change to all registered observers
    ///
    /// Must run on the confined thread. A terminal event marks the source
    /// destroyed before observers are notified, so re-entrant queries from
    /// [`on_transition`](LifecycleObserver::on_transition) see the final
    /// state.
    ///
    /// # Panics
    ///
    /// Panics when called from a non-confined thread.
    pub fn dispatch(&self, event: LifecycleEvent) {
        self.confinement.assert("Lifecycle::dispatch");
        if event.is_terminal() {
            self.destroyed.store(true, Ordering::SeqCst);
        }

        // Snapshot under the lock, notify outside it: observers may
        // unregister themselves from within on_transition.
        let snapshot: Vec<(ObserverId, Weak<dyn LifecycleObserver>)> = {
            let mut observers = self.lock_observers();
            observers.retain(|(_, weak)| weak.strong_count() > 0);
            observers.clone()
        };

        tracing::debug!(?event, observers = snapshot.len(), "dispatching lifecycle event");
        for (_, weak) in snapshot {
            if let Some(observer) = weak.upgrade() {
                observer.on_transition(event);
            }
        }
    }

    /// Number of live registered observers
    ///
    /// Dropped observers are pruned before counting.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        let mut observers = self.lock_observers();
        observers.retain(|(_, weak)| weak.strong_count() > 0);
        observers.len()
    }

    fn lock_observers(
        &self,
    ) -> std::sync::MutexGuard<'_, Vec<(ObserverId, Weak<dyn LifecycleObserver>)>> {
        // The critical sections never panic, but recover from poisoning
        // rather than propagating it as a second panic.
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleSource for Lifecycle {
    fn confinement(&self) -> Confinement {
        self.confinement.clone()
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn add_observer(&self, observer: Weak<dyn LifecycleObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.lock_observers().push((id, observer));
        tracing::trace!(observer_id = id.0, "lifecycle observer registered");
        id
    }

    fn remove_observer(&self, id: ObserverId) {
        self.lock_observers().retain(|(other, _)| *other != id);
        tracing::trace!(observer_id = id.0, "lifecycle observer removed");
    }
}
