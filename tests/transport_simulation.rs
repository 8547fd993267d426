//! End-to-end simulation of a transport driving a lifecycle-bound call
//!
//! The "transport" here is a spawned I/O thread that writes the request body
//! (through `ProgressBody`) and a confined main thread that delivers delegate
//! events (through `LifecycleGuard`), mirroring how a real HTTP client splits
//! the work.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use call_guard::{
    BytesBody, Callback, Lifecycle, LifecycleEvent, LifecycleGuard, OperationHandle,
    ProgressBody, RequestBody,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

struct CancelCounter {
    cancels: AtomicUsize,
}

impl CancelCounter {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            cancels: AtomicUsize::new(0),
        })
    }
}

impl OperationHandle for CancelCounter {
    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Callback for EventLog {
    type Response = u16;
    type Error = String;

    fn on_start(&self) {
        self.events.lock().unwrap().push("start".into());
    }

    fn on_response(&self, status: u16) {
        self.events.lock().unwrap().push(format!("response:{status}"));
    }

    fn on_failure(&self, error: String) {
        self.events.lock().unwrap().push(format!("failure:{error}"));
    }

    fn on_completed(&self) {
        self.events.lock().unwrap().push("completed".into());
    }
}

#[test]
fn upload_then_response_happy_path() {
    let lifecycle = Arc::new(Lifecycle::new());
    let handle = CancelCounter::new();
    let delegate = EventLog::new();
    let guard = LifecycleGuard::bind(Arc::clone(&handle), Arc::clone(&delegate), &lifecycle);

    guard.on_start();

    // The I/O thread uploads the body; the listener runs there, off the
    // confined thread.
    let confined_thread = thread::current().id();
    let progress_log: Arc<Mutex<Vec<(u64, Option<u64>, bool)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let listener_log = Arc::clone(&progress_log);
    let io_thread = thread::spawn(move || {
        let body = BytesBody::new(vec![0x55u8; 2048]).with_content_type("application/zip");
        let progress = ProgressBody::new(body, move |written: u64, total: Option<u64>, done: bool| {
            assert_ne!(
                thread::current().id(),
                confined_thread,
                "the upload listener runs on the I/O thread"
            );
            listener_log.lock().unwrap().push((written, total, done));
        });
        let mut wire = Vec::new();
        progress.write_to(&mut wire).expect("in-memory write cannot fail");
        wire.len()
    });
    let wire_len = io_thread.join().unwrap();
    assert_eq!(wire_len, 2048);

    let progress_calls = progress_log.lock().unwrap().clone();
    let last = progress_calls.last().copied().expect("at least one chunk reported");
    assert_eq!(last, (2048, Some(2048), true));
    assert_eq!(
        progress_calls.iter().filter(|c| c.2).count(),
        1,
        "done fires exactly once per upload"
    );

    // Back on the confined thread, the transport delivers the result.
    guard.on_response(201);
    guard.on_completed();

    assert_eq!(delegate.events(), vec!["start", "response:201", "completed"]);
    assert_eq!(handle.cancels.load(Ordering::SeqCst), 0);
    assert_eq!(
        lifecycle.observer_count(),
        0,
        "completion must release the observation"
    );

    // Teardown afterwards is inert.
    lifecycle.dispatch(LifecycleEvent::Destroyed);
    assert_eq!(handle.cancels.load(Ordering::SeqCst), 0);
}

#[test]
fn destroy_mid_flight_cancels_and_silences_delegate() {
    let lifecycle = Arc::new(Lifecycle::new());
    let handle = CancelCounter::new();
    let delegate = EventLog::new();
    let guard = LifecycleGuard::bind(Arc::clone(&handle), Arc::clone(&delegate), &lifecycle);

    guard.on_start();
    lifecycle.dispatch(LifecycleEvent::Destroyed);

    // The transport finishes anyway and delivers; nothing gets through.
    guard.on_response(200);
    guard.on_completed();

    assert_eq!(delegate.events(), vec!["start"]);
    assert_eq!(handle.cancels.load(Ordering::SeqCst), 1);
    assert_eq!(lifecycle.observer_count(), 0);
}

/// Both orderings of the complete-vs-destroy race resolve to exactly one
/// exit action, and `cancel()` is called at most once across the guard's
/// lifetime.
#[test]
fn complete_vs_destroy_race_has_one_winner() {
    // Completion first: forward-and-unregister wins, destroy is a no-op.
    {
        let lifecycle = Arc::new(Lifecycle::new());
        let handle = CancelCounter::new();
        let delegate = EventLog::new();
        let guard =
            LifecycleGuard::bind(Arc::clone(&handle), Arc::clone(&delegate), &lifecycle);

        guard.on_completed();
        lifecycle.dispatch(LifecycleEvent::Destroyed);

        assert_eq!(delegate.events(), vec!["completed"]);
        assert_eq!(handle.cancels.load(Ordering::SeqCst), 0);
    }

    // Destroy first: cancel-and-unregister wins, completion is a no-op.
    {
        let lifecycle = Arc::new(Lifecycle::new());
        let handle = CancelCounter::new();
        let delegate = EventLog::new();
        let guard =
            LifecycleGuard::bind(Arc::clone(&handle), Arc::clone(&delegate), &lifecycle);

        lifecycle.dispatch(LifecycleEvent::Destroyed);
        guard.on_completed();

        assert!(delegate.events().is_empty());
        assert_eq!(handle.cancels.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn rebinding_after_destroy_short_circuits() {
    let lifecycle = Arc::new(Lifecycle::new());
    lifecycle.dispatch(LifecycleEvent::Destroyed);

    // A second request dispatched for the same dead owner: each new guard
    // cancels its own handle immediately.
    for _ in 0..3 {
        let handle = CancelCounter::new();
        let delegate = EventLog::new();
        let _guard =
            LifecycleGuard::bind(Arc::clone(&handle), Arc::clone(&delegate), &lifecycle);
        assert_eq!(handle.cancels.load(Ordering::SeqCst), 1);
        assert!(delegate.events().is_empty());
    }
    assert_eq!(lifecycle.observer_count(), 0);
}

#[test]
fn progress_decorator_nests_transparently() {
    // Wrapping an already-wrapped body keeps byte delivery and metadata
    // intact; both listeners observe the same chunks.
    let outer_calls = Arc::new(AtomicUsize::new(0));
    let inner_calls = Arc::new(AtomicUsize::new(0));

    let outer_counter = Arc::clone(&outer_calls);
    let inner_counter = Arc::clone(&inner_calls);

    let body = BytesBody::new(vec![9u8; 512]).with_content_type("text/plain");
    let inner = ProgressBody::new(body, move |_w: u64, _t: Option<u64>, _d: bool| {
        inner_counter.fetch_add(1, Ordering::SeqCst);
    });
    let outer = ProgressBody::new(inner, move |w: u64, t: Option<u64>, d: bool| {
        outer_counter.fetch_add(1, Ordering::SeqCst);
        assert_eq!(t, Some(512));
        if d {
            assert_eq!(w, 512);
        }
    });

    assert_eq!(outer.content_type(), Some("text/plain"));
    assert_eq!(outer.content_length(), Some(512));

    let mut wire = Vec::new();
    outer.write_to(&mut wire).unwrap();

    assert_eq!(wire, vec![9u8; 512]);
    assert_eq!(outer_calls.load(Ordering::SeqCst), 1);
    assert_eq!(inner_calls.load(Ordering::SeqCst), 1);
}
