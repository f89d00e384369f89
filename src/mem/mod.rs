//! Memory-accounting contexts.
//!
//! Each worker thread carries a *current* [`MemTracker`]; allocations and
//! frees performed by cache internals are charged to whichever tracker is
//! current at that moment. The page cache swaps in its own tracker for the
//! duration of every insert and capacity change, so that bytes freed by
//! eviction are attributed to the cache rather than to the query thread
//! that happened to trigger it.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Tracks memory consumption attributed to one subsystem.
///
/// Consumption may transiently go negative when frees are observed by a
/// different tracker than the one that saw the matching allocation; the
/// counter is signed for that reason.
#[derive(Debug)]
pub struct MemTracker {
    label: String,
    consumption: AtomicI64,
}

impl MemTracker {
    /// Creates a new tracker with a human-readable label.
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { label: label.into(), consumption: AtomicI64::new(0) })
    }

    /// Records `bytes` of allocation against this tracker.
    pub fn consume(&self, bytes: i64) {
        self.consumption.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records `bytes` of deallocation against this tracker.
    pub fn release(&self, bytes: i64) {
        self.consumption.fetch_sub(bytes, Ordering::Relaxed);
    }

    /// Current attributed consumption in bytes.
    pub fn consumption(&self) -> i64 {
        self.consumption.load(Ordering::Relaxed)
    }

    /// The tracker's label.
    pub fn label(&self) -> &str {
        &self.label
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<MemTracker>>> = const { RefCell::new(None) };
}

/// Replaces the calling thread's current tracker, returning the previous one.
pub fn swap_current(tracker: Option<Arc<MemTracker>>) -> Option<Arc<MemTracker>> {
    CURRENT.with(|slot| slot.replace(tracker))
}

/// The calling thread's current tracker, if any.
pub fn current() -> Option<Arc<MemTracker>> {
    CURRENT.with(|slot| slot.borrow().clone())
}

/// Charges `bytes` of allocation to the calling thread's current tracker.
/// A thread with no tracker installed is simply not accounted.
pub(crate) fn consume_current(bytes: i64) {
    CURRENT.with(|slot| {
        if let Some(tracker) = slot.borrow().as_ref() {
            tracker.consume(bytes);
        }
    });
}

/// Charges `bytes` of deallocation to the calling thread's current tracker.
pub(crate) fn release_current(bytes: i64) {
    CURRENT.with(|slot| {
        if let Some(tracker) = slot.borrow().as_ref() {
            tracker.release(bytes);
        }
    });
}

/// Installs a tracker as the calling thread's current one and restores the
/// previous tracker when dropped, on every exit path including panics.
pub struct TrackerScope {
    prev: Option<Arc<MemTracker>>,
    // Tied to the thread whose slot it swapped.
    _not_send: PhantomData<*const ()>,
}

impl TrackerScope {
    /// Swaps `tracker` in as the current tracker for the calling thread.
    pub fn new(tracker: Arc<MemTracker>) -> Self {
        let prev = swap_current(Some(tracker));
        Self { prev, _not_send: PhantomData }
    }
}

impl Drop for TrackerScope {
    fn drop(&mut self) {
        swap_current(self.prev.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_and_release() {
        let tracker = MemTracker::new("test");
        tracker.consume(1000);
        assert_eq!(tracker.consumption(), 1000);
        tracker.release(400);
        assert_eq!(tracker.consumption(), 600);
        assert_eq!(tracker.label(), "test");
    }

    #[test]
    fn test_scope_swaps_and_restores() {
        let outer = MemTracker::new("outer");
        let inner = MemTracker::new("inner");

        let _outer_scope = TrackerScope::new(outer.clone());
        consume_current(100);

        {
            let _inner_scope = TrackerScope::new(inner.clone());
            consume_current(50);
            release_current(10);
        }

        // Back to the outer tracker after the inner scope ends.
        consume_current(5);

        assert_eq!(outer.consumption(), 105);
        assert_eq!(inner.consumption(), 40);
    }

    #[test]
    fn test_scope_restores_on_panic() {
        let outer = MemTracker::new("outer");
        let inner = MemTracker::new("inner");

        let _outer_scope = TrackerScope::new(outer.clone());

        let inner_clone = inner.clone();
        let result = std::panic::catch_unwind(move || {
            let _scope = TrackerScope::new(inner_clone);
            panic!("boom");
        });
        assert!(result.is_err());

        // The panicking scope must have restored the outer tracker.
        consume_current(7);
        assert_eq!(outer.consumption(), 7);
        assert_eq!(inner.consumption(), 0);
    }

    #[test]
    fn test_no_tracker_is_silent() {
        let prev = swap_current(None);
        consume_current(123);
        release_current(45);
        swap_current(prev);
    }

    #[test]
    fn test_current_reflects_scope() {
        let tracker = MemTracker::new("visible");
        {
            let _scope = TrackerScope::new(tracker.clone());
            let cur = current().unwrap();
            assert_eq!(cur.label(), "visible");
        }
    }
}
