//! Countdown latch with a single completion continuation.
//!
//! Fan-out code registers one pending unit per outstanding operation
//! *before* issuing it and counts down when it finishes. The continuation
//! runs on whichever thread brings the count to zero, exactly once.
//!
//! ```ignore
//! let latch = Latch::new(bundles.len(), || log!("build"; "done"));
//! rayon::scope(|s| {
//!     for bundle in &bundles {
//!         s.spawn(|_| {
//!             bundle.build();
//!             latch.count_down();
//!         });
//!     }
//! });
//! latch.fire_if_idle(); // zero bundles
//! ```

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

type Continuation<'a> = Box<dyn FnOnce() + Send + 'a>;

pub struct Latch<'a> {
    pending: AtomicUsize,
    on_zero: Mutex<Option<Continuation<'a>>>,
}

impl<'a> Latch<'a> {
    pub fn new(count: usize, on_zero: impl FnOnce() + Send + 'a) -> Self {
        Self {
            pending: AtomicUsize::new(count),
            on_zero: Mutex::new(Some(Box::new(on_zero))),
        }
    }

    /// Register `n` more outstanding operations.
    pub fn add(&self, n: usize) {
        self.pending.fetch_add(n, Ordering::AcqRel);
    }

    /// Mark one operation finished; fires the continuation at zero.
    pub fn count_down(&self) {
        let previous = self.pending.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "latch counted below zero");
        if previous == 1 {
            self.fire();
        }
    }

    /// Fire the continuation if nothing is outstanding.
    ///
    /// Covers the degenerate fan-out with an initial count of zero.
    pub fn fire_if_idle(&self) {
        if self.pending() == 0 {
            self.fire();
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn fire(&self) {
        let continuation = self.on_zero.lock().take();
        if let Some(continuation) = continuation {
            continuation();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_after_all_count_downs() {
        let fired = AtomicUsize::new(0);
        let latch = Latch::new(3, || {
            fired.fetch_add(1, Ordering::SeqCst);
        });

        latch.count_down();
        latch.count_down();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        latch.count_down();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        latch.fire_if_idle();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_count_fires_when_checked() {
        let fired = AtomicUsize::new(0);
        let latch = Latch::new(0, || {
            fired.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        latch.fire_if_idle();
        latch.fire_if_idle();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_add_keeps_latch_open() {
        let fired = AtomicUsize::new(0);
        let latch = Latch::new(1, || {
            fired.fetch_add(1, Ordering::SeqCst);
        });

        // A running operation discovers two more before finishing
        latch.add(2);
        latch.count_down();
        latch.count_down();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(latch.pending(), 1);

        latch.count_down();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_count_down() {
        let fired = AtomicUsize::new(0);
        let latch = Latch::new(64, || {
            fired.fetch_add(1, Ordering::SeqCst);
        });

        rayon::scope(|s| {
            for _ in 0..64 {
                s.spawn(|_| latch.count_down());
            }
        });

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
