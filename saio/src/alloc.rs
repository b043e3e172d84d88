//! Advisory RAM accounting, shared by every buffer pool and in-RAM bucket so
//! that the external radix heap can divide a fixed budget across its
//! buckets and callers can observe how much of it is actually in use.
//!
//! A pair of counters, current and peak, updated on every reservation and
//! release. This is an explicit handle that call sites hold and pass around
//! rather than a process-wide global, so unrelated streams and heaps in the
//! same process don't share accounting by accident.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct RamTracker {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl RamTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `bytes` as allocated. Returns a guard that releases the
    /// accounting when dropped.
    pub fn reserve(&self, bytes: usize) -> RamReservation {
        let prev = self.inner.current.fetch_add(bytes, Ordering::Relaxed);
        self.inner
            .peak
            .fetch_max(prev + bytes, Ordering::Relaxed);
        RamReservation {
            tracker: self.clone(),
            bytes,
        }
    }

    pub fn current(&self) -> usize {
        self.inner.current.load(Ordering::Relaxed)
    }

    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::Relaxed)
    }
}

/// RAII accounting token. Dropping it releases the reserved bytes from the
/// tracker's current count; the peak is never retroactively lowered.
pub struct RamReservation {
    tracker: RamTracker,
    bytes: usize,
}

impl Drop for RamReservation {
    fn drop(&mut self) {
        self.tracker
            .inner
            .current
            .fetch_sub(self.bytes, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_current_and_peak() {
        let tracker = RamTracker::new();
        let a = tracker.reserve(100);
        assert_eq!(tracker.current(), 100);
        let b = tracker.reserve(50);
        assert_eq!(tracker.current(), 150);
        assert_eq!(tracker.peak(), 150);
        drop(b);
        assert_eq!(tracker.current(), 100);
        assert_eq!(tracker.peak(), 150);
        drop(a);
        assert_eq!(tracker.current(), 0);
    }

    #[test]
    fn clones_share_accounting() {
        let tracker = RamTracker::new();
        let other = tracker.clone();
        let _r = other.reserve(64);
        assert_eq!(tracker.current(), 64);
    }
}
