// Pending/completed segment bookkeeping shared by the poller and the fetch workers.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;
use url::Url;

use crate::segment::SegmentRecord;

#[derive(Debug, Default)]
struct TrackerInner {
    /// Discovery-ordered FIFO of records awaiting fetch.
    pending: VecDeque<SegmentRecord>,
    /// Every URL accepted this window: pending, in flight, or completed.
    seen: HashSet<Url>,
    /// Records whose bytes are on disk; the window's output artifact.
    completed: Vec<SegmentRecord>,
}

/// Thread-safe pending queue plus completed set for one recording window.
///
/// A URL is accepted at most once per window. Records popped for fetching
/// stay in the seen set, so a failed fetch is never re-enqueued and a
/// re-discovered segment is never fetched twice.
#[derive(Debug, Default)]
pub struct SegmentTracker {
    inner: Mutex<TrackerInner>,
}

impl SegmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues the record unless its URL was already offered this window.
    /// Returns whether the record was accepted.
    pub fn offer_if_absent(&self, record: SegmentRecord) -> bool {
        let mut inner = self.inner.lock();
        if !inner.seen.insert(record.source_url().clone()) {
            return false;
        }
        inner.pending.push_back(record);
        true
    }

    /// Non-blocking removal of the queue head.
    ///
    /// The record leaves the queue before any fetch starts, so two workers
    /// can never fetch the same segment.
    pub fn poll(&self) -> Option<SegmentRecord> {
        self.inner.lock().pending.pop_front()
    }

    pub fn is_drained(&self) -> bool {
        self.inner.lock().pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Moves a fetched record into the completed set.
    pub fn complete(&self, record: SegmentRecord) {
        self.inner.lock().completed.push(record);
    }

    pub fn completed_len(&self) -> usize {
        self.inner.lock().completed.len()
    }

    /// Consumes the window's output artifact.
    pub fn take_completed(&self) -> Vec<SegmentRecord> {
        std::mem::take(&mut self.inner.lock().completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use url::Url;

    fn record(name: &str) -> SegmentRecord {
        SegmentRecord::new(
            Url::parse(&format!("https://radio.example.com/live/ch/{name}")).unwrap(),
        )
    }

    #[test]
    fn duplicate_offers_are_rejected() {
        let tracker = SegmentTracker::new();
        assert!(tracker.offer_if_absent(record("media-1.ts")));
        assert!(!tracker.offer_if_absent(record("media-1.ts")));
        assert_eq!(tracker.pending_len(), 1);
    }

    #[test]
    fn poll_preserves_discovery_order() {
        let tracker = SegmentTracker::new();
        tracker.offer_if_absent(record("media-1.ts"));
        tracker.offer_if_absent(record("media-2.ts"));
        tracker.offer_if_absent(record("media-3.ts"));

        let order: Vec<String> = std::iter::from_fn(|| tracker.poll())
            .map(|r| r.source_url().path().to_string())
            .collect();
        assert_eq!(
            order,
            vec!["/live/ch/media-1.ts", "/live/ch/media-2.ts", "/live/ch/media-3.ts"]
        );
        assert!(tracker.is_drained());
    }

    #[test]
    fn popped_records_are_not_accepted_again() {
        let tracker = SegmentTracker::new();
        tracker.offer_if_absent(record("media-1.ts"));
        let popped = tracker.poll().unwrap();

        // Re-discovery of an in-flight (or lost) segment must be a no-op.
        assert!(!tracker.offer_if_absent(popped.clone()));
        assert!(tracker.is_drained());
    }

    #[test]
    fn completed_records_are_not_accepted_again() {
        let tracker = SegmentTracker::new();
        tracker.offer_if_absent(record("media-1.ts"));
        let popped = tracker.poll().unwrap();
        tracker.complete(popped);

        assert!(!tracker.offer_if_absent(record("media-1.ts")));
        assert_eq!(tracker.completed_len(), 1);
        assert_eq!(tracker.take_completed().len(), 1);
        assert_eq!(tracker.completed_len(), 0);
    }

    #[test]
    fn concurrent_offers_admit_each_url_once() {
        let tracker = Arc::new(SegmentTracker::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let tracker = Arc::clone(&tracker);
            handles.push(std::thread::spawn(move || {
                let mut accepted = 0;
                for i in 0..100 {
                    if tracker.offer_if_absent(record(&format!("media-{i}.ts"))) {
                        accepted += 1;
                    }
                }
                accepted
            }));
        }
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 100);
        assert_eq!(tracker.pending_len(), 100);
    }
}
