// Edge capture. The only part of the core that runs at interrupt priority, so it does nothing but
// filter bounce and hand the timestamp over.

use portable_atomic::{AtomicU64, Ordering};

use crate::Millis;

const PENDING_BIT: u64 = 1 << 32;

/// Single-slot handoff between the capture callback of one channel and the estimator.
///
/// Timestamp and pending flag are packed into one 64 bit word, so a post is a single store and a
/// take a single swap: the estimator can never see a flag without its timestamp. On the RP2040
/// (no native 64 bit atomics) `portable_atomic` falls back to a critical section.
///
/// Only the latest edge is kept. Edges that arrive faster than the estimator polls are coalesced,
/// which bounds the measurable pulse rate to the poll rate of the main loop.
pub struct EdgeMailbox {
    slot: AtomicU64,
}

impl EdgeMailbox {
    pub const fn new() -> Self {
        Self {
            slot: AtomicU64::new(0),
        }
    }

    /// Publish an edge, replacing one that was not consumed yet
    pub fn post(&self, timestamp: Millis) {
        self.slot.store(PENDING_BIT | timestamp as u64, Ordering::Release);
    }

    /// Consume the pending edge, if any
    pub fn take(&self) -> Option<Millis> {
        let word = self.slot.swap(0, Ordering::AcqRel);
        if word & PENDING_BIT != 0 {
            Some(word as Millis)
        } else {
            None
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot.load(Ordering::Acquire) & PENDING_BIT != 0
    }
}

impl Default for EdgeMailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Debounce filter in front of a mailbox. Owned by the capture task of one channel, nothing else
/// touches `last_accepted`.
pub struct EdgeCapture<'a> {
    mailbox: &'a EdgeMailbox,
    debounce_ms: Millis,
    last_accepted: Option<Millis>,
}

impl<'a> EdgeCapture<'a> {
    pub fn new(mailbox: &'a EdgeMailbox, debounce_ms: Millis) -> Self {
        Self {
            mailbox,
            debounce_ms,
            last_accepted: None,
        }
    }

    /// Call on every falling edge. Returns `false` if the edge was dropped as bounce.
    pub fn on_edge(&mut self, now: Millis) -> bool {
        if let Some(last) = self.last_accepted {
            if now.wrapping_sub(last) <= self.debounce_ms {
                return false;
            }
        }
        self.mailbox.post(now);
        self.last_accepted = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mailbox_yields_nothing() {
        let mailbox = EdgeMailbox::new();
        assert!(!mailbox.is_pending());
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn take_clears_pending() {
        let mailbox = EdgeMailbox::new();
        mailbox.post(1234);
        assert!(mailbox.is_pending());
        assert_eq!(mailbox.take(), Some(1234));
        assert!(!mailbox.is_pending());
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn edge_at_time_zero_is_still_pending() {
        let mailbox = EdgeMailbox::new();
        mailbox.post(0);
        assert_eq!(mailbox.take(), Some(0));
    }

    #[test]
    fn unconsumed_edges_are_coalesced() {
        let mailbox = EdgeMailbox::new();
        mailbox.post(100);
        mailbox.post(120);
        mailbox.post(140);
        assert_eq!(mailbox.take(), Some(140));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn keeps_full_timestamp_range() {
        let mailbox = EdgeMailbox::new();
        mailbox.post(Millis::MAX);
        assert_eq!(mailbox.take(), Some(Millis::MAX));
    }

    #[test]
    fn first_edge_is_always_accepted() {
        let mailbox = EdgeMailbox::new();
        let mut capture = EdgeCapture::new(&mailbox, 5);
        assert!(capture.on_edge(0));
        assert_eq!(mailbox.take(), Some(0));
    }

    #[test]
    fn bounce_is_dropped() {
        let mailbox = EdgeMailbox::new();
        let mut capture = EdgeCapture::new(&mailbox, 5);
        assert!(capture.on_edge(1000));
        assert_eq!(mailbox.take(), Some(1000));

        assert!(!capture.on_edge(1002));
        assert!(!capture.on_edge(1005));
        assert_eq!(mailbox.take(), None);

        assert!(capture.on_edge(1006));
        assert_eq!(mailbox.take(), Some(1006));
    }

    #[test]
    fn bounce_does_not_extend_the_debounce_window() {
        let mailbox = EdgeMailbox::new();
        let mut capture = EdgeCapture::new(&mailbox, 5);
        capture.on_edge(1000);
        assert!(!capture.on_edge(1004));
        // measured from the last accepted edge, not from the rejected one
        assert!(capture.on_edge(1006));
    }

    #[test]
    fn debounce_survives_clock_wraparound() {
        let mailbox = EdgeMailbox::new();
        let mut capture = EdgeCapture::new(&mailbox, 5);
        assert!(capture.on_edge(Millis::MAX - 1));
        assert!(!capture.on_edge(2));
        assert!(capture.on_edge(10));
        assert_eq!(mailbox.take(), Some(10));
    }
}
