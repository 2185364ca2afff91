//! Event queue with deterministic ordering.

use gpon_core::{Event, EventPriority};
use std::cmp::Ordering;
use std::time::Duration;

/// Key for ordering events in the queue.
///
/// Events are ordered by:
/// 1. Time (earlier first)
/// 2. Priority (flow control, expiry, tick, generators, attacks)
/// 3. Sequence number (FIFO for same time/priority)
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EventKey {
    /// When this event should be processed.
    pub time: Duration,
    /// Priority for ordering at same time.
    pub priority: EventPriority,
    /// Sequence number for deterministic FIFO ordering.
    pub sequence: u64,
}

impl EventKey {
    pub fn new(time: Duration, event: &Event, sequence: u64) -> Self {
        Self {
            time,
            priority: event.priority(),
            sequence,
        }
    }
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match self.priority.cmp(&other.priority) {
            Ordering::Equal => {}
            ord => return ord,
        }

        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_key_ordering() {
        let earlier = EventKey {
            time: Duration::from_secs(1),
            priority: EventPriority::Attack,
            sequence: 2,
        };
        let later = EventKey {
            time: Duration::from_secs(2),
            priority: EventPriority::Control,
            sequence: 1,
        };
        assert!(earlier < later);
    }

    #[test]
    fn test_priority_ordering_at_same_time() {
        let flow = EventKey {
            time: Duration::from_secs(1),
            priority: EventPriority::Control,
            sequence: 9, // Higher sequence, but should still be first
        };
        let tick = EventKey {
            time: Duration::from_secs(1),
            priority: EventPriority::Tick,
            sequence: 1,
        };
        assert!(flow < tick, "Flow changes should land before the tick");
    }

    #[test]
    fn test_sequence_breaks_ties() {
        let first = EventKey::new(Duration::ZERO, &Event::Tick, 1);
        let second = EventKey::new(Duration::ZERO, &Event::Tick, 2);
        assert!(first < second);
    }
}
