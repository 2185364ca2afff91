//! Run statistics.

use serde::Serialize;

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Events processed by priority.
    pub events_by_priority: [u64; 5],
    /// Ticks run.
    pub ticks: u64,
    /// Packets created by the downstream/upstream generators.
    pub packets_generated: u64,
    /// Packets emitted by attacks.
    pub attack_packets: u64,
    /// Hops put in flight.
    pub packets_forwarded: u64,
    /// Terminal deliveries (PC/Server downstream, primary OLT upstream).
    pub packets_delivered: u64,
    /// Legitimate downstream traffic dropped at a congestion node.
    pub dropped_congestion: u64,
    /// Upstream traffic rejected by a secondary OLT allow-list.
    pub dropped_unknown_onu: u64,
    /// Upstream traffic refused by a listen-only tap.
    pub dropped_listen_only: u64,
    /// Packets ignored on position mismatch or ONU ID filtering.
    pub packets_ignored: u64,
    /// Arrivals suppressed because the lineage already reached the device.
    pub packets_deduplicated: u64,
    /// Packets removed by their time-to-live.
    pub packets_expired: u64,
    /// Packets removed because the attack that sent them stopped.
    pub packets_purged: u64,
    /// Dispatcher failures (logged, tick continued).
    pub dispatch_errors: u64,
    /// Timers set.
    pub timers_set: u64,
    /// Timers cancelled.
    pub timers_cancelled: u64,
}

impl SimulationStats {
    /// Total packets dropped for any reason.
    pub fn packets_dropped(&self) -> u64 {
        self.dropped_congestion + self.dropped_unknown_onu + self.dropped_listen_only
    }

    /// Deliveries / (deliveries + drops).
    pub fn delivery_rate(&self) -> f64 {
        let total = self.packets_delivered + self.packets_dropped();
        if total == 0 {
            1.0
        } else {
            self.packets_delivered as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_rate() {
        let mut stats = SimulationStats::default();
        assert_eq!(stats.delivery_rate(), 1.0);
        stats.packets_delivered = 3;
        stats.dropped_congestion = 1;
        assert_eq!(stats.packets_dropped(), 1);
        assert!((stats.delivery_rate() - 0.75).abs() < f64::EPSILON);
    }
}
