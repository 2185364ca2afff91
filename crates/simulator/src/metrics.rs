//! Delivery metrics and the end-of-run report.

use crate::ScenarioError;
use gpon_simulation::{Delivery, SimulationStats};
use gpon_types::{AttackKind, Direction, LogEntry, LogLevel};
use hdrhistogram::Histogram;
use std::collections::BTreeMap;
use std::time::Duration;

/// Latency percentiles for one traffic class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencySummary {
    pub count: u64,
    pub p50: Duration,
    pub p90: Duration,
    pub p99: Duration,
    pub max: Duration,
    pub avg: Duration,
}

impl LatencySummary {
    fn from_histogram(histogram: &Histogram<u64>) -> Self {
        if histogram.is_empty() {
            return Self::default();
        }
        let at = |q: f64| Duration::from_micros(histogram.value_at_quantile(q));
        Self {
            count: histogram.len(),
            p50: at(0.50),
            p90: at(0.90),
            p99: at(0.99),
            max: Duration::from_micros(histogram.max()),
            avg: Duration::from_micros(histogram.mean() as u64),
        }
    }
}

/// Collects terminal deliveries drained from the runner.
///
/// Legitimate traffic is split by direction; attack traffic is only
/// counted, per attack.
pub struct MetricsCollector {
    downstream: Histogram<u64>,
    upstream: Histogram<u64>,
    attack_deliveries: BTreeMap<AttackKind, u64>,
    rejected_commands: u64,
}

impl MetricsCollector {
    pub fn new() -> Result<Self, ScenarioError> {
        Ok(Self {
            downstream: Histogram::new(3)?,
            upstream: Histogram::new(3)?,
            attack_deliveries: BTreeMap::new(),
            rejected_commands: 0,
        })
    }

    pub fn record(&mut self, delivery: &Delivery) {
        if let Some(kind) = delivery.owner {
            *self.attack_deliveries.entry(kind).or_default() += 1;
            return;
        }
        let micros = u64::try_from(delivery.latency.as_micros()).unwrap_or(u64::MAX);
        match delivery.direction {
            Direction::Downstream => self.downstream.saturating_record(micros),
            Direction::Upstream => self.upstream.saturating_record(micros),
        }
    }

    pub fn record_all<'a>(&mut self, deliveries: impl IntoIterator<Item = &'a Delivery>) {
        for delivery in deliveries {
            self.record(delivery);
        }
    }

    /// A scheduled command the runner refused.
    pub fn record_rejection(&mut self) {
        self.rejected_commands += 1;
    }

    pub fn downstream(&self) -> LatencySummary {
        LatencySummary::from_histogram(&self.downstream)
    }

    pub fn upstream(&self) -> LatencySummary {
        LatencySummary::from_histogram(&self.upstream)
    }

    pub fn attack_deliveries(&self) -> &BTreeMap<AttackKind, u64> {
        &self.attack_deliveries
    }

    pub fn rejected_commands(&self) -> u64 {
        self.rejected_commands
    }
}

/// Final run report.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub scenario: String,
    pub seed: u64,
    pub simulated_duration: Duration,
    pub wall_duration: Duration,
    pub stats: SimulationStats,
    pub downstream: LatencySummary,
    pub upstream: LatencySummary,
    pub attack_deliveries: BTreeMap<AttackKind, u64>,
    /// Status line per attack still running at the end.
    pub active_attacks: Vec<String>,
    pub rejected_commands: u64,
    pub warnings: usize,
    pub errors: usize,
    pub critical: usize,
    /// Most recent log entries, oldest first.
    pub log_tail: Vec<LogEntry>,
}

impl SimulationReport {
    /// Count log entries by level into the report.
    pub(crate) fn tally_levels<'a>(&mut self, entries: impl IntoIterator<Item = &'a LogEntry>) {
        for entry in entries {
            match entry.level {
                LogLevel::Info => {}
                LogLevel::Warning => self.warnings += 1,
                LogLevel::Error => self.errors += 1,
                LogLevel::Critical => self.critical += 1,
            }
        }
    }

    pub fn print_summary(&self) {
        println!("\n═══════════════════════════════════════════");
        println!("          GPON SIMULATION REPORT            ");
        println!("═══════════════════════════════════════════");
        println!();
        println!("Scenario: {} (seed {})", self.scenario, self.seed);
        println!();
        println!("Traffic:");
        println!("  Ticks:        {}", self.stats.ticks);
        println!("  Generated:    {}", self.stats.packets_generated);
        println!("  Forwarded:    {}", self.stats.packets_forwarded);
        println!("  Delivered:    {}", self.stats.packets_delivered);
        println!("  Deduplicated: {}", self.stats.packets_deduplicated);
        println!("  Expired:      {}", self.stats.packets_expired);
        println!(
            "  Delivery rate: {:.1}%",
            self.stats.delivery_rate() * 100.0
        );
        println!();
        println!("Drops:");
        println!("  Congestion:   {}", self.stats.dropped_congestion);
        println!("  Unknown ONU:  {}", self.stats.dropped_unknown_onu);
        println!("  Listen-only:  {}", self.stats.dropped_listen_only);
        println!("  Ignored:      {}", self.stats.packets_ignored);
        println!();
        print_latency("Downstream latency", &self.downstream);
        print_latency("Upstream latency", &self.upstream);

        println!("Attacks:");
        println!("  Packets emitted: {}", self.stats.attack_packets);
        println!("  Packets purged:  {}", self.stats.packets_purged);
        for (kind, count) in &self.attack_deliveries {
            println!("  {kind}: {count} delivered");
        }
        for line in &self.active_attacks {
            println!("  Active: {line}");
        }
        if self.rejected_commands > 0 {
            println!("  Rejected commands: {}", self.rejected_commands);
        }
        println!();
        println!(
            "Log: {} warnings, {} errors, {} critical",
            self.warnings, self.errors, self.critical
        );
        for entry in &self.log_tail {
            println!("  {entry}");
        }
        println!();
        println!(
            "Duration: {:.2}s (simulated: {:.3}s)",
            self.wall_duration.as_secs_f64(),
            self.simulated_duration.as_secs_f64()
        );
        println!("═══════════════════════════════════════════\n");
    }
}

fn print_latency(title: &str, summary: &LatencySummary) {
    println!("{title}:");
    if summary.count == 0 {
        println!("  No deliveries recorded.");
    } else {
        println!("  Count: {}", summary.count);
        println!("  P50:   {:.3}s", summary.p50.as_secs_f64());
        println!("  P90:   {:.3}s", summary.p90.as_secs_f64());
        println!("  P99:   {:.3}s", summary.p99.as_secs_f64());
        println!("  Max:   {:.3}s", summary.max.as_secs_f64());
        println!("  Avg:   {:.3}s", summary.avg.as_secs_f64());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpon_types::{DeviceId, PacketId};

    fn delivery(direction: Direction, owner: Option<AttackKind>, millis: u64) -> Delivery {
        Delivery {
            packet: PacketId(1),
            origin: PacketId(1),
            device: DeviceId(1),
            direction,
            owner,
            latency: Duration::from_millis(millis),
        }
    }

    #[test]
    fn test_latency_split_by_direction() {
        let mut metrics = MetricsCollector::new().unwrap();
        for millis in [1_000, 2_000, 3_000, 4_000] {
            metrics.record(&delivery(Direction::Downstream, None, millis));
        }
        metrics.record(&delivery(Direction::Upstream, None, 500));

        let down = metrics.downstream();
        assert_eq!(down.count, 4);
        assert!(down.p50 >= Duration::from_millis(1_990) && down.p50 <= Duration::from_millis(2_010));
        assert!(down.max >= Duration::from_millis(3_990));
        assert_eq!(metrics.upstream().count, 1);
    }

    #[test]
    fn test_attack_deliveries_counted_separately() {
        let mut metrics = MetricsCollector::new().unwrap();
        metrics.record(&delivery(Direction::Upstream, Some(AttackKind::Ddos), 100));
        metrics.record(&delivery(Direction::Upstream, Some(AttackKind::Ddos), 100));
        assert_eq!(metrics.upstream().count, 0);
        assert_eq!(metrics.attack_deliveries().get(&AttackKind::Ddos), Some(&2));
    }

    #[test]
    fn test_empty_summary_is_zero() {
        let metrics = MetricsCollector::new().unwrap();
        assert_eq!(metrics.downstream(), LatencySummary::default());
    }
}
