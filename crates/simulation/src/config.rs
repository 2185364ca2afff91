//! Simulation configuration.

use gpon_attacks::AttackConfig;
use gpon_types::DEFAULT_LOG_CAPACITY;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and cadence of a simulation run.
///
/// All durations are simulated time. `speed` scales the tick cadence and the
/// per-hop transit time; the generators and attack loops run on their own
/// fixed cadences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulation speed multiplier. Must be positive and finite.
    pub speed: f64,
    /// Tick interval at speed 1.0.
    pub base_tick: Duration,
    /// Floor on the tick interval at high speeds.
    pub min_tick: Duration,
    /// Hops per second at speed 1.0.
    pub base_segments_per_sec: f64,

    /// Downstream broadcast cadence (plus up to `downstream_jitter`).
    pub downstream_interval: Duration,
    pub downstream_jitter: Duration,
    /// Upstream response cadence (plus up to `upstream_jitter`).
    pub upstream_interval: Duration,
    pub upstream_jitter: Duration,
    /// Minimum gap between two upstream responses from one endpoint.
    pub upstream_min_gap: Duration,

    /// Extra lifetime for generated downstream packets.
    pub downstream_ttl_grace: Duration,
    /// Extra lifetime for generated upstream packets.
    pub upstream_ttl_grace: Duration,
    /// Extra lifetime for forwarded copies and attack packets.
    pub forward_ttl_grace: Duration,

    /// Ticks in the downstream phase before the settle timer is armed.
    pub settle_ticks: u64,
    /// Settle period before flipping to upstream.
    pub upstream_delay: Duration,
    /// Time spent in upstream before flipping back.
    pub upstream_dwell: Duration,

    /// How long a packet lineage is remembered for delivery dedup.
    pub dedup_horizon: Duration,
    /// Entries kept in the user-visible log.
    pub log_capacity: usize,

    pub attacks: AttackConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            base_tick: Duration::from_millis(1000),
            min_tick: Duration::from_millis(50),
            base_segments_per_sec: 0.15,
            downstream_interval: Duration::from_millis(4500),
            downstream_jitter: Duration::from_millis(1500),
            upstream_interval: Duration::from_millis(5400),
            upstream_jitter: Duration::from_millis(2100),
            upstream_min_gap: Duration::from_millis(4500),
            downstream_ttl_grace: Duration::from_millis(1600),
            upstream_ttl_grace: Duration::from_millis(800),
            forward_ttl_grace: Duration::from_millis(800),
            settle_ticks: 20,
            upstream_delay: Duration::from_millis(2000),
            upstream_dwell: Duration::from_millis(15000),
            dedup_horizon: Duration::from_secs(120),
            log_capacity: DEFAULT_LOG_CAPACITY,
            attacks: AttackConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_attacks(mut self, attacks: AttackConfig) -> Self {
        self.attacks = attacks;
        self
    }

    pub fn with_flow_timing(mut self, settle_ticks: u64, delay: Duration, dwell: Duration) -> Self {
        self.settle_ticks = settle_ticks;
        self.upstream_delay = delay;
        self.upstream_dwell = dwell;
        self
    }

    /// Tick interval at `speed`: `max(base_tick / speed, min_tick)`.
    pub fn tick_interval(&self, speed: f64) -> Duration {
        let scaled = self.base_tick.as_secs_f64() / speed;
        Duration::try_from_secs_f64(scaled)
            .unwrap_or(Duration::MAX)
            .max(self.min_tick)
    }

    /// Transit time of one hop at `speed`.
    pub fn segment_duration(&self, speed: f64) -> Duration {
        let per_sec = self.base_segments_per_sec * speed.max(0.1);
        Duration::try_from_secs_f64(1.0 / per_sec).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_interval_has_floor() {
        let config = SimulationConfig::default();
        assert_eq!(config.tick_interval(1.0), Duration::from_secs(1));
        assert_eq!(config.tick_interval(4.0), Duration::from_millis(250));
        assert_eq!(config.tick_interval(100.0), Duration::from_millis(50));
    }

    #[test]
    fn test_segment_duration_scales_with_speed() {
        let config = SimulationConfig::default();
        let at_one = config.segment_duration(1.0);
        let at_ten = config.segment_duration(10.0);
        assert!(at_one > at_ten);
        // Speeds below 0.1 are clamped.
        assert_eq!(config.segment_duration(0.01), config.segment_duration(0.1));
    }
}
