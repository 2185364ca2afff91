//! Attack tuning parameters.
//!
//! Success probabilities are plain parameters; nothing in the topology makes
//! an attack fail deterministically. Tests pin them to 0.0 or 1.0.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Passive tap and short-code cracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EavesdropConfig {
    /// Interval between candidate codes per cracked device.
    pub crack_step: Duration,
    /// Candidates tried per device before giving up.
    pub crack_attempt_cap: u32,
    /// Interval between captured-packet emissions.
    pub capture_interval: Duration,
}

impl Default for EavesdropConfig {
    fn default() -> Self {
        Self {
            crack_step: Duration::from_millis(400),
            crack_attempt_cap: 100,
            capture_interval: Duration::from_secs(2),
        }
    }
}

/// Identifier guessing (Bruteforce-ID and Unauthorized-ONT).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuessingConfig {
    /// Interval between guesses.
    pub guess_interval: Duration,
    /// Independent chance each guess is accepted.
    pub success_probability: f64,
    /// Guesses before the attack gives up.
    pub attempt_cap: u32,
}

impl Default for GuessingConfig {
    fn default() -> Self {
        Self {
            guess_interval: Duration::from_secs(1),
            success_probability: 0.05,
            attempt_cap: 128,
        }
    }
}

/// Upstream flood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DdosConfig {
    /// Interval between flood packets.
    pub flood_interval: Duration,
    /// Consecutive close arrivals that overload the OLT.
    pub packet_threshold: u32,
    /// Arrivals closer than this count toward the threshold.
    pub congestion_window: Duration,
}

impl Default for DdosConfig {
    fn default() -> Self {
        Self {
            flood_interval: Duration::from_millis(100),
            packet_threshold: 20,
            congestion_window: Duration::from_millis(500),
        }
    }
}

/// Spoofed registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RogueOnuConfig {
    /// Interval between registration attempts.
    pub attempt_interval: Duration,
    /// Independent chance each attempt is accepted.
    pub success_probability: f64,
    /// Attempts before the attack gives up.
    pub attempt_cap: u32,
    /// Service profile granted on success.
    pub service_profile: String,
    /// Interval between keep-alive exchanges once registered.
    pub keepalive_interval: Duration,
}

impl Default for RogueOnuConfig {
    fn default() -> Self {
        Self {
            attempt_interval: Duration::from_secs(3),
            success_probability: 0.2,
            attempt_cap: 10,
            service_profile: "internet-100M".to_string(),
            keepalive_interval: Duration::from_secs(3),
        }
    }
}

/// Substitute ONT takeover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OntSpoofConfig {
    /// Interval between short-code candidates.
    pub step_interval: Duration,
    /// Interval between forged request/response pairs after takeover.
    pub traffic_interval: Duration,
}

impl Default for OntSpoofConfig {
    fn default() -> Self {
        Self {
            step_interval: Duration::from_millis(300),
            traffic_interval: Duration::from_secs(2),
        }
    }
}

/// Configuration for every attack type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    pub eavesdrop: EavesdropConfig,
    pub guessing: GuessingConfig,
    pub ddos: DdosConfig,
    pub rogue: RogueOnuConfig,
    pub spoof: OntSpoofConfig,
}

impl AttackConfig {
    /// Set the per-guess success probability for identifier guessing.
    pub fn with_guess_probability(mut self, p: f64) -> Self {
        self.guessing.success_probability = p.clamp(0.0, 1.0);
        self
    }

    /// Set the per-attempt success probability for spoofed registration.
    pub fn with_registration_probability(mut self, p: f64) -> Self {
        self.rogue.success_probability = p.clamp(0.0, 1.0);
        self
    }

    /// Set the DDoS overload threshold.
    pub fn with_ddos_threshold(mut self, packets: u32, window: Duration) -> Self {
        self.ddos.packet_threshold = packets.max(1);
        self.ddos.congestion_window = window;
        self
    }

    /// Set the guessing attempt cap.
    pub fn with_guess_cap(mut self, cap: u32) -> Self {
        self.guessing.attempt_cap = cap.max(1);
        self
    }

    /// Set the registration attempt cap.
    pub fn with_registration_cap(mut self, cap: u32) -> Self {
        self.rogue.attempt_cap = cap.max(1);
        self
    }
}
