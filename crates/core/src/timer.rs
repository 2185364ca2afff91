//! Timer identities.

use gpon_types::{AttackKind, DeviceId, PacketId};
use serde::{Deserialize, Serialize};

/// A recurring or one-shot job run by an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttackJob {
    /// Short-code cracking loop against one device.
    Crack(DeviceId),
    /// Passive capture emission.
    Capture,
    /// Identifier guess toward the OLT.
    Guess,
    /// Flood emission.
    Flood,
    /// Spoofed registration attempt.
    Register,
    /// ONT spoof brute-force step.
    SpoofStep,
    /// Forged request/response pair after takeover.
    SpoofTraffic,
}

/// Who owns a timer. Stopping an owner cancels all of its timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerOwner {
    Simulation,
    Attack(AttackKind),
}

/// Timer identifier: job kind plus owner.
///
/// At most one timer per id is armed; setting an armed id replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimerId {
    /// Simulation tick.
    Tick,
    /// Downstream broadcast generator.
    DownstreamGenerator,
    /// Upstream response generator.
    UpstreamGenerator,
    /// Settle period over, flip to upstream.
    FlowSettle,
    /// Upstream dwell over, flip back to downstream.
    FlowDwell,
    /// Packet time-to-live.
    PacketTtl(PacketId),
    /// Attack loop.
    Attack { kind: AttackKind, job: AttackJob },
}

impl TimerId {
    pub fn owner(&self) -> TimerOwner {
        match self {
            TimerId::Attack { kind, .. } => TimerOwner::Attack(*kind),
            TimerId::Tick
            | TimerId::DownstreamGenerator
            | TimerId::UpstreamGenerator
            | TimerId::FlowSettle
            | TimerId::FlowDwell
            | TimerId::PacketTtl(_) => TimerOwner::Simulation,
        }
    }

    pub fn attack(kind: AttackKind, job: AttackJob) -> Self {
        TimerId::Attack { kind, job }
    }
}
