//! Events processed by the runner.

use crate::{AttackJob, TimerId};
use gpon_types::{AttackKind, PacketId};

/// Priority for ordering events scheduled at the same instant.
///
/// Lower values run first: flow-phase changes are visible to the tick that
/// shares their timestamp, expiries land before the tick delivers, and
/// generators and attacks emit after the tick has moved existing traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum EventPriority {
    Control = 0,
    Expiry = 1,
    Tick = 2,
    Generator = 3,
    Attack = 4,
}

/// Something that happens at a point in simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Scheduler tick: deliver, dispatch, re-enqueue.
    Tick,
    /// Emit one downstream broadcast round.
    GenerateDownstream,
    /// Emit upstream responses from eligible endpoints.
    GenerateUpstream,
    /// Downstream settle period elapsed.
    FlowSettled,
    /// Upstream dwell elapsed.
    FlowDwellElapsed,
    /// Packet time-to-live reached.
    PacketExpired { packet: PacketId },
    /// Attack loop step.
    AttackStep { kind: AttackKind, job: AttackJob },
}

impl Event {
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::FlowSettled | Event::FlowDwellElapsed => EventPriority::Control,
            Event::PacketExpired { .. } => EventPriority::Expiry,
            Event::Tick => EventPriority::Tick,
            Event::GenerateDownstream | Event::GenerateUpstream => EventPriority::Generator,
            Event::AttackStep { .. } => EventPriority::Attack,
        }
    }

    /// Event fired when `timer` elapses.
    pub fn for_timer(timer: TimerId) -> Self {
        match timer {
            TimerId::Tick => Event::Tick,
            TimerId::DownstreamGenerator => Event::GenerateDownstream,
            TimerId::UpstreamGenerator => Event::GenerateUpstream,
            TimerId::FlowSettle => Event::FlowSettled,
            TimerId::FlowDwell => Event::FlowDwellElapsed,
            TimerId::PacketTtl(packet) => Event::PacketExpired { packet },
            TimerId::Attack { kind, job } => Event::AttackStep { kind, job },
        }
    }

    /// Timer this event was fired by.
    pub fn timer(&self) -> TimerId {
        match *self {
            Event::Tick => TimerId::Tick,
            Event::GenerateDownstream => TimerId::DownstreamGenerator,
            Event::GenerateUpstream => TimerId::UpstreamGenerator,
            Event::FlowSettled => TimerId::FlowSettle,
            Event::FlowDwellElapsed => TimerId::FlowDwell,
            Event::PacketExpired { packet } => TimerId::PacketTtl(packet),
            Event::AttackStep { kind, job } => TimerId::Attack { kind, job },
        }
    }
}
