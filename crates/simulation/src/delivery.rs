//! Per-lineage delivery dedup.
//!
//! Fan-out can reach a device over more than one path in meshed topologies.
//! Each `(origin, device)` pair is admitted once; entries older than the
//! horizon are pruned so long runs stay bounded.

use gpon_types::{AttackKind, DeviceId, Direction, Packet, PacketId};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// A packet that reached a terminal device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub packet: PacketId,
    pub origin: PacketId,
    pub device: DeviceId,
    pub direction: Direction,
    pub owner: Option<AttackKind>,
    /// Time from creation to delivery.
    pub latency: Duration,
}

impl Delivery {
    pub fn new(packet: &Packet, device: DeviceId, now: Duration) -> Self {
        Self {
            packet: packet.id,
            origin: packet.origin,
            device,
            direction: packet.direction,
            owner: packet.owner,
            latency: now.saturating_sub(packet.created_at),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryTracker {
    seen: HashMap<(PacketId, DeviceId), Duration>,
}

impl DeliveryTracker {
    /// Record a visit. Returns `false` if this lineage already reached `device`.
    pub fn admit(&mut self, origin: PacketId, device: DeviceId, now: Duration) -> bool {
        match self.seen.entry((origin, device)) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    pub fn prune(&mut self, now: Duration, horizon: Duration) {
        self.seen
            .retain(|_, first_seen| now.saturating_sub(*first_seen) < horizon);
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
