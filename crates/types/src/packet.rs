//! Packets travelling over the simulated network.

use crate::pathfinder::normalize_path;
use crate::{AttackKind, DeviceId, OnuId, PacketId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Logical traffic direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// OLT toward subscribers.
    Downstream,
    /// Subscribers toward OLT.
    Upstream,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Downstream => f.write_str("DOWNSTREAM"),
            Direction::Upstream => f.write_str("UPSTREAM"),
        }
    }
}

/// Logical packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketKind {
    Gpon,
    Ethernet,
    Ip,
    /// Physical-layer OAM (registration, ranging).
    Ploam,
}

/// What a packet carries. Dispatcher rules may treat attack payloads specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadKind {
    Broadcast,
    Service,
    UserTraffic,
    Response,
    Attack,
}

/// A packet and its planned walk through the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub id: PacketId,
    /// Generated packet this one descends from (itself for originals).
    pub origin: PacketId,
    pub kind: PacketKind,
    pub payload: PayloadKind,
    pub direction: Direction,
    pub source: DeviceId,
    /// Last device of the planned path.
    pub destination: DeviceId,
    /// Target ONU for directed downstream traffic; stamped by ONUs upstream.
    pub target_onu: Option<OnuId>,
    /// Planned walk, no immediate repeats.
    pub path: Vec<DeviceId>,
    /// Index into `path` of the device currently holding the packet.
    pub current_position: usize,
    pub created_at: Duration,
    /// Attack that emitted this packet (inherited by every copy).
    pub owner: Option<AttackKind>,
}

impl Packet {
    /// Create a packet that will walk `path`. Returns `None` for an empty path.
    pub fn along(
        id: PacketId,
        path: Vec<DeviceId>,
        direction: Direction,
        kind: PacketKind,
        payload: PayloadKind,
        created_at: Duration,
    ) -> Option<Self> {
        let path = normalize_path(path);
        let source = *path.first()?;
        let destination = *path.last()?;
        Some(Self {
            id,
            origin: id,
            kind,
            payload,
            direction,
            source,
            destination,
            target_onu: None,
            path,
            current_position: 0,
            created_at,
            owner: None,
        })
    }

    pub fn with_target(mut self, target: Option<OnuId>) -> Self {
        self.target_onu = target;
        self
    }

    pub fn with_owner(mut self, owner: AttackKind) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Device the packet currently sits at.
    pub fn current_device(&self) -> Option<DeviceId> {
        self.path.get(self.current_position).copied()
    }

    /// Next planned hop, if any.
    pub fn next_hop(&self) -> Option<DeviceId> {
        self.path.get(self.current_position + 1).copied()
    }

    /// Hops left on the planned path.
    pub fn remaining_hops(&self) -> usize {
        self.path.len().saturating_sub(self.current_position + 1)
    }

    pub fn is_attack(&self) -> bool {
        self.payload == PayloadKind::Attack
    }

    /// Move one hop forward along the path. Never moves backwards.
    pub fn advance(&mut self) {
        if self.current_position + 1 < self.path.len() {
            self.current_position += 1;
        }
    }

    /// Copy of this packet re-routed from the current device to `next`.
    ///
    /// The walked prefix is kept. If `next` is the planned next hop the rest of
    /// the plan is kept too, otherwise the plan is cut to end at `next`.
    pub fn forward_to(&self, next: DeviceId, id: PacketId) -> Packet {
        let walked = self.current_position.min(self.path.len().saturating_sub(1));
        let mut path: Vec<DeviceId> = self.path[..=walked].to_vec();
        if self.next_hop() == Some(next) {
            path.extend_from_slice(&self.path[walked + 1..]);
        } else {
            path.push(next);
        }
        let path = normalize_path(path);
        let destination = path.last().copied().unwrap_or(next);
        Packet {
            id,
            destination,
            path,
            current_position: walked,
            ..self.clone()
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} {} {} -> {}",
            self.id, self.payload, self.direction, self.source, self.destination
        )
    }
}
