//! Helpers shared by the attack state machines.

use crate::{ActiveAttack, Anchor, AttackError, AttackProgress};
use gpon_core::{Action, AttackJob};
use gpon_types::{
    AttackKind, Device, DeviceId, DeviceKind, Direction, LogRecord, Network, OnuId, Packet,
    PacketIdAllocator, PacketKind, PayloadKind, PortMedium, ShortCode,
};
use rand::Rng;
use std::time::Duration;

/// Mutable world an attack step runs against.
pub struct AttackContext<'a, R: Rng> {
    pub network: &'a mut Network,
    pub rng: &'a mut R,
    pub ids: &'a mut PacketIdAllocator,
    pub now: Duration,
}

/// What a successful setup hands back to the engine.
pub(crate) struct Setup {
    pub attacker: DeviceId,
    pub anchor: Anchor,
    pub progress: AttackProgress,
    pub timers: Vec<(AttackJob, Duration)>,
    pub narration: LogRecord,
}

/// Outcome of one loop step.
pub(crate) enum Step {
    /// Keep running; actions include any re-armed timers.
    Continue(Vec<Action>),
    /// Terminal success or failure; the engine tears the attack down.
    Finish(Vec<Action>),
}

/// Look up a target and require it to be a legitimate device.
pub(crate) fn legit_target(
    network: &Network,
    kind: AttackKind,
    target: DeviceId,
) -> Result<&Device, AttackError> {
    let device = network
        .device(target)
        .ok_or(AttackError::UnknownTarget(target))?;
    if !device.role.is_legitimate() {
        return Err(AttackError::InvalidTarget {
            kind,
            device: target,
            reason: "attack devices cannot be targeted",
        });
    }
    Ok(device)
}

/// Require a legitimate ONU/ONT target.
pub(crate) fn onu_target(
    network: &Network,
    kind: AttackKind,
    target: Option<DeviceId>,
) -> Result<DeviceId, AttackError> {
    let target = target.ok_or(AttackError::MissingTarget(kind))?;
    let device = legit_target(network, kind, target)?;
    if !device.is_onu() {
        return Err(AttackError::InvalidTarget {
            kind,
            device: target,
            reason: "expected an ONU/ONT",
        });
    }
    Ok(target)
}

/// Upstream neighbor of `device` in the current hierarchy.
pub(crate) fn parent_of(network: &Network, device: DeviceId) -> Result<DeviceId, AttackError> {
    let graph = network.graph();
    network
        .hierarchy(&graph)
        .upstream_of(&graph, device)
        .ok_or(AttackError::Unreachable(device))
}

/// Where to hang an injected ONU.
///
/// A splitter or OLT target is used directly, an ONU/ONT target resolves to
/// its parent. Without a target the first reachable legitimate splitter with
/// a free optical port is used, then the primary OLT.
pub(crate) fn attachment_point(
    network: &Network,
    kind: AttackKind,
    target: Option<DeviceId>,
) -> Result<DeviceId, AttackError> {
    if let Some(target) = target {
        let device = legit_target(network, kind, target)?;
        return match device.kind {
            DeviceKind::Splitter | DeviceKind::Olt => Ok(target),
            DeviceKind::Onu | DeviceKind::Ont => parent_of(network, target),
            DeviceKind::Router | DeviceKind::Switch | DeviceKind::Pc | DeviceKind::Server => {
                Err(AttackError::InvalidTarget {
                    kind,
                    device: target,
                    reason: "expected an ONU/ONT, splitter or OLT",
                })
            }
        };
    }

    let graph = network.graph();
    let hierarchy = network.hierarchy(&graph);
    let has_room = |d: &&Device| d.free_port(PortMedium::Optical).is_some();
    network
        .devices()
        .filter(|d| d.kind == DeviceKind::Splitter && d.role.is_legitimate())
        .filter(|d| hierarchy.is_reachable(d.id))
        .find(has_room)
        .or_else(|| {
            network
                .primary_olt()
                .and_then(|olt| network.device(olt))
                .filter(has_room)
        })
        .map(|d| d.id)
        .ok_or(AttackError::NoAttachmentPoint)
}

/// Legitimate ONU/ONTs the primary OLT can reach.
pub(crate) fn reachable_onus(network: &Network) -> Vec<DeviceId> {
    let graph = network.graph();
    let hierarchy = network.hierarchy(&graph);
    network
        .devices()
        .filter(|d| d.is_onu() && d.role.is_legitimate() && hierarchy.is_reachable(d.id))
        .map(|d| d.id)
        .collect()
}

/// Give `device` a random short code if it has none. Returns the code.
pub(crate) fn ensure_short_code(
    network: &mut Network,
    device: DeviceId,
    rng: &mut impl Rng,
) -> Option<ShortCode> {
    let device = network.device_mut(device)?;
    if device.gpon.short_code.is_none() {
        device.gpon.short_code =
            ShortCode::new(rng.gen_range(ShortCode::MIN.value()..=ShortCode::MAX.value()));
    }
    device.gpon.short_code
}

/// Display name of a device, falling back to its id.
pub(crate) fn name_of(network: &Network, device: DeviceId) -> String {
    network
        .device(device)
        .map_or_else(|| device.to_string(), |d| d.name.clone())
}

/// Build an attack-owned packet along `path` and record its id.
pub(crate) fn emit<R: Rng>(
    ctx: &mut AttackContext<'_, R>,
    attack: &mut ActiveAttack,
    path: Vec<DeviceId>,
    direction: Direction,
    kind: PacketKind,
    target_onu: Option<OnuId>,
) -> Option<Action> {
    if path.len() < 2 {
        return None;
    }
    let id = ctx.ids.next_id();
    let packet = Packet::along(id, path, direction, kind, PayloadKind::Attack, ctx.now)?
        .with_target(target_onu)
        .with_owner(attack.kind);
    attack.packets.insert(id);
    Some(Action::EmitPacket { packet })
}

/// Re-arm a recurring attack job.
pub(crate) fn rearm(kind: AttackKind, job: AttackJob, after: Duration) -> Action {
    Action::set_timer(gpon_core::TimerId::attack(kind, job), after)
}
