//! Upstream flood from a DDoS source ONU.
//!
//! The source hangs off the congestion node (the target splitter, or the
//! target ONU's parent) and emits a flood packet every `flood_interval`.
//! Arrivals at the primary OLT closer together than `congestion_window`
//! build a burst; once the burst reaches `packet_threshold` the OLT is
//! marked overloaded and downstream traffic through the congestion node is
//! dropped until the attack stops.

use crate::common::{emit, legit_target, name_of, parent_of, rearm, Setup, Step};
use crate::{
    ActiveAttack, Anchor, AttackContext, AttackError, AttackProgress, DdosConfig, Graft,
};
use gpon_core::{Action, AttackJob};
use gpon_types::{
    AttackKind, DeviceId, DeviceKind, DeviceRole, Direction, LogRecord, Network, PacketKind,
};
use rand::Rng;
use serde_json::json;
use std::time::Duration;
use tracing::info;

const KIND: AttackKind = AttackKind::Ddos;

pub(crate) fn setup<R: Rng>(
    config: &DdosConfig,
    target: Option<DeviceId>,
    graft: &mut Graft,
    ctx: &mut AttackContext<'_, R>,
) -> Result<Setup, AttackError> {
    let target = target.ok_or(AttackError::MissingTarget(KIND))?;
    let node = match legit_target(ctx.network, KIND, target)?.kind {
        DeviceKind::Splitter => target,
        DeviceKind::Onu | DeviceKind::Ont => parent_of(ctx.network, target)?,
        _ => {
            return Err(AttackError::InvalidTarget {
                kind: KIND,
                device: target,
                reason: "expected an ONU/ONT or splitter",
            })
        }
    };
    let source = graft.attach(ctx.network, node, DeviceKind::Onu, DeviceRole::DdosSource, "ddos-ont")?;

    let narration = LogRecord::warning(format!(
        "DDOS: flood source attached at {}, sending every {:?}",
        name_of(ctx.network, node),
        config.flood_interval
    ))
    .with_device(target);

    Ok(Setup {
        attacker: source,
        anchor: Anchor::PrimaryOlt,
        progress: AttackProgress::Flood {
            source,
            congestion_node: node,
            sent: 0,
            burst: 0,
            last_arrival: None,
            overloaded_olt: None,
        },
        timers: vec![(AttackJob::Flood, config.flood_interval)],
        narration,
    })
}

pub(crate) fn step<R: Rng>(
    config: &DdosConfig,
    attack: &mut ActiveAttack,
    path: &[DeviceId],
    ctx: &mut AttackContext<'_, R>,
) -> Step {
    let mut actions = Vec::new();
    actions.extend(emit(ctx, attack, path.to_vec(), Direction::Upstream, PacketKind::Ip, None));
    if let AttackProgress::Flood { sent, .. } = &mut attack.progress {
        *sent += 1;
    }
    actions.push(rearm(KIND, AttackJob::Flood, config.flood_interval));
    Step::Continue(actions)
}

/// A flood packet reached the primary OLT.
///
/// Marks the OLT overloaded the first time the burst reaches the threshold;
/// later arrivals only keep the burst counter going.
///
/// Gaps are measured between emission times: every flood packet crosses the
/// same hops, so emission spacing is arrival spacing, and tick batching
/// cannot merge or split a burst.
pub(crate) fn on_arrival(
    config: &DdosConfig,
    attack: &mut ActiveAttack,
    olt: DeviceId,
    sent_at: Duration,
    network: &mut Network,
) -> Vec<Action> {
    let AttackProgress::Flood {
        congestion_node,
        burst,
        last_arrival,
        overloaded_olt,
        ..
    } = &mut attack.progress
    else {
        return Vec::new();
    };

    let close = last_arrival.map_or(true, |last| sent_at.saturating_sub(last) < config.congestion_window);
    *burst = if close { burst.saturating_add(1) } else { 1 };
    *last_arrival = Some(sent_at);

    if *burst < config.packet_threshold || overloaded_olt.is_some() {
        return Vec::new();
    }

    *overloaded_olt = Some(olt);
    if let Some(device) = network.device_mut(olt) {
        device.set_overloaded(true);
    }
    info!(%olt, burst = *burst, "OLT overloaded by flood");

    let record = LogRecord::critical(format!(
        "DDOS: {} overloaded after {} packets; congestion at {}",
        name_of(network, olt),
        burst,
        name_of(network, *congestion_node)
    ))
    .with_device(olt)
    .with_details(json!({
        "burst": *burst,
        "congestion_node": congestion_node.0,
    }));
    vec![Action::Log(record)]
}
