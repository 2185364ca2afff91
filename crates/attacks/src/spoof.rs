//! ONT spoof: a substitute ONT brute-forces the victim's short code and
//! takes over its line.
//!
//! ```text
//!  BruteForcing:   parent ── tap ── victim          TakenOver:   parent ── substitute ══ victim
//!                             └── substitute ── pc                             └── pc
//! ```
//!
//! Keys run 01..99. Once the key matches (or the search is forced at 99) the tap splitter is
//! removed, the substitute takes the parent's original port, the victim is
//! bridged behind the substitute over ethernet and forged request/response
//! pairs start flowing between the attacker PC and the OLT.

use crate::common::{
    emit, ensure_short_code, name_of, onu_target, parent_of, rearm, Setup, Step,
};
use crate::{
    ActiveAttack, Anchor, AttackContext, AttackError, AttackProgress, Graft, OntSpoofConfig,
    SpoofPhase,
};
use gpon_core::{Action, AttackJob};
use gpon_types::{
    AttackKind, DeviceId, DeviceKind, DeviceRole, Direction, LogRecord, PacketKind, PortMedium,
    ShortCode, TopologyError,
};
use rand::Rng;
use serde_json::json;

const KIND: AttackKind = AttackKind::OntSpoof;

pub(crate) fn setup<R: Rng>(
    config: &OntSpoofConfig,
    target: Option<DeviceId>,
    graft: &mut Graft,
    ctx: &mut AttackContext<'_, R>,
) -> Result<Setup, AttackError> {
    let victim = onu_target(ctx.network, KIND, target)?;
    let parent = parent_of(ctx.network, victim)?;
    let victim_code =
        ensure_short_code(ctx.network, victim, ctx.rng).ok_or(AttackError::UnknownTarget(victim))?;

    let tap = graft.splice(ctx.network, parent, victim, "tap-splitter")?;
    let substitute = graft.attach(ctx.network, tap, DeviceKind::Ont, DeviceRole::Substitute, "ont-spoof")?;
    let endpoint = graft.attach(ctx.network, substitute, DeviceKind::Pc, DeviceRole::Attacker, "attacker-pc")?;

    let narration = LogRecord::warning(format!(
        "ONT_SPOOF: substitute {} spliced beside {}, brute-forcing its short code",
        name_of(ctx.network, substitute),
        name_of(ctx.network, victim)
    ))
    .with_device(victim);

    Ok(Setup {
        attacker: substitute,
        anchor: Anchor::Device(victim),
        progress: AttackProgress::Spoof {
            victim,
            parent,
            substitute,
            endpoint,
            victim_code,
            current_key: None,
            matched: None,
            forced: false,
            phase: SpoofPhase::BruteForcing,
        },
        timers: vec![(AttackJob::SpoofStep, config.step_interval)],
        narration,
    })
}

pub(crate) fn step<R: Rng>(
    config: &OntSpoofConfig,
    attack: &mut ActiveAttack,
    job: AttackJob,
    path: &[DeviceId],
    ctx: &mut AttackContext<'_, R>,
) -> Step {
    match job {
        AttackJob::SpoofStep => brute_force(config, attack, ctx),
        AttackJob::SpoofTraffic => forge_traffic(config, attack, path, ctx),
        _ => Step::Continue(Vec::new()),
    }
}

/// Try the next key; take over on a match or once the key space is spent.
fn brute_force<R: Rng>(
    config: &OntSpoofConfig,
    attack: &mut ActiveAttack,
    ctx: &mut AttackContext<'_, R>,
) -> Step {
    let AttackProgress::Spoof {
        victim,
        victim_code,
        current_key,
        matched,
        forced,
        phase: SpoofPhase::BruteForcing,
        ..
    } = &mut attack.progress
    else {
        return Step::Continue(Vec::new());
    };

    let key = match *current_key {
        None => ShortCode::MIN,
        Some(key) => key.next().unwrap_or(ShortCode::MAX),
    };
    *current_key = Some(key);

    // The victim may be re-keyed mid-search; keys already tried stay tried.
    let live_code = ctx
        .network
        .device(*victim)
        .and_then(|d| d.gpon.short_code)
        .unwrap_or(*victim_code);
    *victim_code = live_code;

    if key == live_code {
        *matched = Some(key);
    } else if key == ShortCode::MAX {
        *matched = Some(key);
        *forced = true;
    } else {
        return Step::Continue(vec![rearm(KIND, AttackJob::SpoofStep, config.step_interval)]);
    }

    match take_over(config, attack, ctx) {
        Ok(actions) => Step::Continue(actions),
        Err(error) => Step::Finish(vec![Action::Log(
            LogRecord::error(format!("ONT_SPOOF: takeover failed: {error}"))
                .with_device(attack.attacker),
        )]),
    }
}

/// Rewire the victim's line through the substitute.
fn take_over<R: Rng>(
    config: &OntSpoofConfig,
    attack: &mut ActiveAttack,
    ctx: &mut AttackContext<'_, R>,
) -> Result<Vec<Action>, AttackError> {
    let AttackProgress::Spoof {
        victim,
        parent,
        substitute,
        endpoint,
        matched,
        forced,
        ..
    } = attack.progress.clone()
    else {
        return Ok(Vec::new());
    };
    let network = &mut *ctx.network;

    let tap = attack
        .injected
        .iter()
        .copied()
        .find(|&d| network.device(d).map(|d| d.role) == Some(DeviceRole::TapSplitter));
    if let Some(tap) = tap {
        network.remove_device(tap)?;
        attack.injected.retain(|&d| d != tap);
    }

    let snapshot = attack
        .replaced_link
        .ok_or(AttackError::Unreachable(victim))?;
    let parent_end = if snapshot.a.device == parent {
        snapshot.a
    } else {
        snapshot.b
    };
    let uplink = network
        .device(substitute)
        .and_then(|d| {
            d.ports
                .iter()
                .find(|p| p.medium == PortMedium::Optical)
                .map(|p| p.number)
        })
        .ok_or(TopologyError::NoFreePort { device: substitute })?;
    network.connect_ports(parent_end.device, parent_end.port, substitute, uplink)?;

    let free_ethernet = |device: DeviceId| {
        network
            .device(device)
            .and_then(|d| d.free_port(PortMedium::Ethernet))
            .ok_or(TopologyError::NoFreePort { device })
    };
    let victim_port = free_ethernet(victim)?;
    let substitute_port = free_ethernet(substitute)?;
    network.connect_ports(victim, victim_port, substitute, substitute_port)?;

    let victim_gpon = match network.device_mut(victim) {
        Some(device) => {
            device.gpon.compromised = true;
            device.gpon.id_cracked = true;
            device.gpon.clone()
        }
        None => return Err(AttackError::UnknownTarget(victim)),
    };
    if let Some(device) = network.device_mut(substitute) {
        device.gpon.onu_id = victim_gpon.onu_id;
        device.gpon.alloc_id = victim_gpon.alloc_id;
        device.gpon.gem_port = victim_gpon.gem_port;
        device.gpon.serial_number = victim_gpon.serial_number.clone();
        device.gpon.short_code = victim_gpon.short_code;
    }

    attack.flagged.push(victim);
    attack.attacker = endpoint;
    attack.anchor = Anchor::PrimaryOlt;
    if let AttackProgress::Spoof { phase, .. } = &mut attack.progress {
        *phase = SpoofPhase::TakenOver;
    }

    let key = matched.map_or_else(|| "--".to_string(), |k| k.to_string());
    let how = if forced { "forced" } else { "matched" };
    let record = LogRecord::new(
        KIND.severity(),
        format!(
            "ONT_SPOOF: key {key} {how}, {} took over {}'s line",
            name_of(network, substitute),
            name_of(network, victim)
        ),
    )
    .with_device(victim)
    .with_details(json!({ "key": key, "forced": forced }));

    Ok(vec![
        Action::Log(record),
        rearm(KIND, AttackJob::SpoofTraffic, config.traffic_interval),
    ])
}

/// Forged request up to the OLT and its response back to the attacker PC.
fn forge_traffic<R: Rng>(
    config: &OntSpoofConfig,
    attack: &mut ActiveAttack,
    path: &[DeviceId],
    ctx: &mut AttackContext<'_, R>,
) -> Step {
    let AttackProgress::Spoof {
        victim,
        phase: SpoofPhase::TakenOver,
        ..
    } = &attack.progress
    else {
        return Step::Continue(Vec::new());
    };
    let victim_id = ctx.network.device(*victim).and_then(|d| d.gpon.onu_id);
    let upstream = path.to_vec();
    let downstream: Vec<DeviceId> = path.iter().rev().copied().collect();

    let mut actions = Vec::new();
    actions.extend(emit(ctx, attack, upstream, Direction::Upstream, PacketKind::Ip, victim_id));
    actions.extend(emit(ctx, attack, downstream, Direction::Downstream, PacketKind::Ip, victim_id));
    actions.push(rearm(KIND, AttackJob::SpoofTraffic, config.traffic_interval));
    Step::Continue(actions)
}
