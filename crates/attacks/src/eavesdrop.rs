//! Eavesdrop: a listen-only ONU tapped into the PON.
//!
//! Setup hangs a sniffer ONU (and a capture PC behind it) off the target
//! splitter, or splices a tap splitter into the target ONU's line. Two kinds
//! of loops then run: one short-code cracking loop per reachable ONU/ONT,
//! and a capture loop copying downstream traffic to the capture PC.

use crate::common::{
    emit, ensure_short_code, legit_target, name_of, parent_of, reachable_onus, rearm, Setup, Step,
};
use crate::{
    ActiveAttack, Anchor, AttackContext, AttackError, AttackProgress, CrackState, CrackedCode,
    EavesdropConfig, Graft,
};
use gpon_core::{Action, AttackJob};
use gpon_types::{
    AttackKind, DeviceId, DeviceKind, DeviceRole, Direction, LogRecord, PacketKind, ShortCode,
};
use rand::Rng;
use std::collections::BTreeMap;
use tracing::trace;

const KIND: AttackKind = AttackKind::Eavesdrop;

pub(crate) fn setup<R: Rng>(
    config: &EavesdropConfig,
    target: Option<DeviceId>,
    graft: &mut Graft,
    ctx: &mut AttackContext<'_, R>,
) -> Result<Setup, AttackError> {
    let target = target.ok_or(AttackError::MissingTarget(KIND))?;
    let target_kind = legit_target(ctx.network, KIND, target)?.kind;
    let olt = ctx.network.primary_olt().ok_or(AttackError::NoPrimaryOlt)?;
    let onus = reachable_onus(ctx.network);
    if onus.is_empty() {
        return Err(AttackError::NoOnus);
    }

    let tap = match target_kind {
        DeviceKind::Splitter => target,
        DeviceKind::Onu | DeviceKind::Ont => {
            let parent = parent_of(ctx.network, target)?;
            graft.splice(ctx.network, parent, target, "tap-splitter")?
        }
        _ => {
            return Err(AttackError::InvalidTarget {
                kind: KIND,
                device: target,
                reason: "expected an ONU/ONT or splitter",
            })
        }
    };

    for &onu in &onus {
        ensure_short_code(ctx.network, onu, ctx.rng);
    }

    let sniffer = graft.attach(ctx.network, tap, DeviceKind::Onu, DeviceRole::Sniffer, "sniffer-ont")?;
    graft.register(ctx.network, sniffer, olt, ctx.rng)?;
    let capture_pc = graft.attach(ctx.network, sniffer, DeviceKind::Pc, DeviceRole::Sniffer, "sniffer-pc")?;

    let cracking: BTreeMap<DeviceId, CrackState> = onus
        .iter()
        .map(|&onu| {
            (
                onu,
                CrackState {
                    next_candidate: ShortCode::MIN.value(),
                    attempts: 0,
                    done: false,
                },
            )
        })
        .collect();
    let mut timers: Vec<(AttackJob, _)> = vec![(AttackJob::Capture, config.capture_interval)];
    timers.extend(onus.iter().map(|&onu| (AttackJob::Crack(onu), config.crack_step)));

    let narration = LogRecord::warning(format!(
        "EAVESDROP: sniffer attached at {}, cracking {} ONU codes",
        name_of(ctx.network, tap),
        onus.len()
    ))
    .with_device(target);

    Ok(Setup {
        attacker: capture_pc,
        anchor: Anchor::PrimaryOlt,
        progress: AttackProgress::Eavesdrop {
            sniffer,
            cracking,
            cracked: Vec::new(),
            captured: 0,
        },
        timers,
        narration,
    })
}

pub(crate) fn step<R: Rng>(
    config: &EavesdropConfig,
    attack: &mut ActiveAttack,
    job: AttackJob,
    path: &[DeviceId],
    ctx: &mut AttackContext<'_, R>,
) -> Step {
    match job {
        AttackJob::Capture => capture(config, attack, path, ctx),
        AttackJob::Crack(device) => crack(config, attack, device, ctx),
        _ => Step::Continue(Vec::new()),
    }
}

/// Copy a downstream frame from the OLT to the capture PC.
fn capture<R: Rng>(
    config: &EavesdropConfig,
    attack: &mut ActiveAttack,
    path: &[DeviceId],
    ctx: &mut AttackContext<'_, R>,
) -> Step {
    let AttackProgress::Eavesdrop { sniffer, .. } = &attack.progress else {
        return Step::Continue(Vec::new());
    };
    let sniffer = *sniffer;
    let sniffer_id = ctx.network.device(sniffer).and_then(|d| d.gpon.onu_id);
    let downstream: Vec<DeviceId> = path.iter().rev().copied().collect();

    let mut actions = Vec::new();
    actions.extend(emit(
        ctx,
        attack,
        downstream,
        Direction::Downstream,
        PacketKind::Gpon,
        sniffer_id,
    ));
    actions.push(rearm(KIND, AttackJob::Capture, config.capture_interval));
    Step::Continue(actions)
}

/// Try the next candidate code against one device.
fn crack<R: Rng>(
    config: &EavesdropConfig,
    attack: &mut ActiveAttack,
    device: DeviceId,
    ctx: &mut AttackContext<'_, R>,
) -> Step {
    let AttackProgress::Eavesdrop {
        cracking, cracked, ..
    } = &mut attack.progress
    else {
        return Step::Continue(Vec::new());
    };
    let Some(state) = cracking.get_mut(&device) else {
        return Step::Continue(Vec::new());
    };
    let Some(code) = ctx.network.device(device).and_then(|d| d.gpon.short_code) else {
        // Device vanished or never got a code; this loop ends.
        state.done = true;
        return Step::Continue(Vec::new());
    };
    if state.done {
        return Step::Continue(Vec::new());
    }

    let candidate = state.next_candidate;
    state.attempts += 1;
    trace!(%device, candidate, "Trying short code");

    if ShortCode::new(candidate) == Some(code) {
        state.done = true;
        cracked.push(CrackedCode { device, code });
        if let Some(d) = ctx.network.device_mut(device) {
            d.gpon.id_cracked = true;
        }
        attack.flagged.push(device);
        let record = LogRecord::new(
            KIND.severity(),
            format!(
                "EAVESDROP: code {code} cracked for {} after {} attempts",
                name_of(ctx.network, device),
                state.attempts
            ),
        )
        .with_device(device);
        return Step::Continue(vec![Action::Log(record)]);
    }

    state.next_candidate = candidate.saturating_add(1);
    if state.attempts >= config.crack_attempt_cap || state.next_candidate > ShortCode::MAX.value() {
        state.done = true;
        let record = LogRecord::info(format!(
            "EAVESDROP: gave up on {} after {} attempts",
            name_of(ctx.network, device),
            state.attempts
        ))
        .with_device(device);
        return Step::Continue(vec![Action::Log(record)]);
    }

    Step::Continue(vec![rearm(KIND, AttackJob::Crack(device), config.crack_step)])
}
