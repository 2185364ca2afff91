//! Rogue ONU registration with spoofed serial numbers.
//!
//! Once the OLT accepts a forged serial the rogue is an ordinary registered
//! ONU: the dispatcher stamps its ID on upstream traffic and hands it
//! downstream frames addressed to that ID. The register job keeps firing as
//! a keep-alive exchange between the attacker PC and the OLT.

use crate::common::{attachment_point, emit, name_of, rearm, Setup, Step};
use crate::{
    ActiveAttack, Anchor, AttackContext, AttackError, AttackProgress, Graft, RogueOnuConfig,
};
use gpon_core::{Action, AttackJob};
use gpon_types::{
    generate_serial, AttackKind, DeviceId, DeviceKind, DeviceRole, Direction, LogRecord, OnuId,
    PacketKind,
};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;

const KIND: AttackKind = AttackKind::RogueOnu;

/// Vendor prefixes the rogue cycles through when forging serials.
const SPOOFED_VENDORS: [&str; 4] = ["HWTC", "ZTEG", "ALCL", "GPON"];

pub(crate) fn setup<R: Rng>(
    config: &RogueOnuConfig,
    target: Option<DeviceId>,
    graft: &mut Graft,
    ctx: &mut AttackContext<'_, R>,
) -> Result<Setup, AttackError> {
    let point = attachment_point(ctx.network, KIND, target)?;
    let rogue = graft.attach(ctx.network, point, DeviceKind::Onu, DeviceRole::RogueOnu, "malicious-ont")?;
    let endpoint = graft.attach(ctx.network, rogue, DeviceKind::Pc, DeviceRole::Attacker, "attacker-pc")?;

    let narration = LogRecord::warning(format!(
        "ROGUE_ONU: malicious ONT attached at {}, attempting registration",
        name_of(ctx.network, point)
    ))
    .with_device(point);

    Ok(Setup {
        attacker: rogue,
        anchor: Anchor::PrimaryOlt,
        progress: AttackProgress::Registration {
            rogue,
            endpoint,
            attempts: 0,
            registered: None,
        },
        timers: vec![(AttackJob::Register, config.attempt_interval)],
        narration,
    })
}

pub(crate) fn step<R: Rng>(
    config: &RogueOnuConfig,
    attack: &mut ActiveAttack,
    path: &[DeviceId],
    ctx: &mut AttackContext<'_, R>,
) -> Step {
    let AttackProgress::Registration {
        rogue,
        endpoint,
        attempts,
        registered,
    } = &mut attack.progress
    else {
        return Step::Continue(Vec::new());
    };
    if let Some(onu_id) = *registered {
        let endpoint = *endpoint;
        return Step::Continue(keep_alive(config, attack, endpoint, onu_id, path, ctx));
    }
    let rogue = *rogue;
    *attempts += 1;
    let attempts = *attempts;

    let vendor = SPOOFED_VENDORS.choose(ctx.rng).copied().unwrap_or("GPON");
    let serial = generate_serial(vendor, ctx.rng);
    let accepted = ctx.rng.gen_bool(config.success_probability.clamp(0.0, 1.0));

    let mut actions = Vec::new();
    actions.extend(emit(ctx, attack, path.to_vec(), Direction::Upstream, PacketKind::Ploam, None));

    if accepted {
        let Some(olt) = ctx.network.primary_olt() else {
            return Step::Finish(actions);
        };
        let registration = match ctx.network.register_onu(rogue, olt, ctx.rng) {
            Ok(registration) => registration,
            Err(error) => {
                actions.push(Action::Log(
                    LogRecord::error(format!("ROGUE_ONU: registration failed: {error}"))
                        .with_device(rogue),
                ));
                return Step::Finish(actions);
            }
        };
        if let Some(device) = ctx.network.device_mut(rogue) {
            device.gpon.serial_number = Some(serial.clone());
            device.gpon.service_profile = Some(config.service_profile.clone());
        }
        attack.allow_listed.push(registration.onu_id);
        if let AttackProgress::Registration { registered, .. } = &mut attack.progress {
            *registered = Some(registration.onu_id);
        }
        actions.push(Action::Log(
            LogRecord::new(
                KIND.severity(),
                format!(
                    "ROGUE_ONU: spoofed serial {serial} accepted, registered as {} with profile {}",
                    registration.onu_id, config.service_profile
                ),
            )
            .with_device(rogue)
            .with_details(json!({
                "serial_number": serial,
                "onu_id": registration.onu_id.0,
                "alloc_id": registration.alloc_id,
                "gem_port": registration.gem_port,
                "attempts": attempts,
            })),
        ));
        actions.push(rearm(KIND, AttackJob::Register, config.keepalive_interval));
        return Step::Continue(actions);
    }

    if attempts >= config.attempt_cap {
        actions.push(Action::Log(
            LogRecord::error(format!("ROGUE_ONU: registration rejected {attempts} times, giving up"))
                .with_device(rogue),
        ));
        return Step::Finish(actions);
    }
    actions.push(rearm(KIND, AttackJob::Register, config.attempt_interval));
    Step::Continue(actions)
}

/// Upstream request from the attacker PC (the rogue stamps its ID on the
/// way) and a response from the OLT addressed to the registered ID.
fn keep_alive<R: Rng>(
    config: &RogueOnuConfig,
    attack: &mut ActiveAttack,
    endpoint: DeviceId,
    onu_id: OnuId,
    path: &[DeviceId],
    ctx: &mut AttackContext<'_, R>,
) -> Vec<Action> {
    let upstream: Vec<DeviceId> = std::iter::once(endpoint).chain(path.iter().copied()).collect();
    let downstream: Vec<DeviceId> = upstream.iter().rev().copied().collect();

    let mut actions = Vec::new();
    actions.extend(emit(ctx, attack, upstream, Direction::Upstream, PacketKind::Ip, None));
    actions.extend(emit(ctx, attack, downstream, Direction::Downstream, PacketKind::Ip, Some(onu_id)));
    actions.push(rearm(KIND, AttackJob::Register, config.keepalive_interval));
    actions
}
