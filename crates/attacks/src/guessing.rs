//! Identifier guessing: Bruteforce-ID and Unauthorized-ONT.
//!
//! A rogue ONU sits under a splitter and sends PLOAM frames carrying
//! successive ONU ID guesses toward the OLT. Each guess is accepted with an
//! independent probability (Bruteforce-ID also succeeds when the guess equals
//! the victim's ID). Once accepted the rogue adopts the ID and keeps sending
//! traffic under it.

use crate::common::{
    attachment_point, emit, legit_target, name_of, onu_target, parent_of, rearm, Setup, Step,
};
use crate::{
    ActiveAttack, Anchor, AttackContext, AttackError, AttackProgress, Graft, GuessingConfig,
};
use gpon_core::{Action, AttackJob};
use gpon_types::{
    AttackKind, DeviceId, DeviceKind, DeviceRole, Direction, LogRecord, OnuId, PacketKind,
};
use rand::Rng;
use serde_json::json;

pub(crate) fn setup<R: Rng>(
    config: &GuessingConfig,
    kind: AttackKind,
    target: Option<DeviceId>,
    graft: &mut Graft,
    ctx: &mut AttackContext<'_, R>,
) -> Result<Setup, AttackError> {
    let (victim, parent) = match kind {
        AttackKind::BruteforceId => {
            let victim = onu_target(ctx.network, kind, target)?;
            if !legit_target(ctx.network, kind, victim)?.is_registered() {
                return Err(AttackError::InvalidTarget {
                    kind,
                    device: victim,
                    reason: "victim is not registered",
                });
            }
            (Some(victim), parent_of(ctx.network, victim)?)
        }
        _ => (None, attachment_point(ctx.network, kind, target)?),
    };

    let rogue = graft.attach(ctx.network, parent, DeviceKind::Onu, DeviceRole::RogueOnu, "ont-rogue")?;

    let narration = LogRecord::warning(format!(
        "{kind}: rogue ONU attached under {}, guessing ONU IDs every {:?}",
        name_of(ctx.network, parent),
        config.guess_interval
    ))
    .with_device(victim.unwrap_or(parent));

    Ok(Setup {
        attacker: rogue,
        anchor: Anchor::PrimaryOlt,
        progress: AttackProgress::Guessing {
            rogue,
            victim,
            next_candidate: OnuId(1),
            attempts: 0,
            adopted: None,
        },
        timers: vec![(AttackJob::Guess, config.guess_interval)],
        narration,
    })
}

pub(crate) fn step<R: Rng>(
    config: &GuessingConfig,
    attack: &mut ActiveAttack,
    path: &[DeviceId],
    ctx: &mut AttackContext<'_, R>,
) -> Step {
    let kind = attack.kind;
    let AttackProgress::Guessing {
        rogue,
        victim,
        next_candidate,
        attempts,
        adopted,
    } = &mut attack.progress
    else {
        return Step::Continue(Vec::new());
    };
    let (rogue, victim) = (*rogue, *victim);

    // Already in: keep talking under the stolen identity.
    if let Some(id) = *adopted {
        let mut actions = Vec::new();
        actions.extend(emit(ctx, attack, path.to_vec(), Direction::Upstream, PacketKind::Gpon, Some(id)));
        actions.push(rearm(kind, AttackJob::Guess, config.guess_interval));
        return Step::Continue(actions);
    }

    let candidate = *next_candidate;
    *next_candidate = candidate.next();
    *attempts += 1;
    let attempts = *attempts;
    let victim_id = victim
        .and_then(|v| ctx.network.device(v))
        .and_then(|d| d.gpon.onu_id);
    let accepted = victim_id == Some(candidate)
        || ctx.rng.gen_bool(config.success_probability.clamp(0.0, 1.0));

    let mut actions = Vec::new();
    actions.extend(emit(ctx, attack, path.to_vec(), Direction::Upstream, PacketKind::Ploam, Some(candidate)));

    if accepted {
        return Step::Continue(adopt(config, attack, rogue, candidate, attempts, actions, ctx));
    }
    if attempts >= config.attempt_cap {
        actions.push(Action::Log(
            LogRecord::error(format!("{kind}: gave up after {attempts} rejected guesses"))
                .with_device(rogue),
        ));
        return Step::Finish(actions);
    }
    actions.push(rearm(kind, AttackJob::Guess, config.guess_interval));
    Step::Continue(actions)
}

/// The OLT accepted `candidate`: the rogue takes it on.
fn adopt<R: Rng>(
    config: &GuessingConfig,
    attack: &mut ActiveAttack,
    rogue: DeviceId,
    candidate: OnuId,
    attempts: u32,
    mut actions: Vec<Action>,
    ctx: &mut AttackContext<'_, R>,
) -> Vec<Action> {
    let kind = attack.kind;
    if let AttackProgress::Guessing { adopted, .. } = &mut attack.progress {
        *adopted = Some(candidate);
    }
    if let Some(device) = ctx.network.device_mut(rogue) {
        device.gpon.onu_id = Some(candidate);
        device.gpon.alloc_id = Some(candidate.alloc_id());
        device.gpon.gem_port = Some(candidate.gem_port());
    }

    actions.push(Action::Log(
        LogRecord::new(
            kind.severity(),
            format!("{kind}: OLT accepted guessed {candidate} after {attempts} attempts"),
        )
        .with_device(rogue)
        .with_details(json!({ "onu_id": candidate.0, "attempts": attempts })),
    ));

    let holder = ctx
        .network
        .devices()
        .find(|d| d.id != rogue && d.gpon.onu_id == Some(candidate))
        .map(|d| (d.id, d.name.clone()));
    if let Some((holder, name)) = holder {
        actions.push(Action::Log(
            LogRecord::warning(format!("ID collision: {candidate} is also used by {name}"))
                .with_device(holder),
        ));
    }

    actions.push(rearm(kind, AttackJob::Guess, config.guess_interval));
    actions
}
