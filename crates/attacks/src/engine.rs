//! Attack engine: lifecycle of every running attack.
//!
//! The engine owns one [`ActiveAttack`] per kind. Starting an attack grafts
//! its devices into the network and returns the timers that drive it; each
//! timer firing revalidates the attacker's path before running one step.
//! Stopping (explicitly, on a terminal outcome, or after failed validation)
//! goes through a single teardown that cancels timers, purges packets,
//! removes injected devices, restores replaced links and clears flags.

use crate::common::{name_of, Setup, Step};
use crate::{
    ddos, eavesdrop, guessing, rogue, spoof, ActiveAttack, Anchor, AttackConfig, AttackContext,
    AttackError, AttackProgress, Graft,
};
use gpon_core::{Action, AttackJob, CongestionState, TimerId};
use gpon_types::{
    shortest_path, AttackKind, DeviceId, LogRecord, Network, Packet, PacketId,
};
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Runs attacks against a [`Network`].
#[derive(Debug, Clone, Default)]
pub struct AttackEngine {
    config: AttackConfig,
    attacks: BTreeMap<AttackKind, ActiveAttack>,
}

impl AttackEngine {
    pub fn new(config: AttackConfig) -> Self {
        Self {
            config,
            attacks: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &AttackConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: AttackConfig) {
        self.config = config;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════

    /// Start an attack.
    ///
    /// On error every device grafted so far is removed again and the network
    /// is left as it was.
    pub fn start<R: Rng>(
        &mut self,
        kind: AttackKind,
        target: Option<DeviceId>,
        ctx: &mut AttackContext<'_, R>,
    ) -> Result<Vec<Action>, AttackError> {
        if self.attacks.contains_key(&kind) {
            return Err(AttackError::AlreadyActive(kind));
        }
        if kind.requires_target() && target.is_none() {
            return Err(AttackError::MissingTarget(kind));
        }
        ctx.network.primary_olt().ok_or(AttackError::NoPrimaryOlt)?;

        let mut graft = Graft::default();
        let setup = match kind {
            AttackKind::Eavesdrop => {
                eavesdrop::setup(&self.config.eavesdrop, target, &mut graft, ctx)
            }
            AttackKind::BruteforceId | AttackKind::UnauthorizedOnt => {
                guessing::setup(&self.config.guessing, kind, target, &mut graft, ctx)
            }
            AttackKind::Ddos => ddos::setup(&self.config.ddos, target, &mut graft, ctx),
            AttackKind::RogueOnu => rogue::setup(&self.config.rogue, target, &mut graft, ctx),
            AttackKind::OntSpoof => spoof::setup(&self.config.spoof, target, &mut graft, ctx),
        };
        let Setup {
            attacker,
            anchor,
            progress,
            timers,
            narration,
        } = match setup {
            Ok(setup) => setup,
            Err(error) => {
                if let Err(undo) = graft.undo(ctx.network) {
                    warn!(%kind, error = %undo, "Rollback after failed start was incomplete");
                }
                debug!(%kind, %error, "Attack refused");
                return Err(error);
            }
        };

        info!(
            %kind,
            target = ?target,
            injected = graft.devices.len(),
            "Attack started"
        );

        let mut actions = vec![Action::Log(narration)];
        actions.extend(
            timers
                .into_iter()
                .map(|(job, after)| Action::set_timer(TimerId::attack(kind, job), after)),
        );

        self.attacks.insert(
            kind,
            ActiveAttack {
                kind,
                active: true,
                target,
                attacker,
                anchor,
                injected: graft.devices,
                replaced_link: graft.replaced,
                allow_listed: graft.allow_listed,
                flagged: Vec::new(),
                packets: BTreeSet::new(),
                started_at: ctx.now,
                progress,
            },
        );
        Ok(actions)
    }

    /// Stop an attack. Stopping an attack that is not running is a no-op.
    pub fn stop(&mut self, kind: AttackKind, network: &mut Network) -> Vec<Action> {
        if !self.attacks.contains_key(&kind) {
            return Vec::new();
        }
        let mut actions = vec![Action::Log(LogRecord::info(format!("{kind} attack stopped")))];
        actions.extend(self.teardown(kind, network));
        actions
    }

    /// Stop every running attack.
    pub fn stop_all(&mut self, network: &mut Network) -> Vec<Action> {
        let kinds: Vec<AttackKind> = self.attacks.keys().copied().collect();
        kinds
            .into_iter()
            .flat_map(|kind| self.stop(kind, network))
            .collect()
    }

    /// Single cleanup path for every way an attack ends.
    fn teardown(&mut self, kind: AttackKind, network: &mut Network) -> Vec<Action> {
        let Some(attack) = self.attacks.remove(&kind) else {
            return Vec::new();
        };
        let mut actions = vec![
            Action::CancelAttackTimers { kind },
            Action::PurgePackets { owner: kind },
        ];

        let mut graft = Graft {
            devices: attack.injected,
            replaced: attack.replaced_link,
            allow_listed: attack.allow_listed,
        };
        if let Err(error) = graft.undo(network) {
            actions.push(Action::Log(LogRecord::warning(format!(
                "{kind}: could not restore original link: {error}"
            ))));
        }

        for device in attack.flagged {
            if let Some(device) = network.device_mut(device) {
                device.gpon.id_cracked = false;
                device.gpon.compromised = false;
            }
        }
        if let AttackProgress::Flood {
            overloaded_olt: Some(olt),
            ..
        } = attack.progress
        {
            if let Some(device) = network.device_mut(olt) {
                device.set_overloaded(false);
            }
        }

        info!(%kind, "Attack torn down");
        actions
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Event handlers
    // ═══════════════════════════════════════════════════════════════════════

    /// Run one step of an attack loop.
    ///
    /// The attacker's path to its anchor is revalidated first; if it is gone
    /// the attack logs once and disables itself.
    pub fn on_timer<R: Rng>(
        &mut self,
        kind: AttackKind,
        job: AttackJob,
        ctx: &mut AttackContext<'_, R>,
    ) -> Vec<Action> {
        let Some(attack) = self.attacks.get_mut(&kind) else {
            return Vec::new();
        };

        let path = match validate(attack, ctx.network) {
            Ok(path) => path,
            Err(reason) => {
                warn!(%kind, attacker = %attack.attacker, reason, "Attack lost its path");
                let record = LogRecord::warning(format!("{kind} disabled: {reason}"))
                    .with_device(attack.attacker);
                let mut actions = vec![Action::Log(record)];
                actions.extend(self.teardown(kind, ctx.network));
                return actions;
            }
        };

        let config = &self.config;
        let step = match kind {
            AttackKind::Eavesdrop => eavesdrop::step(&config.eavesdrop, attack, job, &path, ctx),
            AttackKind::BruteforceId | AttackKind::UnauthorizedOnt => {
                guessing::step(&config.guessing, attack, &path, ctx)
            }
            AttackKind::Ddos => ddos::step(&config.ddos, attack, &path, ctx),
            AttackKind::RogueOnu => rogue::step(&config.rogue, attack, &path, ctx),
            AttackKind::OntSpoof => spoof::step(&config.spoof, attack, job, &path, ctx),
        };

        match step {
            Step::Continue(actions) => actions,
            Step::Finish(mut actions) => {
                actions.extend(self.teardown(kind, ctx.network));
                actions
            }
        }
    }

    /// A packet reached a device.
    ///
    /// Flood packets arriving at the primary OLT feed the overload detector;
    /// captured frames arriving at the sniffer PC are counted.
    pub fn on_delivered(
        &mut self,
        packet: &Packet,
        device: DeviceId,
        network: &mut Network,
    ) -> Vec<Action> {
        let Some(kind) = packet.owner else {
            return Vec::new();
        };
        let Some(attack) = self.attacks.get_mut(&kind) else {
            return Vec::new();
        };
        if network.primary_olt() == Some(device)
            && matches!(attack.progress, AttackProgress::Flood { .. })
        {
            return ddos::on_arrival(&self.config.ddos, attack, device, packet.created_at, network);
        }
        if let AttackProgress::Eavesdrop { captured, .. } = &mut attack.progress {
            if device == attack.attacker {
                *captured += 1;
            }
        }
        Vec::new()
    }

    /// A packet left the simulation (delivered, dropped or expired).
    pub fn forget_packet(&mut self, packet: PacketId) {
        for attack in self.attacks.values_mut() {
            attack.packets.remove(&packet);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Current congestion marker for the dispatcher.
    pub fn congestion(&self) -> CongestionState {
        self.attacks
            .values()
            .find_map(|attack| match attack.progress {
                AttackProgress::Flood {
                    congestion_node,
                    overloaded_olt: Some(_),
                    ..
                } => Some(CongestionState::at(congestion_node)),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn is_active(&self, kind: AttackKind) -> bool {
        self.attacks.contains_key(&kind)
    }

    pub fn get(&self, kind: AttackKind) -> Option<&ActiveAttack> {
        self.attacks.get(&kind)
    }

    pub fn attacks(&self) -> impl Iterator<Item = &ActiveAttack> {
        self.attacks.values()
    }

    /// Human-readable status line per running attack.
    pub fn describe(&self, network: &Network) -> Vec<String> {
        self.attacks
            .values()
            .map(|attack| {
                format!(
                    "{} via {}: {}",
                    attack.kind,
                    name_of(network, attack.attacker),
                    attack.progress.summary()
                )
            })
            .collect()
    }
}

/// Path from the attacker to its anchor, or why there is none.
fn validate(attack: &ActiveAttack, network: &Network) -> Result<Vec<DeviceId>, &'static str> {
    if !network.contains(attack.attacker) {
        return Err("attacker device was removed");
    }
    let anchor = match attack.anchor {
        Anchor::PrimaryOlt => network.primary_olt().ok_or("no primary OLT")?,
        Anchor::Device(device) => device,
    };
    if !network.contains(anchor) {
        return Err("victim device was removed");
    }
    let graph = network.graph();
    shortest_path(&graph, attack.attacker, anchor).ok_or("no path to the network")
}
