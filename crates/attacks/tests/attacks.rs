//! Attack lifecycle tests against the fixture topologies.

use gpon_attacks::{
    AttackConfig, AttackContext, AttackEngine, AttackError, AttackProgress, SpoofPhase,
};
use gpon_core::{Action, AttackJob, TimerId};
use gpon_test_helpers::TreeFixture;
use gpon_types::{
    AttackKind, DeviceId, DeviceRole, DeviceStatus, Direction, LogLevel, Packet, PacketId,
    PacketIdAllocator, PacketKind, PayloadKind, ShortCode,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;
use tracing_test::traced_test;

struct Harness {
    fixture: TreeFixture,
    engine: AttackEngine,
    rng: ChaCha8Rng,
    ids: PacketIdAllocator,
    now: Duration,
}

impl Harness {
    fn new(config: AttackConfig) -> Self {
        Self {
            fixture: TreeFixture::full_tree(),
            engine: AttackEngine::new(config),
            rng: ChaCha8Rng::seed_from_u64(7),
            ids: PacketIdAllocator::new(),
            now: Duration::ZERO,
        }
    }

    fn start(
        &mut self,
        kind: AttackKind,
        target: Option<DeviceId>,
    ) -> Result<Vec<Action>, AttackError> {
        let mut ctx = AttackContext {
            network: &mut self.fixture.network,
            rng: &mut self.rng,
            ids: &mut self.ids,
            now: self.now,
        };
        self.engine.start(kind, target, &mut ctx)
    }

    fn fire(&mut self, kind: AttackKind, job: AttackJob) -> Vec<Action> {
        let mut ctx = AttackContext {
            network: &mut self.fixture.network,
            rng: &mut self.rng,
            ids: &mut self.ids,
            now: self.now,
        };
        self.engine.on_timer(kind, job, &mut ctx)
    }

    fn stop(&mut self, kind: AttackKind) -> Vec<Action> {
        self.engine.stop(kind, &mut self.fixture.network)
    }
}

fn logs(actions: &[Action]) -> Vec<(LogLevel, String)> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::Log(record) => Some((record.level, record.message.clone())),
            _ => None,
        })
        .collect()
}

fn emitted(actions: &[Action]) -> Vec<&Packet> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::EmitPacket { packet } => Some(packet),
            _ => None,
        })
        .collect()
}

fn tore_down(actions: &[Action], kind: AttackKind) -> bool {
    actions.contains(&Action::CancelAttackTimers { kind })
        && actions.contains(&Action::PurgePackets { owner: kind })
}

// ═══════════════════════════════════════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_start_requires_target() {
    let mut h = Harness::new(AttackConfig::default());
    let devices = h.fixture.network.device_count();
    assert_eq!(
        h.start(AttackKind::Ddos, None),
        Err(AttackError::MissingTarget(AttackKind::Ddos))
    );
    assert_eq!(h.fixture.network.device_count(), devices);
}

#[traced_test]
#[test]
fn test_invalid_target_leaves_network_unchanged() {
    let mut h = Harness::new(AttackConfig::default());
    let devices = h.fixture.network.device_count();
    let links = h.fixture.network.link_count();
    let pc = h.fixture.pcs[0];

    let result = h.start(AttackKind::OntSpoof, Some(pc));
    assert!(matches!(result, Err(AttackError::InvalidTarget { .. })));
    assert_eq!(h.fixture.network.device_count(), devices);
    assert_eq!(h.fixture.network.link_count(), links);
    assert!(!h.engine.is_active(AttackKind::OntSpoof));
}

#[traced_test]
#[test]
fn test_double_start_rejected() {
    let mut h = Harness::new(AttackConfig::default());
    let ont = h.fixture.onts[0];
    h.start(AttackKind::Ddos, Some(ont)).unwrap();
    assert_eq!(
        h.start(AttackKind::Ddos, Some(ont)),
        Err(AttackError::AlreadyActive(AttackKind::Ddos))
    );
}

#[traced_test]
#[test]
fn test_stop_is_idempotent() {
    let mut h = Harness::new(AttackConfig::default());
    assert!(h.stop(AttackKind::Eavesdrop).is_empty());

    let splitter = h.fixture.splitter;
    h.start(AttackKind::Eavesdrop, Some(splitter)).unwrap();
    let first = h.stop(AttackKind::Eavesdrop);
    assert!(tore_down(&first, AttackKind::Eavesdrop));
    assert!(h.stop(AttackKind::Eavesdrop).is_empty());
}

#[traced_test]
#[test]
fn test_start_arms_timers_and_narrates() {
    let mut h = Harness::new(AttackConfig::default());
    let actions = h.start(AttackKind::Ddos, Some(h.fixture.onts[0])).unwrap();
    assert_eq!(logs(&actions).len(), 1);
    assert!(actions.contains(&Action::SetTimer {
        id: TimerId::attack(AttackKind::Ddos, AttackJob::Flood),
        duration: Duration::from_millis(100),
    }));
}

// ═══════════════════════════════════════════════════════════════════════════
// Eavesdrop
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_eavesdrop_attaches_registered_sniffer() {
    let mut h = Harness::new(AttackConfig::default());
    let splitter = h.fixture.splitter;
    let actions = h.start(AttackKind::Eavesdrop, Some(splitter)).unwrap();

    let attack = h.engine.get(AttackKind::Eavesdrop).unwrap();
    assert_eq!(attack.injected.len(), 2);
    let AttackProgress::Eavesdrop { sniffer, cracking, .. } = &attack.progress else {
        panic!("unexpected progress");
    };
    let sniffer = h.fixture.network.device(*sniffer).unwrap();
    assert_eq!(sniffer.role, DeviceRole::Sniffer);
    assert!(sniffer.is_registered());
    assert_eq!(cracking.len(), 2);

    for ont in &h.fixture.onts {
        assert!(actions.contains(&Action::SetTimer {
            id: TimerId::attack(AttackKind::Eavesdrop, AttackJob::Crack(*ont)),
            duration: Duration::from_millis(400),
        }));
        assert!(h.fixture.network.device(*ont).unwrap().gpon.short_code.is_some());
    }
}

#[traced_test]
#[test]
fn test_eavesdrop_cracks_code() {
    let mut h = Harness::new(AttackConfig::default());
    let ont = h.fixture.onts[0];
    h.fixture.network.device_mut(ont).unwrap().gpon.short_code = ShortCode::new(3);
    let splitter = h.fixture.splitter;
    h.start(AttackKind::Eavesdrop, Some(splitter)).unwrap();

    for _ in 0..2 {
        let actions = h.fire(AttackKind::Eavesdrop, AttackJob::Crack(ont));
        assert!(logs(&actions).is_empty());
    }
    let actions = h.fire(AttackKind::Eavesdrop, AttackJob::Crack(ont));
    let logs = logs(&actions);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].0, LogLevel::Error);
    assert!(h.fixture.network.device(ont).unwrap().gpon.id_cracked);

    h.stop(AttackKind::Eavesdrop);
    assert!(!h.fixture.network.device(ont).unwrap().gpon.id_cracked);
}

#[traced_test]
#[test]
fn test_eavesdrop_capture_flows_to_sniffer_pc() {
    let mut h = Harness::new(AttackConfig::default());
    let splitter = h.fixture.splitter;
    h.start(AttackKind::Eavesdrop, Some(splitter)).unwrap();
    let attacker = h.engine.get(AttackKind::Eavesdrop).unwrap().attacker;

    let actions = h.fire(AttackKind::Eavesdrop, AttackJob::Capture);
    let packets = emitted(&actions);
    assert_eq!(packets.len(), 1);
    let packet = packets[0];
    assert_eq!(packet.direction, Direction::Downstream);
    assert_eq!(packet.payload, PayloadKind::Attack);
    assert_eq!(packet.source, h.fixture.olt);
    assert_eq!(packet.destination, attacker);
    assert_eq!(packet.owner, Some(AttackKind::Eavesdrop));
    assert!(h
        .engine
        .get(AttackKind::Eavesdrop)
        .unwrap()
        .packets
        .contains(&packet.id));
}

#[traced_test]
#[test]
fn test_eavesdrop_splice_on_onu_target_is_undone() {
    let mut h = Harness::new(AttackConfig::default());
    let (splitter, victim) = (h.fixture.splitter, h.fixture.onts[1]);
    let before = h.fixture.network.link_between(splitter, victim).unwrap().clone();

    h.start(AttackKind::Eavesdrop, Some(victim)).unwrap();
    assert!(h.fixture.network.link_between(splitter, victim).is_none());

    h.stop(AttackKind::Eavesdrop);
    let after = h.fixture.network.link_between(splitter, victim).unwrap();
    assert_eq!(after.a, before.a);
    assert_eq!(after.b, before.b);
}

// ═══════════════════════════════════════════════════════════════════════════
// Identifier guessing
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_bruteforce_adopts_victim_id() {
    let mut h = Harness::new(AttackConfig::default().with_guess_probability(0.0));
    let victim = h.fixture.onts[1];
    let victim_id = h.fixture.network.device(victim).unwrap().gpon.onu_id.unwrap();
    assert_eq!(victim_id.0, 2);
    h.start(AttackKind::BruteforceId, Some(victim)).unwrap();

    let first = h.fire(AttackKind::BruteforceId, AttackJob::Guess);
    assert_eq!(emitted(&first)[0].kind, PacketKind::Ploam);
    assert!(logs(&first).is_empty());

    let second = h.fire(AttackKind::BruteforceId, AttackJob::Guess);
    let messages = logs(&second);
    assert_eq!(messages.len(), 2, "acceptance plus collision warning");
    assert!(messages[1].1.contains("collision"));

    let attack = h.engine.get(AttackKind::BruteforceId).unwrap();
    let AttackProgress::Guessing { rogue, adopted, .. } = attack.progress else {
        panic!("unexpected progress");
    };
    assert_eq!(adopted, Some(victim_id));
    assert_eq!(
        h.fixture.network.device(rogue).unwrap().gpon.onu_id,
        Some(victim_id)
    );
}

#[traced_test]
#[test]
fn test_bruteforce_rejects_unregistered_victim() {
    let mut h = Harness::new(AttackConfig::default());
    let victim = h.fixture.onts[0];
    h.fixture
        .network
        .device_mut(victim)
        .unwrap()
        .gpon
        .clear_registration();
    assert!(matches!(
        h.start(AttackKind::BruteforceId, Some(victim)),
        Err(AttackError::InvalidTarget { .. })
    ));
}

#[traced_test]
#[test]
fn test_unauthorized_ont_gives_up_at_cap() {
    let config = AttackConfig::default()
        .with_guess_probability(0.0)
        .with_guess_cap(3);
    let mut h = Harness::new(config);
    let devices = h.fixture.network.device_count();
    h.start(AttackKind::UnauthorizedOnt, None).unwrap();
    assert_eq!(h.fixture.network.device_count(), devices + 1);

    h.fire(AttackKind::UnauthorizedOnt, AttackJob::Guess);
    h.fire(AttackKind::UnauthorizedOnt, AttackJob::Guess);
    let last = h.fire(AttackKind::UnauthorizedOnt, AttackJob::Guess);

    assert!(tore_down(&last, AttackKind::UnauthorizedOnt));
    assert!(!h.engine.is_active(AttackKind::UnauthorizedOnt));
    assert_eq!(h.fixture.network.device_count(), devices);
}

// ═══════════════════════════════════════════════════════════════════════════
// DDoS
// ═══════════════════════════════════════════════════════════════════════════

fn flood_packet(h: &Harness, id: u64, sent_at: Duration) -> Packet {
    let attack = h.engine.get(AttackKind::Ddos).unwrap();
    let path = vec![attack.attacker, h.fixture.splitter, h.fixture.olt];
    Packet::along(
        PacketId(id),
        path,
        Direction::Upstream,
        PacketKind::Ip,
        PayloadKind::Attack,
        sent_at,
    )
    .unwrap()
    .with_owner(AttackKind::Ddos)
}

#[traced_test]
#[test]
fn test_ddos_overload_is_idempotent() {
    let config = AttackConfig::default().with_ddos_threshold(3, Duration::from_millis(500));
    let mut h = Harness::new(config);
    let olt = h.fixture.olt;
    h.start(AttackKind::Ddos, Some(h.fixture.onts[0])).unwrap();

    let mut overload_logs = 0;
    for i in 0..6u64 {
        let packet = flood_packet(&h, 100 + i, Duration::from_millis(100 * i));
        let actions = h.engine.on_delivered(&packet, olt, &mut h.fixture.network);
        overload_logs += logs(&actions)
            .iter()
            .filter(|(level, _)| *level == LogLevel::Critical)
            .count();
    }
    assert_eq!(overload_logs, 1);
    assert_eq!(
        h.fixture.network.device(olt).unwrap().status,
        DeviceStatus::Error
    );
    assert!(h.engine.congestion().is_congested(h.fixture.splitter));

    h.stop(AttackKind::Ddos);
    assert_eq!(
        h.fixture.network.device(olt).unwrap().status,
        DeviceStatus::Active
    );
    assert!(h.engine.congestion().node.is_none());
}

#[traced_test]
#[test]
fn test_ddos_slow_arrivals_do_not_overload() {
    let config = AttackConfig::default().with_ddos_threshold(3, Duration::from_millis(500));
    let mut h = Harness::new(config);
    let olt = h.fixture.olt;
    h.start(AttackKind::Ddos, Some(h.fixture.splitter)).unwrap();

    for i in 0..6u64 {
        let packet = flood_packet(&h, i, Duration::from_secs(i));
        h.engine.on_delivered(&packet, olt, &mut h.fixture.network);
    }
    assert!(h.engine.congestion().node.is_none());
}

#[traced_test]
#[test]
fn test_ddos_flood_emits_upstream() {
    let mut h = Harness::new(AttackConfig::default());
    h.start(AttackKind::Ddos, Some(h.fixture.onts[0])).unwrap();
    let actions = h.fire(AttackKind::Ddos, AttackJob::Flood);
    let packets = emitted(&actions);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].direction, Direction::Upstream);
    assert_eq!(packets[0].destination, h.fixture.olt);
}

// ═══════════════════════════════════════════════════════════════════════════
// Rogue ONU
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_rogue_registers_with_spoofed_serial() {
    let mut h = Harness::new(AttackConfig::default().with_registration_probability(1.0));
    h.start(AttackKind::RogueOnu, None).unwrap();
    let actions = h.fire(AttackKind::RogueOnu, AttackJob::Register);
    assert_eq!(logs(&actions)[0].0, LogLevel::Error);

    let attack = h.engine.get(AttackKind::RogueOnu).unwrap();
    let AttackProgress::Registration { rogue, registered, .. } = attack.progress else {
        panic!("unexpected progress");
    };
    assert!(registered.is_some());
    let rogue = h.fixture.network.device(rogue).unwrap();
    let serial = rogue.gpon.serial_number.clone().unwrap();
    assert!(["HWTC", "ZTEG", "ALCL", "GPON"]
        .iter()
        .any(|vendor| serial.starts_with(vendor)));
    assert_eq!(serial.len(), 12);
    assert_eq!(rogue.gpon.service_profile.as_deref(), Some("internet-100M"));
}

#[traced_test]
#[test]
fn test_registered_rogue_keeps_alive_and_revalidates() {
    let config = AttackConfig::default().with_registration_probability(1.0);
    let keepalive = config.rogue.keepalive_interval;
    let mut h = Harness::new(config);
    let devices = h.fixture.network.device_count();
    h.start(AttackKind::RogueOnu, None).unwrap();

    let register = TimerId::attack(AttackKind::RogueOnu, AttackJob::Register);
    let accepted = h.fire(AttackKind::RogueOnu, AttackJob::Register);
    assert!(accepted.contains(&Action::set_timer(register, keepalive)));

    let attack = h.engine.get(AttackKind::RogueOnu).unwrap();
    let AttackProgress::Registration {
        rogue,
        endpoint,
        registered: Some(onu_id),
        ..
    } = attack.progress
    else {
        panic!("rogue not registered");
    };

    let exchange = h.fire(AttackKind::RogueOnu, AttackJob::Register);
    assert!(exchange.contains(&Action::set_timer(register, keepalive)));
    let packets = emitted(&exchange);
    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0].direction, Direction::Upstream);
    assert_eq!(packets[0].path[..2], [endpoint, rogue]);
    assert_eq!(packets[0].destination, h.fixture.olt);
    assert_eq!(packets[1].direction, Direction::Downstream);
    assert_eq!(packets[1].destination, endpoint);
    assert_eq!(packets[1].target_onu, Some(onu_id));

    // Losing the only uplink after registration still ends the attack.
    let uplink = h
        .fixture
        .network
        .link_between(rogue, h.fixture.splitter)
        .unwrap()
        .id;
    h.fixture.network.disconnect(uplink).unwrap();
    let actions = h.fire(AttackKind::RogueOnu, AttackJob::Register);
    assert!(tore_down(&actions, AttackKind::RogueOnu));
    assert!(!h.engine.is_active(AttackKind::RogueOnu));
    assert_eq!(h.fixture.network.device_count(), devices);
}

#[traced_test]
#[test]
fn test_disconnected_attacker_disables_once() {
    let mut h = Harness::new(AttackConfig::default().with_registration_probability(0.0));
    let devices = h.fixture.network.device_count();
    h.start(AttackKind::RogueOnu, None).unwrap();
    let rogue = h.engine.get(AttackKind::RogueOnu).unwrap().attacker;
    let uplink = h
        .fixture
        .network
        .link_between(rogue, h.fixture.splitter)
        .unwrap()
        .id;
    h.fixture.network.disconnect(uplink).unwrap();

    let actions = h.fire(AttackKind::RogueOnu, AttackJob::Register);
    let messages = logs(&actions);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, LogLevel::Warning);
    assert!(tore_down(&actions, AttackKind::RogueOnu));
    assert!(emitted(&actions).is_empty());
    assert!(!h.engine.is_active(AttackKind::RogueOnu));
    assert_eq!(h.fixture.network.device_count(), devices);

    assert!(h.fire(AttackKind::RogueOnu, AttackJob::Register).is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// ONT spoof
// ═══════════════════════════════════════════════════════════════════════════

fn run_spoof_until_takeover(h: &mut Harness) -> usize {
    for step in 1..=99 {
        h.fire(AttackKind::OntSpoof, AttackJob::SpoofStep);
        let attack = h.engine.get(AttackKind::OntSpoof).unwrap();
        if let AttackProgress::Spoof {
            phase: SpoofPhase::TakenOver,
            ..
        } = attack.progress
        {
            return step;
        }
    }
    panic!("spoof never took over");
}

#[traced_test]
#[test]
fn test_ont_spoof_matches_victim_code() {
    let mut h = Harness::new(AttackConfig::default());
    let (splitter, victim) = (h.fixture.splitter, h.fixture.onts[1]);
    h.fixture.network.device_mut(victim).unwrap().gpon.short_code = ShortCode::new(57);
    let devices = h.fixture.network.device_count();
    h.start(AttackKind::OntSpoof, Some(victim)).unwrap();

    assert_eq!(run_spoof_until_takeover(&mut h), 57);
    let attack = h.engine.get(AttackKind::OntSpoof).unwrap();
    let AttackProgress::Spoof {
        substitute,
        endpoint,
        matched,
        forced,
        ..
    } = attack.progress
    else {
        panic!("unexpected progress");
    };
    assert_eq!(matched, ShortCode::new(57));
    assert!(!forced);
    assert_eq!(attack.attacker, endpoint);
    assert!(h.fixture.network.link_between(splitter, substitute).is_some());
    assert!(h.fixture.network.link_between(victim, substitute).is_some());
    let victim_device = h.fixture.network.device(victim).unwrap();
    assert!(victim_device.gpon.compromised);
    assert_eq!(
        h.fixture.network.device(substitute).unwrap().gpon.onu_id,
        victim_device.gpon.onu_id
    );

    let traffic = h.fire(AttackKind::OntSpoof, AttackJob::SpoofTraffic);
    let packets = emitted(&traffic);
    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0].direction, Direction::Upstream);
    assert_eq!(packets[1].direction, Direction::Downstream);
    assert_eq!(packets[1].destination, endpoint);

    h.stop(AttackKind::OntSpoof);
    assert_eq!(h.fixture.network.device_count(), devices);
    assert!(h.fixture.network.link_between(splitter, victim).is_some());
    assert!(!h.fixture.network.device(victim).unwrap().gpon.compromised);
}

#[traced_test]
#[test]
fn test_ont_spoof_forced_at_last_key() {
    let mut h = Harness::new(AttackConfig::default());
    let victim = h.fixture.onts[0];
    h.fixture.network.device_mut(victim).unwrap().gpon.short_code = ShortCode::new(57);
    h.start(AttackKind::OntSpoof, Some(victim)).unwrap();
    for _ in 0..10 {
        h.fire(AttackKind::OntSpoof, AttackJob::SpoofStep);
    }

    // Re-keyed to a code the search already passed.
    h.fixture.network.device_mut(victim).unwrap().gpon.short_code = ShortCode::new(3);
    assert_eq!(run_spoof_until_takeover(&mut h), 89);
    let AttackProgress::Spoof { matched, forced, .. } =
        h.engine.get(AttackKind::OntSpoof).unwrap().progress
    else {
        panic!("unexpected progress");
    };
    assert_eq!(matched, Some(ShortCode::MAX));
    assert!(forced);
}

#[traced_test]
#[test]
fn test_ont_spoof_key_space_covers_every_assigned_code() {
    let mut h = Harness::new(AttackConfig::default());
    let victim = h.fixture.onts[0];
    // "00" is not a code; the victim gets one from 01..99 instead.
    h.fixture.network.device_mut(victim).unwrap().gpon.short_code = ShortCode::new(0);
    h.start(AttackKind::OntSpoof, Some(victim)).unwrap();
    let code = h.fixture.network.device(victim).unwrap().gpon.short_code.unwrap();
    assert!(code >= ShortCode::MIN);

    assert_eq!(run_spoof_until_takeover(&mut h), usize::from(code.value()));
    let AttackProgress::Spoof { matched, forced, .. } =
        h.engine.get(AttackKind::OntSpoof).unwrap().progress
    else {
        panic!("unexpected progress");
    };
    assert_eq!(matched, Some(code));
    assert!(!forced);
}
