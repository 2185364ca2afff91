//! Deterministic simulation runner.
//!
//! The runner is the only writer of simulation state. Collaborator commands
//! (topology edits, start/stop, speed, attacks) and timer-driven events all
//! go through it, and state machines hand their side effects back as
//! [`Action`]s for it to apply.

use crate::delivery::{Delivery, DeliveryTracker};
use crate::event_queue::EventKey;
use crate::flow::{FlowController, FlowTiming};
use crate::{SimulationConfig, SimulationError, SimulationSnapshot, SimulationStats};
use gpon_attacks::{AttackConfig, AttackContext, AttackEngine};
use gpon_core::{Action, Event, FlowPhase, TimerId, TimerOwner};
use gpon_dispatch::{DispatchContext, DispatchError, DispatchResult, Dispatcher, DropReason};
use gpon_types::{
    shortest_path, AttackKind, Device, DeviceId, DeviceKind, Direction, EventLog, Link, LinkId,
    LinkStatus, LogEntry, LogRecord, Network, NetworkDocument, Packet, PacketId,
    PacketIdAllocator, PacketKind, PayloadKind, PortNumber, Registration,
};
use indexmap::IndexMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// A packet crossing one link.
#[derive(Debug, Clone)]
struct InFlight {
    packet: Packet,
    to: DeviceId,
    deliver_at: Duration,
}

/// Deterministic simulation runner.
///
/// Processes events in deterministic order and applies the actions they
/// produce. Given the same seed and the same command sequence, produces
/// identical logs, packets and stats every run.
pub struct SimulationRunner {
    config: SimulationConfig,

    /// Devices and links.
    network: Network,

    /// Global event queue, ordered deterministically.
    event_queue: BTreeMap<EventKey, Event>,

    /// Sequence counter for deterministic ordering.
    sequence: u64,

    /// Current simulation time.
    now: Duration,

    /// Jitter, serials and attack rolls (seeded for determinism).
    rng: ChaCha8Rng,

    /// Timer registry for cancellation support.
    /// Maps timer_id -> event_key for removal.
    timers: HashMap<TimerId, EventKey>,

    running: bool,
    tick: u64,
    speed: f64,
    flow: FlowController,
    attacks: AttackEngine,

    /// Packets waiting at a device for the next tick.
    inboxes: BTreeMap<DeviceId, Vec<Packet>>,
    in_flight: Vec<InFlight>,
    /// Every packet still alive, by id, in emission order.
    live: IndexMap<PacketId, Packet>,

    deliveries: DeliveryTracker,
    /// Terminal deliveries not yet drained by `take_deliveries`.
    delivered: Vec<Delivery>,
    /// Last upstream response per endpoint.
    upstream_last: HashMap<DeviceId, Duration>,

    ids: PacketIdAllocator,
    log: EventLog,
    stats: SimulationStats,
}

impl SimulationRunner {
    /// Create a stopped runner over `network`.
    pub fn new(config: SimulationConfig, network: Network, seed: u64) -> Self {
        let speed = if config.speed.is_finite() && config.speed > 0.0 {
            config.speed
        } else {
            warn!(speed = config.speed, "Configured speed is invalid, using 1.0");
            1.0
        };
        let flow = FlowController::new(FlowTiming {
            settle_ticks: config.settle_ticks,
            upstream_delay: config.upstream_delay,
            upstream_dwell: config.upstream_dwell,
        });

        Self {
            attacks: AttackEngine::new(config.attacks.clone()),
            log: EventLog::new(config.log_capacity),
            config,
            network,
            event_queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            rng: ChaCha8Rng::seed_from_u64(seed),
            timers: HashMap::new(),
            running: false,
            tick: 0,
            speed,
            flow,
            inboxes: BTreeMap::new(),
            in_flight: Vec::new(),
            live: IndexMap::new(),
            deliveries: DeliveryTracker::default(),
            delivered: Vec::new(),
            upstream_last: HashMap::new(),
            ids: PacketIdAllocator::new(),
            stats: SimulationStats::default(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════

    /// Start the simulation. Starting a running simulation is a no-op.
    pub fn start(&mut self) -> Result<(), SimulationError> {
        if self.running {
            debug!("Simulation already running");
            return Ok(());
        }
        if self.network.primary_olt().is_none() {
            return self.report(Err(SimulationError::NoPrimaryOlt));
        }

        self.running = true;
        self.tick = 0;
        self.clear_transport();
        self.network.bootstrap_known_onu_ids();

        let actions = self.flow.start();
        self.apply_actions(actions);
        self.set_timer(TimerId::Tick, Duration::ZERO);
        self.set_timer(TimerId::DownstreamGenerator, Duration::ZERO);
        let first_upstream = self.jittered(self.config.upstream_interval, self.config.upstream_jitter);
        self.set_timer(TimerId::UpstreamGenerator, first_upstream);

        self.narrate(LogRecord::info(format!(
            "Simulation started at {}x speed",
            self.speed
        )));
        Ok(())
    }

    /// Stop the simulation. Idempotent.
    ///
    /// Running attacks keep their devices and timers; their packets are only
    /// transported while the simulation runs.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        let actions = self.flow.stop();
        self.apply_actions(actions);
        self.cancel_owned_timers(TimerOwner::Simulation);
        self.clear_transport();
        self.narrate(LogRecord::info("Simulation stopped"));
    }

    /// Change the speed multiplier and re-arm the tick at the new cadence.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), SimulationError> {
        if !(speed.is_finite() && speed > 0.0) {
            return self.report(Err(SimulationError::InvalidSpeed(speed)));
        }
        self.speed = speed;
        if self.running {
            let interval = self.tick_interval();
            self.set_timer(TimerId::Tick, interval);
        }
        self.narrate(LogRecord::info(format!("Simulation speed set to {speed}x")));
        Ok(())
    }

    fn clear_transport(&mut self) {
        for id in self.live.keys() {
            self.attacks.forget_packet(*id);
        }
        self.inboxes.clear();
        self.in_flight.clear();
        self.live.clear();
        self.deliveries.clear();
        self.upstream_last.clear();
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Topology commands
    // ═══════════════════════════════════════════════════════════════════════

    pub fn add_device(&mut self, kind: DeviceKind, name: impl Into<String>) -> DeviceId {
        let name = name.into();
        let id = self.network.add_device(kind, name.clone());
        self.narrate(LogRecord::info(format!("Added {kind} {name}")).with_device(id));
        id
    }

    /// Insert a prepared device (custom ports, position or role).
    pub fn insert_device(&mut self, device: Device) -> DeviceId {
        let message = format!("Added {} {}", device.kind, device.name);
        let id = self.network.insert_device(device);
        self.narrate(LogRecord::info(message).with_device(id));
        id
    }

    pub fn remove_device(&mut self, id: DeviceId) -> Result<Device, SimulationError> {
        let result = self.network.remove_device(id).map_err(SimulationError::from);
        if let Ok(device) = &result {
            self.inboxes.remove(&id);
            let message = format!("Removed {}", device.name);
            self.narrate(LogRecord::info(message));
        }
        self.report(result)
    }

    pub fn connect(&mut self, a: DeviceId, b: DeviceId) -> Result<LinkId, SimulationError> {
        let result = self.network.connect(a, b).map_err(SimulationError::from);
        if result.is_ok() {
            self.narrate_link("Connected", a, b);
        }
        self.report(result)
    }

    pub fn connect_ports(
        &mut self,
        a: DeviceId,
        port_a: PortNumber,
        b: DeviceId,
        port_b: PortNumber,
    ) -> Result<LinkId, SimulationError> {
        let result = self
            .network
            .connect_ports(a, port_a, b, port_b)
            .map_err(SimulationError::from);
        if result.is_ok() {
            self.narrate_link("Connected", a, b);
        }
        self.report(result)
    }

    pub fn disconnect(&mut self, link: LinkId) -> Result<Link, SimulationError> {
        let result = self.network.disconnect(link).map_err(SimulationError::from);
        if let Ok(removed) = &result {
            let (a, b) = (removed.a.device, removed.b.device);
            self.narrate_link("Disconnected", a, b);
        }
        self.report(result)
    }

    pub fn set_link_status(
        &mut self,
        link: LinkId,
        status: LinkStatus,
    ) -> Result<(), SimulationError> {
        let result = self
            .network
            .set_link_status(link, status)
            .map_err(SimulationError::from);
        if result.is_ok() {
            self.narrate(LogRecord::info(format!("{link} set to {status:?}")));
        }
        self.report(result)
    }

    /// Register an ONU/ONT with the primary OLT.
    pub fn register_onu(&mut self, onu: DeviceId) -> Result<Registration, SimulationError> {
        let Some(olt) = self.network.primary_olt() else {
            return self.report(Err(SimulationError::NoPrimaryOlt));
        };
        let result = self
            .network
            .register_onu(onu, olt, &mut self.rng)
            .map_err(SimulationError::from);
        if let Ok(registration) = &result {
            let message = format!(
                "{} registered as {} (serial {})",
                self.name_of(onu),
                registration.onu_id,
                registration.serial_number
            );
            self.narrate(LogRecord::info(message).with_device(onu));
        }
        self.report(result)
    }

    fn narrate_link(&mut self, verb: &str, a: DeviceId, b: DeviceId) {
        let message = format!("{verb} {} and {}", self.name_of(a), self.name_of(b));
        self.narrate(LogRecord::info(message));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Attack commands
    // ═══════════════════════════════════════════════════════════════════════

    pub fn start_attack(
        &mut self,
        kind: AttackKind,
        target: Option<DeviceId>,
    ) -> Result<(), SimulationError> {
        let mut ctx = AttackContext {
            network: &mut self.network,
            rng: &mut self.rng,
            ids: &mut self.ids,
            now: self.now,
        };
        match self.attacks.start(kind, target, &mut ctx) {
            Ok(actions) => {
                self.apply_actions(actions);
                Ok(())
            }
            Err(error) => self.report(Err(error.into())),
        }
    }

    /// Stop an attack. Stopping an inactive attack is a no-op.
    pub fn stop_attack(&mut self, kind: AttackKind) {
        let actions = self.attacks.stop(kind, &mut self.network);
        self.apply_actions(actions);
    }

    pub fn stop_all_attacks(&mut self) {
        let actions = self.attacks.stop_all(&mut self.network);
        self.apply_actions(actions);
    }

    /// Replace attack tuning. Running attacks pick it up on their next step.
    pub fn set_attack_config(&mut self, config: AttackConfig) {
        self.attacks.set_config(config.clone());
        self.config.attacks = config;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Persistence
    // ═══════════════════════════════════════════════════════════════════════

    /// Re-initialise from a persisted document.
    ///
    /// Stops the simulation and every attack first. A malformed document is
    /// rejected and leaves the current state untouched.
    pub fn load_document(&mut self, json: &str) -> Result<(), SimulationError> {
        let document = match NetworkDocument::from_json(json) {
            Ok(document) => document,
            Err(error) => return self.report(Err(error.into())),
        };
        self.stop();
        self.stop_all_attacks();

        let restored = document.into_network(&mut self.rng);
        self.network = restored.network;
        self.log.restore(restored.logs);
        for (link, error) in restored.skipped_links {
            self.narrate(LogRecord::warning(format!("Skipped stored {link}: {error}")));
        }
        let message = format!(
            "Loaded network with {} devices and {} links",
            self.network.device_count(),
            self.network.link_count()
        );
        self.narrate(LogRecord::info(message));
        Ok(())
    }

    /// Current devices, links and log tail.
    pub fn export_document(&self) -> NetworkDocument {
        NetworkDocument::capture(&self.network, self.log.tail(self.log.len()))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Execution
    // ═══════════════════════════════════════════════════════════════════════

    /// Process the next event. Returns `false` when the queue is empty.
    pub fn step(&mut self) -> bool {
        let Some((key, event)) = self.event_queue.pop_first() else {
            return false;
        };
        self.now = key.time;

        let timer = event.timer();
        if self.timers.get(&timer) == Some(&key) {
            self.timers.remove(&timer);
        }

        self.stats.events_processed += 1;
        self.stats.events_by_priority[event.priority() as usize] += 1;
        trace!(time = ?self.now, ?event, "Processing event");

        self.process_event(event);
        true
    }

    /// Run until the given simulated time.
    pub fn run_until(&mut self, end_time: Duration) {
        trace!(
            end_time_secs = end_time.as_secs_f64(),
            "Running simulation step"
        );

        while let Some((&key, _)) = self.event_queue.first_key_value() {
            if key.time > end_time {
                break;
            }
            self.step();
        }
        if self.now < end_time {
            self.now = end_time;
        }
    }

    pub fn run_for(&mut self, duration: Duration) {
        self.run_until(self.now.saturating_add(duration));
    }

    fn process_event(&mut self, event: Event) {
        match event {
            Event::Tick => self.on_tick(),
            Event::GenerateDownstream => self.generate_downstream(),
            Event::GenerateUpstream => self.generate_upstream(),
            Event::FlowSettled => {
                let actions = self.flow.on_settled();
                self.apply_actions(actions);
            }
            Event::FlowDwellElapsed => {
                let actions = self.flow.on_dwell_elapsed();
                self.apply_actions(actions);
            }
            Event::PacketExpired { packet } => self.expire(packet),
            Event::AttackStep { kind, job } => {
                let mut ctx = AttackContext {
                    network: &mut self.network,
                    rng: &mut self.rng,
                    ids: &mut self.ids,
                    now: self.now,
                };
                let actions = self.attacks.on_timer(kind, job, &mut ctx);
                self.apply_actions(actions);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Tick
    // ═══════════════════════════════════════════════════════════════════════

    /// Deliver arrivals, dispatch every non-empty inbox, re-enqueue outbound.
    fn on_tick(&mut self) {
        if !self.running {
            return;
        }
        let actions = self.flow.on_tick(self.tick);
        self.apply_actions(actions);

        self.deliver_arrivals();
        let inboxes = std::mem::take(&mut self.inboxes);
        let (results, failures) = self.dispatch_all(&inboxes);

        for (device, error) in failures {
            self.stats.dispatch_errors += 1;
            warn!(%device, %error, "Dispatch failed, skipping device this tick");
            let message = format!("{}: {error}", self.name_of(device));
            self.narrate(LogRecord::error(message).with_device(device));
        }
        for (device, result) in results {
            self.apply_dispatch(device, result);
        }

        self.tick += 1;
        self.stats.ticks += 1;
        self.deliveries.prune(self.now, self.config.dedup_horizon);
        let interval = self.tick_interval();
        self.set_timer(TimerId::Tick, interval);
    }

    /// Move arrived in-flight packets into their destination inboxes.
    fn deliver_arrivals(&mut self) {
        let now = self.now;
        let (arrived, pending): (Vec<InFlight>, Vec<InFlight>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|flight| flight.deliver_at <= now);
        self.in_flight = pending;

        for InFlight { mut packet, to, .. } in arrived {
            packet.advance();
            if !self.network.contains(to) {
                trace!(packet = %packet.id, device = %to, "Destination removed, discarding");
                self.discard(packet.id);
                continue;
            }
            if !self.deliveries.admit(packet.origin, to, now) {
                trace!(packet = %packet.id, device = %to, "Lineage already reached device");
                self.stats.packets_deduplicated += 1;
                self.discard(packet.id);
                continue;
            }
            self.live.insert(packet.id, packet.clone());
            self.inboxes.entry(to).or_default().push(packet);
        }
    }

    /// Run the dispatcher over every device with a non-empty inbox, in
    /// network order.
    #[allow(clippy::type_complexity)]
    fn dispatch_all(
        &self,
        inboxes: &BTreeMap<DeviceId, Vec<Packet>>,
    ) -> (Vec<(DeviceId, DispatchResult)>, Vec<(DeviceId, DispatchError)>) {
        let graph = self.network.graph();
        let hierarchy = self.network.hierarchy(&graph);
        let dispatcher = Dispatcher::new(DispatchContext {
            network: &self.network,
            graph: &graph,
            hierarchy: &hierarchy,
            flow: self.flow.phase(),
            congestion: self.attacks.congestion(),
        });

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for device in self.network.devices() {
            let Some(inbound) = inboxes.get(&device.id) else {
                continue;
            };
            if inbound.is_empty() {
                continue;
            }
            match dispatcher.process(device, inbound) {
                Ok(result) => results.push((device.id, result)),
                Err(error) => failures.push((device.id, error)),
            }
        }
        (results, failures)
    }

    fn apply_dispatch(&mut self, device: DeviceId, result: DispatchResult) {
        let DispatchResult {
            outbound,
            delivered,
            dropped,
            reason,
            dropped_count,
            ignored,
        } = result;
        self.stats.packets_ignored += ignored as u64;

        // Fan-out copies share the inbound id; the first keeps it.
        let mut seen = HashSet::new();
        for mut packet in outbound {
            if !seen.insert(packet.id) {
                packet.id = self.ids.next_id();
            }
            self.stats.packets_forwarded += 1;
            self.enqueue(packet, self.config.forward_ttl_grace);
        }

        for packet in delivered {
            self.stats.packets_delivered += 1;
            self.delivered.push(Delivery::new(&packet, device, self.now));
            self.discard(packet.id);
            let actions = self.attacks.on_delivered(&packet, device, &mut self.network);
            self.apply_actions(actions);
        }

        if let (true, Some(reason)) = (dropped, reason) {
            self.record_drop(device, reason, dropped_count as u64);
        }
    }

    fn record_drop(&mut self, device: DeviceId, reason: DropReason, count: u64) {
        match reason {
            DropReason::Congestion { .. } => self.stats.dropped_congestion += count,
            DropReason::UnknownOnu { .. } => self.stats.dropped_unknown_onu += count,
            DropReason::ListenOnly => self.stats.dropped_listen_only += count,
        }
        if reason.is_silent() {
            trace!(%device, %reason, count, "Packets dropped");
        } else {
            let message = format!("{}: {reason}", self.name_of(device));
            self.narrate(LogRecord::warning(message).with_device(device));
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Generators
    // ═══════════════════════════════════════════════════════════════════════

    /// Broadcast from the primary OLT toward every reachable endpoint.
    fn generate_downstream(&mut self) {
        if !self.running {
            return;
        }
        let next = self.jittered(self.config.downstream_interval, self.config.downstream_jitter);
        self.set_timer(TimerId::DownstreamGenerator, next);

        let graph = self.network.graph();
        let hierarchy = self.network.hierarchy(&graph);
        let Some(olt) = hierarchy.root() else {
            return;
        };
        let allowed = {
            let dispatcher = Dispatcher::new(DispatchContext {
                network: &self.network,
                graph: &graph,
                hierarchy: &hierarchy,
                flow: self.flow.phase(),
                congestion: self.attacks.congestion(),
            });
            self.network
                .device(olt)
                .is_some_and(|device| dispatcher.may_originate(device, Direction::Downstream))
        };
        if !allowed {
            return;
        }

        let id = self.ids.next_id();
        let Some(packet) = Packet::along(
            id,
            vec![olt],
            Direction::Downstream,
            PacketKind::Gpon,
            PayloadKind::Broadcast,
            self.now,
        ) else {
            return;
        };
        self.stats.packets_generated += 1;
        let ttl = self.ttl(&packet, self.config.downstream_ttl_grace);
        self.live.insert(id, packet.clone());
        self.inboxes.entry(olt).or_default().push(packet);
        self.set_timer(TimerId::PacketTtl(id), ttl);
        debug!(packet = %id, %olt, "Downstream broadcast generated");
    }

    /// Responses from every eligible endpoint toward the primary OLT.
    ///
    /// Endpoints without a path are skipped for this round.
    fn generate_upstream(&mut self) {
        if !self.running {
            return;
        }
        let next = self.jittered(self.config.upstream_interval, self.config.upstream_jitter);
        self.set_timer(TimerId::UpstreamGenerator, next);

        let graph = self.network.graph();
        let hierarchy = self.network.hierarchy(&graph);
        let Some(olt) = hierarchy.root() else {
            return;
        };
        let paths: Vec<Vec<DeviceId>> = {
            let dispatcher = Dispatcher::new(DispatchContext {
                network: &self.network,
                graph: &graph,
                hierarchy: &hierarchy,
                flow: self.flow.phase(),
                congestion: self.attacks.congestion(),
            });
            let now = self.now;
            let min_gap = self.config.upstream_min_gap;
            self.network
                .devices()
                .filter(|device| dispatcher.may_originate(device, Direction::Upstream))
                .filter(|device| {
                    self.upstream_last
                        .get(&device.id)
                        .map_or(true, |last| now.saturating_sub(*last) >= min_gap)
                })
                .filter_map(|device| shortest_path(&graph, device.id, olt))
                .filter(|path| path.len() >= 2)
                .collect()
        };

        for path in paths {
            let Some(&source) = path.first() else {
                continue;
            };
            let id = self.ids.next_id();
            let Some(packet) = Packet::along(
                id,
                path,
                Direction::Upstream,
                PacketKind::Ip,
                PayloadKind::Response,
                self.now,
            ) else {
                continue;
            };
            self.upstream_last.insert(source, self.now);
            self.stats.packets_generated += 1;
            self.enqueue(packet, self.config.upstream_ttl_grace);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Packet bookkeeping
    // ═══════════════════════════════════════════════════════════════════════

    /// Put a packet in flight toward its next hop and refresh its lifetime.
    fn enqueue(&mut self, packet: Packet, grace: Duration) {
        let Some(to) = packet.next_hop() else {
            trace!(packet = %packet.id, "No next hop, not enqueued");
            return;
        };
        let id = packet.id;
        let ttl = self.ttl(&packet, grace);
        let deliver_at = self.now.saturating_add(self.segment());
        self.live.insert(id, packet.clone());
        self.in_flight.push(InFlight {
            packet,
            to,
            deliver_at,
        });
        self.set_timer(TimerId::PacketTtl(id), ttl);
    }

    fn emit_attack_packet(&mut self, packet: Packet) {
        if !self.running {
            trace!(packet = %packet.id, "Simulation stopped, attack packet discarded");
            self.attacks.forget_packet(packet.id);
            return;
        }
        self.stats.attack_packets += 1;
        self.enqueue(packet, self.config.forward_ttl_grace);
    }

    /// Remaining lifetime: one tick to be picked up, one segment per
    /// remaining hop, plus `grace`.
    fn ttl(&self, packet: &Packet, grace: Duration) -> Duration {
        let hops = u32::try_from(packet.remaining_hops()).unwrap_or(u32::MAX);
        self.tick_interval()
            .saturating_add(self.segment().saturating_mul(hops))
            .saturating_add(grace)
    }

    /// Forget a packet that left the simulation.
    fn discard(&mut self, id: PacketId) {
        self.live.shift_remove(&id);
        self.cancel_timer(TimerId::PacketTtl(id));
        self.attacks.forget_packet(id);
    }

    fn expire(&mut self, id: PacketId) {
        let mut removed = self.live.shift_remove(&id).is_some();
        let before = self.in_flight.len();
        self.in_flight.retain(|flight| flight.packet.id != id);
        removed |= self.in_flight.len() != before;
        for inbox in self.inboxes.values_mut() {
            inbox.retain(|packet| packet.id != id);
        }
        self.attacks.forget_packet(id);
        if removed {
            self.stats.packets_expired += 1;
            trace!(packet = %id, "Packet expired");
        }
    }

    /// Drop every packet an attack owns, wherever it is.
    fn purge_packets(&mut self, owner: AttackKind) {
        let owned = |packet: &Packet| packet.owner == Some(owner);
        let mut ids: BTreeSet<PacketId> = self
            .live
            .values()
            .filter(|p| owned(p))
            .map(|p| p.id)
            .collect();
        ids.extend(
            self.in_flight
                .iter()
                .filter(|flight| owned(&flight.packet))
                .map(|flight| flight.packet.id),
        );
        ids.extend(self.inboxes.values().flatten().filter(|p| owned(p)).map(|p| p.id));

        self.live.retain(|_, packet| !owned(packet));
        self.in_flight.retain(|flight| !owned(&flight.packet));
        for inbox in self.inboxes.values_mut() {
            inbox.retain(|packet| !owned(packet));
        }
        for id in &ids {
            self.cancel_timer(TimerId::PacketTtl(*id));
        }
        self.stats.packets_purged += ids.len() as u64;
        debug!(%owner, purged = ids.len(), "Attack packets purged");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Actions and timers
    // ═══════════════════════════════════════════════════════════════════════

    fn apply_actions(&mut self, actions: Vec<Action>) {
        for action in actions {
            self.process_action(action);
        }
    }

    fn process_action(&mut self, action: Action) {
        match action {
            Action::EmitPacket { packet } => self.emit_attack_packet(packet),
            Action::SetTimer { id, duration } => self.set_timer(id, duration),
            Action::CancelTimer { id } => self.cancel_timer(id),
            Action::CancelAttackTimers { kind } => {
                self.cancel_owned_timers(TimerOwner::Attack(kind))
            }
            Action::PurgePackets { owner } => self.purge_packets(owner),
            Action::Log(record) => self.narrate(record),
        }
    }

    fn schedule_event(&mut self, time: Duration, event: Event) -> EventKey {
        self.sequence += 1;
        let key = EventKey::new(time, &event, self.sequence);
        self.event_queue.insert(key, event);
        key
    }

    /// Arm a timer, replacing any armed timer with the same id.
    fn set_timer(&mut self, id: TimerId, duration: Duration) {
        if let Some(old) = self.timers.remove(&id) {
            self.event_queue.remove(&old);
        }
        let time = self.now.saturating_add(duration);
        let key = self.schedule_event(time, Event::for_timer(id));
        self.timers.insert(id, key);
        self.stats.timers_set += 1;
    }

    fn cancel_timer(&mut self, id: TimerId) {
        if let Some(key) = self.timers.remove(&id) {
            self.event_queue.remove(&key);
            self.stats.timers_cancelled += 1;
        }
    }

    fn cancel_owned_timers(&mut self, owner: TimerOwner) {
        let event_queue = &mut self.event_queue;
        let mut cancelled = 0u64;
        self.timers.retain(|id, key| {
            if id.owner() == owner {
                event_queue.remove(key);
                cancelled += 1;
                false
            } else {
                true
            }
        });
        self.stats.timers_cancelled += cancelled;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Helpers
    // ═══════════════════════════════════════════════════════════════════════

    fn narrate(&mut self, record: LogRecord) {
        self.log.push(self.now, record);
    }

    /// Log a rejected command and hand the result back.
    fn report<T>(&mut self, result: Result<T, SimulationError>) -> Result<T, SimulationError> {
        if let Err(error) = &result {
            debug!(%error, "Command rejected");
            let record = LogRecord::new(error.level(), error.to_string());
            self.narrate(record);
        }
        result
    }

    fn jittered(&mut self, base: Duration, jitter: Duration) -> Duration {
        let max = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
        if max == 0 {
            return base;
        }
        base.saturating_add(Duration::from_millis(self.rng.gen_range(0..=max)))
    }

    fn name_of(&self, device: DeviceId) -> String {
        self.network
            .device(device)
            .map_or_else(|| device.to_string(), |d| d.name.clone())
    }

    fn tick_interval(&self) -> Duration {
        self.config.tick_interval(self.speed)
    }

    fn segment(&self) -> Duration {
        self.config.segment_duration(self.speed)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn phase(&self) -> FlowPhase {
        self.flow.phase()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn attacks(&self) -> &AttackEngine {
        &self.attacks
    }

    /// Live packets, oldest first.
    pub fn packets(&self) -> impl Iterator<Item = &Packet> {
        self.live.values()
    }

    pub fn packet(&self, id: PacketId) -> Option<&Packet> {
        self.live.get(&id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn logs(&self) -> impl Iterator<Item = &LogEntry> {
        self.log.entries()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn pending_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Drain terminal deliveries recorded since the last call.
    pub fn take_deliveries(&mut self) -> Vec<Delivery> {
        std::mem::take(&mut self.delivered)
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            time: self.now,
            running: self.running,
            phase: self.flow.phase(),
            tick: self.tick,
            speed: self.speed,
            devices: self.network.devices().cloned().collect(),
            links: self.network.links().cloned().collect(),
            packets: self.live.values().cloned().collect(),
            attacks: self.attacks.attacks().cloned().collect(),
            logs: self.log.tail(self.log.len()),
            stats: self.stats.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpon_test_helpers::TreeFixture;

    fn runner() -> SimulationRunner {
        let fixture = TreeFixture::olt_splitter_two_onts();
        SimulationRunner::new(SimulationConfig::default(), fixture.network, 42)
    }

    #[test]
    fn test_start_arms_simulation_timers() {
        let mut runner = runner();
        runner.start().unwrap();
        assert!(runner.is_running());
        assert_eq!(runner.phase(), FlowPhase::Downstream);
        assert!(runner.timers.contains_key(&TimerId::Tick));
        assert!(runner.timers.contains_key(&TimerId::DownstreamGenerator));
        assert!(runner.timers.contains_key(&TimerId::UpstreamGenerator));
    }

    #[test]
    fn test_stop_cancels_every_simulation_timer() {
        let mut runner = runner();
        runner.start().unwrap();
        runner.run_for(Duration::from_secs(3));
        runner.stop();
        runner.stop();
        assert!(!runner.is_running());
        assert_eq!(runner.phase(), FlowPhase::Uninitialized);
        assert!(runner.timers.is_empty());
        assert!(runner.event_queue.is_empty());
        assert_eq!(runner.packets().count(), 0);
        assert_eq!(runner.in_flight_count(), 0);
    }

    #[test]
    fn test_rearming_replaces_queued_event() {
        let mut runner = runner();
        runner.set_timer(TimerId::Tick, Duration::from_secs(5));
        runner.set_timer(TimerId::Tick, Duration::from_secs(1));
        assert_eq!(runner.event_queue.len(), 1);
        assert_eq!(runner.stats.timers_set, 2);
    }

    #[test]
    fn test_start_without_olt_is_rejected() {
        let mut runner = SimulationRunner::new(SimulationConfig::default(), Network::new(), 1);
        assert!(matches!(runner.start(), Err(SimulationError::NoPrimaryOlt)));
        assert!(!runner.is_running());
        assert_eq!(runner.log().len(), 1);
    }

    #[test]
    fn test_generated_broadcast_waits_in_olt_inbox() {
        let mut runner = runner();
        runner.start().unwrap();
        runner.run_until(Duration::ZERO);
        let olt = runner.network().primary_olt().unwrap();
        assert_eq!(runner.inboxes.get(&olt).map(Vec::len), Some(1));
        assert_eq!(runner.stats().packets_generated, 1);
    }
}
