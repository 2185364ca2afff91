//! Forwarding rules by device kind.

use crate::{DispatchError, DispatchResult, DropReason};
use gpon_core::{CongestionState, FlowPhase};
use gpon_types::{
    Device, DeviceId, DeviceKind, DeviceRole, Direction, Hierarchy, Network, Packet,
    TopologyGraph,
};
use tracing::trace;

/// Read-only view a dispatch runs against.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub network: &'a Network,
    pub graph: &'a TopologyGraph,
    pub hierarchy: &'a Hierarchy,
    pub flow: FlowPhase,
    pub congestion: CongestionState,
}

/// Stateless per-device dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'a> {
    ctx: DispatchContext<'a>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(ctx: DispatchContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &DispatchContext<'a> {
        &self.ctx
    }

    /// Process a device's inbox.
    ///
    /// Packets not currently positioned at `device` are ignored. Outbound
    /// copies keep the inbound packet's id; the caller assigns fresh ids to
    /// extra fan-out copies.
    pub fn process(
        &self,
        device: &Device,
        inbound: &[Packet],
    ) -> Result<DispatchResult, DispatchError> {
        if !self.ctx.graph.contains(device.id) {
            return Err(DispatchError::NotInGraph(device.id));
        }

        let mut result = DispatchResult::default();
        let mut congested = 0usize;

        for packet in inbound {
            if packet.path.is_empty() {
                return Err(DispatchError::EmptyPath { packet: packet.id });
            }
            if packet.current_device() != Some(device.id) {
                trace!(device = %device.id, packet = %packet.id, "Position mismatch, ignoring");
                result.ignored += 1;
                continue;
            }

            match (device.kind, packet.direction) {
                (DeviceKind::Olt, direction) => self.olt(device, packet, direction, &mut result),
                (DeviceKind::Splitter, Direction::Downstream) => {
                    if self.ctx.congestion.is_congested(device.id) && !packet.is_attack() {
                        congested += 1;
                    } else {
                        self.fan_out(device.id, packet, &mut result);
                    }
                }
                (DeviceKind::Onu | DeviceKind::Ont, Direction::Downstream) => {
                    if accepts_downstream(device, packet) {
                        self.fan_out(device.id, packet, &mut result);
                    } else {
                        result.ignored += 1;
                    }
                }
                (DeviceKind::Onu | DeviceKind::Ont, Direction::Upstream) => {
                    self.onu_upstream(device, packet, &mut result)
                }
                (DeviceKind::Router | DeviceKind::Switch, Direction::Downstream) => {
                    self.fan_out(device.id, packet, &mut result)
                }
                (DeviceKind::Splitter | DeviceKind::Router | DeviceKind::Switch, Direction::Upstream) => {
                    self.forward_up(device.id, packet, &mut result)
                }
                (DeviceKind::Pc | DeviceKind::Server, Direction::Downstream) => {
                    result.delivered.push(packet.clone())
                }
                // Endpoints originate upstream traffic through the generators.
                (DeviceKind::Pc | DeviceKind::Server, Direction::Upstream) => result.ignored += 1,
            }
        }

        if congested > 0 {
            result.drop_packets(
                DropReason::Congestion {
                    node: device.id,
                    count: congested,
                },
                congested,
            );
        }

        Ok(result)
    }

    /// Whether `device` may originate new traffic in `direction` under the
    /// current flow phase.
    ///
    /// The primary OLT broadcasts downstream in any initialised phase;
    /// endpoints answer upstream only during the upstream phase. Listen-only
    /// taps never originate.
    pub fn may_originate(&self, device: &Device, direction: Direction) -> bool {
        if device.role == DeviceRole::Sniffer {
            return false;
        }
        match (self.ctx.flow, direction) {
            (FlowPhase::Uninitialized, _) => false,
            (_, Direction::Downstream) => self.is_primary(device),
            (FlowPhase::Upstream, Direction::Upstream) => device.is_end_device(),
            (FlowPhase::Downstream, Direction::Upstream) => false,
        }
    }

    fn is_primary(&self, device: &Device) -> bool {
        self.ctx.hierarchy.root() == Some(device.id)
    }

    fn olt(&self, device: &Device, packet: &Packet, direction: Direction, result: &mut DispatchResult) {
        match direction {
            Direction::Upstream if self.is_primary(device) => result.delivered.push(packet.clone()),
            Direction::Upstream => {
                let known = packet
                    .target_onu
                    .is_some_and(|onu| device.gpon.known_onu_ids.contains(&onu));
                if known {
                    self.forward_up(device.id, packet, result);
                } else {
                    trace!(olt = %device.id, onu = ?packet.target_onu, "Unknown ONU, dropping");
                    result.drop_packets(DropReason::UnknownOnu { onu: packet.target_onu }, 1);
                }
            }
            Direction::Downstream => self.fan_out(device.id, packet, result),
        }
    }

    fn onu_upstream(&self, device: &Device, packet: &Packet, result: &mut DispatchResult) {
        match device.role {
            DeviceRole::Sniffer => result.drop_packets(DropReason::ListenOnly, 1),
            DeviceRole::Normal
            | DeviceRole::RogueOnu
            | DeviceRole::Substitute
            | DeviceRole::DdosSource
            | DeviceRole::Attacker
            | DeviceRole::TapSplitter => {
                let mut stamped = packet.clone();
                if let Some(onu) = device.gpon.onu_id {
                    stamped.target_onu = Some(onu);
                }
                self.forward_up(device.id, &stamped, result);
            }
        }
    }

    /// One copy per downstream link.
    fn fan_out(&self, device: DeviceId, packet: &Packet, result: &mut DispatchResult) {
        for next in self.ctx.hierarchy.downstream_of(self.ctx.graph, device) {
            result.outbound.push(packet.forward_to(next, packet.id));
        }
    }

    /// Single copy toward the upstream link.
    fn forward_up(&self, device: DeviceId, packet: &Packet, result: &mut DispatchResult) {
        if let Some(next) = self.ctx.hierarchy.upstream_of(self.ctx.graph, device) {
            result.outbound.push(packet.forward_to(next, packet.id));
        }
    }
}

/// Broadcast, or directed at this ONU's registered ID.
fn accepts_downstream(device: &Device, packet: &Packet) -> bool {
    match packet.target_onu {
        None => true,
        Some(target) => device.is_registered() && device.gpon.onu_id == Some(target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpon_test_helpers::{TreeFixture, TwoStageFixture};
    use gpon_types::{OnuId, PacketId, PacketKind, PayloadKind};
    use std::time::Duration;

    fn downstream_at(path: Vec<DeviceId>, position: usize) -> Packet {
        let mut packet = Packet::along(
            PacketId(1),
            path,
            Direction::Downstream,
            PacketKind::Gpon,
            PayloadKind::Broadcast,
            Duration::ZERO,
        )
        .unwrap();
        for _ in 0..position {
            packet.advance();
        }
        packet
    }

    fn upstream_at(path: Vec<DeviceId>, position: usize) -> Packet {
        let mut packet = Packet::along(
            PacketId(2),
            path,
            Direction::Upstream,
            PacketKind::Ip,
            PayloadKind::Response,
            Duration::ZERO,
        )
        .unwrap();
        for _ in 0..position {
            packet.advance();
        }
        packet
    }

    fn dispatch(
        network: &Network,
        device: DeviceId,
        inbound: &[Packet],
        congestion: CongestionState,
    ) -> DispatchResult {
        let graph = network.graph();
        let hierarchy = network.hierarchy(&graph);
        let dispatcher = Dispatcher::new(DispatchContext {
            network,
            graph: &graph,
            hierarchy: &hierarchy,
            flow: FlowPhase::Downstream,
            congestion,
        });
        dispatcher
            .process(network.device(device).unwrap(), inbound)
            .unwrap()
    }

    #[test]
    fn test_splitter_fans_out_one_copy_per_downstream_link() {
        let f = TreeFixture::olt_splitter_two_onts();
        let packet = downstream_at(vec![f.olt, f.splitter], 1);
        let result = dispatch(&f.network, f.splitter, &[packet], CongestionState::default());

        assert_eq!(result.outbound.len(), 2);
        assert_eq!(result.outbound[0].path, vec![f.olt, f.splitter, f.onts[0]]);
        assert_eq!(result.outbound[1].path, vec![f.olt, f.splitter, f.onts[1]]);
        assert_eq!(result.outbound[0].destination, f.onts[0]);
        assert!(result.outbound.iter().all(|p| p.current_position == 1));
        assert!(!result.dropped);
    }

    #[test]
    fn test_splitter_forwards_upstream_to_single_parent() {
        let f = TreeFixture::olt_splitter_two_onts();
        let packet = upstream_at(vec![f.onts[0], f.splitter, f.olt], 1);
        let result = dispatch(&f.network, f.splitter, &[packet], CongestionState::default());
        assert_eq!(result.outbound.len(), 1);
        assert_eq!(result.outbound[0].next_hop(), Some(f.olt));
    }

    #[test]
    fn test_position_mismatch_is_ignored() {
        let f = TreeFixture::olt_splitter_two_onts();
        let packet = downstream_at(vec![f.olt, f.splitter], 0);
        let result = dispatch(&f.network, f.splitter, &[packet], CongestionState::default());
        assert!(result.outbound.is_empty());
        assert_eq!(result.ignored, 1);
        assert!(!result.dropped);
    }

    #[test]
    fn test_congestion_drops_only_legitimate_downstream() {
        let f = TreeFixture::olt_splitter_two_onts();
        let legit = downstream_at(vec![f.olt, f.splitter], 1);
        let mut attack = downstream_at(vec![f.olt, f.splitter], 1);
        attack.payload = PayloadKind::Attack;

        let result = dispatch(
            &f.network,
            f.splitter,
            &[legit, attack],
            CongestionState::at(f.splitter),
        );
        assert!(result.dropped);
        assert_eq!(result.dropped_count, 1);
        assert_eq!(
            result.reason,
            Some(DropReason::Congestion {
                node: f.splitter,
                count: 1
            })
        );
        assert_eq!(result.outbound.len(), 2);
        assert!(result.outbound.iter().all(Packet::is_attack));
    }

    #[test]
    fn test_onu_filters_directed_downstream() {
        let mut f = TreeFixture::olt_splitter_two_onts();
        f.register_all();
        let ont = f.onts[0];
        let own_id = f.network.device(ont).unwrap().gpon.onu_id;
        let router = f.network.add_device(DeviceKind::Router, "router");
        f.network.connect(ont, router).unwrap();

        let mut mine = downstream_at(vec![f.olt, f.splitter, ont], 2);
        mine.target_onu = own_id;
        let mut theirs = downstream_at(vec![f.olt, f.splitter, ont], 2);
        theirs.target_onu = Some(OnuId(77));
        let broadcast = downstream_at(vec![f.olt, f.splitter, ont], 2);

        let result = dispatch(
            &f.network,
            ont,
            &[mine, theirs, broadcast],
            CongestionState::default(),
        );
        assert_eq!(result.outbound.len(), 2);
        assert_eq!(result.ignored, 1);
        assert!(!result.dropped);
        assert!(result.outbound.iter().all(|p| p.destination == router));
    }

    #[test]
    fn test_unregistered_onu_ignores_directed_traffic() {
        let f = TreeFixture::olt_splitter_two_onts();
        let mut packet = downstream_at(vec![f.olt, f.splitter, f.onts[1]], 2);
        packet.target_onu = Some(OnuId(1));
        let result = dispatch(&f.network, f.onts[1], &[packet], CongestionState::default());
        assert!(result.is_empty());
        assert_eq!(result.ignored, 1);
    }

    #[test]
    fn test_onu_stamps_id_upstream() {
        let mut f = TreeFixture::olt_splitter_two_onts();
        f.register_all();
        let ont = f.onts[1];
        let packet = upstream_at(vec![ont, f.splitter, f.olt], 0);
        let result = dispatch(&f.network, ont, &[packet], CongestionState::default());
        assert_eq!(result.outbound.len(), 1);
        assert_eq!(
            result.outbound[0].target_onu,
            f.network.device(ont).unwrap().gpon.onu_id
        );
    }

    #[test]
    fn test_sniffer_never_sends_upstream() {
        let mut f = TreeFixture::olt_splitter_two_onts();
        let ont = f.onts[0];
        f.network.device_mut(ont).unwrap().role = DeviceRole::Sniffer;
        let packet = upstream_at(vec![ont, f.splitter, f.olt], 0);
        let result = dispatch(&f.network, ont, &[packet], CongestionState::default());
        assert!(result.outbound.is_empty());
        assert_eq!(result.reason, Some(DropReason::ListenOnly));
    }

    #[test]
    fn test_primary_olt_terminates_upstream() {
        let f = TreeFixture::olt_splitter_two_onts();
        let packet = upstream_at(vec![f.onts[0], f.splitter, f.olt], 2);
        let result = dispatch(&f.network, f.olt, &[packet], CongestionState::default());
        assert!(result.outbound.is_empty());
        assert_eq!(result.delivered.len(), 1);
    }

    #[test]
    fn test_secondary_olt_filters_by_known_ids() {
        let f = TwoStageFixture::new();
        let known = f.network.device(f.secondary).unwrap().gpon.known_onu_ids.clone();
        let known_id = *known.iter().next().unwrap();

        let mut allowed = upstream_at(vec![f.ont, f.splitter, f.secondary, f.primary], 2);
        allowed.target_onu = Some(known_id);
        let result = dispatch(&f.network, f.secondary, &[allowed], CongestionState::default());
        assert_eq!(result.outbound.len(), 1);
        assert_eq!(result.outbound[0].next_hop(), Some(f.primary));

        let mut unknown = upstream_at(vec![f.ont, f.splitter, f.secondary, f.primary], 2);
        unknown.target_onu = Some(OnuId(999));
        let result = dispatch(&f.network, f.secondary, &[unknown], CongestionState::default());
        assert!(result.outbound.is_empty());
        assert!(result.dropped);
        assert!(result.reason.unwrap().is_silent());
    }

    #[test]
    fn test_secondary_olt_forwards_downstream_unfiltered() {
        let f = TwoStageFixture::new();
        let mut packet = downstream_at(vec![f.primary, f.secondary], 1);
        packet.target_onu = Some(OnuId(500));
        let result = dispatch(&f.network, f.secondary, &[packet], CongestionState::default());
        assert_eq!(result.outbound.len(), 1);
        assert_eq!(result.outbound[0].destination, f.splitter);
    }

    #[test]
    fn test_endpoint_delivery_and_router_fan_out() {
        let f = TreeFixture::full_tree();
        let router = f.routers[0];
        let packet = downstream_at(vec![f.olt, f.splitter, f.onts[0], router], 3);
        let result = dispatch(&f.network, router, &[packet], CongestionState::default());
        assert_eq!(result.outbound.len(), f.pcs_behind_router(router).len());

        let pc = f.pcs_behind_router(router)[0];
        let packet = downstream_at(vec![f.olt, f.splitter, f.onts[0], router, pc], 4);
        let result = dispatch(&f.network, pc, &[packet], CongestionState::default());
        assert_eq!(result.delivered.len(), 1);
        assert!(result.outbound.is_empty());
    }

    #[test]
    fn test_device_outside_graph_is_an_error() {
        let f = TreeFixture::olt_splitter_two_onts();
        let graph = TopologyGraph::default();
        let hierarchy = Hierarchy::default();
        let dispatcher = Dispatcher::new(DispatchContext {
            network: &f.network,
            graph: &graph,
            hierarchy: &hierarchy,
            flow: FlowPhase::Upstream,
            congestion: CongestionState::default(),
        });
        let device = f.network.device(f.olt).unwrap();
        assert_eq!(
            dispatcher.process(device, &[]),
            Err(DispatchError::NotInGraph(f.olt))
        );
    }

    #[test]
    fn test_origination_follows_flow_phase() {
        let f = TreeFixture::full_tree();
        let graph = f.network.graph();
        let hierarchy = f.network.hierarchy(&graph);
        let olt = f.network.device(f.olt).unwrap();
        let pc = f.network.device(f.pcs[0]).unwrap();

        let with_phase = |flow| {
            Dispatcher::new(DispatchContext {
                network: &f.network,
                graph: &graph,
                hierarchy: &hierarchy,
                flow,
                congestion: CongestionState::default(),
            })
        };

        let idle = with_phase(FlowPhase::Uninitialized);
        assert!(!idle.may_originate(olt, Direction::Downstream));

        let down = with_phase(FlowPhase::Downstream);
        assert!(down.may_originate(olt, Direction::Downstream));
        assert!(!down.may_originate(pc, Direction::Upstream));

        let up = with_phase(FlowPhase::Upstream);
        assert!(up.may_originate(olt, Direction::Downstream));
        assert!(up.may_originate(pc, Direction::Upstream));
        assert!(!up.may_originate(olt, Direction::Upstream));
    }

    #[test]
    fn test_device_without_links_produces_nothing() {
        let mut f = TreeFixture::olt_splitter_two_onts();
        let lonely = f.network.add_device(DeviceKind::Switch, "lonely");
        let packet = downstream_at(vec![lonely], 0);
        let result = dispatch(&f.network, lonely, &[packet], CongestionState::default());
        assert!(result.is_empty());
    }
}
