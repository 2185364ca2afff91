//! Graph surgery for attacks.
//!
//! A [`Graft`] records every device an attack inserts, the link it
//! replaced and the ONU IDs its registrations put on allow-lists, so setup
//! failures and teardown can put the network back the way it was.

use crate::AttackError;
use gpon_types::{
    Device, DeviceId, DeviceKind, DeviceRole, LinkSnapshot, Network, OnuId, PortMedium,
    Registration, TopologyError,
};
use rand::Rng;
use tracing::{debug, warn};

/// Injected devices and the replaced link, in the order they happened.
#[derive(Debug, Clone, Default)]
pub struct Graft {
    pub devices: Vec<DeviceId>,
    pub replaced: Option<LinkSnapshot>,
    /// IDs handed to injected ONUs; secondary OLTs above them learned these.
    pub allow_listed: Vec<OnuId>,
}

impl Graft {
    /// Create a device and link it to `parent`.
    pub fn attach(
        &mut self,
        network: &mut Network,
        parent: DeviceId,
        kind: DeviceKind,
        role: DeviceRole,
        prefix: &str,
    ) -> Result<DeviceId, AttackError> {
        let id = self.insert(network, kind, role, prefix);
        network.connect(parent, id)?;
        Ok(id)
    }

    /// Create a device without linking it.
    pub fn insert(
        &mut self,
        network: &mut Network,
        kind: DeviceKind,
        role: DeviceRole,
        prefix: &str,
    ) -> DeviceId {
        let id = network.allocate_device_id();
        let device = Device::new(id, kind, format!("{prefix}-{}", id.0)).with_role(role);
        network.insert_device(device);
        self.devices.push(id);
        debug!(device = %id, %kind, ?role, "Injected device");
        id
    }

    /// Register an injected ONU with `olt` and remember the ID it got.
    pub fn register(
        &mut self,
        network: &mut Network,
        onu: DeviceId,
        olt: DeviceId,
        rng: &mut impl Rng,
    ) -> Result<Registration, AttackError> {
        let registration = network.register_onu(onu, olt, rng)?;
        self.allow_listed.push(registration.onu_id);
        Ok(registration)
    }

    /// Replace the optical link `parent - child` with
    /// `parent - splitter - child`, keeping the original ports on both ends.
    pub fn splice(
        &mut self,
        network: &mut Network,
        parent: DeviceId,
        child: DeviceId,
        prefix: &str,
    ) -> Result<DeviceId, AttackError> {
        let link = network
            .link_between(parent, child)
            .ok_or(AttackError::Unreachable(child))?;
        if link.medium != PortMedium::Optical {
            return Err(TopologyError::IncompatiblePorts { a: parent, b: child }.into());
        }
        let link_id = link.id;
        let snapshot = LinkSnapshot::from(link);
        let (parent_end, child_end) = if snapshot.a.device == parent {
            (snapshot.a, snapshot.b)
        } else {
            (snapshot.b, snapshot.a)
        };

        network.disconnect(link_id)?;
        self.replaced = Some(snapshot);

        let splitter = self.insert(network, DeviceKind::Splitter, DeviceRole::TapSplitter, prefix);
        let (up, down) = {
            let device = network
                .device(splitter)
                .ok_or(TopologyError::UnknownDevice(splitter))?;
            let mut optical = device
                .ports
                .iter()
                .filter(|p| p.medium == PortMedium::Optical)
                .map(|p| p.number);
            match (optical.next(), optical.next()) {
                (Some(up), Some(down)) => (up, down),
                _ => return Err(TopologyError::NoFreePort { device: splitter }.into()),
            }
        };
        network.connect_ports(parent_end.device, parent_end.port, splitter, up)?;
        network.connect_ports(splitter, down, child_end.device, child_end.port)?;
        Ok(splitter)
    }

    /// Remove injected devices (newest first), withdraw their IDs from the
    /// allow-lists and restore the replaced link.
    ///
    /// Devices already removed out-of-band are skipped. Returns the error if
    /// the replaced link could not be restored.
    pub fn undo(&mut self, network: &mut Network) -> Result<(), TopologyError> {
        for device in self.devices.drain(..).rev() {
            if network.contains(device) {
                network.remove_device(device)?;
            }
        }
        for onu_id in self.allow_listed.drain(..) {
            network.forget_known_onu_id(onu_id);
        }
        if let Some(snapshot) = self.replaced.take() {
            if network.link_between(snapshot.a.device, snapshot.b.device).is_some() {
                return Ok(());
            }
            if let Err(error) = network.restore_link(&snapshot) {
                warn!(%error, "Could not restore replaced link");
                return Err(error);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpon_test_helpers::{TreeFixture, TwoStageFixture};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_splice_then_undo_restores_same_ports() {
        let mut f = TreeFixture::olt_splitter_two_onts();
        let victim = f.onts[1];
        let before = LinkSnapshot::from(f.network.link_between(f.splitter, victim).unwrap());

        let mut graft = Graft::default();
        let tap = graft
            .splice(&mut f.network, f.splitter, victim, "tap-splitter")
            .unwrap();
        assert!(f.network.link_between(f.splitter, victim).is_none());
        assert!(f.network.link_between(f.splitter, tap).is_some());
        assert!(f.network.link_between(tap, victim).is_some());

        graft.undo(&mut f.network).unwrap();
        assert!(!f.network.contains(tap));
        let after = LinkSnapshot::from(f.network.link_between(f.splitter, victim).unwrap());
        assert_eq!(before, after);
    }

    #[test]
    fn test_attach_and_undo() {
        let mut f = TreeFixture::olt_splitter_two_onts();
        let mut graft = Graft::default();
        let rogue = graft
            .attach(
                &mut f.network,
                f.splitter,
                DeviceKind::Onu,
                DeviceRole::RogueOnu,
                "ont-rogue",
            )
            .unwrap();
        assert_eq!(f.network.device(rogue).unwrap().role, DeviceRole::RogueOnu);
        graft.undo(&mut f.network).unwrap();
        assert!(!f.network.contains(rogue));
        assert_eq!(f.network.device_count(), 4);
    }

    #[test]
    fn test_undo_withdraws_registered_ids() {
        let mut f = TwoStageFixture::new();
        let mut graft = Graft::default();
        let rogue = graft
            .attach(
                &mut f.network,
                f.splitter,
                DeviceKind::Onu,
                DeviceRole::RogueOnu,
                "ont-rogue",
            )
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let registration = graft
            .register(&mut f.network, rogue, f.primary, &mut rng)
            .unwrap();
        let secondary = f.secondary;
        let known = |network: &Network| network.device(secondary).unwrap().gpon.known_onu_ids.clone();
        assert!(known(&f.network).contains(&registration.onu_id));

        graft.undo(&mut f.network).unwrap();
        let after = known(&f.network);
        assert!(!after.contains(&registration.onu_id));
        assert_eq!(after.len(), 1);
    }

    #[test]
    fn test_undo_tolerates_out_of_band_removal() {
        let mut f = TreeFixture::olt_splitter_two_onts();
        let mut graft = Graft::default();
        let rogue = graft
            .attach(
                &mut f.network,
                f.splitter,
                DeviceKind::Onu,
                DeviceRole::RogueOnu,
                "ont-rogue",
            )
            .unwrap();
        f.network.remove_device(rogue).unwrap();
        assert!(graft.undo(&mut f.network).is_ok());
    }
}
