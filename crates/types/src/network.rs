//! Mutable device/link store.
//!
//! `Network` is the single owner of devices and links. Every structural
//! mutation (by the user or by an attack) goes through the methods here so
//! port bookkeeping and link/device consistency stay intact.

use crate::{
    Device, DeviceId, DeviceKind, Hierarchy, Link, LinkEndpoint, LinkId, LinkSnapshot, LinkStatus,
    OnuId, PortMedium, PortNumber, TopologyError, TopologyGraph,
};
use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

const SERIAL_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Largest ONU ID an OLT hands out.
pub const MAX_ONU_ID: u16 = 1023;

/// Result of registering an ONU with an OLT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub onu_id: OnuId,
    pub alloc_id: u16,
    pub gem_port: u16,
    pub serial_number: String,
}

/// Devices and links, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Network {
    devices: IndexMap<DeviceId, Device>,
    links: IndexMap<LinkId, Link>,
    next_device: u64,
    next_link: u64,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Devices
    // ═══════════════════════════════════════════════════════════════════════

    /// Allocate an id for a device about to be inserted.
    pub fn allocate_device_id(&mut self) -> DeviceId {
        self.next_device += 1;
        DeviceId(self.next_device)
    }

    /// Create a device with default ports and insert it.
    pub fn add_device(&mut self, kind: DeviceKind, name: impl Into<String>) -> DeviceId {
        let id = self.allocate_device_id();
        self.insert_device(Device::new(id, kind, name))
    }

    /// Insert a prepared device.
    ///
    /// OLTs without an ordinal get the next one. Ports are unplugged: links
    /// are the only source of port occupancy.
    pub fn insert_device(&mut self, mut device: Device) -> DeviceId {
        let id = device.id;
        self.next_device = self.next_device.max(id.0);
        if device.is_olt() && device.gpon.olt_ordinal.is_none() {
            let olts = self.devices.values().filter(|d| d.is_olt()).count() as u32;
            device.gpon.olt_ordinal = Some(olts + 1);
        }
        for port in &mut device.ports {
            port.link = None;
        }
        debug!(device = %id, kind = %device.kind, name = %device.name, "Device added");
        self.devices.insert(id, device);
        id
    }

    /// Remove a device and every link attached to it.
    pub fn remove_device(&mut self, id: DeviceId) -> Result<Device, TopologyError> {
        if !self.devices.contains_key(&id) {
            return Err(TopologyError::UnknownDevice(id));
        }
        let attached: Vec<LinkId> = self.links_of(id).map(|l| l.id).collect();
        for link in attached {
            self.disconnect(link)?;
        }
        let device = self
            .devices
            .shift_remove(&id)
            .ok_or(TopologyError::UnknownDevice(id))?;
        debug!(device = %id, "Device removed");
        Ok(device)
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(&id)
    }

    pub fn device_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        self.devices.get_mut(&id)
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.contains_key(&id)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn device_by_name(&self, name: &str) -> Option<&Device> {
        self.devices.values().find(|d| d.name == name)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// The primary OLT: first OLT with ordinal 1 (or no ordinal).
    pub fn primary_olt(&self) -> Option<DeviceId> {
        self.devices
            .values()
            .find(|d| d.is_primary_olt_candidate())
            .map(|d| d.id)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Links
    // ═══════════════════════════════════════════════════════════════════════

    /// Link two devices on their first free compatible ports.
    ///
    /// Optical is preferred when both sides have a free optical port.
    pub fn connect(&mut self, a: DeviceId, b: DeviceId) -> Result<LinkId, TopologyError> {
        let (da, db) = self.pair(a, b)?;

        let mut shared = false;
        for medium in [PortMedium::Optical, PortMedium::Ethernet] {
            if !(da.supports(medium) && db.supports(medium)) {
                continue;
            }
            shared = true;
            match (da.free_port(medium), db.free_port(medium)) {
                (Some(pa), Some(pb)) => return self.connect_ports(a, pa, b, pb),
                (None, _) if medium == PortMedium::Ethernet => {
                    return Err(TopologyError::NoFreePort { device: a })
                }
                (_, None) if medium == PortMedium::Ethernet => {
                    return Err(TopologyError::NoFreePort { device: b })
                }
                _ => {}
            }
        }

        if shared {
            // Only optical was shared and one side was full.
            let full = if da.free_port(PortMedium::Optical).is_none() { a } else { b };
            Err(TopologyError::NoFreePort { device: full })
        } else {
            Err(TopologyError::IncompatiblePorts { a, b })
        }
    }

    /// Link two explicit ports. Both must exist, be free and share a medium.
    pub fn connect_ports(
        &mut self,
        a: DeviceId,
        port_a: PortNumber,
        b: DeviceId,
        port_b: PortNumber,
    ) -> Result<LinkId, TopologyError> {
        let (da, db) = self.pair(a, b)?;
        let pa = da
            .port(port_a)
            .filter(|p| p.is_free())
            .ok_or(TopologyError::PortUnavailable { device: a, port: port_a })?;
        let pb = db
            .port(port_b)
            .filter(|p| p.is_free())
            .ok_or(TopologyError::PortUnavailable { device: b, port: port_b })?;
        if pa.medium != pb.medium {
            return Err(TopologyError::IncompatiblePorts { a, b });
        }
        let medium = pa.medium;

        self.next_link += 1;
        let id = LinkId(self.next_link);
        let link = Link {
            id,
            a: LinkEndpoint { device: a, port: port_a },
            b: LinkEndpoint { device: b, port: port_b },
            medium,
            status: LinkStatus::Active,
        };
        self.plug(link.a, Some(id));
        self.plug(link.b, Some(id));
        debug!(link = %id, %a, %b, ?medium, "Link established");
        self.links.insert(id, link);
        Ok(id)
    }

    /// Recreate a link with the same endpoints and ports.
    pub fn restore_link(&mut self, snapshot: &LinkSnapshot) -> Result<LinkId, TopologyError> {
        self.connect_ports(
            snapshot.a.device,
            snapshot.a.port,
            snapshot.b.device,
            snapshot.b.port,
        )
    }

    /// Insert a link loaded from a persisted document, keeping its id.
    pub fn insert_link(&mut self, link: Link) -> Result<LinkId, TopologyError> {
        let id = link.id;
        let new_id = self.connect_ports(link.a.device, link.a.port, link.b.device, link.b.port)?;
        if let Some(mut created) = self.links.shift_remove(&new_id) {
            created.id = id;
            created.status = link.status;
            self.plug(created.a, Some(id));
            self.plug(created.b, Some(id));
            self.links.insert(id, created);
        }
        self.next_link = self.next_link.max(id.0);
        Ok(id)
    }

    /// Remove a link and free both ports.
    pub fn disconnect(&mut self, id: LinkId) -> Result<Link, TopologyError> {
        let link = self
            .links
            .shift_remove(&id)
            .ok_or(TopologyError::UnknownLink(id))?;
        self.plug(link.a, None);
        self.plug(link.b, None);
        debug!(link = %id, "Link removed");
        Ok(link)
    }

    pub fn set_link_status(&mut self, id: LinkId, status: LinkStatus) -> Result<(), TopologyError> {
        let link = self.links.get_mut(&id).ok_or(TopologyError::UnknownLink(id))?;
        link.status = status;
        Ok(())
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn links_of(&self, device: DeviceId) -> impl Iterator<Item = &Link> {
        self.links.values().filter(move |l| l.touches(device))
    }

    /// First link joining `a` and `b`, either orientation.
    pub fn link_between(&self, a: DeviceId, b: DeviceId) -> Option<&Link> {
        self.links.values().find(|l| l.joins(a, b))
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    fn pair(&self, a: DeviceId, b: DeviceId) -> Result<(&Device, &Device), TopologyError> {
        if a == b {
            return Err(TopologyError::SelfLink(a));
        }
        let da = self.device(a).ok_or(TopologyError::UnknownDevice(a))?;
        let db = self.device(b).ok_or(TopologyError::UnknownDevice(b))?;
        if self.link_between(a, b).is_some() {
            return Err(TopologyError::AlreadyLinked { a, b });
        }
        Ok((da, db))
    }

    fn plug(&mut self, endpoint: LinkEndpoint, link: Option<LinkId>) {
        if let Some(port) = self
            .devices
            .get_mut(&endpoint.device)
            .and_then(|d| d.port_mut(endpoint.port))
        {
            port.link = link;
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Graph views
    // ═══════════════════════════════════════════════════════════════════════

    /// Adjacency over the current devices and active links.
    pub fn graph(&self) -> TopologyGraph {
        TopologyGraph::build(self.devices.values(), self.links.values())
    }

    /// Orientation relative to the primary OLT.
    pub fn hierarchy(&self, graph: &TopologyGraph) -> Hierarchy {
        Hierarchy::from_root(graph, self.primary_olt())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Registration
    // ═══════════════════════════════════════════════════════════════════════

    /// Next free ONU ID (highest in use + 1).
    pub fn next_onu_id(&self) -> Result<OnuId, TopologyError> {
        let next = self
            .devices
            .values()
            .filter_map(|d| d.gpon.onu_id)
            .max()
            .map_or(OnuId(1), OnuId::next);
        if next.0 > MAX_ONU_ID {
            return Err(TopologyError::OnuIdsExhausted);
        }
        Ok(next)
    }

    /// Register an ONU/ONT with an OLT.
    ///
    /// Assigns ONU ID, allocation ID, GEM port and a serial number, and adds
    /// the ID to every secondary OLT the ONU sits below. Registering an
    /// already-registered ONU returns its existing registration.
    pub fn register_onu(
        &mut self,
        onu: DeviceId,
        olt: DeviceId,
        rng: &mut impl Rng,
    ) -> Result<Registration, TopologyError> {
        let olt_device = self.device(olt).ok_or(TopologyError::UnknownDevice(olt))?;
        if !olt_device.is_olt() {
            return Err(TopologyError::WrongKind {
                device: olt,
                expected: "OLT",
                actual: olt_device.kind,
            });
        }
        let onu_device = self.device(onu).ok_or(TopologyError::UnknownDevice(onu))?;
        if !onu_device.is_onu() {
            return Err(TopologyError::WrongKind {
                device: onu,
                expected: "ONU/ONT",
                actual: onu_device.kind,
            });
        }
        if let (Some(onu_id), Some(alloc_id), Some(gem_port)) = (
            onu_device.gpon.onu_id,
            onu_device.gpon.alloc_id,
            onu_device.gpon.gem_port,
        ) {
            return Ok(Registration {
                onu_id,
                alloc_id,
                gem_port,
                serial_number: onu_device.gpon.serial_number.clone().unwrap_or_default(),
            });
        }

        let onu_id = match onu_device.gpon.onu_id {
            Some(id) => id,
            None => self.next_onu_id()?,
        };
        let registration = Registration {
            onu_id,
            alloc_id: onu_id.alloc_id(),
            gem_port: onu_id.gem_port(),
            serial_number: generate_serial("GPON", rng),
        };
        self.apply_registration(onu, &registration);

        let graph = self.graph();
        let hierarchy = self.hierarchy(&graph);
        let secondaries: Vec<DeviceId> = self
            .devices
            .values()
            .filter(|d| d.is_olt() && !d.is_primary_olt_candidate())
            .map(|d| d.id)
            .filter(|id| hierarchy.subtree(&graph, *id).contains(&onu))
            .collect();
        for secondary in secondaries {
            if let Some(device) = self.device_mut(secondary) {
                device.gpon.known_onu_ids.insert(onu_id);
            }
        }

        debug!(%onu, %olt, onu_id = %registration.onu_id, "ONU registered");
        Ok(registration)
    }

    /// Write registration fields onto a device.
    pub fn apply_registration(&mut self, onu: DeviceId, registration: &Registration) {
        if let Some(device) = self.device_mut(onu) {
            device.gpon.onu_id = Some(registration.onu_id);
            device.gpon.alloc_id = Some(registration.alloc_id);
            device.gpon.gem_port = Some(registration.gem_port);
            device.gpon.serial_number = Some(registration.serial_number.clone());
        }
    }

    /// Seed every secondary OLT's allow-list with the registered ONUs below it.
    pub fn bootstrap_known_onu_ids(&mut self) {
        let graph = self.graph();
        let hierarchy = self.hierarchy(&graph);
        let updates: Vec<(DeviceId, Vec<OnuId>)> = self
            .devices
            .values()
            .filter(|d| d.is_olt() && !d.is_primary_olt_candidate())
            .map(|olt| {
                let ids = hierarchy
                    .subtree(&graph, olt.id)
                    .into_iter()
                    .filter_map(|id| self.device(id))
                    .filter(|d| d.is_registered())
                    .filter_map(|d| d.gpon.onu_id)
                    .collect();
                (olt.id, ids)
            })
            .collect();
        for (olt, ids) in updates {
            if let Some(device) = self.device_mut(olt) {
                trace!(%olt, count = ids.len(), "Seeding known ONU IDs");
                device.gpon.known_onu_ids.extend(ids);
            }
        }
    }

    /// Withdraw an ONU ID from every secondary OLT allow-list.
    pub fn forget_known_onu_id(&mut self, onu_id: OnuId) {
        for device in self.devices.values_mut().filter(|d| d.is_olt()) {
            device.gpon.known_onu_ids.remove(&onu_id);
        }
    }
}

/// Serial number: 4-character vendor prefix plus 8 random alphanumerics.
pub fn generate_serial(vendor: &str, rng: &mut impl Rng) -> String {
    let suffix: String = (0..8)
        .map(|_| SERIAL_CHARSET[rng.gen_range(0..SERIAL_CHARSET.len())] as char)
        .collect();
    format!("{vendor}{suffix}")
}
