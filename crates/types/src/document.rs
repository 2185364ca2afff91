//! Persisted network document.
//!
//! Collaborators own persistence; the simulator only needs to export its
//! state and to be re-initialised from a document written by any earlier
//! version, filling missing optional fields with safe defaults.

use crate::{
    Device, DeviceId, DeviceKind, DeviceRole, DeviceStatus, GponConfig, Link, LinkId, LogEntry,
    Network, Port, Position, TopologyError,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Current document version.
pub const DOCUMENT_VERSION: u32 = 1;

/// Errors loading a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported document version {0}")]
    UnsupportedVersion(u32),
}

/// Device as stored on disk. Everything but identity and kind is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub kind: DeviceKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: DeviceRole,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default)]
    pub status_level: u8,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub gpon: GponConfig,
}

impl DeviceRecord {
    fn into_device(self, rng: &mut impl Rng) -> Device {
        let name = self
            .name
            .unwrap_or_else(|| format!("{}-{}", self.kind, self.id.0));
        let mut device = Device::new(self.id, self.kind, name);
        device.role = self.role;
        device.status = self.status;
        device.status_level = self.status_level.min(3);
        device.position = self.position.unwrap_or_else(|| Position {
            x: rng.gen_range(100.0..700.0),
            y: rng.gen_range(100.0..500.0),
        });
        device.gpon = self.gpon;
        if self.ports.is_empty() {
            device.reset_ports();
        } else {
            device.ports = self.ports;
        }
        device
    }
}

impl From<&Device> for DeviceRecord {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id,
            kind: device.kind,
            name: Some(device.name.clone()),
            role: device.role,
            status: device.status,
            status_level: device.status_level,
            position: Some(device.position),
            ports: device.ports.clone(),
            gpon: device.gpon.clone(),
        }
    }
}

/// Versioned snapshot of devices, links and the recent log tail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

/// A network rebuilt from a document.
#[derive(Debug, Clone)]
pub struct RestoredNetwork {
    pub network: Network,
    pub logs: Vec<LogEntry>,
    /// Stored links that no longer fit, with the reason.
    pub skipped_links: Vec<(LinkId, TopologyError)>,
}

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

impl NetworkDocument {
    /// Capture a network and log tail.
    pub fn capture(network: &Network, logs: Vec<LogEntry>) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            devices: network.devices().map(DeviceRecord::from).collect(),
            links: network.links().cloned().collect(),
            logs,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let document: NetworkDocument = serde_json::from_str(json)?;
        if document.version > DOCUMENT_VERSION {
            return Err(DocumentError::UnsupportedVersion(document.version));
        }
        Ok(document)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rebuild a network. Links that no longer fit (unknown device, port in
    /// use) are skipped and reported back.
    pub fn into_network(self, rng: &mut impl Rng) -> RestoredNetwork {
        let mut network = Network::new();
        for record in self.devices {
            network.insert_device(record.into_device(rng));
        }
        let mut skipped_links = Vec::new();
        for link in self.links {
            let id = link.id;
            if let Err(error) = network.insert_link(link) {
                warn!(link = %id, %error, "Skipping link from document");
                skipped_links.push((id, error));
            }
        }
        RestoredNetwork {
            network,
            logs: self.logs,
            skipped_links,
        }
    }
}
