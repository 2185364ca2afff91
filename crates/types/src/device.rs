//! Devices, ports and their GPON configuration.

use crate::{DeviceId, LinkId, OnuId, PortNumber, ShortCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Default downstream wavelength in nanometres.
pub const DEFAULT_WAVELENGTH_DOWN: u16 = 1490;

/// Default upstream wavelength in nanometres.
pub const DEFAULT_WAVELENGTH_UP: u16 = 1310;

/// Default splitter ratio for newly created splitters.
pub const DEFAULT_SPLITTER_RATIO: &str = "1:8";

/// Device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceKind {
    Olt,
    Splitter,
    Onu,
    Ont,
    Router,
    Switch,
    Pc,
    Server,
}

impl DeviceKind {
    /// ONU and ONT are functionally identical.
    pub fn is_onu(self) -> bool {
        matches!(self, DeviceKind::Onu | DeviceKind::Ont)
    }

    /// Terminal endpoints that consume downstream traffic and originate upstream traffic.
    pub fn is_end_device(self) -> bool {
        matches!(self, DeviceKind::Pc | DeviceKind::Server)
    }

    /// Default port layout for a fresh device of this kind.
    fn default_ports(self, splitter_ratio: &str) -> Vec<(PortMedium, u16)> {
        match self {
            DeviceKind::Olt => vec![(PortMedium::Optical, 8)],
            DeviceKind::Splitter => {
                vec![(PortMedium::Optical, 1 + splitter_outputs(splitter_ratio))]
            }
            DeviceKind::Onu | DeviceKind::Ont => {
                vec![(PortMedium::Optical, 1), (PortMedium::Ethernet, 4)]
            }
            DeviceKind::Router => vec![(PortMedium::Ethernet, 5)],
            DeviceKind::Switch => vec![(PortMedium::Ethernet, 8)],
            DeviceKind::Pc => vec![(PortMedium::Ethernet, 1)],
            DeviceKind::Server => vec![(PortMedium::Ethernet, 2)],
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceKind::Olt => "OLT",
            DeviceKind::Splitter => "SPLITTER",
            DeviceKind::Onu => "ONU",
            DeviceKind::Ont => "ONT",
            DeviceKind::Router => "ROUTER",
            DeviceKind::Switch => "SWITCH",
            DeviceKind::Pc => "PC",
            DeviceKind::Server => "SERVER",
        };
        f.write_str(s)
    }
}

/// Number of output legs encoded in a `1:N` ratio. Unparseable ratios fall back to 8.
pub fn splitter_outputs(ratio: &str) -> u16 {
    ratio
        .split_once(':')
        .and_then(|(_, n)| n.trim().parse::<u16>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(8)
}

/// Role a device plays in the simulation.
///
/// Attack-injected devices carry a non-`Normal` role so forwarding rules and
/// teardown can match on it exhaustively instead of probing free-form config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    #[default]
    Normal,
    /// ONU inserted by a rogue-registration or identifier-guessing attack.
    RogueOnu,
    /// ONT impersonating a victim during an ONT spoof.
    Substitute,
    /// Listen-only tap (sniffer ONU and the endpoint behind it).
    Sniffer,
    /// ONU flooding the OLT.
    DdosSource,
    /// Attacker endpoint behind an injected ONU.
    Attacker,
    /// Splitter spliced into an existing link by an attack.
    TapSplitter,
}

impl DeviceRole {
    /// Whether this is a legitimate subscriber/operator device.
    pub fn is_legitimate(self) -> bool {
        self == DeviceRole::Normal
    }
}

/// Operational status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    #[default]
    Active,
    Inactive,
    Error,
}

/// Canvas position. Only used by renderers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Physical medium of a port or link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortMedium {
    Optical,
    Ethernet,
}

/// Port link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortStatus {
    #[default]
    Up,
    Down,
}

/// A numbered, typed interface on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub number: PortNumber,
    pub medium: PortMedium,
    #[serde(default)]
    pub status: PortStatus,
    /// Link currently plugged into this port.
    #[serde(default)]
    pub link: Option<LinkId>,
}

impl Port {
    /// Whether nothing is plugged in and the port is up.
    pub fn is_free(&self) -> bool {
        self.link.is_none() && self.status == PortStatus::Up
    }
}

/// GPON-specific configuration carried by every device.
///
/// Only the fields meaningful for the device's kind are populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GponConfig {
    /// Downstream wavelength (nm).
    pub wavelength_down: u16,
    /// Upstream wavelength (nm).
    pub wavelength_up: u16,
    /// Splitter ratio such as `1:8`.
    pub splitter_ratio: String,

    // Registration (ONU/ONT)
    pub onu_id: Option<OnuId>,
    pub alloc_id: Option<u16>,
    pub gem_port: Option<u16>,
    pub serial_number: Option<String>,
    /// Service profile granted by the OLT.
    pub service_profile: Option<String>,
    /// Two-digit code exposed to the brute-force attacks.
    pub short_code: Option<ShortCode>,
    /// Set once an attacker has recovered `short_code`.
    pub id_cracked: bool,
    /// Set while an attacker impersonates this device.
    pub compromised: bool,

    // OLT
    /// Ordinal among OLTs; 1 (or none) is the primary.
    pub olt_ordinal: Option<u32>,
    /// ONU IDs a secondary OLT accepts upstream traffic from.
    pub known_onu_ids: BTreeSet<OnuId>,
}

impl Default for GponConfig {
    fn default() -> Self {
        Self {
            wavelength_down: DEFAULT_WAVELENGTH_DOWN,
            wavelength_up: DEFAULT_WAVELENGTH_UP,
            splitter_ratio: DEFAULT_SPLITTER_RATIO.to_string(),
            onu_id: None,
            alloc_id: None,
            gem_port: None,
            serial_number: None,
            service_profile: None,
            short_code: None,
            id_cracked: false,
            compromised: false,
            olt_ordinal: None,
            known_onu_ids: BTreeSet::new(),
        }
    }
}

impl GponConfig {
    /// Registered iff ONU ID, allocation ID and GEM port are all present.
    pub fn is_registered(&self) -> bool {
        self.onu_id.is_some() && self.alloc_id.is_some() && self.gem_port.is_some()
    }

    /// Drop every registration field.
    pub fn clear_registration(&mut self) {
        self.onu_id = None;
        self.alloc_id = None;
        self.gem_port = None;
        self.serial_number = None;
        self.service_profile = None;
    }
}

/// A network device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub kind: DeviceKind,
    #[serde(default)]
    pub role: DeviceRole,
    #[serde(default)]
    pub status: DeviceStatus,
    /// Severity indicator 0 (healthy) to 3 (overloaded).
    #[serde(default)]
    pub status_level: u8,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub gpon: GponConfig,
}

impl Device {
    /// Create a device with the default port layout for its kind.
    pub fn new(id: DeviceId, kind: DeviceKind, name: impl Into<String>) -> Self {
        let gpon = GponConfig::default();
        let mut device = Self {
            id,
            name: name.into(),
            kind,
            role: DeviceRole::Normal,
            status: DeviceStatus::Active,
            status_level: 0,
            position: Position::default(),
            ports: Vec::new(),
            gpon,
        };
        device.reset_ports();
        device
    }

    /// Set the role.
    pub fn with_role(mut self, role: DeviceRole) -> Self {
        self.role = role;
        self
    }

    /// Set the position.
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }

    /// Set the splitter ratio and rebuild the port layout.
    pub fn with_splitter_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.gpon.splitter_ratio = ratio.into();
        self.reset_ports();
        self
    }

    /// Replace all ports with the default layout (unplugged).
    pub fn reset_ports(&mut self) {
        let mut number = 0u16;
        self.ports = self
            .kind
            .default_ports(&self.gpon.splitter_ratio)
            .into_iter()
            .flat_map(|(medium, count)| std::iter::repeat(medium).take(count as usize))
            .map(|medium| {
                number += 1;
                Port {
                    number: PortNumber(number),
                    medium,
                    status: PortStatus::Up,
                    link: None,
                }
            })
            .collect();
    }

    pub fn is_olt(&self) -> bool {
        self.kind == DeviceKind::Olt
    }

    pub fn is_onu(&self) -> bool {
        self.kind.is_onu()
    }

    pub fn is_end_device(&self) -> bool {
        self.kind.is_end_device()
    }

    /// Whether this OLT is the primary one (ordinal 1 or none).
    pub fn is_primary_olt_candidate(&self) -> bool {
        self.is_olt() && self.gpon.olt_ordinal.map_or(true, |n| n <= 1)
    }

    pub fn is_registered(&self) -> bool {
        self.is_onu() && self.gpon.is_registered()
    }

    pub fn port(&self, number: PortNumber) -> Option<&Port> {
        self.ports.iter().find(|p| p.number == number)
    }

    pub fn port_mut(&mut self, number: PortNumber) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.number == number)
    }

    /// First free port of the given medium.
    pub fn free_port(&self, medium: PortMedium) -> Option<PortNumber> {
        self.ports
            .iter()
            .find(|p| p.medium == medium && p.is_free())
            .map(|p| p.number)
    }

    /// Whether the device has any port of the given medium.
    pub fn supports(&self, medium: PortMedium) -> bool {
        self.ports.iter().any(|p| p.medium == medium)
    }

    pub fn set_overloaded(&mut self, overloaded: bool) {
        if overloaded {
            self.status = DeviceStatus::Error;
            self.status_level = 3;
        } else {
            self.status = DeviceStatus::Active;
            self.status_level = 0;
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.name, self.id)
    }
}
