//! Core types for the GPON simulator.
//!
//! Devices, ports, links and packets, the [`Network`] store that owns them,
//! and the read-only views the rest of the simulator works from:
//!
//! - [`TopologyGraph`]: adjacency over devices and active links
//! - [`Hierarchy`]: downstream/upstream orientation relative to the primary OLT
//! - [`shortest_path`]: deterministic breadth-first paths

mod attack;
mod device;
mod document;
mod error;
mod identifiers;
mod link;
mod log;
mod network;
mod packet;
mod pathfinder;
mod topology;

pub use attack::{AttackKind, UnknownAttack};
pub use device::{
    splitter_outputs, Device, DeviceKind, DeviceRole, DeviceStatus, GponConfig, Port, PortMedium,
    PortStatus, Position, DEFAULT_SPLITTER_RATIO, DEFAULT_WAVELENGTH_DOWN, DEFAULT_WAVELENGTH_UP,
};
pub use document::{
    DeviceRecord, DocumentError, NetworkDocument, RestoredNetwork, DOCUMENT_VERSION,
};
pub use error::TopologyError;
pub use identifiers::{
    DeviceId, InvalidShortCode, LinkId, OnuId, PacketId, PacketIdAllocator, PortNumber, ShortCode,
};
pub use link::{Link, LinkEndpoint, LinkSnapshot, LinkStatus};
pub use log::{EventLog, LogEntry, LogLevel, LogRecord, DEFAULT_LOG_CAPACITY};
pub use network::{generate_serial, Network, Registration, MAX_ONU_ID};
pub use packet::{Direction, Packet, PacketKind, PayloadKind};
pub use pathfinder::{normalize_path, shortest_path};
pub use topology::{Hierarchy, TopologyGraph};
