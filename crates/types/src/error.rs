//! Topology mutation errors.

use crate::{DeviceId, DeviceKind, LinkId, PortNumber};
use thiserror::Error;

/// Errors raised by [`Network`](crate::Network) mutations.
///
/// Every variant leaves the network unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("unknown device {0}")]
    UnknownDevice(DeviceId),

    #[error("unknown link {0}")]
    UnknownLink(LinkId),

    #[error("device {0} cannot link to itself")]
    SelfLink(DeviceId),

    #[error("{a} and {b} are already linked")]
    AlreadyLinked { a: DeviceId, b: DeviceId },

    #[error("no compatible interface between {a} and {b}")]
    IncompatiblePorts { a: DeviceId, b: DeviceId },

    #[error("no free port on {device} for this link")]
    NoFreePort { device: DeviceId },

    #[error("port {port} on {device} does not exist or is in use")]
    PortUnavailable { device: DeviceId, port: PortNumber },

    #[error("{device} is a {actual}, expected {expected}")]
    WrongKind {
        device: DeviceId,
        expected: &'static str,
        actual: DeviceKind,
    },

    #[error("ONU ID space exhausted")]
    OnuIdsExhausted,
}
