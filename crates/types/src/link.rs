//! Links between device ports.

use crate::{DeviceId, LinkId, PortMedium, PortNumber};
use serde::{Deserialize, Serialize};

/// Link state. Inactive links are invisible to the topology graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    #[default]
    Active,
    Inactive,
}

/// One side of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkEndpoint {
    pub device: DeviceId,
    pub port: PortNumber,
}

/// A connection between two device ports.
///
/// The endpoints are unordered for reachability purposes; `a`/`b` only
/// record which side initiated the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub a: LinkEndpoint,
    pub b: LinkEndpoint,
    pub medium: PortMedium,
    #[serde(default)]
    pub status: LinkStatus,
}

impl Link {
    pub fn is_active(&self) -> bool {
        self.status == LinkStatus::Active
    }

    /// Whether the link touches `device`.
    pub fn touches(&self, device: DeviceId) -> bool {
        self.a.device == device || self.b.device == device
    }

    /// The endpoint opposite `device`, if the link touches it.
    pub fn other(&self, device: DeviceId) -> Option<LinkEndpoint> {
        if self.a.device == device {
            Some(self.b)
        } else if self.b.device == device {
            Some(self.a)
        } else {
            None
        }
    }

    /// Whether the link joins `x` and `y` in either orientation.
    pub fn joins(&self, x: DeviceId, y: DeviceId) -> bool {
        (self.a.device == x && self.b.device == y) || (self.a.device == y && self.b.device == x)
    }
}

/// Everything needed to recreate a link with the same endpoints and ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub a: LinkEndpoint,
    pub b: LinkEndpoint,
    pub medium: PortMedium,
}

impl From<&Link> for LinkSnapshot {
    fn from(link: &Link) -> Self {
        Self {
            a: link.a,
            b: link.b,
            medium: link.medium,
        }
    }
}
