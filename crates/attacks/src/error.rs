//! Attack start/stop errors.

use gpon_types::{AttackKind, DeviceId, TopologyError};
use thiserror::Error;

/// Why an attack could not start. The network is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttackError {
    #[error("{0} attack is already active")]
    AlreadyActive(AttackKind),

    #[error("{0} attack requires a victim device")]
    MissingTarget(AttackKind),

    #[error("target {0} does not exist")]
    UnknownTarget(DeviceId),

    #[error("{device} is not a valid {kind} target: {reason}")]
    InvalidTarget {
        kind: AttackKind,
        device: DeviceId,
        reason: &'static str,
    },

    #[error("network has no primary OLT")]
    NoPrimaryOlt,

    #[error("network has no legitimate ONU/ONT")]
    NoOnus,

    #[error("{0} is not connected to the primary OLT")]
    Unreachable(DeviceId),

    #[error("no attachment point with a free optical port")]
    NoAttachmentPoint,

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

impl AttackError {
    /// Resource errors (missing devices, already active) as opposed to
    /// protocol errors (bad target, incompatible wiring).
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            AttackError::AlreadyActive(_)
                | AttackError::NoPrimaryOlt
                | AttackError::NoOnus
                | AttackError::NoAttachmentPoint
        )
    }
}
