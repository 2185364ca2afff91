//! Dispatcher errors.

use gpon_types::{DeviceId, PacketId};
use thiserror::Error;

/// Conditions that abort a single device's dispatch.
///
/// The scheduler logs these and treats the device as producing no output
/// for the tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("{0} is not part of the current topology graph")]
    NotInGraph(DeviceId),

    #[error("{packet} has an empty path")]
    EmptyPath { packet: PacketId },
}
