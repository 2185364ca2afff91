//! Actions returned by state machines for the runner to perform.

use crate::TimerId;
use gpon_types::{AttackKind, LogRecord, Packet};
use std::time::Duration;

/// Side effect requested by a state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Put a packet in flight from its current device toward its next hop.
    EmitPacket { packet: Packet },

    /// Arm (or re-arm) a timer.
    SetTimer { id: TimerId, duration: Duration },

    /// Cancel a timer. Cancelling an unarmed timer is a no-op.
    CancelTimer { id: TimerId },

    /// Cancel every timer an attack owns.
    CancelAttackTimers { kind: AttackKind },

    /// Drop every queued, in-flight and live packet an attack owns.
    PurgePackets { owner: AttackKind },

    /// Append to the user-visible log.
    Log(LogRecord),
}

impl Action {
    pub fn log(record: LogRecord) -> Self {
        Action::Log(record)
    }

    pub fn set_timer(id: TimerId, duration: Duration) -> Self {
        Action::SetTimer { id, duration }
    }
}
