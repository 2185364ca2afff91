//! Dispatch outcomes.

use gpon_types::{DeviceId, OnuId, Packet};
use std::fmt;

/// Why packets were dropped at a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Legitimate downstream traffic blocked at the DDoS congestion node.
    Congestion { node: DeviceId, count: usize },
    /// Secondary OLT rejected an ONU ID missing from its allow-list.
    UnknownOnu { onu: Option<OnuId> },
    /// Listen-only tap refused to send upstream.
    ListenOnly,
}

impl DropReason {
    /// Silent drops are traced but not reported in the user log.
    pub fn is_silent(&self) -> bool {
        match self {
            DropReason::Congestion { .. } => false,
            DropReason::UnknownOnu { .. } | DropReason::ListenOnly => true,
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Congestion { count, .. } => {
                write!(f, "downstream dropped due to DDOS ({count} packets)")
            }
            DropReason::UnknownOnu { onu: Some(onu) } => write!(f, "unknown {onu}"),
            DropReason::UnknownOnu { onu: None } => f.write_str("unstamped upstream packet"),
            DropReason::ListenOnly => f.write_str("listen-only device"),
        }
    }
}

/// What a device did with its inbox.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchResult {
    /// Copies leaving the device, positioned at the device, headed to the next hop.
    pub outbound: Vec<Packet>,
    /// Packets that reached a terminal device.
    pub delivered: Vec<Packet>,
    /// Whether any packet was dropped.
    pub dropped: bool,
    /// Reason for the most recent drop.
    pub reason: Option<DropReason>,
    /// Number of packets dropped.
    pub dropped_count: usize,
    /// Packets ignored (position mismatch or not addressed to this ONU).
    pub ignored: usize,
}

impl DispatchResult {
    pub(crate) fn drop_packets(&mut self, reason: DropReason, count: usize) {
        self.dropped = true;
        self.dropped_count += count;
        self.reason = Some(reason);
    }

    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty() && self.delivered.is_empty() && !self.dropped
    }
}
