//! Network-wide flow phase and congestion marker.

use gpon_types::{DeviceId, Direction};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical flow phase of the running simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlowPhase {
    #[default]
    Uninitialized,
    Downstream,
    Upstream,
}

impl FlowPhase {
    pub fn direction(self) -> Option<Direction> {
        match self {
            FlowPhase::Uninitialized => None,
            FlowPhase::Downstream => Some(Direction::Downstream),
            FlowPhase::Upstream => Some(Direction::Upstream),
        }
    }
}

impl fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction() {
            Some(direction) => write!(f, "{direction}"),
            None => f.write_str("UNINITIALIZED"),
        }
    }
}

/// Congestion marker consulted by splitters.
///
/// `node` is set only while a flood has overloaded the OLT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CongestionState {
    pub node: Option<DeviceId>,
}

impl CongestionState {
    pub fn at(node: DeviceId) -> Self {
        Self { node: Some(node) }
    }

    pub fn is_congested(&self, device: DeviceId) -> bool {
        self.node == Some(device)
    }
}
