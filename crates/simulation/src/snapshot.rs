//! Read-only view handed to renderers and reports.

use crate::SimulationStats;
use gpon_attacks::ActiveAttack;
use gpon_core::FlowPhase;
use gpon_types::{Device, Link, LogEntry, Packet};
use serde::Serialize;
use std::time::Duration;

/// Everything a collaborator needs to draw the current state.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSnapshot {
    pub time: Duration,
    pub running: bool,
    pub phase: FlowPhase,
    pub tick: u64,
    pub speed: f64,
    pub devices: Vec<Device>,
    pub links: Vec<Link>,
    /// Live packets, oldest first.
    pub packets: Vec<Packet>,
    pub attacks: Vec<ActiveAttack>,
    pub logs: Vec<LogEntry>,
    pub stats: SimulationStats,
}

impl SimulationSnapshot {
    pub fn device_by_name(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }
}
