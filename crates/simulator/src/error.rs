//! Scenario errors.

use gpon_simulation::SimulationError;
use gpon_types::{DocumentError, TopologyError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preparing or driving a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown demo topology '{0}' (expected tree or multi-olt)")]
    UnknownDemo(String),

    #[error("duration must be a positive finite number of seconds, got {0}")]
    InvalidDuration(f64),

    #[error("attack {kind} scheduled at invalid time {at}s")]
    InvalidSchedule { kind: String, at: f64 },

    #[error("no device named '{0}' in the topology")]
    UnknownDevice(String),

    #[error("histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),
}
