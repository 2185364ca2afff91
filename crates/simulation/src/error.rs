//! Errors returned by runner entry points.

use gpon_attacks::AttackError;
use gpon_types::{DocumentError, LogLevel, TopologyError};
use thiserror::Error;

/// A rejected command. The runner logs it and leaves state unchanged.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("speed must be a positive finite number, got {0}")]
    InvalidSpeed(f64),

    #[error("network has no primary OLT")]
    NoPrimaryOlt,

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Attack(#[from] AttackError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl SimulationError {
    /// Log level used when the rejection is reported.
    ///
    /// Resource problems (missing OLT, attack already running) are warnings;
    /// malformed requests are errors.
    pub fn level(&self) -> LogLevel {
        match self {
            SimulationError::InvalidSpeed(_) | SimulationError::NoPrimaryOlt => LogLevel::Warning,
            SimulationError::Attack(error) if error.is_resource() => LogLevel::Warning,
            SimulationError::Attack(_)
            | SimulationError::Topology(_)
            | SimulationError::Document(_) => LogLevel::Error,
        }
    }
}
