//! Scenario files.
//!
//! A scenario is a TOML file naming the topology, the run length and an
//! attack schedule:
//!
//! ```toml
//! name = "ddos under load"
//! demo = "tree"
//! duration_secs = 120.0
//! speed = 1.0
//! seed = 7
//!
//! [[attack]]
//! kind = "DDOS"
//! target = "Splitter-1"
//! at_secs = 30.0
//! stop_secs = 90.0
//! ```
//!
//! `topology` points at a saved network document and wins over `demo`.
//! Relative paths resolve against the scenario file's directory.

use crate::{DemoTopology, ScenarioError};
use gpon_simulation::{SimulationConfig, SimulationError};
use gpon_types::AttackKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Seed used when neither the scenario nor the command line picks one.
pub const DEFAULT_SEED: u64 = 12345;

/// One attack in the schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledAttack {
    pub kind: AttackKind,
    /// Device name, for attacks that need a target.
    #[serde(default)]
    pub target: Option<String>,
    /// Simulated seconds after start.
    #[serde(default)]
    pub at_secs: f64,
    /// Stop time. Runs to the end when absent.
    #[serde(default)]
    pub stop_secs: Option<f64>,
}

impl ScheduledAttack {
    pub fn new(kind: AttackKind, target: Option<String>) -> Self {
        Self {
            kind,
            target,
            at_secs: 0.0,
            stop_secs: None,
        }
    }

    pub fn at(mut self, secs: f64) -> Self {
        self.at_secs = secs;
        self
    }

    pub fn until(mut self, secs: f64) -> Self {
        self.stop_secs = Some(secs);
        self
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        let valid = |secs: f64| secs.is_finite() && secs >= 0.0;
        let bad = [Some(self.at_secs), self.stop_secs]
            .into_iter()
            .flatten()
            .find(|&secs| !valid(secs))
            .or(self.stop_secs.filter(|&stop| stop <= self.at_secs));
        match bad {
            Some(at) => Err(ScenarioError::InvalidSchedule {
                kind: self.kind.to_string(),
                at,
            }),
            None => Ok(()),
        }
    }
}

/// A complete run description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub name: String,
    /// Saved network document to load.
    pub topology: Option<PathBuf>,
    /// Built-in topology used when no document is given.
    pub demo: DemoTopology,
    pub duration_secs: f64,
    pub speed: f64,
    pub seed: Option<u64>,
    /// Pace the run against the wall clock.
    pub realtime: bool,
    /// Simulation tuning. `speed` above overrides `simulation.speed`.
    pub simulation: SimulationConfig,
    #[serde(rename = "attack")]
    pub attacks: Vec<ScheduledAttack>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name: "unnamed".to_string(),
            topology: None,
            demo: DemoTopology::default(),
            duration_secs: 60.0,
            speed: 1.0,
            seed: None,
            realtime: false,
            simulation: SimulationConfig::default(),
            attacks: Vec::new(),
        }
    }
}

impl ScenarioConfig {
    /// Parse a scenario from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ScenarioError> {
        let scenario: ScenarioConfig = toml::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Read a scenario file. A relative `topology` path is resolved against
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut scenario = Self::from_toml(&text)?;
        if let (Some(topology), Some(dir)) = (&scenario.topology, path.parent()) {
            if topology.is_relative() {
                scenario.topology = Some(dir.join(topology));
            }
        }
        Ok(scenario)
    }

    pub fn with_topology(mut self, path: impl Into<PathBuf>) -> Self {
        self.topology = Some(path.into());
        self
    }

    pub fn with_demo(mut self, demo: DemoTopology) -> Self {
        self.demo = demo;
        self.topology = None;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_secs = duration.as_secs_f64();
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn with_simulation(mut self, simulation: SimulationConfig) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn with_attack(mut self, attack: ScheduledAttack) -> Self {
        self.attacks.push(attack);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or(DEFAULT_SEED)
    }

    pub fn duration(&self) -> Result<Duration, ScenarioError> {
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(ScenarioError::InvalidDuration(self.duration_secs));
        }
        Ok(Duration::from_secs_f64(self.duration_secs))
    }

    /// Simulation config with the scenario speed applied.
    pub fn simulation_config(&self) -> SimulationConfig {
        self.simulation.clone().with_speed(self.speed)
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.duration()?;
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(SimulationError::InvalidSpeed(self.speed).into());
        }
        self.attacks.iter().try_for_each(ScheduledAttack::validate)
    }
}
