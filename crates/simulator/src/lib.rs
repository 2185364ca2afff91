//! GPON Simulator
//!
//! A scenario-driven driver built on top of `gpon-simulation`. Loads a
//! network (saved document or a built-in demo), schedules attacks at fixed
//! simulated times and reports what the traffic went through.
//!
//! # Architecture
//!
//! - **Scenarios**: TOML files naming topology, duration, speed, seed and
//!   an attack schedule ([`ScenarioConfig`])
//! - **Demo topologies**: a single-OLT tree and a two-OLT cascade
//! - **Metrics**: delivery latency percentiles per direction, attack
//!   deliveries, log severity counts
//! - **Pacing**: run flat out, or in step with the wall clock
//!
//! # Example
//!
//! ```ignore
//! use gpon_simulator::{DemoTopology, ScenarioConfig, ScheduledAttack, Simulator};
//! use gpon_types::AttackKind;
//! use std::time::Duration;
//!
//! let scenario = ScenarioConfig::default()
//!     .with_demo(DemoTopology::Tree)
//!     .with_seed(42)
//!     .with_attack(ScheduledAttack::new(AttackKind::Ddos, Some("Splitter-1".into())).at(10.0));
//!
//! let mut simulator = Simulator::new(scenario)?;
//! simulator.initialize()?;
//! let report = simulator.run_for(Duration::from_secs(60));
//! report.print_summary();
//! ```

pub mod config;
pub mod demo;
pub mod error;
pub mod metrics;
pub mod runner;

pub use config::{ScenarioConfig, ScheduledAttack, DEFAULT_SEED};
pub use demo::DemoTopology;
pub use error::ScenarioError;
pub use metrics::{LatencySummary, MetricsCollector, SimulationReport};
pub use runner::{Simulator, DEFAULT_LOG_TAIL, REALTIME_FRAME};
