//! Scenario driver over the deterministic runner.

use crate::{MetricsCollector, ScenarioConfig, ScenarioError, SimulationReport};
use gpon_simulation::SimulationRunner;
use gpon_types::{AttackKind, DeviceId, Network};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Wall-clock frame used by [`Simulator::run_realtime`].
pub const REALTIME_FRAME: Duration = Duration::from_millis(50);

/// Log entries included in the report by default.
pub const DEFAULT_LOG_TAIL: usize = 10;

#[derive(Debug, Clone, Copy)]
enum Command {
    Start(AttackKind, Option<DeviceId>),
    Stop(AttackKind),
}

/// Runs a scenario: builds the network, applies the attack schedule at its
/// simulated times and collects delivery metrics.
pub struct Simulator {
    scenario: ScenarioConfig,
    runner: SimulationRunner,
    metrics: MetricsCollector,
    /// Attack commands by simulated time, in schedule order.
    schedule: Vec<(Duration, Command)>,
    next_command: usize,
    wall_time: Duration,
    log_tail: usize,
}

impl Simulator {
    /// Build the scenario's network (document or demo) and a stopped runner.
    pub fn new(scenario: ScenarioConfig) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let seed = scenario.seed();
        let runner = match &scenario.topology {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|source| ScenarioError::Read {
                    path: path.clone(),
                    source,
                })?;
                let mut runner =
                    SimulationRunner::new(scenario.simulation_config(), Network::new(), seed);
                runner.load_document(&json)?;
                runner
            }
            None => {
                let network = scenario.demo.build(seed)?;
                SimulationRunner::new(scenario.simulation_config(), network, seed)
            }
        };
        Self::with_runner(scenario, runner)
    }

    /// Use a prepared network instead of the scenario's topology.
    pub fn with_network(scenario: ScenarioConfig, network: Network) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let runner = SimulationRunner::new(scenario.simulation_config(), network, scenario.seed());
        Self::with_runner(scenario, runner)
    }

    fn with_runner(scenario: ScenarioConfig, runner: SimulationRunner) -> Result<Self, ScenarioError> {
        let mut schedule = Vec::new();
        for attack in &scenario.attacks {
            let target = match &attack.target {
                Some(name) => Some(
                    runner
                        .network()
                        .device_by_name(name)
                        .map(|d| d.id)
                        .ok_or_else(|| ScenarioError::UnknownDevice(name.clone()))?,
                ),
                None => None,
            };
            schedule.push((
                Duration::from_secs_f64(attack.at_secs),
                Command::Start(attack.kind, target),
            ));
            if let Some(stop) = attack.stop_secs {
                schedule.push((Duration::from_secs_f64(stop), Command::Stop(attack.kind)));
            }
        }
        schedule.sort_by_key(|(at, _)| *at);

        info!(
            scenario = %scenario.name,
            seed = scenario.seed(),
            devices = runner.network().device_count(),
            links = runner.network().link_count(),
            scheduled = schedule.len(),
            "Simulator ready"
        );

        Ok(Self {
            metrics: MetricsCollector::new()?,
            scenario,
            runner,
            schedule,
            next_command: 0,
            wall_time: Duration::ZERO,
            log_tail: DEFAULT_LOG_TAIL,
        })
    }

    /// Entries of the log tail to include in reports.
    pub fn with_log_tail(mut self, entries: usize) -> Self {
        self.log_tail = entries;
        self
    }

    /// Start traffic.
    pub fn initialize(&mut self) -> Result<(), ScenarioError> {
        self.runner.start()?;
        Ok(())
    }

    /// Run the scenario for its configured duration, paced or not.
    pub async fn run(&mut self) -> Result<SimulationReport, ScenarioError> {
        let duration = self.scenario.duration()?;
        if self.scenario.realtime {
            Ok(self.run_realtime(duration).await)
        } else {
            Ok(self.run_for(duration))
        }
    }

    /// Advance simulated time as fast as possible.
    pub fn run_for(&mut self, duration: Duration) -> SimulationReport {
        let started = Instant::now();
        let end = self.runner.now().saturating_add(duration);
        self.advance_to(end);
        self.wall_time += started.elapsed();
        self.report()
    }

    /// Advance simulated time in step with the wall clock.
    pub async fn run_realtime(&mut self, duration: Duration) -> SimulationReport {
        let started = Instant::now();
        let origin = self.runner.now();
        let end = origin.saturating_add(duration);

        let mut frame = tokio::time::interval(REALTIME_FRAME);
        frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
        while self.runner.now() < end {
            frame.tick().await;
            let target = origin.saturating_add(started.elapsed()).min(end);
            self.advance_to(target);
        }

        self.wall_time += started.elapsed();
        self.report()
    }

    fn advance_to(&mut self, end: Duration) {
        while let Some(&(at, command)) = self.schedule.get(self.next_command) {
            if at > end {
                break;
            }
            self.next_command += 1;
            self.runner.run_until(at);
            self.collect();
            self.apply(command);
        }
        self.runner.run_until(end);
        self.collect();
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Start(kind, target) => match self.runner.start_attack(kind, target) {
                Ok(()) => info!(attack = %kind, time = ?self.runner.now(), "Scheduled attack started"),
                Err(error) => {
                    warn!(attack = %kind, %error, "Scheduled attack rejected");
                    self.metrics.record_rejection();
                }
            },
            Command::Stop(kind) => {
                self.runner.stop_attack(kind);
                info!(attack = %kind, time = ?self.runner.now(), "Scheduled attack stopped");
            }
        }
    }

    fn collect(&mut self) {
        let deliveries = self.runner.take_deliveries();
        debug!(count = deliveries.len(), "Collected deliveries");
        self.metrics.record_all(&deliveries);
    }

    /// Report over everything run so far.
    pub fn report(&self) -> SimulationReport {
        let mut report = SimulationReport {
            scenario: self.scenario.name.clone(),
            seed: self.scenario.seed(),
            simulated_duration: self.runner.now(),
            wall_duration: self.wall_time,
            stats: self.runner.stats().clone(),
            downstream: self.metrics.downstream(),
            upstream: self.metrics.upstream(),
            attack_deliveries: self.metrics.attack_deliveries().clone(),
            active_attacks: self.runner.attacks().describe(self.runner.network()),
            rejected_commands: self.metrics.rejected_commands(),
            warnings: 0,
            errors: 0,
            critical: 0,
            log_tail: self.runner.log().tail(self.log_tail),
        };
        report.tally_levels(self.runner.logs());
        report
    }

    /// Write the current network and log tail as a JSON document.
    pub fn export(&self, path: &Path) -> Result<(), ScenarioError> {
        let json = self.runner.export_document().to_json()?;
        std::fs::write(path, json).map_err(|source| ScenarioError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Network exported");
        Ok(())
    }

    pub fn scenario(&self) -> &ScenarioConfig {
        &self.scenario
    }

    pub fn runner(&self) -> &SimulationRunner {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut SimulationRunner {
        &mut self.runner
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }
}
