//! GPON Simulator CLI
//!
//! Run deterministic GPON traffic simulations with scheduled attacks.
//!
//! # Example
//!
//! ```bash
//! # Tree demo, DDoS on the splitter after 10 simulated seconds
//! gpon-sim --demo tree -d 120 --attack ddos:Splitter-1 --attack-at 10
//!
//! # Scenario file, overriding its seed and pacing against the wall clock
//! gpon-sim --scenario scenarios/spoof.toml --seed 7 --realtime
//! ```

use anyhow::Context;
use clap::Parser;
use gpon_simulator::{DemoTopology, ScenarioConfig, ScheduledAttack, Simulator};
use gpon_types::AttackKind;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// GPON Simulator
///
/// Runs deterministic traffic and attack simulations. Single-threaded,
/// reproducible when the same seed is used.
#[derive(Parser, Debug)]
#[command(name = "gpon-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Scenario file (TOML). Other flags override its values.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Saved network document (JSON) to load
    #[arg(short = 't', long, conflicts_with = "demo")]
    topology: Option<PathBuf>,

    /// Built-in topology: tree or multi-olt
    #[arg(long)]
    demo: Option<DemoTopology>,

    /// Simulation duration in seconds
    #[arg(short = 'd', long)]
    duration: Option<f64>,

    /// Speed multiplier
    #[arg(long)]
    speed: Option<f64>,

    /// Random seed for reproducible results
    #[arg(long)]
    seed: Option<u64>,

    /// Attack to run, as KIND or KIND:TARGET-NAME (repeatable)
    #[arg(long = "attack", value_parser = parse_attack)]
    attacks: Vec<AttackArg>,

    /// Start time in seconds for each --attack, in order (default 0)
    #[arg(long = "attack-at")]
    attack_at: Vec<f64>,

    /// Write the final network to this JSON file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Pace the run against the wall clock
    #[arg(long)]
    realtime: bool,

    /// Log entries to print with the report
    #[arg(long, default_value = "10")]
    logs: usize,
}

#[derive(Debug, Clone)]
struct AttackArg {
    kind: AttackKind,
    target: Option<String>,
}

fn parse_attack(s: &str) -> Result<AttackArg, String> {
    let (kind, target) = match s.split_once(':') {
        Some((kind, target)) => (kind, Some(target.to_string())),
        None => (s, None),
    };
    let kind = kind.parse::<AttackKind>().map_err(|e| e.to_string())?;
    Ok(AttackArg {
        kind,
        target: target.filter(|t| !t.is_empty()),
    })
}

fn scenario_from(args: &Args) -> anyhow::Result<ScenarioConfig> {
    let mut scenario = match &args.scenario {
        Some(path) => ScenarioConfig::load(path)
            .with_context(|| format!("loading scenario {}", path.display()))?,
        None => ScenarioConfig::default(),
    };

    if let Some(path) = &args.topology {
        scenario = scenario.with_topology(path.clone());
    }
    if let Some(demo) = args.demo {
        scenario = scenario.with_demo(demo);
    }
    if let Some(secs) = args.duration {
        scenario.duration_secs = secs;
    }
    if let Some(speed) = args.speed {
        scenario = scenario.with_speed(speed);
    }
    if let Some(seed) = args.seed {
        scenario = scenario.with_seed(seed);
    }
    if args.realtime {
        scenario = scenario.with_realtime(true);
    }
    for (i, attack) in args.attacks.iter().enumerate() {
        let at = args.attack_at.get(i).copied().unwrap_or(0.0);
        scenario =
            scenario.with_attack(ScheduledAttack::new(attack.kind, attack.target.clone()).at(at));
    }

    scenario.validate()?;
    Ok(scenario)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,gpon_simulator=info")),
        )
        .init();

    let args = Args::parse();
    let scenario = scenario_from(&args)?;

    info!(
        scenario = %scenario.name,
        duration_secs = scenario.duration_secs,
        speed = scenario.speed,
        seed = scenario.seed(),
        attacks = scenario.attacks.len(),
        realtime = scenario.realtime,
        "Starting simulation"
    );

    let mut simulator = Simulator::new(scenario)
        .context("failed to create simulator")?
        .with_log_tail(args.logs);
    simulator.initialize()?;

    let report = simulator.run().await?;
    report.print_summary();

    if let Some(path) = &args.export {
        simulator
            .export(path)
            .with_context(|| format!("exporting to {}", path.display()))?;
    }
    Ok(())
}
