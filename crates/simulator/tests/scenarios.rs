//! Scenario runs through the simulator driver.

use gpon_simulation::SimulationConfig;
use gpon_simulator::{DemoTopology, ScenarioConfig, ScenarioError, ScheduledAttack, Simulator};
use gpon_test_helpers::TreeFixture;
use gpon_types::{AttackKind, DeviceStatus};
use std::time::Duration;
use tracing_test::traced_test;

/// Tree demo with a short settle and a long upstream dwell, so both
/// directions carry traffic early in the run.
fn tree_scenario() -> ScenarioConfig {
    let simulation = SimulationConfig::default().with_flow_timing(
        2,
        Duration::from_secs(1),
        Duration::from_secs(120),
    );
    ScenarioConfig::default()
        .with_demo(DemoTopology::Tree)
        .with_seed(42)
        .with_duration(Duration::from_secs(60))
        .with_simulation(simulation)
}

fn started(scenario: ScenarioConfig) -> Simulator {
    let mut simulator = Simulator::new(scenario).unwrap();
    simulator.initialize().unwrap();
    simulator
}

#[traced_test]
#[test]
fn test_tree_demo_delivers_both_directions() {
    let mut simulator = started(tree_scenario());
    let report = simulator.run_for(Duration::from_secs(90));

    assert_eq!(report.simulated_duration, Duration::from_secs(90));
    assert_eq!(report.seed, 42);
    assert!(report.downstream.count > 0);
    assert!(report.upstream.count > 0);
    assert!(report.downstream.p50 > Duration::ZERO);
    assert!(report.downstream.max >= report.downstream.p50);
    assert_eq!(report.stats.dropped_congestion, 0);
    assert!(report.active_attacks.is_empty());
    assert_eq!(report.critical, 0);
}

#[traced_test]
#[test]
fn test_multi_olt_demo_forwards_through_secondary() {
    let scenario = tree_scenario().with_demo(DemoTopology::MultiOlt);
    let mut simulator = started(scenario);
    let report = simulator.run_for(Duration::from_secs(90));

    assert!(report.upstream.count > 0);
    assert_eq!(report.stats.dropped_unknown_onu, 0);
}

#[traced_test]
#[test]
fn test_scheduled_ddos_overloads_then_recovers() {
    let ddos = ScheduledAttack::new(AttackKind::Ddos, Some("Splitter-1".to_string()))
        .at(5.0)
        .until(50.0);
    let mut simulator = started(tree_scenario().with_attack(ddos));

    let during = simulator.run_for(Duration::from_secs(40));
    assert_eq!(during.active_attacks.len(), 1);
    assert!(during.active_attacks[0].starts_with("DDOS"));
    assert!(during.stats.dropped_congestion > 0);
    assert!(during.critical >= 1);

    let after = simulator.run_for(Duration::from_secs(20));
    assert!(after.active_attacks.is_empty());
    assert_eq!(after.rejected_commands, 0);
    let runner = simulator.runner();
    let olt = runner.network().device_by_name("OLT-1").unwrap();
    assert_eq!(olt.status, DeviceStatus::Active);
    assert!(runner.packets().all(|p| p.owner != Some(AttackKind::Ddos)));
}

#[traced_test]
#[test]
fn test_unknown_target_name_is_rejected_up_front() {
    let attack = ScheduledAttack::new(AttackKind::Eavesdrop, Some("Splitter-9".to_string()));
    let result = Simulator::new(tree_scenario().with_attack(attack));
    assert!(matches!(result, Err(ScenarioError::UnknownDevice(name)) if name == "Splitter-9"));
}

#[traced_test]
#[test]
fn test_refused_attack_is_counted_not_fatal() {
    let attack = ScheduledAttack::new(AttackKind::OntSpoof, None).at(1.0);
    let mut simulator = started(tree_scenario().with_attack(attack));
    let report = simulator.run_for(Duration::from_secs(10));

    assert_eq!(report.rejected_commands, 1);
    assert!(report.active_attacks.is_empty());
    assert!(report.errors + report.warnings >= 1);
}

#[traced_test]
#[test]
fn test_same_seed_same_report() {
    let scenario = tree_scenario()
        .with_attack(ScheduledAttack::new(AttackKind::RogueOnu, None).at(3.0))
        .with_attack(
            ScheduledAttack::new(AttackKind::Eavesdrop, Some("Splitter-1".to_string())).at(6.0),
        );
    let first = started(scenario.clone()).run_for(Duration::from_secs(45));
    let second = started(scenario).run_for(Duration::from_secs(45));

    assert_eq!(first.stats, second.stats);
    assert_eq!(first.downstream, second.downstream);
    assert_eq!(first.upstream, second.upstream);
    assert_eq!(first.attack_deliveries, second.attack_deliveries);
    assert_eq!(first.active_attacks, second.active_attacks);
    assert_eq!(first.log_tail, second.log_tail);
}

#[traced_test]
#[test]
fn test_export_then_load_topology() {
    let fixture = TreeFixture::full_tree();
    let mut simulator = Simulator::with_network(tree_scenario(), fixture.network.clone()).unwrap();
    simulator.initialize().unwrap();
    simulator.run_for(Duration::from_secs(5));

    let path = std::env::temp_dir().join(format!("gpon-sim-export-{}.json", std::process::id()));
    simulator.export(&path).unwrap();

    let loaded = Simulator::new(tree_scenario().with_topology(path.clone())).unwrap();
    let _ = std::fs::remove_file(&path);

    let network = loaded.runner().network();
    assert_eq!(network.device_count(), fixture.network.device_count());
    assert_eq!(network.link_count(), fixture.network.link_count());
    assert!(network.device_by_name("PC-1").is_some());
    assert!(loaded.runner().log().len() > 1);
}

#[traced_test]
#[test]
fn test_missing_topology_file_is_read_error() {
    let scenario = tree_scenario().with_topology("/nonexistent/gpon/network.json");
    assert!(matches!(
        Simulator::new(scenario),
        Err(ScenarioError::Read { .. })
    ));
}

#[traced_test]
#[tokio::test]
async fn test_realtime_run_tracks_wall_clock() {
    let mut simulator = started(tree_scenario());
    let report = simulator.run_realtime(Duration::from_millis(300)).await;

    assert_eq!(report.simulated_duration, Duration::from_millis(300));
    assert!(report.wall_duration >= Duration::from_millis(250));
}

#[traced_test]
#[tokio::test]
async fn test_run_uses_scenario_duration() {
    let scenario = tree_scenario().with_duration(Duration::from_secs(12));
    let mut simulator = started(scenario);
    let report = simulator.run().await.unwrap();
    assert_eq!(report.simulated_duration, Duration::from_secs(12));
}

#[traced_test]
#[test]
fn test_bundled_scenarios_load_and_resolve() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../scenarios");

    let ddos = ScenarioConfig::load(&dir.join("ddos.toml")).unwrap();
    assert_eq!(ddos.seed(), 7);
    assert_eq!(ddos.attacks.len(), 1);
    assert_eq!(ddos.attacks[0].kind, AttackKind::Ddos);
    assert_eq!(ddos.attacks[0].stop_secs, Some(90.0));

    let spoof = ScenarioConfig::load(&dir.join("spoof.toml")).unwrap();
    assert_eq!(spoof.seed(), gpon_simulator::DEFAULT_SEED);
    assert_eq!(spoof.simulation.upstream_dwell, Duration::from_secs(60));
    assert_eq!(spoof.attacks[1].kind, AttackKind::OntSpoof);

    for scenario in [ddos, spoof] {
        assert!(Simulator::new(scenario).is_ok());
    }
}
