//! Same seed, same run.
//!
//! Jitter, attack randomness and packet ids all come from the runner's
//! seeded RNG and allocators, so two runners fed the same commands must
//! agree on every packet and log line.

use gpon_simulation::{SimulationConfig, SimulationRunner};
use gpon_test_helpers::TreeFixture;
use gpon_types::{AttackKind, LogLevel, Packet};
use std::time::Duration;
use tracing_test::traced_test;

fn scripted_run(seed: u64) -> SimulationRunner {
    let fixture = TreeFixture::full_tree();
    let mut runner = SimulationRunner::new(SimulationConfig::default(), fixture.network, seed);
    runner.start().unwrap();
    runner
        .start_attack(AttackKind::Eavesdrop, Some(fixture.splitter))
        .unwrap();
    runner.start_attack(AttackKind::RogueOnu, None).unwrap();
    runner.run_for(Duration::from_secs(90));
    runner
}

fn log_lines(runner: &SimulationRunner) -> Vec<(Duration, LogLevel, String)> {
    runner
        .logs()
        .map(|e| (e.timestamp, e.level, e.message.clone()))
        .collect()
}

fn live_packets(runner: &SimulationRunner) -> Vec<Packet> {
    runner.packets().cloned().collect()
}

#[traced_test]
#[test]
fn test_same_seed_same_run() {
    let first = scripted_run(12345);
    let second = scripted_run(12345);

    assert_eq!(first.stats(), second.stats());
    assert_eq!(live_packets(&first), live_packets(&second));
    assert_eq!(log_lines(&first), log_lines(&second));
    assert_eq!(first.now(), second.now());
    assert_eq!(first.tick(), second.tick());
}

#[traced_test]
#[test]
fn test_determinism_survives_stop_and_restart() {
    let run = || {
        let mut runner = scripted_run(7);
        runner.stop();
        runner.run_for(Duration::from_secs(5));
        runner.start().unwrap();
        runner.run_for(Duration::from_secs(30));
        runner
    };
    let first = run();
    let second = run();

    assert_eq!(first.stats(), second.stats());
    assert_eq!(live_packets(&first), live_packets(&second));
    assert_eq!(log_lines(&first), log_lines(&second));
}

#[traced_test]
#[test]
fn test_run_produces_traffic() {
    let runner = scripted_run(99);
    let stats = runner.stats();
    assert!(stats.ticks >= 89);
    assert!(stats.packets_generated > 0);
    assert!(stats.attack_packets > 0);
    assert!(stats.packets_delivered > 0);
    assert!(stats.events_processed > stats.ticks);
}
