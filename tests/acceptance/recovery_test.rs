//! Relay failure handling and restart recovery.
//!
//! A failed pulse must never be counted: the hand keeps its drift and is
//! caught up on a later tick once the relay works again.

use super::common::{sim_tower, sim_tower_at, sydney, SimOptions};
use chrono::Duration;
use tower_common::error::ClockError;
use tower_common::hand::HandId;
use tower_common::state::SyncState;
use tower_core::hand_log::HandLog;

#[test]
fn test_broken_relay_caught_up_after_repair() {
    let start = sydney(2023, 6, 1, 9, 0);
    let mut sim = sim_tower_at([540, 540]);
    sim.relays[0].set_broken(true);

    for minute in 1..=3 {
        let report = sim.tower.on_tick(&(start + Duration::minutes(minute))).unwrap();
        assert_eq!(report.pass.relay_failures.len(), 1);
        assert!(matches!(
            report.pass.relay_failures[0],
            (HandId::One, ClockError::PulseFailure { .. })
        ));
        // Hand two is unaffected
        assert_eq!(report.pass.pulses[1], 1);
        assert_eq!(sim.tower.scheduler().state(), SyncState::Idle);
    }
    assert_eq!(sim.tower.positions(), [540, 543]);
    assert_eq!(sim.tower.hand(HandId::One).drift_minutes(), 3);

    sim.relays[0].set_broken(false);
    let report = sim.tower.on_tick(&(start + Duration::minutes(4))).unwrap();
    assert_eq!(report.pass.pulses, [4, 1]);
    assert!(report.pass.relay_failures.is_empty());
    assert_eq!(sim.tower.positions(), [544, 544]);
    assert_eq!(sim.pulses(), [4, 4]);
}

#[test]
fn test_intermittent_failure_mid_paired_run() {
    let now = sydney(2023, 6, 1, 9, 10);
    let mut sim = sim_tower_at([540, 540]);
    sim.relays[1].fail_next(1);

    // First paired pulse for hand two fails; hand one finishes alone.
    let report = sim.tower.on_tick(&now).unwrap();
    assert_eq!(report.pass.pulses, [10, 0]);
    assert_eq!(sim.relays[1].failures(), 1);

    let report = sim.tower.on_tick(&(now + Duration::minutes(1))).unwrap();
    assert_eq!(report.pass.pulses, [1, 11]);
    assert_eq!(sim.tower.positions(), [551, 551]);
}

#[test]
fn test_restart_resumes_from_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = HandLog::new(dir.path().join("hands.jsonl"));
    let start = sydney(2023, 6, 1, 9, 0);

    {
        let mut sim = sim_tower(SimOptions {
            positions: Some([530, 530]),
            log: Some(log.clone()),
            ..SimOptions::default()
        });
        sim.tower.on_tick(&start).unwrap();
        assert_eq!(sim.tower.positions(), [540, 540]);
    }

    // Power returns five minutes later; no positions given, so the log seeds them.
    let mut sim = sim_tower(SimOptions {
        log: Some(log.clone()),
        ..SimOptions::default()
    });
    assert_eq!(sim.tower.positions(), [540, 540]);

    let report = sim.tower.on_tick(&(start + Duration::minutes(5))).unwrap();
    assert_eq!(report.pass.pulses, [5, 5]);
    assert_eq!(log.last_record().unwrap().unwrap().positions(), [545, 545]);
}

#[test]
fn test_stale_log_reports_anomaly_and_recovers() {
    let now = sydney(2023, 6, 1, 9, 0);
    // A position far outside the dial, as left by a corrupted record
    let mut sim = sim_tower_at([540 + 1440, 540]);

    let report = sim.tower.on_tick(&now).unwrap();
    assert_eq!(report.anomalies.len(), 1);
    assert!(matches!(
        report.anomalies[0],
        ClockError::DriftWraparoundAnomaly {
            hand: HandId::One,
            difference: -1440,
            adjustments: 2
        }
    ));
    assert_eq!(report.pass.total_pulses(), 0);
    assert_eq!(sim.tower.hand(HandId::One).drift_minutes(), 0);
    assert_eq!(sim.tower.positions(), [540, 540]);

    // The reduced position sticks; later ticks are clean
    let report = sim.tower.on_tick(&(now + Duration::minutes(1))).unwrap();
    assert!(report.anomalies.is_empty());
    assert_eq!(report.pass.pulses, [1, 1]);
}

#[test]
fn test_stale_position_logged_reduced() {
    let dir = tempfile::tempdir().unwrap();
    let log = HandLog::new(dir.path().join("hands.jsonl"));
    let now = sydney(2023, 6, 1, 9, 0);
    // Hand one coasts ten minutes fast from a stale record
    let mut sim = sim_tower(SimOptions {
        positions: Some([550 + 1440, 540]),
        log: Some(log.clone()),
        ..SimOptions::default()
    });

    let report = sim.tower.on_tick(&now).unwrap();
    assert_eq!(report.anomalies.len(), 1);
    assert_eq!(report.drift[0].drift, -10);
    assert_eq!(log.last_record().unwrap().unwrap().positions(), [550, 540]);

    let report = sim.tower.on_tick(&(now + Duration::minutes(1))).unwrap();
    assert!(report.anomalies.is_empty());
    assert_eq!(report.pass.pulses, [0, 1]);
}

#[test]
fn test_lamp_stays_off_without_schedule() {
    let mut sim = sim_tower_at([0, 0]);
    // Default schedule never reports night
    sim.tower.on_tick(&sydney(2023, 6, 1, 0, 0)).unwrap();
    assert!(!sim.lamp.is_lit());
    assert_eq!(sim.lamp.switches(), 0);
}
