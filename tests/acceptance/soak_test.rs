//! Long-running tick loop tests.
//!
//! Drives a simulated tower through whole days of minute ticks, polling
//! several times per minute the way the daemon does, with relay failures
//! injected along the way. Every pulse must be accounted for and the
//! hands must finish on the face time.

use super::common::{sim_tower, sydney, SimOptions, SimTower};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tower_core::face_time::to_face_minutes;
use tower_core::hand_log::HandLog;

/// Sub-second offsets polled within each minute; only the first is on the minute.
const POLL_OFFSETS_MS: [i64; 4] = [0, 250, 500, 30_000];

/// Soak test configuration.
struct SoakConfig {
    /// First instant; the hands start on its face time.
    start: DateTime<Tz>,
    /// Minute ticks after the first.
    minutes: i64,
    /// Inject a single relay failure every this many minutes (0 = never).
    failure_every: i64,
    /// Record positions to this log.
    log: Option<HandLog>,
}

impl Default for SoakConfig {
    fn default() -> Self {
        Self {
            start: sydney(2023, 6, 1, 0, 0),
            minutes: 24 * 60,
            failure_every: 0,
            log: None,
        }
    }
}

/// Totals gathered over a soak run.
#[derive(Debug, Default)]
struct SoakResult {
    ticks: u64,
    polls: u64,
    pulses: [u64; 2],
    relay_failures: u64,
    injected: u64,
    /// Largest drift left on either hand after a pass.
    max_residual_drift: i32,
    end: Option<DateTime<Utc>>,
}

fn run_soak(config: SoakConfig) -> (SimTower, SoakResult) {
    let start_face = to_face_minutes(&config.start).minutes();
    let mut sim = sim_tower(SimOptions {
        positions: Some([start_face, start_face]),
        log: config.log,
        ..SimOptions::default()
    });
    let mut result = SoakResult::default();
    let start = config.start.with_timezone(&Utc);

    for minute in 0..=config.minutes {
        let instant = start + Duration::minutes(minute);

        // Never inject on the last tick so the run can finish in sync.
        if config.failure_every > 0
            && minute % config.failure_every == config.failure_every / 2
            && minute < config.minutes
        {
            sim.relays[(minute % 2) as usize].fail_next(1);
            result.injected += 1;
        }

        for offset in POLL_OFFSETS_MS {
            result.polls += 1;
            let report = sim
                .tower
                .poll(instant + Duration::milliseconds(offset))
                .unwrap();
            let Some(report) = report else {
                continue;
            };
            assert_eq!(offset, 0, "ticked off the minute at {instant}");

            result.ticks += 1;
            result.relay_failures += report.pass.relay_failures.len() as u64;
            for (i, pulses) in report.pass.pulses.iter().enumerate() {
                result.pulses[i] += u64::from(*pulses);
            }
            for hand in [0, 1] {
                let residual = (report.face_time.minutes() - sim.tower.positions()[hand])
                    .rem_euclid(720);
                result.max_residual_drift = result.max_residual_drift.max(residual);
            }
        }
        result.end = Some(instant);
    }

    (sim, result)
}

#[test]
fn test_soak_one_day() {
    let (sim, result) = run_soak(SoakConfig::default());

    assert_eq!(result.ticks, 24 * 60 + 1);
    assert_eq!(result.polls, result.ticks * POLL_OFFSETS_MS.len() as u64);
    assert_eq!(result.pulses, [1440, 1440]);
    assert_eq!(sim.pulses(), [1440, 1440]);
    assert_eq!(result.relay_failures, 0);
    assert_eq!(result.max_residual_drift, 0);
    assert_eq!(sim.tower.positions(), [0, 0]);
}

#[test]
fn test_soak_one_day_with_relay_failures() {
    let (sim, result) = run_soak(SoakConfig {
        failure_every: 97,
        ..SoakConfig::default()
    });

    assert!(result.injected > 10);
    assert_eq!(result.relay_failures, result.injected);
    assert_eq!(sim.relays[0].failures() + sim.relays[1].failures(), result.injected);
    // A failed pulse is retried on the next tick, never lost or doubled.
    assert_eq!(result.pulses, [1440, 1440]);
    assert_eq!(result.max_residual_drift, 1);
    assert_eq!(sim.tower.positions(), [0, 0]);
}

#[test]
fn test_soak_across_spring_forward() {
    let start = sydney(2023, 9, 30, 12, 0);
    let minutes = 2 * 24 * 60;
    let (sim, result) = run_soak(SoakConfig {
        start,
        minutes,
        ..SoakConfig::default()
    });

    // Every tick moves one minute except the jump, which moves sixty-one.
    let expected = minutes as u64 + 60;
    assert_eq!(result.pulses, [expected, expected]);

    let end = result.end.unwrap();
    let face = to_face_minutes(&end.with_timezone(&start.timezone())).minutes();
    assert_eq!(sim.tower.positions(), [face, face]);
}

#[test]
fn test_soak_hand_log_tracks_every_move() {
    let dir = tempfile::tempdir().unwrap();
    let log = HandLog::new(dir.path().join("soak.jsonl"));

    let (sim, result) = run_soak(SoakConfig {
        minutes: 6 * 60,
        failure_every: 45,
        log: Some(log.clone()),
        ..SoakConfig::default()
    });

    assert_eq!(result.pulses, [360, 360]);
    let last = log.last_record().unwrap().unwrap();
    assert_eq!(last.positions(), sim.tower.positions());
    assert_eq!(last.positions(), [360, 360]);

    // The first tick changes nothing; every later one moves at least one hand.
    let contents = std::fs::read_to_string(log.path()).unwrap();
    assert_eq!(contents.lines().count(), 6 * 60);
}

/// A full week, for pre-release runs.
#[test]
#[ignore = "Soak test - a simulated week of ticks"]
fn test_soak_week() {
    let (sim, result) = run_soak(SoakConfig {
        minutes: 7 * 24 * 60,
        failure_every: 61,
        ..SoakConfig::default()
    });

    assert_eq!(result.pulses, [7 * 1440, 7 * 1440]);
    assert_eq!(result.relay_failures, result.injected);
    assert_eq!(sim.tower.positions(), [0, 0]);
}
