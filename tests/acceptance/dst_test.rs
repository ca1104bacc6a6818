//! Daylight-saving transitions.
//!
//! Sydney springs forward at 02:00 AEST on the first Sunday of October and
//! falls back at 03:00 AEDT on the first Sunday of April. The dial follows
//! local time, so the hands have to jump with it.

use super::common::{sim_tower, sim_tower_at, sydney, SimOptions};
use chrono::Duration;
use tower_core::face_time::to_face_minutes;

#[test]
fn test_spring_forward_pulses_sixty_one() {
    let before = sydney(2023, 10, 1, 1, 59);
    let after = before + Duration::minutes(1);
    let mut sim = sim_tower_at([119, 119]);

    let report = sim.tower.on_tick(&before).unwrap();
    assert_eq!(report.pass.total_pulses(), 0);

    let report = sim.tower.on_tick(&after).unwrap();
    assert_eq!(report.face_time.minutes(), 180);
    assert_eq!(report.pass.pulses, [61, 61]);
    assert_eq!(report.pass.iterations, 61);
    assert_eq!(sim.pulses(), [61, 61]);
    assert_eq!(sim.tower.positions(), [180, 180]);
}

#[test]
fn test_fall_back_face_delta() {
    let before = sydney(2023, 4, 2, 2, 59);
    let after = before + Duration::minutes(1);
    assert_eq!(
        to_face_minutes(&before).minutes() - to_face_minutes(&after).minutes(),
        59
    );
}

#[test]
fn test_fall_back_with_default_cutoff_goes_round() {
    // 59 minutes fast is outside a 30 minute coast window, so the hands
    // are driven forward the long way.
    let before = sydney(2023, 4, 2, 2, 59);
    let after = before + Duration::minutes(1);
    let mut sim = sim_tower_at([179, 179]);

    let report = sim.tower.on_tick(&after).unwrap();
    assert_eq!(report.drift[0].drift, 661);
    assert_eq!(sim.pulses(), [661, 661]);
    assert_eq!(sim.tower.positions(), [120, 120]);
}

#[test]
fn test_fall_back_with_wide_cutoff_coasts() {
    let before = sydney(2023, 4, 2, 2, 59);
    let mut sim = sim_tower(SimOptions {
        positions: Some([179, 179]),
        cutoff: 60,
        ..SimOptions::default()
    });

    // The repeated hour: hands wait until true time catches up.
    for minute in 1..=59 {
        let report = sim.tower.on_tick(&(before + Duration::minutes(minute))).unwrap();
        assert_eq!(report.pass.total_pulses(), 0, "minute {minute}");
        assert_eq!(report.drift[0].drift, minute as i32 - 60);
    }

    // 02:59 AEST shows 179 again; one minute later they move once.
    let report = sim.tower.on_tick(&(before + Duration::minutes(61))).unwrap();
    assert_eq!(report.pass.pulses, [1, 1]);
    assert_eq!(sim.tower.positions(), [180, 180]);
}
