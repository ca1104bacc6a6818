//! The tick controller.
//!
//! [`Tower`] owns both hands, their relays, the lamp and the hand log. An
//! external poller asks [`Tower::should_tick`] several times a second and
//! calls [`Tower::on_tick`] once per minute boundary:
//!
//! 1. convert the instant to a dial position
//! 2. compare both hands against it
//! 3. run one scheduling pass
//! 4. log the hand positions if anything moved
//! 5. switch the lamp from the day/night schedule
//!
//! Every failure is reported and left for the next tick.

use crate::daylight::{schedule_from_config, DayNight, NeverNight};
use crate::face_time::{is_on_minute, FaceTime};
use crate::hand::{DriftReport, HandState, DEFAULT_CUTOFF, DEFAULT_PULSE_INTERVAL};
use crate::hand_log::{seed_positions, HandLog, HandRecord};
use crate::scheduler::{PassReport, SyncScheduler};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower_common::config::TowerConfig;
use tower_common::error::{ClockError, ClockResult};
use tower_common::hand::HandId;
use tower_relay::{LampRelay, RelayPort};
use tracing::{debug, error, info, warn};

/// Outcome of one [`Tower::on_tick`].
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// True dial position for the tick.
    pub face_time: FaceTime,
    /// Comparison result per hand.
    pub drift: [DriftReport; 2],
    /// Wraparound anomalies raised while comparing.
    pub anomalies: Vec<ClockError>,
    /// The scheduling pass.
    pub pass: PassReport,
    /// Lamp state after the tick, if a lamp is attached.
    pub lamp_lit: Option<bool>,
}

/// Tower clock controller.
pub struct Tower {
    tz: Tz,
    hands: [HandState; 2],
    relays: [Box<dyn RelayPort>; 2],
    lamp: Option<Box<dyn LampRelay>>,
    day_night: Box<dyn DayNight>,
    scheduler: SyncScheduler,
    log: Option<HandLog>,
    running: Arc<AtomicBool>,
    last_minute: Option<i64>,
    face_time: Option<FaceTime>,
}

impl std::fmt::Debug for Tower {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tower")
            .field("tz", &self.tz)
            .field("hands", &self.hands)
            .field("relays", &[self.relays[0].name(), self.relays[1].name()])
            .field("scheduler", &self.scheduler)
            .field("log", &self.log)
            .field("last_minute", &self.last_minute)
            .finish_non_exhaustive()
    }
}

impl Tower {
    /// Timezone the dial shows.
    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// State of one hand.
    #[must_use]
    pub fn hand(&self, id: HandId) -> &HandState {
        &self.hands[id.index()]
    }

    /// Remembered positions of both hands.
    #[must_use]
    pub fn positions(&self) -> [i32; 2] {
        [self.hands[0].face_minutes(), self.hands[1].face_minutes()]
    }

    /// The scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    /// Flag that keeps scheduling passes running; clear it to stop.
    #[must_use]
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Dial position of the most recent tick.
    #[must_use]
    pub fn face_time(&self) -> Option<FaceTime> {
        self.face_time
    }

    /// Whether `instant` should trigger [`Tower::on_tick`]: it is in the
    /// first second of a minute that has not been processed yet.
    pub fn should_tick<Z: TimeZone>(&self, instant: &DateTime<Z>) -> bool {
        is_on_minute(instant) && self.last_minute != Some(minute_index(instant))
    }

    /// Bring both hands to `instant` and update the lamp.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::PulseScheduleExceeded`] if the pass was
    /// abandoned. Positions moved before that are still logged and the
    /// lamp is still updated.
    pub fn on_tick<Z: TimeZone>(&mut self, instant: &DateTime<Z>) -> ClockResult<TickReport> {
        self.last_minute = Some(minute_index(instant));
        let local = instant.with_timezone(&self.tz);
        let face_time = FaceTime::from_instant(&local);
        self.face_time = Some(face_time);

        let before = self.positions();
        let drift = [
            self.hands[0].compare(face_time.minutes()),
            self.hands[1].compare(face_time.minutes()),
        ];
        let anomalies: Vec<ClockError> = drift.iter().filter_map(DriftReport::anomaly).collect();
        for anomaly in &anomalies {
            error!(error = %anomaly, "Stored hand position was stale");
        }
        debug!(face = %face_time, one = drift[0].drift, two = drift[1].drift, "Tick");

        let pass = self
            .scheduler
            .run_pass(&mut self.hands, &mut self.relays, &self.running);

        if self.positions() != before {
            self.record_positions(&local);
        }
        let lamp_lit = self.update_lamp(instant.with_timezone(&Utc));

        Ok(TickReport {
            face_time,
            drift,
            anomalies,
            pass: pass?,
            lamp_lit,
        })
    }

    /// Convenience for the daemon: tick at the current time if due.
    ///
    /// # Errors
    ///
    /// See [`Tower::on_tick`].
    pub fn poll(&mut self, now: DateTime<Utc>) -> ClockResult<Option<TickReport>> {
        if self.should_tick(&now) {
            self.on_tick(&now).map(Some)
        } else {
            Ok(None)
        }
    }

    fn record_positions(&self, local: &DateTime<Tz>) {
        let Some(log) = &self.log else {
            return;
        };
        if let Err(e) = log.append(&HandRecord::new(local, self.positions())) {
            error!(error = %e, "Failed to log hand positions");
        }
    }

    fn update_lamp(&mut self, now: DateTime<Utc>) -> Option<bool> {
        let lamp = self.lamp.as_mut()?;
        let night = self.day_night.is_night(now);
        if lamp.is_lit() != night {
            match lamp.set_lit(night) {
                Ok(()) => info!("Lights {}", if night { "on" } else { "off" }),
                Err(e) => warn!(error = %e, night, "Failed to switch lamp"),
            }
        }
        Some(lamp.is_lit())
    }
}

fn minute_index<Z: TimeZone>(instant: &DateTime<Z>) -> i64 {
    instant.timestamp().div_euclid(60)
}

/// Builder for a [`Tower`].
pub struct TowerBuilder {
    tz: Tz,
    relays: [Box<dyn RelayPort>; 2],
    positions: Option<[i32; 2]>,
    cutoff: i32,
    hand_pulse_interval: Duration,
    scheduler: Option<SyncScheduler>,
    pass_interval: Duration,
    lamp: Option<Box<dyn LampRelay>>,
    day_night: Box<dyn DayNight>,
    log: Option<HandLog>,
    running: Option<Arc<AtomicBool>>,
}

impl TowerBuilder {
    /// Start a builder for hands driven by `relays` (hand one, then hand two).
    #[must_use]
    pub fn new(tz: Tz, relays: [Box<dyn RelayPort>; 2]) -> Self {
        Self {
            tz,
            relays,
            positions: None,
            cutoff: DEFAULT_CUTOFF,
            hand_pulse_interval: DEFAULT_PULSE_INTERVAL,
            scheduler: None,
            pass_interval: DEFAULT_PULSE_INTERVAL,
            lamp: None,
            day_night: Box::new(NeverNight),
            log: None,
            running: None,
        }
    }

    /// Start a builder from the controller configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Config`] for an unknown timezone or unparsable
    /// lamp times.
    pub fn from_config(config: &TowerConfig, relays: [Box<dyn RelayPort>; 2]) -> ClockResult<Self> {
        let tz = config.tz()?;
        let day_night = schedule_from_config(&config.lights, &config.position, tz)?;
        Ok(Self::new(tz, relays)
            .cutoff(config.hands.cutoff)
            .hand_pulse_interval(config.hands.pulse_interval)
            .pass_interval(config.pulse_interval)
            .day_night(day_night)
            .hand_log(HandLog::new(&config.log.hand_log)))
    }

    /// Starting positions; otherwise seeded from the hand log or the current time.
    #[must_use]
    pub fn positions(mut self, positions: [i32; 2]) -> Self {
        self.positions = Some(positions);
        self
    }

    /// Coast window for both hands.
    #[must_use]
    pub fn cutoff(mut self, cutoff: i32) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Wait between pulses within a batch.
    #[must_use]
    pub fn hand_pulse_interval(mut self, interval: Duration) -> Self {
        self.hand_pulse_interval = interval;
        self
    }

    /// Wait after each scheduler loop body.
    #[must_use]
    pub fn pass_interval(mut self, interval: Duration) -> Self {
        self.pass_interval = interval;
        self
    }

    /// Use a preconfigured scheduler; overrides [`TowerBuilder::pass_interval`].
    #[must_use]
    pub fn scheduler(mut self, scheduler: SyncScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Attach the lamp relay.
    #[must_use]
    pub fn lamp(mut self, lamp: Box<dyn LampRelay>) -> Self {
        self.lamp = Some(lamp);
        self
    }

    /// Day/night source for the lamp.
    #[must_use]
    pub fn day_night(mut self, day_night: Box<dyn DayNight>) -> Self {
        self.day_night = day_night;
        self
    }

    /// Persist positions to `log`.
    #[must_use]
    pub fn hand_log(mut self, log: HandLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Share an existing running flag.
    #[must_use]
    pub fn running(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    /// Build the tower.
    #[must_use]
    pub fn build(self) -> Tower {
        let positions = self.positions.unwrap_or_else(|| {
            let now = Utc::now().with_timezone(&self.tz);
            match &self.log {
                Some(log) => seed_positions(log, &now),
                None => [FaceTime::from_instant(&now).minutes(); 2],
            }
        });
        let hand = |id: HandId| {
            HandState::new(id, positions[id.index()])
                .with_cutoff(self.cutoff)
                .with_pulse_interval(self.hand_pulse_interval)
        };

        info!(
            tz = %self.tz,
            one = %hand(HandId::One).face_time(),
            two = %hand(HandId::Two).face_time(),
            cutoff = self.cutoff,
            "Tower ready"
        );

        Tower {
            tz: self.tz,
            hands: [hand(HandId::One), hand(HandId::Two)],
            relays: self.relays,
            lamp: self.lamp,
            day_night: self.day_night,
            scheduler: self
                .scheduler
                .unwrap_or_else(|| SyncScheduler::new(self.pass_interval)),
            log: self.log,
            running: self
                .running
                .unwrap_or_else(|| Arc::new(AtomicBool::new(true))),
            last_minute: None,
            face_time: None,
        }
    }
}

/// Clear `running`, stopping any pass at its next iteration.
pub fn request_stop(running: &AtomicBool) {
    running.store(false, Ordering::Release);
}
