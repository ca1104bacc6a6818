//! Per-hand position and drift tracking.
//!
//! Drift ("slow") is the number of forward pulses the hand needs to show
//! true time. It is positive when the hand lags, negative when it leads,
//! and zero when synchronized. Hands can only move forward, so a hand
//! slightly ahead is left to coast until true time catches up, rather
//! than driven almost a full revolution.

use crate::face_time::{FaceTime, MINUTES_PER_DIAL};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tower_common::error::ClockError;
use tower_common::hand::HandId;
use tower_relay::RelayPort;
use tracing::{trace, warn};

/// Default coast window in minutes.
pub const DEFAULT_CUTOFF: i32 = 30;

/// Default settle time between pulses of a batch.
pub const DEFAULT_PULSE_INTERVAL: Duration = Duration::from_millis(500);

/// Outcome of a [`HandState::compare`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftReport {
    /// Hand that was compared.
    pub hand: HandId,
    /// Drift stored on the hand.
    pub drift: i32,
    /// Raw difference before normalization.
    pub raw_difference: i32,
    /// Number of full-dial adjustments needed to bring the raw difference
    /// within one revolution. Non-zero means the stored position was stale
    /// by more than twelve hours.
    pub wrap_adjustments: u32,
}

impl DriftReport {
    /// The anomaly to report, if normalization was needed.
    #[must_use]
    pub fn anomaly(&self) -> Option<ClockError> {
        (self.wrap_adjustments > 0).then(|| ClockError::DriftWraparoundAnomaly {
            hand: self.hand,
            difference: self.raw_difference,
            adjustments: self.wrap_adjustments,
        })
    }
}

/// Position and drift of one hand set.
#[derive(Debug, Clone)]
pub struct HandState {
    id: HandId,
    face_minutes: i32,
    drift_minutes: i32,
    cutoff: i32,
    pulse_interval: Duration,
}

impl HandState {
    /// Create a hand at a remembered dial position with default cutoff and interval.
    #[must_use]
    pub fn new(id: HandId, face_minutes: i32) -> Self {
        Self {
            id,
            face_minutes,
            drift_minutes: 0,
            cutoff: DEFAULT_CUTOFF,
            pulse_interval: DEFAULT_PULSE_INTERVAL,
        }
    }

    /// Set the coast window.
    #[must_use]
    pub fn with_cutoff(mut self, cutoff: i32) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Set the settle time between pulses of a batch.
    #[must_use]
    pub fn with_pulse_interval(mut self, interval: Duration) -> Self {
        self.pulse_interval = interval;
        self
    }

    /// Hand identifier.
    #[must_use]
    pub fn id(&self) -> HandId {
        self.id
    }

    /// Remembered dial position, in minutes.
    #[must_use]
    pub fn face_minutes(&self) -> i32 {
        self.face_minutes
    }

    /// Remembered dial position reduced onto the dial.
    #[must_use]
    pub fn face_time(&self) -> FaceTime {
        FaceTime::from_minutes(i64::from(self.face_minutes))
    }

    /// Current drift: positive slow, negative fast.
    #[must_use]
    pub fn drift_minutes(&self) -> i32 {
        self.drift_minutes
    }

    /// Coast window in minutes.
    #[must_use]
    pub fn cutoff(&self) -> i32 {
        self.cutoff
    }

    /// Settle time between pulses of a batch.
    #[must_use]
    pub fn pulse_interval(&self) -> Duration {
        self.pulse_interval
    }

    /// Overwrite the remembered position (after the dial was set by hand).
    pub fn set_face_minutes(&mut self, face_minutes: i32) {
        self.face_minutes = face_minutes;
    }

    /// Overwrite the drift directly.
    pub fn set_drift_minutes(&mut self, drift: i32) {
        self.drift_minutes = drift;
    }

    /// Recompute drift against the true dial position `current_face_minutes`.
    ///
    /// The difference is normalized into `(-720, 720)`, made non-negative,
    /// and then, if it lies within `cutoff` of a full revolution, turned
    /// into a small negative value so the hand coasts instead of being
    /// driven most of the way round. The remembered position is reduced
    /// onto the dial afterwards.
    pub fn compare(&mut self, current_face_minutes: i32) -> DriftReport {
        let raw_difference = current_face_minutes - self.face_minutes;
        let mut difference = raw_difference;
        let mut wrap_adjustments = 0;

        while difference >= MINUTES_PER_DIAL {
            difference -= MINUTES_PER_DIAL;
            wrap_adjustments += 1;
            warn!(hand = %self.id, raw_difference, difference, "Hand position more than 12 hours from true time");
        }
        while difference <= -MINUTES_PER_DIAL {
            difference += MINUTES_PER_DIAL;
            wrap_adjustments += 1;
            warn!(hand = %self.id, raw_difference, difference, "Hand position more than 12 hours from true time");
        }

        if difference < 0 {
            difference += MINUTES_PER_DIAL;
        }

        if (MINUTES_PER_DIAL - self.cutoff..MINUTES_PER_DIAL).contains(&difference) {
            difference -= MINUTES_PER_DIAL;
        }

        if difference % MINUTES_PER_DIAL == 0 {
            difference = 0;
        }

        self.drift_minutes = difference;
        self.face_minutes = self.face_minutes.rem_euclid(MINUTES_PER_DIAL);
        trace!(hand = %self.id, face = self.face_minutes, current_face_minutes, drift = difference, "Compared");

        DriftReport {
            hand: self.id,
            drift: difference,
            raw_difference,
            wrap_adjustments,
        }
    }

    /// Issue up to `count` pulses through `relay`.
    ///
    /// Each successful pulse moves the hand one minute forward and reduces
    /// drift by one. Pulses within a batch are separated by the pulse
    /// interval. The first relay failure stops the batch; the failed pulse
    /// leaves position and drift untouched. Clearing `running` stops the
    /// batch before the next pulse.
    ///
    /// Returns the number of pulses that completed.
    ///
    /// # Errors
    ///
    /// Returns the number of pulses completed before the failure together
    /// with the relay's error. Those completed pulses are already applied.
    pub fn pulse<R: RelayPort + ?Sized>(
        &mut self,
        relay: &mut R,
        count: u32,
        running: &AtomicBool,
    ) -> Result<u32, (u32, ClockError)> {
        for issued in 0..count {
            if issued > 0 {
                thread::sleep(self.pulse_interval);
            }
            if !running.load(Ordering::Acquire) {
                trace!(hand = %self.id, issued, count, "Batch stopped");
                return Ok(issued);
            }
            if let Err(e) = relay.pulse() {
                return Err((issued, e));
            }
            self.drift_minutes -= 1;
            self.face_minutes = (self.face_minutes + 1).rem_euclid(MINUTES_PER_DIAL);
            trace!(hand = %self.id, face = self.face_minutes, drift = self.drift_minutes, "Pulsed");
        }
        Ok(count)
    }
}
