use crate::hand::HandId;
use thiserror::Error;

/// Clock error types covering time conversion, relay faults and scheduler anomalies.
///
/// None of these are fatal to the process: the tick loop logs them and tries
/// again on the next minute boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClockError {
    /// A time value could not be converted to a face position.
    #[error("invalid time input: {0}")]
    InvalidTimeInput(String),

    /// A relay did not complete its pulse.
    #[error("pulse failure on {relay}: {reason}")]
    PulseFailure {
        /// Name of the relay that failed.
        relay: String,
        /// Underlying cause.
        reason: String,
    },

    /// A scheduling pass ran past its iteration bound and was abandoned.
    #[error(
        "pulse schedule exceeded: {iterations} iterations (limit: {limit}), \
         remaining pulses ({remaining_one}, {remaining_two})"
    )]
    PulseScheduleExceeded {
        /// Iterations executed when the pass was abandoned.
        iterations: u64,
        /// Bound derived from the starting budget.
        limit: u64,
        /// Pulses still owed to hand one.
        remaining_one: u32,
        /// Pulses still owed to hand two.
        remaining_two: u32,
    },

    /// The stored hand position was more than twelve hours away from true time.
    #[error("drift wraparound anomaly on hand {hand}: raw difference {difference} needed {adjustments} adjustment(s)")]
    DriftWraparoundAnomaly {
        /// Hand whose comparison was normalized.
        hand: HandId,
        /// Raw difference before normalization.
        difference: i32,
        /// Number of 720-minute adjustments applied.
        adjustments: u32,
    },

    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O operation error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl ClockError {
    /// Build a [`ClockError::PulseFailure`] for the named relay.
    pub fn pulse_failure(relay: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::PulseFailure {
            relay: relay.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if the error only needs reporting and the state it
    /// accompanies is still valid.
    #[must_use]
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            Self::DriftWraparoundAnomaly { .. } | Self::PulseScheduleExceeded { .. }
        )
    }
}

impl From<crate::config::ConfigError> for ClockError {
    fn from(e: crate::config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

/// Convenience type alias for clock operations.
pub type ClockResult<T> = Result<T, ClockError>;
