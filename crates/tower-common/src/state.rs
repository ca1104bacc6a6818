//! State machine for a single scheduling pass.
//!
//! State transitions follow the pass lifecycle:
//! IDLE → BUDGET_DERIVED → DISPATCHING → IDLE | FAILED
//!
//! A FAILED pass is not terminal: the next tick derives a fresh budget
//! from recomputed drift.

use crate::error::{ClockError, ClockResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// States of the pulse scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    /// Waiting for the next tick.
    #[default]
    Idle,
    /// Pulse budget computed from current drift.
    BudgetDerived,
    /// Pulses are being issued to the relays.
    Dispatching,
    /// The pass hit its iteration bound and was abandoned.
    Failed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::BudgetDerived => write!(f, "BUDGET_DERIVED"),
            Self::Dispatching => write!(f, "DISPATCHING"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl SyncState {
    /// Check if a transition to `target` is valid from the current state.
    #[must_use]
    pub fn can_transition_to(&self, target: SyncState) -> bool {
        use SyncState::{BudgetDerived, Dispatching, Failed, Idle};

        matches!(
            (self, target),
            (Idle, BudgetDerived)
                | (BudgetDerived, Dispatching)
                // Nothing owed: the pass ends without dispatching
                | (BudgetDerived, Idle)
                | (Dispatching, Idle)
                | (Dispatching, Failed)
                // Next tick retries with a fresh budget
                | (Failed, BudgetDerived)
                | (Failed, Idle)
        )
    }

    /// Returns true while a pass is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::BudgetDerived | Self::Dispatching)
    }
}

/// State machine wrapper with transition history tracking.
#[derive(Debug, Clone, Default)]
pub struct SyncStateMachine {
    current: SyncState,
    previous: Option<SyncState>,
    transition_count: u64,
}

impl SyncStateMachine {
    /// Create a new state machine starting in IDLE.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.current
    }

    /// Get the previous state (if any transition occurred).
    #[must_use]
    pub fn previous_state(&self) -> Option<SyncState> {
        self.previous
    }

    /// Get total number of transitions.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt a state transition.
    pub fn transition(&mut self, target: SyncState) -> ClockResult<()> {
        if self.current.can_transition_to(target) {
            self.previous = Some(self.current);
            self.current = target;
            self.transition_count += 1;
            Ok(())
        } else {
            Err(ClockError::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            })
        }
    }

    /// Force the machine into FAILED (only from DISPATCHING).
    pub fn enter_failed(&mut self) {
        if self.current.can_transition_to(SyncState::Failed) {
            self.previous = Some(self.current);
            self.current = SyncState::Failed;
            self.transition_count += 1;
        }
    }
}
