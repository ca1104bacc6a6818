//! Pulse scheduler for the two hand sets.
//!
//! One scheduling pass walks the state machine
//! `IDLE → BUDGET_DERIVED → DISPATCHING → (IDLE | FAILED)`:
//!
//! 1. Derive a [`PulseBudget`] from the drift of both hands.
//! 2. Bound the pass at `(one + 1) * (two + 1)` iterations.
//! 3. While anything is owed: pulse both hands together when both are
//!    behind, otherwise batch the remaining pulses of the single lagging
//!    hand. Wait the pass interval, then re-derive the budget from the
//!    hands themselves.
//!
//! The budget is never counted down independently. A relay failure leaves
//! the hand's drift where it was, the hand is parked for the rest of the
//! pass, and the next pass picks up from its real state. The running flag
//! is checked before every pulse, batches included.

use crate::hand::HandState;
use crate::pulses::PulseBudget;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tower_common::config::TowerConfig;
use tower_common::error::{ClockError, ClockResult};
use tower_common::hand::HandId;
use tower_common::state::{SyncState, SyncStateMachine};
use tower_relay::RelayPort;
use tracing::{debug, error, info, warn};

/// Outcome of one scheduling pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// Budget derived at the start of the pass.
    pub budget: PulseBudget,
    /// Successful pulses per hand, indexed by [`HandId::index`].
    pub pulses: [u32; 2],
    /// Loop iterations executed.
    pub iterations: u64,
    /// Iteration bound in force for this pass.
    pub limit: u64,
    /// Relay failures, in the order they happened.
    pub relay_failures: Vec<(HandId, ClockError)>,
    /// The running flag was cleared before the budget reached zero.
    pub cancelled: bool,
}

impl PassReport {
    /// Total successful pulses across both hands.
    #[must_use]
    pub fn total_pulses(&self) -> u32 {
        self.pulses[0] + self.pulses[1]
    }

    /// Returns true if at least one pulse was issued.
    #[must_use]
    pub fn settled_any(&self) -> bool {
        self.total_pulses() > 0
    }
}

/// Drives the relays of both hands until their drift is worked off.
#[derive(Debug)]
pub struct SyncScheduler {
    /// Pass state machine.
    state: SyncStateMachine,
    /// Wait after each loop body.
    pulse_interval: Duration,
    /// Optional lower ceiling on iterations per pass.
    iteration_cap: Option<u64>,
    /// Passes started.
    pass_count: u64,
}

impl SyncScheduler {
    /// Create a scheduler with the given wait between loop bodies.
    #[must_use]
    pub fn new(pulse_interval: Duration) -> Self {
        Self {
            state: SyncStateMachine::new(),
            pulse_interval,
            iteration_cap: None,
            pass_count: 0,
        }
    }

    /// Create a scheduler from the controller configuration.
    #[must_use]
    pub fn from_config(config: &TowerConfig) -> Self {
        Self::new(config.pulse_interval)
    }

    /// Current pass state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state.state()
    }

    /// Wait after each loop body.
    #[must_use]
    pub fn pulse_interval(&self) -> Duration {
        self.pulse_interval
    }

    /// Passes started since creation.
    #[must_use]
    pub fn pass_count(&self) -> u64 {
        self.pass_count
    }

    /// Iteration bound for a pass starting from `budget`.
    #[must_use]
    pub fn iteration_limit(&self, budget: PulseBudget) -> u64 {
        let bound = budget.iteration_limit();
        self.iteration_cap.map_or(bound, |cap| cap.min(bound))
    }

    /// Run one scheduling pass over both hands.
    ///
    /// `relays[i]` must drive `hands[i]`. The running flag is checked before
    /// every iteration; clearing it ends the pass early with
    /// [`PassReport::cancelled`] set and the machine back in IDLE.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::PulseScheduleExceeded`] if the iteration bound
    /// is passed; the machine is left in FAILED and the next pass starts
    /// from the hands' current drift. Returns
    /// [`ClockError::InvalidStateTransition`] if a pass is already running.
    pub fn run_pass(
        &mut self,
        hands: &mut [HandState; 2],
        relays: &mut [Box<dyn RelayPort>; 2],
        running: &AtomicBool,
    ) -> ClockResult<PassReport> {
        self.state.transition(SyncState::BudgetDerived)?;
        self.pass_count += 1;

        let mut parked = [false; 2];
        let budget = derive_budget(hands, parked);
        let limit = self.iteration_limit(budget);
        let mut report = PassReport {
            budget,
            limit,
            ..PassReport::default()
        };

        if budget.is_zero() {
            self.state.transition(SyncState::Idle)?;
            debug!(pass = self.pass_count, "Hands in sync, nothing to pulse");
            return Ok(report);
        }

        debug!(pass = self.pass_count, %budget, limit, "Budget derived");
        self.state.transition(SyncState::Dispatching)?;

        let mut remaining = budget;
        while !remaining.is_zero() {
            if !running.load(Ordering::Acquire) {
                warn!(pass = self.pass_count, %remaining, "Pass cancelled");
                report.cancelled = true;
                break;
            }

            if remaining.one() > 0 && remaining.two() > 0 {
                for hand in HandId::ALL {
                    dispatch(hands, relays, hand, 1, running, &mut parked, &mut report);
                }
            } else if remaining.two() == 0 {
                dispatch(hands, relays, HandId::One, remaining.one(), running, &mut parked, &mut report);
            } else {
                dispatch(hands, relays, HandId::Two, remaining.two(), running, &mut parked, &mut report);
            }

            if !running.load(Ordering::Acquire) {
                remaining = derive_budget(hands, parked);
                report.iterations += 1;
                if !remaining.is_zero() {
                    warn!(pass = self.pass_count, %remaining, "Pass cancelled");
                    report.cancelled = true;
                }
                break;
            }

            thread::sleep(self.pulse_interval);

            remaining = derive_budget(hands, parked);
            report.iterations += 1;
            if report.iterations > limit {
                self.state.enter_failed();
                error!(
                    pass = self.pass_count,
                    iterations = report.iterations,
                    limit,
                    %remaining,
                    "Pulse schedule exceeded, abandoning pass"
                );
                return Err(ClockError::PulseScheduleExceeded {
                    iterations: report.iterations,
                    limit,
                    remaining_one: remaining.one(),
                    remaining_two: remaining.two(),
                });
            }
        }

        self.state.transition(SyncState::Idle)?;

        if report.settled_any() {
            info!(
                pass = self.pass_count,
                one = report.pulses[0],
                two = report.pulses[1],
                iterations = report.iterations,
                failures = report.relay_failures.len(),
                "Pass complete"
            );
        } else {
            debug!(pass = self.pass_count, failures = report.relay_failures.len(), "Pass complete, no pulses");
        }

        Ok(report)
    }
}

impl Default for SyncScheduler {
    fn default() -> Self {
        Self::new(crate::hand::DEFAULT_PULSE_INTERVAL)
    }
}

/// Budget from the hands' drift, with parked hands owing nothing.
fn derive_budget(hands: &[HandState; 2], parked: [bool; 2]) -> PulseBudget {
    let owed = |hand: HandId| {
        if parked[hand.index()] {
            0
        } else {
            hands[hand.index()].drift_minutes()
        }
    };
    PulseBudget::from_drift(owed(HandId::One), owed(HandId::Two))
}

fn dispatch(
    hands: &mut [HandState; 2],
    relays: &mut [Box<dyn RelayPort>; 2],
    hand: HandId,
    count: u32,
    running: &AtomicBool,
    parked: &mut [bool; 2],
    report: &mut PassReport,
) {
    let i = hand.index();
    match hands[i].pulse(relays[i].as_mut(), count, running) {
        Ok(done) => report.pulses[i] += done,
        Err((done, e)) => {
            report.pulses[i] += done;
            parked[i] = true;
            warn!(
                %hand,
                relay = relays[i].name(),
                error = %e,
                drift = hands[i].drift_minutes(),
                "Relay failed, hand parked until next pass"
            );
            report.relay_failures.push((hand, e));
        }
    }
}

/// Builder for configuring the scheduler.
#[derive(Debug, Default)]
pub struct SyncSchedulerBuilder {
    pulse_interval: Option<Duration>,
    iteration_cap: Option<u64>,
}

impl SyncSchedulerBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wait after each loop body.
    #[must_use]
    pub fn pulse_interval(mut self, interval: Duration) -> Self {
        self.pulse_interval = Some(interval);
        self
    }

    /// Cap iterations per pass below the budget-derived bound.
    ///
    /// A large correction then spreads over several passes, each ending in
    /// FAILED once the cap is hit.
    #[must_use]
    pub fn iteration_cap(mut self, cap: u64) -> Self {
        self.iteration_cap = Some(cap);
        self
    }

    /// Build the scheduler.
    #[must_use]
    pub fn build(self) -> SyncScheduler {
        let mut scheduler = self
            .pulse_interval
            .map_or_else(SyncScheduler::default, SyncScheduler::new);
        scheduler.iteration_cap = self.iteration_cap;
        scheduler
    }
}
