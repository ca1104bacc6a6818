//! Simulated relays for testing.
//!
//! State lives behind an `Arc` so a test can keep a [`SimulatedHandle`]
//! after the relay itself has been boxed and moved into the controller.

use crate::{LampRelay, RelayPort};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tower_common::error::{ClockError, ClockResult};
use tracing::trace;

#[derive(Debug, Default)]
struct SimulatedState {
    pulses: AtomicU64,
    failures: AtomicU64,
    fail_next: AtomicU32,
    fail_always: AtomicBool,
}

/// Hand relay that counts pulses and can be told to fail.
#[derive(Debug)]
pub struct SimulatedRelay {
    name: String,
    state: Arc<SimulatedState>,
}

/// Observer and fault injector for a [`SimulatedRelay`].
#[derive(Debug, Clone)]
pub struct SimulatedHandle {
    state: Arc<SimulatedState>,
}

impl SimulatedRelay {
    /// Create a simulated relay.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(SimulatedState::default()),
        }
    }

    /// Get a handle that stays valid after the relay is moved.
    #[must_use]
    pub fn handle(&self) -> SimulatedHandle {
        SimulatedHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl SimulatedHandle {
    /// Successful pulses so far.
    #[must_use]
    pub fn pulses(&self) -> u64 {
        self.state.pulses.load(Ordering::Relaxed)
    }

    /// Failed pulse attempts so far.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.state.failures.load(Ordering::Relaxed)
    }

    /// Make the next `count` pulses fail.
    pub fn fail_next(&self, count: u32) {
        self.state.fail_next.store(count, Ordering::Relaxed);
    }

    /// Make every pulse fail until cleared.
    pub fn set_broken(&self, broken: bool) {
        self.state.fail_always.store(broken, Ordering::Relaxed);
    }
}

impl RelayPort for SimulatedRelay {
    fn pulse(&mut self) -> ClockResult<()> {
        let scheduled_failure = self
            .state
            .fail_next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();

        if scheduled_failure || self.state.fail_always.load(Ordering::Relaxed) {
            self.state.failures.fetch_add(1, Ordering::Relaxed);
            return Err(ClockError::pulse_failure(&self.name, "simulated relay fault"));
        }

        let total = self.state.pulses.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(relay = %self.name, total, "Simulated pulse");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Lamp relay that records its state and the number of switches.
#[derive(Debug, Default)]
pub struct SimulatedLamp {
    state: Arc<SimulatedLampState>,
}

#[derive(Debug, Default)]
struct SimulatedLampState {
    lit: AtomicBool,
    switches: AtomicU64,
}

/// Observer for a [`SimulatedLamp`].
#[derive(Debug, Clone)]
pub struct SimulatedLampHandle {
    state: Arc<SimulatedLampState>,
}

impl SimulatedLamp {
    /// Create a simulated lamp, initially off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a handle that stays valid after the lamp is moved.
    #[must_use]
    pub fn handle(&self) -> SimulatedLampHandle {
        SimulatedLampHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl SimulatedLampHandle {
    /// Current lamp state.
    #[must_use]
    pub fn is_lit(&self) -> bool {
        self.state.lit.load(Ordering::Relaxed)
    }

    /// Number of on/off changes.
    #[must_use]
    pub fn switches(&self) -> u64 {
        self.state.switches.load(Ordering::Relaxed)
    }
}

impl LampRelay for SimulatedLamp {
    fn set_lit(&mut self, lit: bool) -> ClockResult<()> {
        if self.state.lit.swap(lit, Ordering::Relaxed) != lit {
            self.state.switches.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn is_lit(&self) -> bool {
        self.state.lit.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_relay_counts() {
        let mut relay = SimulatedRelay::new("hand-one");
        let handle = relay.handle();

        relay.pulse().unwrap();
        relay.pulse().unwrap();
        assert_eq!(handle.pulses(), 2);
        assert_eq!(handle.failures(), 0);
    }

    #[test]
    fn test_fail_next() {
        let mut relay = SimulatedRelay::new("hand-one");
        let handle = relay.handle();
        handle.fail_next(2);

        assert!(relay.pulse().is_err());
        assert!(relay.pulse().is_err());
        assert!(relay.pulse().is_ok());
        assert_eq!(handle.pulses(), 1);
        assert_eq!(handle.failures(), 2);
    }

    #[test]
    fn test_broken_relay() {
        let mut relay = SimulatedRelay::new("hand-two");
        let handle = relay.handle();
        handle.set_broken(true);

        let err = relay.pulse().unwrap_err();
        assert!(matches!(err, ClockError::PulseFailure { .. }));

        handle.set_broken(false);
        assert!(relay.pulse().is_ok());
    }

    #[test]
    fn test_boxed_relay_still_observable() {
        let relay = SimulatedRelay::new("hand-one");
        let handle = relay.handle();
        let mut boxed: Box<dyn RelayPort> = Box::new(relay);

        boxed.pulse().unwrap();
        assert_eq!(handle.pulses(), 1);
        assert_eq!(boxed.name(), "hand-one");
    }

    #[test]
    fn test_simulated_lamp_switches() {
        let mut lamp = SimulatedLamp::new();
        let handle = lamp.handle();

        lamp.set_lit(true).unwrap();
        lamp.set_lit(true).unwrap();
        lamp.set_lit(false).unwrap();
        assert!(!handle.is_lit());
        assert_eq!(handle.switches(), 2);
    }
}
