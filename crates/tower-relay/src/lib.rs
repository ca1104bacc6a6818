//! Relay abstractions for driving the clock hands and the tower lamp.
//!
//! This crate provides:
//! - [`RelayPort`] trait: one physical pulse that advances a hand one face-minute
//! - [`LampRelay`] trait: the on/off lamp relay
//! - [`gpio`] module with the Linux sysfs GPIO implementation
//! - [`logging`] module with no-op stand-ins that only log
//! - [`simulated`] module with in-memory relays for tests

pub mod gpio;
pub mod logging;
#[cfg(feature = "simulated")]
pub mod simulated;

pub use gpio::*;
pub use logging::*;
#[cfg(feature = "simulated")]
pub use simulated::*;

use tower_common::ClockResult;

/// Hand relay abstraction.
///
/// A call to [`pulse`](RelayPort::pulse) performs exactly one rest → energised
/// → rest transition of the implementation's fixed pulse width and does not
/// return until the pulse has completed. On error the relay must be left at
/// rest and the caller assumes the hand did not move.
pub trait RelayPort: Send {
    /// Issue one pulse.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::PulseFailure`](tower_common::ClockError::PulseFailure)
    /// if the pulse could not be completed.
    fn pulse(&mut self) -> ClockResult<()>;

    /// Name used in logs and errors.
    fn name(&self) -> &str;
}

impl<R: RelayPort + ?Sized> RelayPort for Box<R> {
    fn pulse(&mut self) -> ClockResult<()> {
        (**self).pulse()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Lamp relay abstraction.
pub trait LampRelay: Send {
    /// Switch the lamp on or off.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the relay could not be switched.
    fn set_lit(&mut self, lit: bool) -> ClockResult<()>;

    /// Last state successfully written.
    fn is_lit(&self) -> bool;
}

impl<L: LampRelay + ?Sized> LampRelay for Box<L> {
    fn set_lit(&mut self, lit: bool) -> ClockResult<()> {
        (**self).set_lit(lit)
    }

    fn is_lit(&self) -> bool {
        (**self).is_lit()
    }
}
