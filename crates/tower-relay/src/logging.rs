//! Stand-in relays that only log.
//!
//! Used in development mode on machines without relay hardware: the whole
//! controller runs, and every pulse or lamp change shows up in the log.

use crate::{LampRelay, RelayPort};
use tower_common::error::ClockResult;
use tracing::info;

/// Hand relay that logs each pulse and always succeeds.
#[derive(Debug)]
pub struct LoggingRelay {
    name: String,
    pulses: u64,
}

impl LoggingRelay {
    /// Create a logging relay.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pulses: 0,
        }
    }

    /// Number of pulses logged so far.
    #[must_use]
    pub fn pulses(&self) -> u64 {
        self.pulses
    }
}

impl RelayPort for LoggingRelay {
    fn pulse(&mut self) -> ClockResult<()> {
        self.pulses += 1;
        info!(relay = %self.name, total = self.pulses, "Pulse");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Lamp relay that logs changes.
#[derive(Debug, Default)]
pub struct LoggingLamp {
    lit: bool,
}

impl LoggingLamp {
    /// Create a logging lamp, initially off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LampRelay for LoggingLamp {
    fn set_lit(&mut self, lit: bool) -> ClockResult<()> {
        if lit != self.lit {
            info!(lit, "Lamp switched");
        }
        self.lit = lit;
        Ok(())
    }

    fn is_lit(&self) -> bool {
        self.lit
    }
}
