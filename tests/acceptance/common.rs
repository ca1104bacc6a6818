//! Common utilities for integration tests.
//!
//! Provides helpers for:
//! - Building a tower on simulated relays
//! - Constructing local instants around known transitions

#![allow(dead_code)] // Not every test file uses every helper

use chrono::{DateTime, TimeZone};
use chrono_tz::Australia::Sydney;
use chrono_tz::Tz;
use std::time::Duration;
use tower_core::hand_log::HandLog;
use tower_core::scheduler::SyncScheduler;
use tower_core::tower::{Tower, TowerBuilder};
use tower_relay::{RelayPort, SimulatedHandle, SimulatedLamp, SimulatedLampHandle, SimulatedRelay};

/// A tower wired to simulated relays, with handles to observe them.
pub struct SimTower {
    pub tower: Tower,
    pub relays: [SimulatedHandle; 2],
    pub lamp: SimulatedLampHandle,
}

impl SimTower {
    /// Pulses seen by each relay.
    pub fn pulses(&self) -> [u64; 2] {
        [self.relays[0].pulses(), self.relays[1].pulses()]
    }
}

/// Options for [`sim_tower`].
pub struct SimOptions {
    pub positions: Option<[i32; 2]>,
    pub cutoff: i32,
    pub log: Option<HandLog>,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            positions: None,
            cutoff: 30,
            log: None,
        }
    }
}

/// Build a Sydney tower on simulated relays with no waits between pulses.
pub fn sim_tower(options: SimOptions) -> SimTower {
    let one = SimulatedRelay::new("hand-one");
    let two = SimulatedRelay::new("hand-two");
    let lamp = SimulatedLamp::new();
    let handles = [one.handle(), two.handle()];
    let lamp_handle = lamp.handle();
    let relays: [Box<dyn RelayPort>; 2] = [Box::new(one), Box::new(two)];

    let mut builder = TowerBuilder::new(Sydney, relays)
        .cutoff(options.cutoff)
        .hand_pulse_interval(Duration::ZERO)
        .scheduler(SyncScheduler::new(Duration::ZERO))
        .lamp(Box::new(lamp));
    if let Some(positions) = options.positions {
        builder = builder.positions(positions);
    }
    if let Some(log) = options.log {
        builder = builder.hand_log(log);
    }

    SimTower {
        tower: builder.build(),
        relays: handles,
        lamp: lamp_handle,
    }
}

/// Build a tower whose hands both show `positions`.
pub fn sim_tower_at(positions: [i32; 2]) -> SimTower {
    sim_tower(SimOptions {
        positions: Some(positions),
        ..SimOptions::default()
    })
}

/// Sydney local time; ambiguous times resolve to the earlier instant.
pub fn sydney(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
    Sydney
        .with_ymd_and_hms(y, mo, d, h, mi, 0)
        .earliest()
        .expect("local time exists")
}
