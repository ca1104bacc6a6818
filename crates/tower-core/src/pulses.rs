//! Pending pulse counts for both hands.
//!
//! A fast hand has negative drift but is never pulsed backwards, so every
//! way into a [`PulseBudget`] clamps at zero.

use std::fmt;
use tower_common::hand::HandId;

/// Non-negative pulses owed to each hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PulseBudget {
    one: u32,
    two: u32,
}

fn clamp(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

impl PulseBudget {
    /// Nothing owed.
    pub const ZERO: PulseBudget = PulseBudget { one: 0, two: 0 };

    /// Build from signed counts; negatives become zero.
    #[must_use]
    pub fn new(one: i64, two: i64) -> Self {
        Self {
            one: clamp(one),
            two: clamp(two),
        }
    }

    /// Build from the drift of both hands.
    #[must_use]
    pub fn from_drift(one: i32, two: i32) -> Self {
        Self::new(i64::from(one), i64::from(two))
    }

    /// Pulses owed to hand one.
    #[must_use]
    pub fn one(&self) -> u32 {
        self.one
    }

    /// Pulses owed to hand two.
    #[must_use]
    pub fn two(&self) -> u32 {
        self.two
    }

    /// Pulses owed to `hand`.
    #[must_use]
    pub fn get(&self, hand: HandId) -> u32 {
        match hand {
            HandId::One => self.one,
            HandId::Two => self.two,
        }
    }

    /// Set hand one's count; negatives become zero.
    pub fn set_one(&mut self, value: i64) {
        self.one = clamp(value);
    }

    /// Set hand two's count; negatives become zero.
    pub fn set_two(&mut self, value: i64) {
        self.two = clamp(value);
    }

    /// Set the count for `hand`; negatives become zero.
    pub fn set(&mut self, hand: HandId, value: i64) {
        match hand {
            HandId::One => self.set_one(value),
            HandId::Two => self.set_two(value),
        }
    }

    /// Add `delta` to both counts, clamping each at zero.
    pub fn add(&mut self, delta: i64) {
        self.set_one(i64::from(self.one) + delta);
        self.set_two(i64::from(self.two) + delta);
    }

    /// Returns true when neither hand is owed anything.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.one == 0 && self.two == 0
    }

    /// Iteration bound for a scheduling pass starting from this budget.
    #[must_use]
    pub fn iteration_limit(&self) -> u64 {
        (u64::from(self.one) + 1) * (u64::from(self.two) + 1)
    }
}

impl PartialEq<[u32; 2]> for PulseBudget {
    fn eq(&self, other: &[u32; 2]) -> bool {
        self.one == other[0] && self.two == other[1]
    }
}

impl PartialEq<(u32, u32)> for PulseBudget {
    fn eq(&self, other: &(u32, u32)) -> bool {
        self.one == other.0 && self.two == other.1
    }
}

impl From<PulseBudget> for [u32; 2] {
    fn from(budget: PulseBudget) -> Self {
        [budget.one, budget.two]
    }
}

impl fmt::Display for PulseBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pulses({}, {})", self.one, self.two)
    }
}
