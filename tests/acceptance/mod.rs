//! Integration tests for town clock acceptance testing.
//!
//! All tests run against simulated relays with zero pulse intervals, so
//! they need no hardware and finish in well under a second each.

mod common;
mod dst_test;
mod recovery_test;
mod soak_test;
