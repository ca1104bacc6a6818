//! Diagnostics and health tracking for the clock daemon.
//!
//! Counters are atomics so the signal watcher or a future status endpoint
//! can read them while the tick loop runs.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_common::error::ClockError;
use tower_common::hand::HandId;
use tower_common::state::SyncState;
use tower_core::tower::TickReport;

/// Consecutive passes with relay failures before the daemon reports unhealthy.
pub const UNHEALTHY_FAILED_PASSES: u32 = 3;

/// Health status of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Hands are being kept in sync.
    Healthy,
    /// The last pass saw relay failures or was abandoned.
    Degraded,
    /// Several passes in a row failed to move a hand.
    Unhealthy,
    /// No tick processed yet.
    Starting,
    /// Shutdown requested.
    ShuttingDown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Starting => write!(f, "starting"),
            HealthStatus::ShuttingDown => write!(f, "shutting_down"),
        }
    }
}

/// Snapshot of daemon diagnostics at a point in time.
#[derive(Debug, Clone)]
pub struct DiagnosticsSnapshot {
    /// Current health status.
    pub health: HealthStatus,
    /// Scheduler state.
    pub state: SyncState,
    /// Ticks processed.
    pub tick_count: u64,
    /// Passes that issued at least one pulse.
    pub correcting_passes: u64,
    /// Pulses issued per hand.
    pub pulses: [u64; 2],
    /// Relay failures.
    pub relay_failures: u64,
    /// Passes abandoned at the iteration bound.
    pub schedule_exceeded: u64,
    /// Stale-position anomalies.
    pub wraparound_anomalies: u64,
    /// Uptime since daemon start.
    pub uptime: Duration,
}

/// Shared diagnostics state updated by the tick loop.
#[derive(Debug)]
pub struct DiagnosticsState {
    tick_count: AtomicU64,
    correcting_passes: AtomicU64,
    pulses: [AtomicU64; 2],
    relay_failures: AtomicU64,
    schedule_exceeded: AtomicU64,
    wraparound_anomalies: AtomicU64,
    /// Passes in a row that ended with a relay failure or were abandoned.
    failing_streak: AtomicU32,
    shutting_down: AtomicBool,
    start_time: Instant,
}

impl Default for DiagnosticsState {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsState {
    /// Create new diagnostics state.
    pub fn new() -> Self {
        Self {
            tick_count: AtomicU64::new(0),
            correcting_passes: AtomicU64::new(0),
            pulses: [AtomicU64::new(0), AtomicU64::new(0)],
            relay_failures: AtomicU64::new(0),
            schedule_exceeded: AtomicU64::new(0),
            wraparound_anomalies: AtomicU64::new(0),
            failing_streak: AtomicU32::new(0),
            shutting_down: AtomicBool::new(false),
            start_time: Instant::now(),
        }
    }

    /// Record a completed tick.
    pub fn record_tick(&self, report: &TickReport) {
        self.tick_count.fetch_add(1, Ordering::Relaxed);
        self.wraparound_anomalies
            .fetch_add(report.anomalies.len() as u64, Ordering::Relaxed);

        let pass = &report.pass;
        for hand in HandId::ALL {
            self.pulses[hand.index()].fetch_add(u64::from(pass.pulses[hand.index()]), Ordering::Relaxed);
        }
        if pass.settled_any() {
            self.correcting_passes.fetch_add(1, Ordering::Relaxed);
        }
        self.relay_failures
            .fetch_add(pass.relay_failures.len() as u64, Ordering::Relaxed);

        if pass.relay_failures.is_empty() {
            self.failing_streak.store(0, Ordering::Relaxed);
        } else {
            self.failing_streak.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a tick that returned an error.
    pub fn record_error(&self, error: &ClockError) {
        self.tick_count.fetch_add(1, Ordering::Relaxed);
        match error {
            ClockError::PulseScheduleExceeded { .. } => {
                self.schedule_exceeded.fetch_add(1, Ordering::Relaxed);
            }
            ClockError::PulseFailure { .. } => {
                self.relay_failures.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        self.failing_streak.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark the daemon as shutting down.
    pub fn set_shutting_down(&self) {
        self.shutting_down.store(true, Ordering::Relaxed);
    }

    /// Ticks processed.
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Relaxed)
    }

    /// Pulses issued to `hand`.
    pub fn pulses(&self, hand: HandId) -> u64 {
        self.pulses[hand.index()].load(Ordering::Relaxed)
    }

    /// Relay failures seen.
    pub fn relay_failures(&self) -> u64 {
        self.relay_failures.load(Ordering::Relaxed)
    }

    /// Passes abandoned at the iteration bound.
    pub fn schedule_exceeded(&self) -> u64 {
        self.schedule_exceeded.load(Ordering::Relaxed)
    }

    /// Stale-position anomalies.
    pub fn wraparound_anomalies(&self) -> u64 {
        self.wraparound_anomalies.load(Ordering::Relaxed)
    }

    /// Get uptime since daemon start.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Current health.
    pub fn health(&self) -> HealthStatus {
        if self.shutting_down.load(Ordering::Relaxed) {
            return HealthStatus::ShuttingDown;
        }
        if self.tick_count() == 0 {
            return HealthStatus::Starting;
        }
        match self.failing_streak.load(Ordering::Relaxed) {
            0 => HealthStatus::Healthy,
            n if n < UNHEALTHY_FAILED_PASSES => HealthStatus::Degraded,
            _ => HealthStatus::Unhealthy,
        }
    }
}

/// Diagnostics collector that aggregates daemon information.
pub struct DiagnosticsCollector {
    state: Arc<DiagnosticsState>,
}

impl DiagnosticsCollector {
    /// Create a new diagnostics collector.
    pub fn new(state: Arc<DiagnosticsState>) -> Self {
        Self { state }
    }

    /// Create a snapshot of current diagnostics.
    pub fn snapshot(&self, sync_state: SyncState) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            health: self.state.health(),
            state: sync_state,
            tick_count: self.state.tick_count(),
            correcting_passes: self.state.correcting_passes.load(Ordering::Relaxed),
            pulses: [self.state.pulses(HandId::One), self.state.pulses(HandId::Two)],
            relay_failures: self.state.relay_failures(),
            schedule_exceeded: self.state.schedule_exceeded(),
            wraparound_anomalies: self.state.wraparound_anomalies(),
            uptime: self.state.uptime(),
        }
    }

    /// Get the underlying state for updates.
    pub fn state(&self) -> &Arc<DiagnosticsState> {
        &self.state
    }
}
