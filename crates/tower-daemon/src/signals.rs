//! Signal handling for graceful daemon shutdown.
//!
//! SIGTERM and SIGINT clear the tower's running flag, so a scheduling pass
//! in progress stops at its next iteration and the tick loop exits. SIGHUP
//! is recorded and logged.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Signal types that the daemon handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGTERM - Graceful termination request.
    Terminate,
    /// SIGINT - Interrupt (Ctrl+C).
    Interrupt,
    /// SIGHUP - Hangup.
    Hangup,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Terminate => write!(f, "SIGTERM"),
            SignalKind::Interrupt => write!(f, "SIGINT"),
            SignalKind::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// Shared state between the signal watcher and the tick loop.
#[derive(Debug)]
pub struct SignalState {
    /// Cleared when shutdown is requested; shared with the tower.
    running: Arc<AtomicBool>,
    /// Set when SIGHUP arrives.
    hangup_received: AtomicBool,
    /// Count of signals received.
    signal_count: AtomicU32,
}

impl SignalState {
    /// Create signal state around the tower's running flag.
    pub fn new(running: Arc<AtomicBool>) -> Self {
        Self {
            running,
            hangup_received: AtomicBool::new(false),
            signal_count: AtomicU32::new(0),
        }
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        !self.running.load(Ordering::Acquire)
    }

    /// Check if a hangup was received (and clear the flag).
    #[inline]
    pub fn take_hangup(&self) -> bool {
        self.hangup_received.swap(false, Ordering::Relaxed)
    }

    /// Request shutdown (can be called from any thread).
    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn record_signal(&self, kind: SignalKind) {
        self.signal_count.fetch_add(1, Ordering::Relaxed);
        match kind {
            SignalKind::Terminate | SignalKind::Interrupt => {
                info!(signal = %kind, "Shutdown signal received");
                self.request_shutdown();
            }
            SignalKind::Hangup => {
                info!(signal = %kind, "Hangup received, configuration is only read at startup");
                self.hangup_received.store(true, Ordering::Relaxed);
            }
        }
    }

    /// Get the total number of signals received.
    pub fn signal_count(&self) -> u32 {
        self.signal_count.load(Ordering::Relaxed)
    }
}

/// Handle for signal management.
#[derive(Clone)]
pub struct SignalHandler {
    state: Arc<SignalState>,
}

static TERM_FLAG: AtomicBool = AtomicBool::new(false);
static INT_FLAG: AtomicBool = AtomicBool::new(false);
static HUP_FLAG: AtomicBool = AtomicBool::new(false);

impl SignalHandler {
    /// Register handlers for SIGTERM, SIGINT and SIGHUP that act on `running`.
    ///
    /// On non-Unix platforms only manual shutdown is available.
    pub fn new(running: Arc<AtomicBool>) -> std::io::Result<Self> {
        let handler = Self {
            state: Arc::new(SignalState::new(running)),
        };

        #[cfg(unix)]
        handler.register_unix_handlers()?;

        Ok(handler)
    }

    /// Register Unix signal handlers.
    ///
    /// The handlers only set static atomics; a watcher thread moves those
    /// into [`SignalState`], where logging is allowed.
    #[cfg(unix)]
    fn register_unix_handlers(&self) -> std::io::Result<()> {
        use std::os::raw::c_int;

        extern "C" fn sigterm_handler(_: c_int) {
            TERM_FLAG.store(true, Ordering::Relaxed);
        }

        extern "C" fn sigint_handler(_: c_int) {
            INT_FLAG.store(true, Ordering::Relaxed);
        }

        extern "C" fn sighup_handler(_: c_int) {
            HUP_FLAG.store(true, Ordering::Relaxed);
        }

        let state = Arc::clone(&self.state);
        std::thread::Builder::new()
            .name("signal-watch".into())
            .spawn(move || loop {
                for (flag, kind) in [
                    (&TERM_FLAG, SignalKind::Terminate),
                    (&INT_FLAG, SignalKind::Interrupt),
                    (&HUP_FLAG, SignalKind::Hangup),
                ] {
                    if flag.swap(false, Ordering::Relaxed) {
                        state.record_signal(kind);
                    }
                }
                if state.shutdown_requested() {
                    break;
                }
                std::thread::sleep(std::time::Duration::from_millis(10));
            })?;

        // SAFETY: the handlers only store to static atomics, which is
        // async-signal-safe.
        unsafe {
            libc::signal(libc::SIGTERM, sigterm_handler as libc::sighandler_t);
            libc::signal(libc::SIGINT, sigint_handler as libc::sighandler_t);
            libc::signal(libc::SIGHUP, sighup_handler as libc::sighandler_t);
        }

        debug!("Unix signal handlers registered");
        Ok(())
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.state.shutdown_requested()
    }

    /// Check if a hangup was received (clears the flag).
    #[inline]
    pub fn take_hangup(&self) -> bool {
        self.state.take_hangup()
    }

    /// Manually request shutdown.
    pub fn request_shutdown(&self) {
        info!("Manual shutdown requested");
        self.state.request_shutdown();
    }

    /// Get the signal state for inspection.
    pub fn state(&self) -> &SignalState {
        &self.state
    }
}
