//! Signal handling for graceful daemon shutdown.
//!
//! Provides Unix signal handling (SIGTERM, SIGINT, SIGHUP) for clean
//! shutdown of the tslink daemon. Uses atomic flags to communicate
//! shutdown requests to the main loop without blocking; the transmitter
//! observes shutdown only between transfers, so a transfer in flight
//! always completes.

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
    /// SIGHUP - Hangup; acknowledged and ignored (no reload semantics).
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

/// Shared state between the signal handler and the main loop.
///
/// All fields use atomic operations for thread-safe access.
#[derive(Debug)]
pub struct SignalState {
    /// Set to true when a shutdown signal is received.
    shutdown_requested: AtomicBool,
    /// Count of signals received (for diagnostics).
    signal_count: AtomicU32,
    /// The most recent signal received.
    last_signal: AtomicU32,
}

impl Default for SignalState {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalState {
    /// Create a new signal state.
    pub fn new() -> Self {
        Self {
            shutdown_requested: AtomicBool::new(false),
            signal_count: AtomicU32::new(0),
            last_signal: AtomicU32::new(0),
        }
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Relaxed)
    }

    /// Request shutdown (can be called from any thread).
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Relaxed);
    }

    /// Record a signal.
    fn record_signal(&self, kind: SignalKind) {
        self.signal_count.fetch_add(1, Ordering::Relaxed);
        self.last_signal.store(kind as u32 + 1, Ordering::Relaxed);
    }

    /// Get the total number of signals received.
    pub fn signal_count(&self) -> u32 {
        self.signal_count.load(Ordering::Relaxed)
    }

    /// Get the most recent signal received, if any.
    pub fn last_signal(&self) -> Option<SignalKind> {
        match self.last_signal.load(Ordering::Relaxed) {
            1 => Some(SignalKind::Terminate),
            2 => Some(SignalKind::Interrupt),
            3 => Some(SignalKind::Hangup),
            _ => None,
        }
    }
}

/// Handle for signal management.
#[derive(Clone)]
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    /// Create a new signal handler and register signal handlers.
    ///
    /// On Unix systems, this registers handlers for SIGTERM, SIGINT,
    /// and SIGHUP. On other platforms, only manual shutdown is
    /// supported.
    pub fn new() -> std::io::Result<Self> {
        let state = Arc::new(SignalState::new());
        let handler = Self {
            state: Arc::clone(&state),
        };

        #[cfg(unix)]
        handler.register_unix_handlers()?;

        Ok(handler)
    }

    /// Register Unix signal handlers.
    ///
    /// Signal handlers must be async-signal-safe, so the handlers only
    /// flip static atomic flags; a helper thread folds those into the
    /// shared state.
    #[cfg(unix)]
    fn register_unix_handlers(&self) -> std::io::Result<()> {
        use std::os::raw::c_int;

        static TERMINATE_FLAG: AtomicBool = AtomicBool::new(false);
        static INTERRUPT_FLAG: AtomicBool = AtomicBool::new(false);
        static HANGUP_FLAG: AtomicBool = AtomicBool::new(false);

        let state = Arc::clone(&self.state);

        std::thread::spawn(move || {
            loop {
                if TERMINATE_FLAG.swap(false, Ordering::Relaxed) {
                    info!(signal = %SignalKind::Terminate, "Shutdown signal received");
                    state.request_shutdown();
                    state.record_signal(SignalKind::Terminate);
                }
                if INTERRUPT_FLAG.swap(false, Ordering::Relaxed) {
                    info!(signal = %SignalKind::Interrupt, "Shutdown signal received");
                    state.request_shutdown();
                    state.record_signal(SignalKind::Interrupt);
                }
                if HANGUP_FLAG.swap(false, Ordering::Relaxed) {
                    info!("SIGHUP received; the link has no reload semantics, ignoring");
                    state.record_signal(SignalKind::Hangup);
                }
                if state.shutdown_requested() {
                    break;
                }
                std::thread::sleep(std::time::Duration::from_millis(10));
            }
        });

        #[allow(unsafe_code)]
        // Handlers only touch static atomics, which is async-signal-safe.
        unsafe {
            libc::signal(libc::SIGTERM, sigterm_handler as libc::sighandler_t);
            libc::signal(libc::SIGINT, sigint_handler as libc::sighandler_t);
            libc::signal(libc::SIGHUP, sighup_handler as libc::sighandler_t);
        }

        extern "C" fn sigterm_handler(_: c_int) {
            TERMINATE_FLAG.store(true, Ordering::Relaxed);
        }

        extern "C" fn sigint_handler(_: c_int) {
            INTERRUPT_FLAG.store(true, Ordering::Relaxed);
        }

        extern "C" fn sighup_handler(_: c_int) {
            HANGUP_FLAG.store(true, Ordering::Relaxed);
        }

        debug!("Unix signal handlers registered");
        Ok(())
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.state.shutdown_requested()
    }

    /// Get the signal state for inspection.
    pub fn state(&self) -> &SignalState {
        &self.state
    }
}
