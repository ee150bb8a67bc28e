use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::signal::{SIGINT, SIGTSTP};

/// Flags shared between the signal handlers and the main loop.
///
/// Handlers only flip or set these flags. Printing and clearing happen in
/// the main loop.
#[derive(Debug, Default)]
pub struct SignalState {
    foreground_only: AtomicBool,
    mode_changed: AtomicBool,
    interrupted: Arc<AtomicBool>,
}

/// A foreground-only mode toggle that has not been announced yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    Entered,
    Exited,
}

impl fmt::Display for ModeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeChange::Entered => write!(f, "Entering foreground-only mode (& is now ignored)"),
            ModeChange::Exited => write!(f, "Exiting foreground-only mode"),
        }
    }
}

impl SignalState {
    pub fn new() -> Arc<Self> {
        Arc::new(SignalState::default())
    }

    /// Flips foreground-only mode. Runs inside the SIGTSTP handler.
    pub fn toggle_foreground_only(&self) {
        self.foreground_only.fetch_xor(true, Ordering::SeqCst);
        self.mode_changed.store(true, Ordering::SeqCst);
    }

    pub fn foreground_only(&self) -> bool {
        self.foreground_only.load(Ordering::SeqCst)
    }

    /// Returns the pending toggle, at most once per toggle.
    pub fn take_mode_change(&self) -> Option<ModeChange> {
        if !self.mode_changed.swap(false, Ordering::SeqCst) {
            return None;
        }
        if self.foreground_only() {
            Some(ModeChange::Entered)
        } else {
            Some(ModeChange::Exited)
        }
    }

    /// Forgets any interrupt seen before a foreground child starts.
    pub fn begin_foreground(&self) {
        self.interrupted.store(false, Ordering::SeqCst);
    }

    /// Whether SIGINT arrived since `begin_foreground`.
    pub fn take_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::SeqCst)
    }
}

/// Installs the shell's handlers:
/// - SIGTSTP: (Ctrl-Z) toggles foreground-only mode.
/// - SIGINT: (Ctrl-C) only records the interrupt, so the shell itself
///   survives it. Foreground children get the default action back on exec.
pub fn install_signal_handlers(state: &Arc<SignalState>) -> io::Result<()> {
    signal_hook::flag::register(SIGINT, Arc::clone(&state.interrupted))?;
    let handler_state = Arc::clone(state);
    // SAFETY: the closure performs two atomic operations and nothing else,
    // which is async-signal-safe.
    unsafe {
        signal_hook::low_level::register(SIGTSTP, move || handler_state.toggle_foreground_only())?;
    }
    Ok(())
}
