//! Operator cancellation.
//!
//! [`install_handlers`] routes SIGINT and SIGTERM to a process-wide flag
//! instead of terminating the process, so the current workspace can be
//! removed before exiting. Long waits poll a [`CancelToken`].

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

static SIGNALLED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_signal(_signal: libc::c_int) {
    SIGNALLED.store(true, Ordering::SeqCst);
}

/// Install SIGINT/SIGTERM handlers that request cancellation.
#[cfg(unix)]
pub fn install_handlers() -> io::Result<()> {
    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    for signal in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
        if unsafe { libc::signal(signal, handler) } == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn install_handlers() -> io::Result<()> {
    Ok(())
}

/// Cancellation flag shared between the driver and blocking waits.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    observe_signals: bool,
}

impl CancelToken {
    /// A token only cancelled through [`CancelToken::cancel`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is also cancelled by an operator signal.
    pub fn with_signals() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            observe_signals: true,
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Has cancellation been requested?
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || (self.observe_signals && SIGNALLED.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }
}
