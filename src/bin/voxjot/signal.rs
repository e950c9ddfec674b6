//! Ctrl-C handling for the capture loop.
//!
//! The handler only flips an atomic flag; the main loop polls it between
//! meter redraws and decides whether to drain the recording or abort.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};

/// Flag set by the SIGINT handler.
static INTERRUPT_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Signal handler for Ctrl-C.
///
/// Sets a flag that the main loop checks to stop the capture.
/// Only uses atomic operations (async-signal-safe).
#[cfg(unix)]
extern "C" fn handle_sigint(_: libc::c_int) {
    INTERRUPT_RECEIVED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
pub(crate) fn install_sigint_handler() -> Result<()> {
    use anyhow::anyhow;
    unsafe {
        // SAFETY: handle_sigint is an extern "C" signal handler with no side effects
        // beyond flipping an atomic flag, which is async-signal-safe.
        let handler = handle_sigint as *const () as libc::sighandler_t;
        if libc::signal(libc::SIGINT, handler) == libc::SIG_ERR {
            return Err(anyhow!("failed to install SIGINT handler"));
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn install_sigint_handler() -> Result<()> {
    Ok(())
}

/// Consume a pending interrupt, if any.
pub(crate) fn take_interrupt() -> bool {
    INTERRUPT_RECEIVED.swap(false, Ordering::SeqCst)
}
