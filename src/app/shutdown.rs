use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set by SIGINT/SIGTERM; polled by the supervising loop.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Only touches an atomic (async-signal-safe).
#[cfg(unix)]
extern "C" fn handle_shutdown_signal(_: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
pub(crate) fn install_shutdown_handler() -> Result<()> {
    use anyhow::anyhow;

    for signal in [libc::SIGINT, libc::SIGTERM] {
        unsafe {
            // SAFETY: handle_shutdown_signal is an extern "C" handler whose only
            // effect is storing to an atomic flag.
            let handler = handle_shutdown_signal as *const () as libc::sighandler_t;
            if libc::signal(signal, handler) == libc::SIG_ERR {
                return Err(anyhow!("failed to install handler for signal {signal}"));
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn install_shutdown_handler() -> Result<()> {
    tracing::warn!("signal handling unavailable on this platform; stop with the process manager");
    Ok(())
}

pub(crate) fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

