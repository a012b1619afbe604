//! Interrupt Handling
//!
//! SIGINT and SIGTERM set a global flag instead of killing the driver, so the
//! trial in flight can be killed and reaped and the remaining benchmarks
//! reported as skipped.

use std::sync::atomic::{AtomicBool, Ordering};

/// Set once an interrupt has been received
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// The flag the handlers set, for code that polls it
pub fn interrupt_flag() -> &'static AtomicBool {
    &INTERRUPTED
}

/// Whether an interrupt has been received
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// Install SIGINT and SIGTERM handlers that set the interrupt flag.
/// The handler is async-signal-safe (only sets an atomic).
#[cfg(unix)]
pub fn install_interrupt_handlers() {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = interrupt_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);
        libc::sigaction(libc::SIGINT, &sa, std::ptr::null_mut());
        libc::sigaction(libc::SIGTERM, &sa, std::ptr::null_mut());
    }
}

#[cfg(unix)]
extern "C" fn interrupt_handler(_sig: libc::c_int) {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

/// No-op on non-Unix.
#[cfg(not(unix))]
pub fn install_interrupt_handlers() {}
