//! Cooperative shutdown via atomic flag

use std::sync::atomic::{AtomicBool, Ordering};

/// Global shutdown flag, set by the SIGTERM/SIGINT handler
pub fn shutdown_flag() -> &'static AtomicBool {
    static FLAG: AtomicBool = AtomicBool::new(false);
    &FLAG
}

/// Install SIGTERM/SIGINT handlers.
///
/// First signal: set the graceful shutdown flag so the harvest loop finishes
/// its in-flight page. Second signal: exit immediately with 130.
pub fn install_signal_handlers() {
    // SAFETY: AtomicBool::swap and process::exit are async-signal-safe
    unsafe {
        for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
            signal_hook::low_level::register(signal, || {
                if shutdown_flag().swap(true, Ordering::Relaxed) {
                    std::process::exit(130);
                }
            })
            .expect("Failed to register signal handler");
        }
    }
}
