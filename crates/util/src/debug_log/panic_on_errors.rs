//! Whether or not [crate::debug_log_error] should panic.
//!
//! Panicking turns logged invariant violations into hard failures while
//! developing. It can only ever happen in debug builds and only while
//! [super::enabled] is true.

#[cfg(debug_assertions)]
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether panicking on errors is enabled or not (see
/// [crate::debug_log_error]).
///
/// This is enabled by default in debug builds and always `false` in release
/// builds.
pub fn enabled() -> bool {
    #[cfg(not(debug_assertions))]
    {
        false
    }

    #[cfg(debug_assertions)]
    {
        ENABLED.load(Ordering::Relaxed)
    }
}

/// Enable or disable panicking on errors.
///
/// Trying to enable it when `cfg!(debug_assertions)` is false will result in
/// the program panicking.
pub fn set(enable: bool) {
    #[cfg(not(debug_assertions))]
    if enable {
        panic!("Panicking on errors cannot be enabled because debug logging cannot be enabled.");
    }

    #[cfg(debug_assertions)]
    ENABLED.store(enable, Ordering::Relaxed);
}

/// Shorthand for `set(false)`.
pub fn disable() {
    set(false);
}

#[cfg(debug_assertions)]
static ENABLED: AtomicBool = AtomicBool::new(true);
