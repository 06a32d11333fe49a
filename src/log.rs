use std::sync::atomic::{AtomicBool, Ordering};

/// Target used by every diagnostic record of the crate.
pub const TARGET: &str = "poolhit";

static ENABLED: AtomicBool = AtomicBool::new(true);

#[inline(always)]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::SeqCst)
}

/// Mute diagnostic logs, journal output is not affected.
pub fn disable() {
    ENABLED.store(false, Ordering::SeqCst)
}

pub fn enable() {
    ENABLED.store(true, Ordering::SeqCst)
}

#[macro_export]
macro_rules! ph_info {
    ($($arg:tt)+) => {
        if $crate::log::is_enabled() {
            ::log::info!(target: $crate::log::TARGET, $($arg)+)
        }
    };
}

#[macro_export]
macro_rules! ph_warn {
    ($($arg:tt)+) => {
        if $crate::log::is_enabled() {
            ::log::warn!(target: $crate::log::TARGET, $($arg)+)
        }
    };
}

#[macro_export]
macro_rules! ph_debug {
    ($($arg:tt)+) => {
        if $crate::log::is_enabled() {
            ::log::debug!(target: $crate::log::TARGET, $($arg)+)
        }
    };
}
