//! FILENAME: core/pivot-engine/src/logging.rs
// PURPOSE: Category-tagged logging macros for the pivot engine.
//
// Every line carries a short category ("PIVOT", "CACHE", "LAYOUT") used as
// the `log` target, so an embedding application can filter per subsystem.
// The engine only emits through the `log` facade and never installs a logger.

#[macro_export]
macro_rules! log_debug {
    ($cat:expr, $($arg:tt)*) => {
        $crate::log::debug!(target: $cat, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_info {
    ($cat:expr, $($arg:tt)*) => {
        $crate::log::info!(target: $cat, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($cat:expr, $($arg:tt)*) => {
        $crate::log::warn!(target: $cat, $($arg)*)
    };
}
