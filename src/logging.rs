//! Logging hooks
//!
//! The engine is a library and owns no logging backend. With the `defmt`
//! feature the hooks forward to defmt (the firmware transport); without it
//! they expand to nothing and the call sites cost nothing. Only the two
//! levels the engine emits are defined: `log_info!` for scoring milestones
//! (task started, finished, gate programmed, start selected) and
//! `log_debug!` for state machine details.

/// Scoring milestone.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::info!($($arg)*);
    }};
}

/// State machine detail.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($arg)*);
    }};
}
