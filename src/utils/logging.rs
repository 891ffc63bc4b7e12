//! Per-module log switches.
//!
//! Chatty paths (foreground callbacks, per-frame pose processing) declare
//! `const ENABLE_LOGS: bool` and log through these macros, so they can be
//! silenced in one place without touching `RUST_LOG`. Failures always go
//! through `log::error!` directly and are never gated.
//!
//! ```ignore
//! const ENABLE_LOGS: bool = false;
//! use crate::{log_debug, log_info};
//!
//! log_debug!("dropped while ENABLE_LOGS is false");
//! ```

/// Shared body of the gated macros. `ENABLE_LOGS` resolves in the caller's module.
#[doc(hidden)]
#[macro_export]
macro_rules! log_gated {
    ($level:ident, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::$level!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::log_gated!(info, $($arg)*) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::log_gated!(debug, $($arg)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::log_gated!(warn, $($arg)*) };
}
