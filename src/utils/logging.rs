//! Debug-gated logging macro.
//!
//! The sensor configuration carries a runtime `debug` flag; per-event
//! diagnostics are too chatty to emit unconditionally, so callers pass the
//! flag as the first argument:
//!
//! ```rust
//! use luxlog::debug_log;
//!
//! let debug = true;
//! debug_log!(debug, "flushing {} samples", 12);
//! ```

/// Log at debug level only when the given flag is set.
#[macro_export]
macro_rules! debug_log {
    ($enabled:expr, $($arg:tt)*) => {
        if $enabled {
            log::debug!($($arg)*);
        }
    };
}
