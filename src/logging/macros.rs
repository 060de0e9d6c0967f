//! Logging macros shared by the engine and the CLI
//!
//! They expand to `tracing` through a hidden re-export, so crates embedding the engine can use
//! them without depending on `tracing` themselves.

/// Progress output for operators. Goes to stderr and the rolling log file at INFO.
#[macro_export]
macro_rules! log_stderr {
    ($($arg:tt)*) => {
        $crate::__tracing::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::__tracing::debug!($($arg)*)
    };
}

/// Recoverable per-item failures (unreachable host, skipped log line, provider fallback).
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::__tracing::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::__tracing::error!($($arg)*)
    };
}
