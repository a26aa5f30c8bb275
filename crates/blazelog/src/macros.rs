//! Logging macros.
//!
//! Each expansion plants one `static` metadata cell at the call site,
//! initialised on the first hit with the source location, level, format
//! string, flags, and a decode function monomorphised over the argument
//! types. The level gate runs before anything else, so a filtered-out
//! statement costs a single relaxed atomic load.

/// Expansion backbone shared by the level macros.
#[doc(hidden)]
#[macro_export]
macro_rules! __log_statement {
    ($level:expr, $flags:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {{
        if $crate::should_log($level) {
            static META: $crate::MetadataCell = $crate::MetadataCell::new();
            let args = ($(&$arg,)*);
            let metadata = META.get_or_init(
                $crate::SourceLocation { file: file!(), line: line!() },
                $level,
                $flags,
                $fmt,
                &args,
            );
            $crate::log_statement(metadata, &args);
        }
    }};
}

/// Log regardless of the current level.
#[macro_export]
macro_rules! log_always {
    ($($args:tt)*) => { $crate::__log_statement!($crate::LogLevel::Always, 0, $($args)*) };
}

/// Log at Error level.
#[macro_export]
macro_rules! log_error {
    ($($args:tt)*) => { $crate::__log_statement!($crate::LogLevel::Error, 0, $($args)*) };
}

/// Log at Warning level.
#[macro_export]
macro_rules! log_warning {
    ($($args:tt)*) => { $crate::__log_statement!($crate::LogLevel::Warning, 0, $($args)*) };
}

/// Log at Notice level.
#[macro_export]
macro_rules! log_notice {
    ($($args:tt)*) => { $crate::__log_statement!($crate::LogLevel::Notice, 0, $($args)*) };
}

/// Log at Debug level.
#[macro_export]
macro_rules! log_debug {
    ($($args:tt)*) => { $crate::__log_statement!($crate::LogLevel::Debug, 0, $($args)*) };
}

/// Log at Trace level.
#[macro_export]
macro_rules! log_trace {
    ($($args:tt)*) => { $crate::__log_statement!($crate::LogLevel::Trace, 0, $($args)*) };
}

/// Like [`log_always!`], but spins until the ring accepts the record
/// instead of dropping it under pressure.
#[macro_export]
macro_rules! log_always_retry {
    ($($args:tt)*) => { $crate::__log_statement!($crate::LogLevel::Always, $crate::FLAG_RETRY, $($args)*) };
}

/// Like [`log_error!`], but never dropped at enqueue time.
#[macro_export]
macro_rules! log_error_retry {
    ($($args:tt)*) => { $crate::__log_statement!($crate::LogLevel::Error, $crate::FLAG_RETRY, $($args)*) };
}

/// Like [`log_warning!`], but never dropped at enqueue time.
#[macro_export]
macro_rules! log_warning_retry {
    ($($args:tt)*) => { $crate::__log_statement!($crate::LogLevel::Warning, $crate::FLAG_RETRY, $($args)*) };
}

/// Like [`log_notice!`], but never dropped at enqueue time.
#[macro_export]
macro_rules! log_notice_retry {
    ($($args:tt)*) => { $crate::__log_statement!($crate::LogLevel::Notice, $crate::FLAG_RETRY, $($args)*) };
}

/// Like [`log_debug!`], but never dropped at enqueue time.
#[macro_export]
macro_rules! log_debug_retry {
    ($($args:tt)*) => { $crate::__log_statement!($crate::LogLevel::Debug, $crate::FLAG_RETRY, $($args)*) };
}

/// Like [`log_trace!`], but never dropped at enqueue time.
#[macro_export]
macro_rules! log_trace_retry {
    ($($args:tt)*) => { $crate::__log_statement!($crate::LogLevel::Trace, $crate::FLAG_RETRY, $($args)*) };
}
