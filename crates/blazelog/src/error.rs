use thiserror::Error;

/// Errors surfaced by the configuration surface of the logger.
///
/// The log path itself never raises errors into the caller: drop-policy
/// records vanish silently under pressure and retry-policy records spin
/// until accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// `set_log_level_str` received an unrecognised value.
    #[error("invalid log level string value: {0:?}")]
    InvalidLevel(String),

    /// Zero was passed as the queue capacity hint.
    #[error("queue capacity hint must be non-zero")]
    InvalidCapacityHint,
}
