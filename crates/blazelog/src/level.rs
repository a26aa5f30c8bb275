use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// Log entry verbosity level.
///
/// Levels are totally ordered from most to least urgent; a message is
/// emitted when its level is less than or equal to the current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    /// Always emitted, regardless of the current level.
    Always = 0,
    Error = 1,
    Warning = 2,
    Notice = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Single-letter code used by the `{level}` pattern token.
    pub fn short_code(self) -> char {
        match self {
            Self::Always => '-',
            Self::Error => 'E',
            Self::Warning => 'W',
            Self::Notice => 'I',
            Self::Debug => 'D',
            Self::Trace => 'T',
        }
    }

    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Self::Always,
            1 => Self::Error,
            2 => Self::Warning,
            4 => Self::Debug,
            5 => Self::Trace,
            _ => Self::Notice,
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "error" => Ok(Self::Error),
            "warning" => Ok(Self::Warning),
            "notice" => Ok(Self::Notice),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(Error::InvalidLevel(value.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Always => "always",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        f.write_str(name)
    }
}
