//! Sink contract and the shared pattern formatter.

use crate::clock::WallTime;
use crate::level::LogLevel;
use crate::record::SourceLocation;
use std::fmt::Write as _;

/// Output endpoint consuming formatted lines.
///
/// The backend thread is the sole caller, so implementations need no
/// internal locking; `Send` lets the sink move onto that thread. `write`
/// receives one non-empty line per call. Failures must be swallowed (and
/// reported on stderr if useful) rather than surfaced to the drain loop.
pub trait Sink: Send {
    /// Write one formatted line.
    fn write(
        &mut self,
        location: &SourceLocation,
        level: LogLevel,
        timestamp: WallTime,
        thread_id: u64,
        message: &str,
    );

    /// Called after every drain pass that produced output.
    fn flush(&mut self) {}
}

/// Default line pattern.
pub const DEFAULT_PATTERN: &str = "{timestamp} [{level}] ({threadID}) {message} ({file}:{line})";

/// Substitutes record fields into a line pattern.
///
/// Tokens: `{timestamp}` (local time, `YYYY-MM-DD HH:MM:SS.nnnnnnnnn`),
/// `{level}` (single-letter code), `{threadID}`, `{message}`, `{file}`,
/// `{line}`. Unknown tokens render literally.
pub struct PatternFormatter {
    pattern: String,
    buffer: String,
}

impl PatternFormatter {
    pub fn new() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.to_string(),
            buffer: String::new(),
        }
    }

    /// Current pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Change the pattern.
    pub fn set_pattern(&mut self, value: impl Into<String>) {
        self.pattern = value.into();
    }

    /// Formats one line. The result stays valid until the next call.
    pub fn format(
        &mut self,
        location: &SourceLocation,
        level: LogLevel,
        timestamp: WallTime,
        thread_id: u64,
        message: &str,
    ) -> &str {
        let stamp = format_timestamp(timestamp);

        self.buffer.clear();
        let mut rest = self.pattern.as_str();
        while let Some(open) = rest.find('{') {
            self.buffer.push_str(&rest[..open]);
            let Some(close) = rest[open..].find('}') else {
                rest = &rest[open..];
                break;
            };
            let token = &rest[open + 1..open + close];
            match token {
                "timestamp" => self.buffer.push_str(&stamp),
                "level" => self.buffer.push(level.short_code()),
                "threadID" => {
                    let _ = write!(self.buffer, "{thread_id}");
                }
                "message" => self.buffer.push_str(message),
                "file" => self.buffer.push_str(location.file),
                "line" => {
                    let _ = write!(self.buffer, "{}", location.line);
                }
                unknown => {
                    let _ = write!(self.buffer, "{{{unknown}}}");
                }
            }
            rest = &rest[open + close + 1..];
        }
        self.buffer.push_str(rest);

        &self.buffer
    }
}

impl Default for PatternFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_timestamp(timestamp: WallTime) -> String {
    let tm = local_time(timestamp.secs);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:09}",
        tm.tm_year + 1900,
        tm.tm_mon + 1,
        tm.tm_mday,
        tm.tm_hour,
        tm.tm_min,
        tm.tm_sec,
        timestamp.nanos,
    )
}

/// Broken-out local time for a Unix timestamp.
pub(crate) fn local_time(secs: i64) -> libc::tm {
    let time = secs as libc::time_t;
    // SAFETY: localtime_r only reads `time` and writes `tm`.
    unsafe {
        let mut tm: libc::tm = std::mem::zeroed();
        libc::localtime_r(&time, &mut tm);
        tm
    }
}
