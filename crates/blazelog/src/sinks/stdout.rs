use crate::clock::WallTime;
use crate::level::LogLevel;
use crate::record::SourceLocation;
use crate::sink::{PatternFormatter, Sink};
use std::io::Write as _;

/// Pattern-formatted stdout sink with per-level ANSI colouring.
pub struct StdoutSink {
    formatter: PatternFormatter,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            formatter: PatternFormatter::new(),
        }
    }

    /// Formatting pattern.
    pub fn pattern(&self) -> &str {
        self.formatter.pattern()
    }

    /// Set formatting pattern.
    pub fn set_pattern(&mut self, value: impl Into<String>) {
        self.formatter.set_pattern(value);
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for StdoutSink {
    fn write(
        &mut self,
        location: &SourceLocation,
        level: LogLevel,
        timestamp: WallTime,
        thread_id: u64,
        message: &str,
    ) {
        let style = match level {
            LogLevel::Error => "\x1b[31m",
            LogLevel::Warning => "\x1b[38;5;208m",
            LogLevel::Debug | LogLevel::Trace => "\x1b[90m",
            LogLevel::Always | LogLevel::Notice => "",
        };

        let line = self.formatter.format(location, level, timestamp, thread_id, message);
        if style.is_empty() {
            println!("{line}");
        } else {
            println!("{style}{line}\x1b[0m");
        }
    }

    fn flush(&mut self) {
        let _ = std::io::stdout().flush();
    }
}
