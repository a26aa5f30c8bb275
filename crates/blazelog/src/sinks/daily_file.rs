use crate::clock::WallTime;
use crate::level::LogLevel;
use crate::record::SourceLocation;
use crate::sink::{local_time, PatternFormatter, Sink};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write as _};
use std::path::PathBuf;

const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// Daily-rotating file sink.
///
/// Lines go to `{prefix_}YYYYMMDD.NNNN.log` inside the destination
/// directory, where `NNNN` is the smallest index in 0..=9998 that does not
/// collide with an existing file. A fresh file is opened on the first write
/// past local midnight. Open failures are reported on stderr and writes are
/// dropped until the next rollover attempt.
pub struct DailyFileSink {
    destination: PathBuf,
    prefix: String,
    stream: Option<BufWriter<File>>,
    formatter: PatternFormatter,
    next_rotate_secs: i64,
}

impl DailyFileSink {
    /// Sink writing into `destination` with an optional filename prefix.
    pub fn new(destination: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() {
            prefix.push('_');
        }

        Self {
            destination: destination.into(),
            prefix,
            stream: None,
            formatter: PatternFormatter::new(),
            next_rotate_secs: 0,
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

    fn reopen(&mut self, now_secs: i64) -> bool {
        if let Err(error) = fs::create_dir_all(&self.destination) {
            eprintln!(
                "blazelog: failed to create log directory {}: {error}",
                self.destination.display()
            );
            return false;
        }

        let tm = local_time(now_secs);
        let date = format!("{:04}{:02}{:02}", tm.tm_year + 1900, tm.tm_mon + 1, tm.tm_mday);

        let path = (0..=9998)
            .map(|index| self.destination.join(format!("{}{date}.{index:04}.log", self.prefix)))
            .find(|candidate| !candidate.exists());
        let Some(path) = path else {
            eprintln!(
                "blazelog: no free log file index under {}",
                self.destination.display()
            );
            return false;
        };

        match OpenOptions::new().append(true).create(true).open(&path) {
            Ok(file) => {
                self.stream = Some(BufWriter::new(file));
                true
            }
            Err(error) => {
                eprintln!("blazelog: failed to open {}: {error}", path.display());
                false
            }
        }
    }

    /// First local midnight after `now_secs`.
    fn next_rotate_time(now_secs: i64) -> i64 {
        let mut tm = local_time(now_secs);
        tm.tm_sec = 0;
        tm.tm_min = 0;
        tm.tm_hour = 0;
        // SAFETY: mktime reads and normalises the tm in place.
        let midnight = unsafe { libc::mktime(&mut tm) };
        midnight as i64 + SECS_PER_DAY
    }
}

impl Sink for DailyFileSink {
    fn write(
        &mut self,
        location: &SourceLocation,
        level: LogLevel,
        timestamp: WallTime,
        thread_id: u64,
        message: &str,
    ) {
        let now = timestamp.secs;
        if self.next_rotate_secs < now || self.stream.is_none() {
            if !self.reopen(now) {
                return;
            }
            self.next_rotate_secs = Self::next_rotate_time(now);
        }

        let line = self.formatter.format(location, level, timestamp, thread_id, message);
        if let Some(stream) = self.stream.as_mut() {
            if let Err(error) = writeln!(stream, "{line}") {
                eprintln!("blazelog: daily log write failed: {error}");
            }
        }
    }

    fn flush(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            let _ = stream.flush();
        }
    }
}
