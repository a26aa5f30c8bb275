//! blazelog - Asynchronous Low-Latency Structured Logger
//!
//! Logging threads format nothing: a statement reserves space in a
//! per-thread SPSC byte ring, packs a timestamp, a pointer to immutable
//! call-site metadata, and its raw arguments, and commits. A single
//! backend thread drains every ring, reconstructs records, formats them
//! lazily, and writes finished lines to a pluggable [`Sink`].
//!
//! # Key Features
//!
//! - No allocation, formatting, or system calls on the common log path
//! - One lock-free SPSC ring per logging thread (no producer contention)
//! - Drop or spin-until-accepted policy per call site under pressure
//! - Lazy formatting on the backend with a pattern-based line layout
//! - Clean shutdown drain, at-exit hook, and fatal-signal drain
//! - Optional calibrated TSC timestamps (`tsc-clock` feature)
//!
//! # Example
//!
//! ```no_run
//! use blazelog::{sinks::StdoutSink, BackendOptions, LogLevel};
//!
//! blazelog::set_log_level(LogLevel::Trace);
//! blazelog::start_backend(Box::new(StdoutSink::new()), BackendOptions::default());
//!
//! blazelog::log_notice!("Hello {}!", "world");
//!
//! blazelog::stop_backend();
//! ```

mod args;
mod backend;
mod clock;
mod codec;
mod context;
mod error;
mod fmt;
mod level;
mod macros;
mod rate_limit;
mod record;
mod registry;
mod signal;
mod sink;
pub mod sinks;
mod sync;
pub mod validate;

pub use args::{ArgStore, ArgTuple, ArgValue, LogArg};
pub use backend::BackendOptions;
pub use clock::{now, Timestamp, WallTime};
pub use codec::{Reader, Writer};
pub use error::Error;
pub use level::LogLevel;
pub use rate_limit::LoopRateLimit;
pub use record::{DecodeArgsFn, MetadataCell, RecordMetadata, SourceLocation, FLAG_RETRY};
pub use sink::{PatternFormatter, Sink, DEFAULT_PATTERN};

use context::EnqueuePolicy;

/// Current log verbosity level.
#[inline]
pub fn log_level() -> LogLevel {
    backend::instance().log_level()
}

/// Change the log verbosity level.
#[inline]
pub fn set_log_level(value: LogLevel) {
    backend::instance().set_log_level(value);
}

/// Change the log verbosity level from its string form.
///
/// Recognised values: `"error"`, `"warning"`, `"notice"`, `"debug"`,
/// `"trace"`. Anything else fails with [`Error::InvalidLevel`] and leaves
/// the level unchanged.
pub fn set_log_level_str(value: &str) -> Result<(), Error> {
    set_log_level(value.parse()?);
    Ok(())
}

/// Returns `true` when a message at `value` should be logged.
#[inline]
pub fn should_log(value: LogLevel) -> bool {
    backend::instance().should_log(value)
}

/// Ring capacity hint, in bytes, for producers created after the call.
pub fn queue_capacity_hint() -> usize {
    backend::instance().registry().capacity_hint()
}

/// Set the ring capacity hint for future producers.
///
/// Zero fails with [`Error::InvalidCapacityHint`] and leaves the hint
/// unchanged. Existing producers keep their capacity.
pub fn set_queue_capacity_hint(value: usize) -> Result<(), Error> {
    backend::instance().registry().set_capacity_hint(value)
}

/// Returns `true` once the backend thread is processing records.
#[inline]
pub fn is_backend_ready() -> bool {
    backend::instance().is_ready()
}

/// Starts the backend thread draining into `sink`.
///
/// Installs the at-exit hook and fatal-signal handlers on first use.
/// Blocks briefly until the thread reports itself running; starting an
/// already-running backend is a reported no-op.
pub fn start_backend(sink: Box<dyn Sink>, options: BackendOptions) {
    backend::instance().start(sink, options);
}

/// Stops the backend thread.
///
/// The worker performs a terminal drain before exiting, so every record
/// committed before this call reaches the sink.
pub fn stop_backend() {
    backend::instance().stop();
}

/// Frontend of one log statement; the logging macros call this.
///
/// Takes the timestamp, computes the encoded size, and asks the calling
/// thread's producer to pack `[header | metadata pointer | args]` into its
/// ring under the policy selected by the metadata flags.
#[inline]
pub fn log_statement<A: ArgTuple>(metadata: &'static RecordMetadata, args: &A) {
    let now = clock::now();
    let size = record::RECORD_PREFIX_SIZE + args.encoded_size();
    let policy = if metadata.flags & FLAG_RETRY != 0 {
        EnqueuePolicy::Retry
    } else {
        EnqueuePolicy::Drop
    };

    let _ = context::with(|context| {
        let thread_id = context.thread_id();
        context.enqueue(policy, size, |writer| {
            record::RecordHeader { event: record::EventType::LogRecord }.encode(writer);
            record::LogRecordHeader { timestamp: now, thread_id }.encode(writer);
            writer.put_u64(record::metadata_to_bits(metadata));
            args.encode(writer);
        })
    });
}
