//! Bundled sink implementations.

mod daily_file;
mod stdout;

pub use daily_file::DailyFileSink;
pub use stdout::StdoutSink;
