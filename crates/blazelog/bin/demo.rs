//! Quick demo: start the backend on the stdout sink, log from a few
//! threads, and shut down cleanly.

use blazelog::{sinks::StdoutSink, BackendOptions, LogLevel};
use std::thread;
use std::time::Duration;

fn main() {
    blazelog::set_log_level(LogLevel::Trace);
    blazelog::start_backend(
        Box::new(StdoutSink::new()),
        BackendOptions {
            bind_to_core: None,
            sleep_duration: Duration::from_millis(10),
        },
    );

    blazelog::log_notice!("demo starting, level {}", "trace");

    let workers: Vec<_> = (0u32..4)
        .map(|worker| {
            thread::spawn(move || {
                for round in 0u32..10 {
                    blazelog::log_debug_retry!("worker {} round {}", worker, round);
                }
                blazelog::log_trace!("worker {} done", worker);
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker thread");
    }

    blazelog::log_warning!("shutting down after {} workers", 4u32);
    blazelog::stop_backend();
}
