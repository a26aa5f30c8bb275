//! Backend singleton and its drain thread.
//!
//! One process-wide backend owns the current log level, the queue registry,
//! and at most one worker thread. The worker drains every registered
//! consumer round-robin, reconstructs records, formats them lazily, and
//! forwards finished lines to the sink. Start/stop transitions are
//! serialised by a mutex; readiness is handed to `start` through a
//! sequentially-consistent flag.

use crate::args::ArgStore;
use crate::clock::TimeResolver;
use crate::codec::Reader;
use crate::fmt;
use crate::level::LogLevel;
use crate::rate_limit::LoopRateLimit;
use crate::record::{self, EventType, LogRecordHeader};
use crate::registry::QueueRegistry;
use crate::signal;
use crate::sink::Sink;
use bytering::Consumer;
use crossbeam_utils::CachePadded;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Once, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Backend thread options.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    /// Pin the backend thread to this core.
    pub bind_to_core: Option<u16>,
    /// Sleep duration when a pass leaves no remaining work.
    pub sleep_duration: Duration,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            bind_to_core: None,
            sleep_duration: Duration::from_millis(100),
        }
    }
}

pub(crate) struct Backend {
    /// Current verbosity level, on its own cache line: every log statement
    /// reads it.
    log_level: CachePadded<AtomicU8>,
    registry: QueueRegistry,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<Vec<Consumer>>>>,
    /// Active consumers between backend sessions; a live producer's ring
    /// must survive stop/start cycles.
    parked: Mutex<Vec<Consumer>>,
    hooks_installed: Once,
}

static BACKEND: OnceLock<Backend> = OnceLock::new();

#[inline]
pub(crate) fn instance() -> &'static Backend {
    BACKEND.get_or_init(Backend::new)
}

impl Backend {
    fn new() -> Self {
        Self {
            log_level: CachePadded::new(AtomicU8::new(LogLevel::Notice as u8)),
            registry: QueueRegistry::new(),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            parked: Mutex::new(Vec::new()),
            hooks_installed: Once::new(),
        }
    }

    pub(crate) fn registry(&self) -> &QueueRegistry {
        &self.registry
    }

    #[inline]
    pub(crate) fn log_level(&self) -> LogLevel {
        LogLevel::from_bits(self.log_level.load(Ordering::Relaxed))
    }

    #[inline]
    pub(crate) fn set_log_level(&self, value: LogLevel) {
        self.log_level.store(value as u8, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn should_log(&self, value: LogLevel) -> bool {
        value <= self.log_level()
    }

    #[inline]
    pub(crate) fn is_ready(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn start(&'static self, sink: Box<dyn Sink>, options: BackendOptions) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);

        self.hooks_installed.call_once(|| {
            signal::install_atexit_hook();
            signal::install_failure_handlers();
        });

        if worker.is_some() {
            eprintln!("blazelog: backend already started");
            return;
        }

        let running = Arc::clone(&self.running);
        let registry = &self.registry;
        let active = std::mem::take(
            &mut *self.parked.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let spawned = thread::Builder::new()
            .name("blazelog-backend".into())
            .spawn(move || worker_main(registry, &running, active, sink, &options));

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                // Synchronous handshake: hold start until the worker
                // observes itself running.
                while !self.running.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_micros(100));
                }
            }
            Err(error) => eprintln!("blazelog: failed to spawn backend thread: {error}"),
        }
    }

    pub(crate) fn stop(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);

        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = worker.take() {
            match handle.join() {
                Ok(active) => {
                    *self.parked.lock().unwrap_or_else(PoisonError::into_inner) = active;
                }
                Err(_) => eprintln!("blazelog: backend thread panicked"),
            }
        }
    }
}

fn worker_main(
    registry: &'static QueueRegistry,
    running: &AtomicBool,
    mut active: Vec<Consumer>,
    mut sink: Box<dyn Sink>,
    options: &BackendOptions,
) -> Vec<Consumer> {
    if let Some(core) = options.bind_to_core {
        if let Err(error) = pin_current_thread(core) {
            eprintln!("blazelog: failed to pin backend thread to core {core}: {error}");
        }
    }

    running.store(true, Ordering::SeqCst);

    let mut resolver = TimeResolver::new();
    let mut format_buffer = String::new();
    let mut rate_limit = LoopRateLimit::new(options.sleep_duration);

    while running.load(Ordering::Relaxed) {
        let pass = panic::catch_unwind(AssertUnwindSafe(|| {
            drain_pass(registry, &mut active, sink.as_mut(), &mut resolver, &mut format_buffer);
        }));
        if let Err(payload) = pass {
            eprintln!("blazelog: backend thread error: {}", panic_message(&payload));
        }
        rate_limit.sleep();
    }

    // Terminal drain: no committed record may be lost across shutdown.
    while drain_pass(registry, &mut active, sink.as_mut(), &mut resolver, &mut format_buffer) > 0 {}

    active
}

/// One pass over every consumer, emptying each before moving on. Returns
/// the number of records processed.
fn drain_pass(
    registry: &QueueRegistry,
    active: &mut Vec<Consumer>,
    sink: &mut dyn Sink,
    resolver: &mut TimeResolver,
    format_buffer: &mut String,
) -> usize {
    let mut count = 0usize;
    let mut do_flush = false;

    registry.for_each_consumer(active, |consumer| loop {
        let Some(entry) = consumer.fetch() else {
            break;
        };
        count += 1;
        if process_record(entry, sink, resolver, format_buffer) {
            do_flush = true;
        }
        consumer.consume();
    });

    if do_flush {
        sink.flush();
    }
    count
}

/// Decodes one committed entry and forwards its lines to the sink.
/// Returns `true` when the entry was a log record.
fn process_record(
    entry: &[u8],
    sink: &mut dyn Sink,
    resolver: &mut TimeResolver,
    format_buffer: &mut String,
) -> bool {
    let mut reader = Reader::new(entry);

    let Some(event) = EventType::from_bits(reader.get_u8()) else {
        return false;
    };
    match event {
        EventType::LogRecord => {}
    }

    let header = LogRecordHeader::decode(&mut reader);
    // SAFETY: the pointer was packed from a &'static RecordMetadata by the
    // frontend; call-site metadata lives for the program lifetime.
    let metadata = unsafe { record::metadata_from_bits(reader.get_u64()) };

    let mut store = ArgStore::default();
    (metadata.decode_args)(&mut reader, &mut store);

    format_buffer.clear();
    fmt::vformat(format_buffer, metadata.format, &store);

    let timestamp = resolver.resolve(header.timestamp);
    for line in format_buffer.split('\n').filter(|line| !line.is_empty()) {
        sink.write(&metadata.location, metadata.level, timestamp, header.thread_id, line);
    }

    true
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(target_os = "linux")]
fn pin_current_thread(core: u16) -> std::io::Result<()> {
    // SAFETY: the cpu_set_t is zero-initialised and manipulated with the
    // libc helpers before being handed to sched_setaffinity for the calling
    // thread (pid 0).
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core as usize, &mut set);
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn pin_current_thread(_core: u16) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "thread affinity is not supported on this platform",
    ))
}
