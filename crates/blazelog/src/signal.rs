//! Shutdown hooks: process exit and fatal signals.
//!
//! Both hooks funnel into `Backend::stop`, which drains every committed
//! record before the process disappears. The fatal-signal handler keeps its
//! own body async-signal-safe (static message, `write(2)`, atomics) before
//! delegating to the stop path; an atomic counter elects the first
//! signalled thread to perform the sleep-and-drain while later signals
//! return immediately.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct FatalSignal {
    signo: libc::c_int,
    name: &'static str,
    banner: &'static [u8],
}

const FATAL_SIGNALS: [FatalSignal; 5] = [
    FatalSignal {
        signo: libc::SIGSEGV,
        name: "SIGSEGV",
        banner: b"blazelog: caught signal SIGSEGV\n",
    },
    FatalSignal {
        signo: libc::SIGILL,
        name: "SIGILL",
        banner: b"blazelog: caught signal SIGILL\n",
    },
    FatalSignal {
        signo: libc::SIGFPE,
        name: "SIGFPE",
        banner: b"blazelog: caught signal SIGFPE\n",
    },
    FatalSignal {
        signo: libc::SIGABRT,
        name: "SIGABRT",
        banner: b"blazelog: caught signal SIGABRT\n",
    },
    FatalSignal {
        signo: libc::SIGBUS,
        name: "SIGBUS",
        banner: b"blazelog: caught signal SIGBUS\n",
    },
];

static SIGNALLED: AtomicUsize = AtomicUsize::new(0);

/// `true` for exactly the first caller across all threads.
fn first_signalled() -> bool {
    SIGNALLED.fetch_add(1, Ordering::Relaxed) == 0
}

extern "C" fn fatal_signal_handler(
    signo: libc::c_int,
    _info: *mut libc::siginfo_t,
    _ucontext: *mut libc::c_void,
) {
    let banner = FATAL_SIGNALS
        .iter()
        .find(|signal| signal.signo == signo)
        .map_or(&b"blazelog: caught fatal signal\n"[..], |signal| signal.banner);
    // SAFETY: write(2) is async-signal-safe; the banner is static.
    unsafe {
        libc::write(libc::STDERR_FILENO, banner.as_ptr().cast(), banner.len());
    }

    if !first_signalled() {
        return;
    }

    // Give the crashing thread time to commit its last records before the
    // terminal drain.
    std::thread::sleep(Duration::from_secs(30));
    crate::backend::instance().stop();
}

pub(crate) fn install_failure_handlers() {
    for signal in &FATAL_SIGNALS {
        // SAFETY: a zeroed sigaction with mask, flags, and handler filled in
        // is a valid argument; the handler stays alive for the program.
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            libc::sigemptyset(&mut action.sa_mask);
            action.sa_flags = libc::SA_SIGINFO;
            action.sa_sigaction = fatal_signal_handler as usize;
            if libc::sigaction(signal.signo, &action, std::ptr::null_mut()) == -1 {
                eprintln!("blazelog: can't install signal handler for {}", signal.name);
            }
        }
    }
}

extern "C" fn atexit_stop() {
    crate::backend::instance().stop();
}

pub(crate) fn install_atexit_hook() {
    // SAFETY: registering an extern "C" fn with atexit.
    let rc = unsafe { libc::atexit(atexit_stop) };
    if rc != 0 {
        eprintln!("blazelog: can't install at-exit handler");
    }
}
