//! Per-thread logging state.
//!
//! Each thread gets a context on its first log statement: a producer ring
//! registered with the backend's queue registry and a process-unique thread
//! id carried in every record header. The context closes its producer when
//! the thread exits; the backend drains what remains and then reaps the
//! queue.

use crate::backend;
use crate::codec::Writer;
use bytering::Producer;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread identities start at 1; 0 never appears in records.
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

/// What to do when the ring has no room for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnqueuePolicy {
    /// Fail immediately; the record is lost.
    Drop,
    /// Spin until the reservation succeeds.
    Retry,
}

pub(crate) struct ThreadContext {
    producer: Producer,
    thread_id: u64,
}

impl ThreadContext {
    fn new() -> Self {
        Self {
            producer: backend::instance().registry().register_producer(None),
            thread_id: NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    #[inline]
    pub(crate) fn thread_id(&self) -> u64 {
        self.thread_id
    }

    /// Reserves `size` bytes, lets `fill` write the record, and commits.
    ///
    /// Returns `false` when the record was dropped: no space under the Drop
    /// policy, or a record that cannot ever fit the ring (spinning for it
    /// would never end).
    pub(crate) fn enqueue<F>(&mut self, policy: EnqueuePolicy, size: usize, fill: F) -> bool
    where
        F: FnOnce(&mut Writer<'_>),
    {
        let mut fill = Some(fill);

        loop {
            if let Some(window) = self.producer.prepare(size) {
                let mut writer = Writer::new(window);
                if let Some(fill) = fill.take() {
                    fill(&mut writer);
                    debug_assert_eq!(writer.written(), size, "encoder must fill the reservation");
                }
            } else {
                match policy {
                    EnqueuePolicy::Drop => return false,
                    EnqueuePolicy::Retry => {
                        if !self.producer.wait_for_space(size) {
                            return false;
                        }
                        continue;
                    }
                }
            }

            self.producer.commit();
            return true;
        }
    }
}

impl Drop for ThreadContext {
    fn drop(&mut self) {
        self.producer.close();
    }
}

thread_local! {
    static CONTEXT: RefCell<Option<ThreadContext>> = const { RefCell::new(None) };
}

/// Runs `f` with the calling thread's context, creating it on first use.
///
/// Returns `None` when thread-local storage is already torn down (a log
/// statement in a late destructor); such records are dropped.
pub(crate) fn with<R>(f: impl FnOnce(&mut ThreadContext) -> R) -> Option<R> {
    CONTEXT
        .try_with(|cell| {
            let mut slot = cell.borrow_mut();
            let context = slot.get_or_insert_with(ThreadContext::new);
            f(context)
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_ids_are_unique() {
        let ids: Vec<u64> = (0..8)
            .map(|_| std::thread::spawn(|| with(|context| context.thread_id())))
            .map(|handle| handle.join().expect("id thread").expect("tls alive"))
            .collect();

        let mut deduped = ids.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), ids.len(), "duplicate thread ids: {ids:?}");
        assert!(ids.iter().all(|&id| id > 0));
    }

    #[test]
    fn drop_policy_fails_fast_when_full() {
        let mut context = ThreadContext {
            producer: backend::instance().registry().register_producer(Some(64)),
            thread_id: 0,
        };

        // Fill the ring, then observe an immediate drop.
        assert!(context.enqueue(EnqueuePolicy::Drop, 60, |writer| {
            writer.put_raw(&[0u8; 60]);
        }));
        assert!(!context.enqueue(EnqueuePolicy::Drop, 60, |writer| {
            writer.put_raw(&[0u8; 60]);
        }));
    }

    #[test]
    fn oversized_retry_record_is_dropped_not_spun() {
        let mut context = ThreadContext {
            producer: backend::instance().registry().register_producer(Some(64)),
            thread_id: 0,
        };

        assert!(!context.enqueue(EnqueuePolicy::Retry, 1024, |_| {}));
    }
}
