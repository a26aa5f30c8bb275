//! Process-wide registry of producer queues.
//!
//! Producers register from any thread; the backend is the sole iterator.
//! New consumer endpoints park in a spinlocked pending list until the next
//! drain pass merges them into the backend-owned active list. A consumer
//! that is both closed and fully drained is reaped during the merge.

use crate::error::Error;
use crate::sync::SpinLock;
use bytering::{ring_buffer, Consumer, Producer};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Default capacity hint for new producer rings (2 MiB).
pub(crate) const DEFAULT_CAPACITY_HINT: usize = 2 * 1024 * 1024;

pub(crate) struct QueueRegistry {
    /// Consumers registered since the last merge.
    pending: SpinLock<Vec<Consumer>>,
    /// Tells the backend to merge pending additions and reap closed queues.
    rebuild: AtomicBool,
    /// Capacity for rings created after the store.
    capacity_hint: AtomicUsize,
}

impl QueueRegistry {
    pub(crate) fn new() -> Self {
        Self {
            pending: SpinLock::new(Vec::new()),
            rebuild: AtomicBool::new(false),
            capacity_hint: AtomicUsize::new(DEFAULT_CAPACITY_HINT),
        }
    }

    pub(crate) fn capacity_hint(&self) -> usize {
        self.capacity_hint.load(Ordering::Relaxed)
    }

    /// Sets the capacity hint for producers created after the call.
    pub(crate) fn set_capacity_hint(&self, value: usize) -> Result<(), Error> {
        if value == 0 {
            return Err(Error::InvalidCapacityHint);
        }
        self.capacity_hint.store(value, Ordering::Relaxed);
        Ok(())
    }

    /// Allocates a ring, parks its consumer half for the backend, and hands
    /// the producer half to the calling thread.
    pub(crate) fn register_producer(&self, capacity_hint: Option<usize>) -> Producer {
        let hint = capacity_hint.unwrap_or_else(|| self.capacity_hint());
        let (producer, consumer) = ring_buffer(hint);

        self.pending.lock().push(consumer);
        self.rebuild.store(true, Ordering::Relaxed);

        producer
    }

    /// Backend-only: merge/reap when flagged, then run `f` over each active
    /// consumer. Observing a closed consumer re-arms the rebuild flag so a
    /// later merge removes it once drained.
    pub(crate) fn for_each_consumer<F>(&self, active: &mut Vec<Consumer>, mut f: F)
    where
        F: FnMut(&mut Consumer),
    {
        if self.rebuild.load(Ordering::Relaxed) {
            // Clear before the merge: a registration racing past this point
            // re-arms the flag and is picked up next pass.
            self.rebuild.store(false, Ordering::Relaxed);
            active.retain(|consumer| !(consumer.is_closed() && consumer.is_empty()));
            active.append(&mut self.pending.lock());
        }

        let mut any_closed = false;
        for consumer in active.iter_mut() {
            f(consumer);
            any_closed = any_closed || consumer.is_closed();
        }

        if any_closed {
            self.rebuild.store(true, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consumer_count(registry: &QueueRegistry, active: &mut Vec<Consumer>) -> usize {
        let mut count = 0;
        registry.for_each_consumer(active, |_| count += 1);
        count
    }

    #[test]
    fn registration_becomes_visible_on_next_pass() {
        let registry = QueueRegistry::new();
        let mut active = Vec::new();

        assert_eq!(consumer_count(&registry, &mut active), 0);

        let _p1 = registry.register_producer(Some(1024));
        assert_eq!(consumer_count(&registry, &mut active), 1);

        let _p2 = registry.register_producer(None);
        assert_eq!(consumer_count(&registry, &mut active), 2);
    }

    #[test]
    fn closed_and_drained_consumers_are_reaped() {
        let registry = QueueRegistry::new();
        let mut active = Vec::new();

        let mut producer = registry.register_producer(Some(1024));
        assert!(producer.write(b"last words"));
        drop(producer); // closes the ring

        // Pass 1: merged, drained, close observed -> flag re-armed.
        let mut drained = Vec::new();
        registry.for_each_consumer(&mut active, |consumer| {
            while let Some(entry) = consumer.fetch() {
                drained.push(entry.to_vec());
                consumer.consume();
            }
        });
        assert_eq!(drained, vec![b"last words".to_vec()]);
        assert_eq!(active.len(), 1);

        // Pass 2: rebuild reaps the closed, empty consumer.
        assert_eq!(consumer_count(&registry, &mut active), 0);
        assert!(active.is_empty());
    }

    #[test]
    fn closed_consumer_with_entries_survives_until_drained() {
        let registry = QueueRegistry::new();
        let mut active = Vec::new();

        let mut producer = registry.register_producer(Some(1024));
        assert!(producer.write(b"one"));
        assert!(producer.write(b"two"));
        drop(producer);

        // Observe the close without draining; the consumer must survive the
        // following rebuilds until it is empty.
        assert_eq!(consumer_count(&registry, &mut active), 1);
        assert_eq!(consumer_count(&registry, &mut active), 1);

        let mut drained = 0;
        registry.for_each_consumer(&mut active, |consumer| {
            while consumer.fetch().is_some() {
                consumer.consume();
                drained += 1;
            }
        });
        assert_eq!(drained, 2);

        assert_eq!(consumer_count(&registry, &mut active), 0);
    }

    #[test]
    fn capacity_hint_rejects_zero() {
        let registry = QueueRegistry::new();
        assert_eq!(registry.capacity_hint(), DEFAULT_CAPACITY_HINT);

        assert_eq!(registry.set_capacity_hint(0), Err(Error::InvalidCapacityHint));
        assert_eq!(registry.capacity_hint(), DEFAULT_CAPACITY_HINT);

        assert_eq!(registry.set_capacity_hint(4096), Ok(()));
        assert_eq!(registry.capacity_hint(), 4096);
    }
}
