use std::hint;
use std::mem::ManuallyDrop;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_utils::CachePadded;

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// The ring exchanges variable-length byte entries between exactly one
// producer thread and one consumer thread.
//
// ## Sequence Numbers
//
// `head` and `tail` are unbounded u64 byte offsets, never wrapped. The
// buffer index is computed as `offset & mask` only on access, which rules
// out the ABA problem entirely: at one byte per nanosecond, wrap-around
// takes centuries.
//
// ## Memory Ordering Protocol
//
// **Producer (prepare/commit):**
// 1. Read its own `tail` mirror (plain field, single writer)
// 2. Check `cached_head`; if space looks insufficient, refresh it with an
//    Acquire load of `head` (synchronizes with the consumer's Release)
// 3. Write the length prefix and let the caller fill the entry bytes
//    (plain writes, protected by the protocol)
// 4. Store `tail` with Release, publishing prefix + payload at once
//
// **Consumer (fetch/consume):**
// 1. Read its own `head` mirror (plain field, single writer)
// 2. Check `cached_tail`; if the ring looks empty, refresh it with an
//    Acquire load of `tail` (synchronizes with the producer's Release)
// 3. Read the length prefix and hand out the payload slice
// 4. Store `head` with Release, returning the bytes to the producer
//
// An entry's bytes are visible to the consumer iff its length prefix is:
// both are published by the same Release store of `tail`.
//
// ## Framing & Wrap Handling
//
// Every entry is `[len: u32 LE][payload; len]`, always contiguous. When an
// entry does not fit between `tail` and the end of the buffer, the producer
// retires the remainder of the lap: it writes a PAD_MARKER length (when at
// least four bytes remain) and starts the entry at the buffer start. The
// consumer releases pad regions transparently inside `fetch`.
//
// =============================================================================

/// Size of the per-entry length prefix.
pub const LEN_PREFIX_SIZE: usize = 4;

/// Length-prefix value marking a retired region before a wrap.
const PAD_MARKER: u32 = u32::MAX;

struct Shared {
    /// Tail byte offset (written by producer, read by consumer)
    tail: CachePadded<AtomicU64>,
    /// Head byte offset (written by consumer, read by producer)
    head: CachePadded<AtomicU64>,
    /// Set by either endpoint; observable by both
    closed: AtomicBool,
    /// Ring storage (fixed power-of-two capacity)
    buffer: *mut u8,
    capacity: usize,
    mask: usize,
}

// SAFETY: the buffer pointer is owned by Shared for its whole lifetime and
// every byte region is accessed by at most one side at a time per the
// head/tail protocol above.
unsafe impl Send for Shared {}
unsafe impl Sync for Shared {}

impl Drop for Shared {
    fn drop(&mut self) {
        // SAFETY: buffer was leaked out of a Vec<u8> with len == capacity
        // in ring_buffer(); reconstituting it here frees the allocation.
        unsafe {
            drop(Vec::from_raw_parts(self.buffer, self.capacity, self.capacity));
        }
    }
}

/// Creates a bounded SPSC byte ring with at least `capacity_hint` bytes.
///
/// The capacity is rounded up to the next power of two.
///
/// # Panics
///
/// Panics if `capacity_hint` is zero or the rounded capacity does not fit
/// a `u32` length prefix.
pub fn ring_buffer(capacity_hint: usize) -> (Producer, Consumer) {
    assert!(capacity_hint > 0, "capacity must be non-zero");
    let capacity = capacity_hint.next_power_of_two();
    assert!(capacity <= u32::MAX as usize, "capacity out of range");

    let mut storage = ManuallyDrop::new(vec![0u8; capacity]);
    let buffer = storage.as_mut_ptr();

    let shared = Arc::new(Shared {
        tail: CachePadded::new(AtomicU64::new(0)),
        head: CachePadded::new(AtomicU64::new(0)),
        closed: AtomicBool::new(false),
        buffer,
        capacity,
        mask: capacity - 1,
    });

    (
        Producer {
            shared: Arc::clone(&shared),
            tail: 0,
            cached_head: 0,
            pending: None,
        },
        Consumer {
            shared,
            head: 0,
            cached_tail: 0,
            fetched: None,
        },
    )
}

#[inline]
unsafe fn write_u32(dst: *mut u8, value: u32) {
    let bytes = value.to_le_bytes();
    ptr::copy_nonoverlapping(bytes.as_ptr(), dst, LEN_PREFIX_SIZE);
}

#[inline]
unsafe fn read_u32(src: *const u8) -> u32 {
    let mut bytes = [0u8; LEN_PREFIX_SIZE];
    ptr::copy_nonoverlapping(src, bytes.as_mut_ptr(), LEN_PREFIX_SIZE);
    u32::from_le_bytes(bytes)
}

/// Producer endpoint. Must stay on a single thread once in use.
pub struct Producer {
    shared: Arc<Shared>,
    /// Local tail mirror (producer is the only tail writer)
    tail: u64,
    /// Cached view of head (avoids cross-core reads)
    cached_head: u64,
    /// End offset of a prepared-but-uncommitted entry
    pending: Option<u64>,
}

impl Producer {
    /// Reserves a contiguous window of `size` bytes plus the length prefix.
    ///
    /// Returns `None` without blocking when free space does not permit the
    /// reservation (or when `size` can never fit the ring). A successful
    /// `prepare` must be followed by [`commit`](Self::commit) before the
    /// entry becomes visible; preparing again first abandons the window.
    pub fn prepare(&mut self, size: usize) -> Option<&mut [u8]> {
        let shared = &*self.shared;
        let total = LEN_PREFIX_SIZE + size;
        if total > shared.capacity {
            return None;
        }

        let idx = (self.tail as usize) & shared.mask;
        let room_to_end = shared.capacity - idx;
        let skip = if room_to_end >= total { 0 } else { room_to_end };
        let needed = skip + total;

        // Fast path: judge free space against the cached head.
        let mut free = shared.capacity - (self.tail.wrapping_sub(self.cached_head) as usize);
        if free < needed {
            // Slow path: refresh the cache.
            self.cached_head = shared.head.load(Ordering::Acquire);
            free = shared.capacity - (self.tail.wrapping_sub(self.cached_head) as usize);
            if free < needed {
                return None;
            }
        }

        if skip > 0 && room_to_end >= LEN_PREFIX_SIZE {
            // SAFETY: idx..idx+4 is beyond head (free space checked above)
            // and the producer owns all bytes in [tail, head + capacity).
            unsafe { write_u32(shared.buffer.add(idx), PAD_MARKER) };
        }

        let start = self.tail.wrapping_add(skip as u64);
        let start_idx = (start as usize) & shared.mask;

        // SAFETY: start_idx..start_idx+total is contiguous (skip guarantees
        // it), within bounds, and owned by the producer until commit.
        unsafe { write_u32(shared.buffer.add(start_idx), size as u32) };
        self.pending = Some(start.wrapping_add(total as u64));

        // SAFETY: same region as above; the slice borrow is tied to &mut
        // self, so no second window can be prepared while it lives.
        Some(unsafe {
            std::slice::from_raw_parts_mut(shared.buffer.add(start_idx + LEN_PREFIX_SIZE), size)
        })
    }

    /// Returns `true` when an entry of `size` payload bytes could ever be
    /// accepted from the producer's current position.
    ///
    /// With no intervening commit the wrap padding requirement is fixed, so
    /// a `false` here is permanent: retrying the same reservation can never
    /// succeed no matter how much the consumer drains.
    pub fn fits(&self, size: usize) -> bool {
        let shared = &*self.shared;
        let total = LEN_PREFIX_SIZE + size;
        if total > shared.capacity {
            return false;
        }
        let idx = (self.tail as usize) & shared.mask;
        let room_to_end = shared.capacity - idx;
        let skip = if room_to_end >= total { 0 } else { room_to_end };
        skip + total <= shared.capacity
    }

    /// Waits until an entry of `size` payload bytes can be reserved.
    ///
    /// Backs the never-drop write path: spins with PAUSE-hint bursts that
    /// double per probe while the wait is young, then switches to scheduler
    /// yields once the consumer has clearly stalled, so a descheduled
    /// consumer can run. Returns `false` instead of waiting when the entry
    /// can never fit from the current position (see [`fits`](Self::fits))
    /// or when the ring closes mid-wait; otherwise a `true` guarantees the
    /// next [`prepare`](Self::prepare) of `size` bytes succeeds.
    pub fn wait_for_space(&mut self, size: usize) -> bool {
        // Burst lengths cap at 2^6 PAUSEs; past ten probes the consumer is
        // not merely slow, so burning the core stops helping.
        const BURST_SHIFT_CAP: u32 = 6;
        const BURSTS_BEFORE_YIELD: u32 = 10;

        if !self.fits(size) {
            return false;
        }

        let shared = &*self.shared;
        let total = LEN_PREFIX_SIZE + size;
        let idx = (self.tail as usize) & shared.mask;
        let room_to_end = shared.capacity - idx;
        let skip = if room_to_end >= total { 0 } else { room_to_end };
        let needed = skip + total;

        let mut probe = 0u32;
        loop {
            self.cached_head = shared.head.load(Ordering::Acquire);
            let free = shared.capacity - (self.tail.wrapping_sub(self.cached_head) as usize);
            if free >= needed {
                return true;
            }
            if shared.closed.load(Ordering::Acquire) {
                return false;
            }

            if probe < BURSTS_BEFORE_YIELD {
                for _ in 0..(1u32 << probe.min(BURST_SHIFT_CAP)) {
                    hint::spin_loop();
                }
                probe += 1;
            } else {
                thread::yield_now();
            }
        }
    }

    /// Publishes the last prepared entry. No effect without a prior
    /// successful [`prepare`](Self::prepare).
    #[inline]
    pub fn commit(&mut self) {
        if let Some(end) = self.pending.take() {
            self.tail = end;
            self.shared.tail.store(end, Ordering::Release);
        }
    }

    /// Copies `payload` in as one entry. Returns `false` when full.
    pub fn write(&mut self, payload: &[u8]) -> bool {
        if let Some(window) = self.prepare(payload.len()) {
            window.copy_from_slice(payload);
        } else {
            return false;
        }
        self.commit();
        true
    }

    /// Bytes currently in flight, framing included.
    pub fn len(&self) -> usize {
        self.tail.wrapping_sub(self.shared.head.load(Ordering::Relaxed)) as usize
    }

    /// Returns `true` when nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ring capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Marks the ring closed. The consumer may still drain what remains.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
    }

    /// Returns `true` once either endpoint closed the ring.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.close();
    }
}

// SAFETY: the endpoint owns its side of the protocol; moving it between
// threads is fine as long as it is used from one thread at a time, which
// &mut self enforces.
unsafe impl Send for Producer {}

/// Consumer endpoint. Must stay on a single thread once in use.
pub struct Consumer {
    shared: Arc<Shared>,
    /// Local head mirror (consumer is the only head writer)
    head: u64,
    /// Cached view of tail (avoids cross-core reads)
    cached_tail: u64,
    /// End offset of the last fetched entry
    fetched: Option<u64>,
}

impl Consumer {
    /// Returns the next committed entry's payload, if any.
    ///
    /// The returned view stays valid until [`consume`](Self::consume) or
    /// the next `fetch`. Pad regions left by wrapping writers are released
    /// transparently.
    pub fn fetch(&mut self) -> Option<&[u8]> {
        loop {
            let mut avail = self.cached_tail.wrapping_sub(self.head) as usize;
            if avail == 0 {
                self.cached_tail = self.shared.tail.load(Ordering::Acquire);
                avail = self.cached_tail.wrapping_sub(self.head) as usize;
                if avail == 0 {
                    return None;
                }
            }

            let idx = (self.head as usize) & self.shared.mask;
            let room_to_end = self.shared.capacity - idx;

            if room_to_end < LEN_PREFIX_SIZE {
                // Too narrow for a prefix: the producer skipped it silently.
                self.release(room_to_end);
                continue;
            }

            // SAFETY: avail > 0 means the producer committed an entry (or a
            // pad marker) starting at idx; the Acquire load of tail above
            // made its bytes visible.
            let len = unsafe { read_u32(self.shared.buffer.add(idx)) };
            if len == PAD_MARKER {
                self.release(room_to_end);
                continue;
            }

            let len = len as usize;
            self.fetched = Some(self.head.wrapping_add((LEN_PREFIX_SIZE + len) as u64));

            // SAFETY: the payload is contiguous at idx + prefix (the
            // producer never frames across the wrap) and stays unwritten
            // until head advances past it.
            return Some(unsafe {
                std::slice::from_raw_parts(self.shared.buffer.add(idx + LEN_PREFIX_SIZE), len)
            });
        }
    }

    /// Releases the last fetched entry back to the producer. No effect
    /// without a prior successful [`fetch`](Self::fetch).
    #[inline]
    pub fn consume(&mut self) {
        if let Some(end) = self.fetched.take() {
            self.head = end;
            self.shared.head.store(end, Ordering::Release);
        }
    }

    #[inline]
    fn release(&mut self, n: usize) {
        self.head = self.head.wrapping_add(n as u64);
        self.shared.head.store(self.head, Ordering::Release);
    }

    /// Bytes currently in flight, framing included.
    pub fn len(&self) -> usize {
        self.shared
            .tail
            .load(Ordering::Acquire)
            .wrapping_sub(self.head) as usize
    }

    /// Returns `true` when every committed entry has been consumed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ring capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Marks the ring closed.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
    }

    /// Returns `true` once either endpoint closed the ring.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

// SAFETY: see Producer.
unsafe impl Send for Consumer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_commit_fetch_consume() {
        let (mut producer, mut consumer) = ring_buffer(64);

        let window = producer.prepare(5).expect("space for one entry");
        window.copy_from_slice(b"hello");
        producer.commit();

        assert_eq!(consumer.fetch().expect("entry committed"), b"hello");
        consumer.consume();
        assert!(consumer.fetch().is_none());
        assert!(consumer.is_empty());
    }

    #[test]
    fn uncommitted_entry_is_invisible() {
        let (mut producer, mut consumer) = ring_buffer(64);

        producer.prepare(8).expect("space");
        assert!(consumer.fetch().is_none());

        producer.commit();
        assert_eq!(consumer.fetch().expect("committed").len(), 8);
    }

    #[test]
    fn commit_without_prepare_is_noop() {
        let (mut producer, mut consumer) = ring_buffer(64);
        producer.commit();
        assert!(consumer.fetch().is_none());
        assert_eq!(producer.len(), 0);
    }

    #[test]
    fn rejects_when_full() {
        let (mut producer, mut consumer) = ring_buffer(64);

        // 4-byte prefix + 28 bytes payload, twice, fills all 64 bytes.
        assert!(producer.write(&[1u8; 28]));
        assert!(producer.write(&[2u8; 28]));
        assert!(producer.prepare(1).is_none());

        consumer.fetch().expect("first entry");
        consumer.consume();
        assert!(producer.write(&[3u8; 20]));
    }

    #[test]
    fn oversized_entry_never_fits() {
        let (mut producer, _consumer) = ring_buffer(64);
        assert!(producer.prepare(64).is_none());
        assert!(producer.prepare(61).is_none());
        assert!(producer.prepare(60).is_some());
    }

    #[test]
    fn fits_accounts_for_wrap_padding() {
        let (mut producer, mut consumer) = ring_buffer(64);
        assert!(producer.fits(60));
        assert!(!producer.fits(61));

        // Advance the tail so a full-capacity entry would need padding it
        // can never reclaim.
        assert!(producer.write(&[0u8; 12]));
        consumer.fetch().expect("entry");
        consumer.consume();
        assert!(!producer.fits(60), "60 + prefix cannot fit past offset 16");
        assert!(producer.fits(40));
    }

    #[test]
    fn wraps_preserving_order_and_content() {
        let (mut producer, mut consumer) = ring_buffer(64);

        // Drive head/tail around the ring several laps with entries whose
        // sizes force pad-marker wraps.
        let mut next_write = 0u8;
        let mut next_read = 0u8;
        for round in 0..200 {
            let size = 1 + (round % 23);
            let payload: Vec<u8> = (0..size)
                .map(|_| {
                    let byte = next_write;
                    next_write = next_write.wrapping_add(1);
                    byte
                })
                .collect();
            while !producer.write(&payload) {
                let entry = consumer.fetch().expect("ring full implies entries");
                for &byte in entry {
                    assert_eq!(byte, next_read);
                    next_read = next_read.wrapping_add(1);
                }
                consumer.consume();
            }
        }

        while let Some(entry) = consumer.fetch().map(<[u8]>::to_vec) {
            for byte in entry {
                assert_eq!(byte, next_read);
                next_read = next_read.wrapping_add(1);
            }
            consumer.consume();
        }
        assert_eq!(next_read, next_write);
    }

    #[test]
    fn wait_for_space_succeeds_once_drained() {
        let (mut producer, mut consumer) = ring_buffer(64);
        assert!(producer.write(&[1u8; 28]));
        assert!(producer.write(&[2u8; 28]));
        assert!(producer.prepare(28).is_none());

        let writer = thread::spawn(move || {
            assert!(producer.wait_for_space(28), "consumer drains, ring stays open");
            assert!(producer.write(&[3u8; 28]), "wait_for_space guarantees the reservation");
        });

        thread::sleep(std::time::Duration::from_millis(20));
        consumer.fetch().expect("first entry");
        consumer.consume();
        writer.join().expect("waiting writer");

        assert_eq!(consumer.fetch().expect("second entry"), &[2u8; 28]);
        consumer.consume();
        assert_eq!(consumer.fetch().expect("third entry"), &[3u8; 28]);
    }

    #[test]
    fn wait_for_space_gives_up_when_closed_or_impossible() {
        let (mut producer, consumer) = ring_buffer(64);
        assert!(!producer.wait_for_space(61), "can never fit");

        assert!(producer.write(&[0u8; 56]));
        consumer.close();
        assert!(!producer.wait_for_space(56), "closed while full");
    }

    #[test]
    fn close_is_visible_from_both_ends() {
        let (producer, consumer) = ring_buffer(64);
        assert!(!consumer.is_closed());
        producer.close();
        assert!(consumer.is_closed());
        assert!(producer.is_closed());
    }

    #[test]
    fn producer_drop_closes() {
        let (mut producer, mut consumer) = ring_buffer(64);
        assert!(producer.write(b"tail"));
        drop(producer);

        assert!(consumer.is_closed());
        // Remaining entries still drain after close.
        assert_eq!(consumer.fetch().expect("entry survives close"), b"tail");
        consumer.consume();
        assert!(consumer.is_empty());
    }
}
