//! Property-based tests for the byte ring invariants.
//!
//! Coverage:
//! - FIFO byte-exact round trip for arbitrary payload sequences
//! - Bounded occupancy (framed in-flight bytes never exceed capacity)
//! - No drop while total framed payload fits the capacity

use bytering::{ring_buffer, LEN_PREFIX_SIZE};
use proptest::prelude::*;

proptest! {
    /// Entries come out exactly once, in order, byte for byte.
    #[test]
    fn prop_fifo_round_trip(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..128), 1..64),
    ) {
        let (mut producer, mut consumer) = ring_buffer(8192);
        let mut expected = std::collections::VecDeque::new();

        for payload in &payloads {
            while !producer.write(payload) {
                let entry = consumer.fetch().expect("full ring holds entries");
                prop_assert_eq!(entry, expected.pop_front().expect("producer ahead of consumer"));
                consumer.consume();
            }
            expected.push_back(payload.clone());
        }

        while let Some(entry) = consumer.fetch().map(<[u8]>::to_vec) {
            prop_assert_eq!(entry, expected.pop_front().expect("no spurious entries"));
            consumer.consume();
        }
        prop_assert!(expected.is_empty(), "{} entries lost", expected.len());
    }

    /// In-flight bytes stay within capacity after any operation sequence.
    #[test]
    fn prop_bounded_occupancy(
        sizes in prop::collection::vec(0usize..64, 1..200),
        drain_every in 1usize..8,
    ) {
        let (mut producer, mut consumer) = ring_buffer(1024);
        let capacity = producer.capacity();

        for (round, &size) in sizes.iter().enumerate() {
            let _ = producer.prepare(size).map(|window| window.fill(0xAB));
            producer.commit();
            prop_assert!(producer.len() <= capacity,
                "occupancy {} exceeds capacity {}", producer.len(), capacity);

            if round % drain_every == 0 {
                if consumer.fetch().is_some() {
                    consumer.consume();
                }
                prop_assert!(consumer.len() <= capacity);
            }
        }
    }

    /// Sequential fill: while framed payload fits, nothing is rejected.
    #[test]
    fn prop_no_drop_within_capacity(sizes in prop::collection::vec(1usize..32, 1..20)) {
        let (mut producer, _consumer) = ring_buffer(4096);
        let framed: usize = sizes.iter().map(|s| s + LEN_PREFIX_SIZE).sum();
        prop_assume!(framed <= producer.capacity());

        for &size in &sizes {
            prop_assert!(producer.write(&vec![0x5A; size]), "rejected within capacity");
        }
    }
}
