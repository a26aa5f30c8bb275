//! Bounded SPSC byte ring exchanging variable-length records.
//!
//! A fixed-capacity single-producer single-consumer queue over raw bytes.
//! Entries are framed with a 4-byte length prefix, reserved as contiguous
//! windows (`prepare`), written in place, and published atomically
//! (`commit`). The consumer side observes whole entries only (`fetch` /
//! `consume`). Neither side ever blocks.
//!
//! # Key Features
//!
//! - Cache-line separated head/tail indices (no false sharing)
//! - Producer/consumer cached counterparts to minimise cross-core traffic
//! - Zero-copy prepare/commit and fetch/consume API
//! - Variable-length framing with transparent wrap handling
//! - Built-in escalating spin-wait for writers that must not drop
//!
//! # Example
//!
//! ```
//! let (mut producer, mut consumer) = bytering::ring_buffer(4096);
//!
//! if let Some(window) = producer.prepare(5) {
//!     window.copy_from_slice(b"hello");
//! }
//! producer.commit();
//!
//! let entry = consumer.fetch().expect("one committed entry");
//! assert_eq!(entry, b"hello");
//! consumer.consume();
//! ```

mod ring;

pub use ring::{ring_buffer, Consumer, Producer, LEN_PREFIX_SIZE};
