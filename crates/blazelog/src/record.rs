//! On-wire record protocol.
//!
//! A committed ring entry is laid out as:
//!
//! ```text
//! [RecordHeader][LogRecordHeader][metadata pointer][arg0][arg1]…
//! ```
//!
//! The metadata pointer refers to an immutable per-call-site descriptor
//! with static storage, so it can cross the ring as a plain integer and is
//! always valid when the backend dereferences it.

use crate::args::{ArgStore, ArgTuple};
use crate::clock::Timestamp;
use crate::codec::{Reader, Writer};
use crate::level::LogLevel;
use std::sync::OnceLock;

/// Record flag: never drop at enqueue time; spin until the ring accepts.
pub const FLAG_RETRY: u32 = 1 << 0;

/// Call-site source location captured by the logging macros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
}

/// Pops each argument of a record in caller-declared order.
pub type DecodeArgsFn = for<'a> fn(&mut Reader<'a>, &mut ArgStore<'a>);

/// Immutable log record descriptor, one per call site.
///
/// Created on the first hit of a call site and never dropped; every record
/// emitted from that site references it by pointer.
#[derive(Debug)]
pub struct RecordMetadata {
    pub location: SourceLocation,
    pub level: LogLevel,
    pub format: &'static str,
    pub flags: u32,
    pub decode_args: DecodeArgsFn,
}

/// Backing cell for one call site's [`RecordMetadata`].
///
/// The logging macros expand to a `static` of this type per call site;
/// `get_or_init` monomorphises the decode function over the argument tuple
/// type, which is how the decoder knows the types without inspecting bytes.
pub struct MetadataCell(OnceLock<RecordMetadata>);

impl MetadataCell {
    #[must_use]
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    pub fn get_or_init<A: ArgTuple>(
        &self,
        location: SourceLocation,
        level: LogLevel,
        flags: u32,
        format: &'static str,
        _args: &A,
    ) -> &RecordMetadata {
        self.0.get_or_init(|| RecordMetadata {
            location,
            level,
            format,
            flags,
            decode_args: A::decode_args,
        })
    }
}

impl Default for MetadataCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Event kind carried in front of every entry. A single variant today;
/// the byte exists so other event kinds can join the stream later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventType {
    LogRecord = 0,
}

impl EventType {
    pub(crate) fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::LogRecord),
            _ => None,
        }
    }
}

/// Leading event header of every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub event: EventType,
}

impl RecordHeader {
    pub(crate) const ENCODED_SIZE: usize = 1;

    pub(crate) fn encode(self, writer: &mut Writer<'_>) {
        writer.put_u8(self.event as u8);
    }
}

/// Per-record header: capture timestamp and producing thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecordHeader {
    pub timestamp: Timestamp,
    pub thread_id: u64,
}

impl LogRecordHeader {
    pub(crate) const ENCODED_SIZE: usize = 16;

    pub(crate) fn encode(self, writer: &mut Writer<'_>) {
        writer.put_i64(self.timestamp);
        writer.put_u64(self.thread_id);
    }

    pub(crate) fn decode(reader: &mut Reader<'_>) -> Self {
        Self {
            timestamp: reader.get_i64(),
            thread_id: reader.get_u64(),
        }
    }
}

pub(crate) const METADATA_PTR_SIZE: usize = 8;

/// Fixed portion of every record: event header, record header, metadata
/// pointer. Argument bytes follow.
pub(crate) const RECORD_PREFIX_SIZE: usize =
    RecordHeader::ENCODED_SIZE + LogRecordHeader::ENCODED_SIZE + METADATA_PTR_SIZE;

#[inline]
pub(crate) fn metadata_to_bits(metadata: &'static RecordMetadata) -> u64 {
    metadata as *const RecordMetadata as u64
}

/// Reconstructs the metadata reference transported by [`metadata_to_bits`].
///
/// # Safety
///
/// `bits` must originate from `metadata_to_bits` on this process's own
/// `&'static RecordMetadata`; call-site metadata is never deallocated, so
/// the reference is valid for the remaining program lifetime.
#[inline]
pub(crate) unsafe fn metadata_from_bits(bits: u64) -> &'static RecordMetadata {
    &*(bits as *const RecordMetadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_round_trip() {
        let mut buf = [0u8; RECORD_PREFIX_SIZE];
        let mut writer = Writer::new(&mut buf);
        RecordHeader { event: EventType::LogRecord }.encode(&mut writer);
        LogRecordHeader { timestamp: 1_700_000_000_000_000_123, thread_id: 7 }.encode(&mut writer);
        assert_eq!(writer.written(), RecordHeader::ENCODED_SIZE + LogRecordHeader::ENCODED_SIZE);

        let mut reader = Reader::new(&buf);
        assert_eq!(EventType::from_bits(reader.get_u8()), Some(EventType::LogRecord));
        let header = LogRecordHeader::decode(&mut reader);
        assert_eq!(header.timestamp, 1_700_000_000_000_000_123);
        assert_eq!(header.thread_id, 7);
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        assert_eq!(EventType::from_bits(0xFF), None);
    }

    #[test]
    fn metadata_cell_initialises_once() {
        static CELL: MetadataCell = MetadataCell::new();
        let location = SourceLocation { file: "lib.rs", line: 10 };

        let first = CELL.get_or_init(location, LogLevel::Notice, 0, "x = {}", &(&1u32,));
        let second = CELL.get_or_init(location, LogLevel::Error, FLAG_RETRY, "ignored", &(&2u32,));

        assert!(std::ptr::eq(first, second), "one descriptor per call site");
        assert_eq!(second.level, LogLevel::Notice);
        assert_eq!(second.format, "x = {}");
        assert_eq!(second.flags, 0);
    }

    #[test]
    fn metadata_pointer_round_trip() {
        static CELL: MetadataCell = MetadataCell::new();
        let metadata = CELL.get_or_init(
            SourceLocation { file: "lib.rs", line: 20 },
            LogLevel::Debug,
            0,
            "fmt",
            &(),
        );

        let bits = metadata_to_bits(metadata);
        // SAFETY: bits came from metadata_to_bits on a &'static just above.
        let restored = unsafe { metadata_from_bits(bits) };
        assert!(std::ptr::eq(metadata, restored));
    }
}
