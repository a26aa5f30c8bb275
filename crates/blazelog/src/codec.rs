//! Little-endian packing of record fields and arguments into raw buffers.
//!
//! The writer fills a window reserved in the ring; the reader walks a
//! committed entry. Both sides derive the layout from the same call-site
//! metadata, so cursor positions always agree and decoding cannot fail.
//! No allocation on either side.

/// Size of the length field preceding an encoded byte/string slice.
pub const SLICE_LEN_SIZE: usize = 4;

/// Forward-only cursor over a reserved ring window.
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    #[inline]
    pub fn written(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    #[inline]
    pub fn put_u8(&mut self, value: u8) {
        self.put_raw(&[value]);
    }

    #[inline]
    pub fn put_u32(&mut self, value: u32) {
        self.put_raw(&value.to_le_bytes());
    }

    #[inline]
    pub fn put_u64(&mut self, value: u64) {
        self.put_raw(&value.to_le_bytes());
    }

    #[inline]
    pub fn put_i64(&mut self, value: i64) {
        self.put_raw(&value.to_le_bytes());
    }

    /// Length-prefixed byte slice: 4-byte little-endian size, then bytes.
    #[inline]
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.put_raw(bytes);
    }
}

/// Forward-only cursor over a committed entry.
///
/// Returned slices borrow from the entry, not from the reader, so decoded
/// string views stay usable while the store referencing them is alive.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn take(&mut self, n: usize) -> &'a [u8] {
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        bytes
    }

    #[inline]
    pub fn get_u8(&mut self) -> u8 {
        self.take(1)[0]
    }

    #[inline]
    pub fn get_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.take(4));
        u32::from_le_bytes(bytes)
    }

    #[inline]
    pub fn get_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8));
        u64::from_le_bytes(bytes)
    }

    #[inline]
    pub fn get_i64(&mut self) -> i64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8));
        i64::from_le_bytes(bytes)
    }

    /// Counterpart of [`Writer::put_bytes`].
    #[inline]
    pub fn get_bytes(&mut self) -> &'a [u8] {
        let len = self.get_u32() as usize;
        self.take(len)
    }
}
