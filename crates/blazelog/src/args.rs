//! Dynamic format-argument store and the per-type packing rules.
//!
//! The frontend encodes arguments with [`LogArg::encode`]; the backend pops
//! them back, in declaration order, through a decode function pointer
//! monomorphised over the call site's argument tuple. Decoded values land in
//! an [`ArgStore`] for late formatting, with string slices borrowed straight
//! from the record payload.

use crate::codec::{Reader, Writer, SLICE_LEN_SIZE};
use std::mem;
use std::path::{Path, PathBuf};

/// Runtime-typed value decoded from a record's argument region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgValue<'a> {
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Char(char),
    Str(&'a str),
    Ptr(usize),
}

/// Format arguments for one record, in caller-declared order.
#[derive(Debug, Default)]
pub struct ArgStore<'a> {
    values: Vec<ArgValue<'a>>,
}

impl<'a> ArgStore<'a> {
    pub fn push(&mut self, value: ArgValue<'a>) {
        self.values.push(value);
    }

    pub fn get(&self, index: usize) -> Option<&ArgValue<'a>> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A value the logging macros can capture.
///
/// `encoded_size` and `encode` run on the calling thread; `decode` runs on
/// the backend and must consume exactly the bytes `encode` produced.
pub trait LogArg {
    fn encoded_size(&self) -> usize;
    fn encode(&self, writer: &mut Writer<'_>);
    fn decode<'a>(reader: &mut Reader<'a>) -> ArgValue<'a>;
}

impl<T: LogArg + ?Sized> LogArg for &T {
    fn encoded_size(&self) -> usize {
        (**self).encoded_size()
    }

    fn encode(&self, writer: &mut Writer<'_>) {
        (**self).encode(writer);
    }

    fn decode<'a>(reader: &mut Reader<'a>) -> ArgValue<'a> {
        T::decode(reader)
    }
}

macro_rules! unsigned_arg {
    ($($int:ty),+) => {$(
        impl LogArg for $int {
            fn encoded_size(&self) -> usize {
                mem::size_of::<$int>()
            }

            fn encode(&self, writer: &mut Writer<'_>) {
                writer.put_raw(&self.to_le_bytes());
            }

            fn decode<'a>(reader: &mut Reader<'a>) -> ArgValue<'a> {
                let mut bytes = [0u8; mem::size_of::<$int>()];
                bytes.copy_from_slice(reader.take(mem::size_of::<$int>()));
                ArgValue::Uint(<$int>::from_le_bytes(bytes) as u64)
            }
        }
    )+};
}

macro_rules! signed_arg {
    ($($int:ty),+) => {$(
        impl LogArg for $int {
            fn encoded_size(&self) -> usize {
                mem::size_of::<$int>()
            }

            fn encode(&self, writer: &mut Writer<'_>) {
                writer.put_raw(&self.to_le_bytes());
            }

            fn decode<'a>(reader: &mut Reader<'a>) -> ArgValue<'a> {
                let mut bytes = [0u8; mem::size_of::<$int>()];
                bytes.copy_from_slice(reader.take(mem::size_of::<$int>()));
                ArgValue::Int(<$int>::from_le_bytes(bytes) as i64)
            }
        }
    )+};
}

unsigned_arg!(u8, u16, u32, u64, usize);
signed_arg!(i8, i16, i32, i64, isize);

impl LogArg for f32 {
    fn encoded_size(&self) -> usize {
        4
    }

    fn encode(&self, writer: &mut Writer<'_>) {
        writer.put_raw(&self.to_le_bytes());
    }

    fn decode<'a>(reader: &mut Reader<'a>) -> ArgValue<'a> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(reader.take(4));
        ArgValue::Float(f64::from(f32::from_le_bytes(bytes)))
    }
}

impl LogArg for f64 {
    fn encoded_size(&self) -> usize {
        8
    }

    fn encode(&self, writer: &mut Writer<'_>) {
        writer.put_raw(&self.to_le_bytes());
    }

    fn decode<'a>(reader: &mut Reader<'a>) -> ArgValue<'a> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(reader.take(8));
        ArgValue::Float(f64::from_le_bytes(bytes))
    }
}

impl LogArg for bool {
    fn encoded_size(&self) -> usize {
        1
    }

    fn encode(&self, writer: &mut Writer<'_>) {
        writer.put_u8(u8::from(*self));
    }

    fn decode<'a>(reader: &mut Reader<'a>) -> ArgValue<'a> {
        ArgValue::Bool(reader.get_u8() != 0)
    }
}

impl LogArg for char {
    fn encoded_size(&self) -> usize {
        4
    }

    fn encode(&self, writer: &mut Writer<'_>) {
        writer.put_u32(*self as u32);
    }

    fn decode<'a>(reader: &mut Reader<'a>) -> ArgValue<'a> {
        ArgValue::Char(char::from_u32(reader.get_u32()).unwrap_or(char::REPLACEMENT_CHARACTER))
    }
}

impl LogArg for str {
    fn encoded_size(&self) -> usize {
        SLICE_LEN_SIZE + self.len()
    }

    fn encode(&self, writer: &mut Writer<'_>) {
        writer.put_bytes(self.as_bytes());
    }

    fn decode<'a>(reader: &mut Reader<'a>) -> ArgValue<'a> {
        let bytes = reader.get_bytes();
        ArgValue::Str(std::str::from_utf8(bytes).unwrap_or("\u{fffd}"))
    }
}

impl LogArg for String {
    fn encoded_size(&self) -> usize {
        self.as_str().encoded_size()
    }

    fn encode(&self, writer: &mut Writer<'_>) {
        self.as_str().encode(writer);
    }

    fn decode<'a>(reader: &mut Reader<'a>) -> ArgValue<'a> {
        str::decode(reader)
    }
}

/// Paths are stringified to their native (lossy) form at the call site.
impl LogArg for Path {
    fn encoded_size(&self) -> usize {
        SLICE_LEN_SIZE + self.to_string_lossy().len()
    }

    fn encode(&self, writer: &mut Writer<'_>) {
        writer.put_bytes(self.to_string_lossy().as_bytes());
    }

    fn decode<'a>(reader: &mut Reader<'a>) -> ArgValue<'a> {
        str::decode(reader)
    }
}

impl LogArg for PathBuf {
    fn encoded_size(&self) -> usize {
        self.as_path().encoded_size()
    }

    fn encode(&self, writer: &mut Writer<'_>) {
        self.as_path().encode(writer);
    }

    fn decode<'a>(reader: &mut Reader<'a>) -> ArgValue<'a> {
        str::decode(reader)
    }
}

impl<T> LogArg for *const T {
    fn encoded_size(&self) -> usize {
        8
    }

    fn encode(&self, writer: &mut Writer<'_>) {
        writer.put_u64(*self as usize as u64);
    }

    fn decode<'a>(reader: &mut Reader<'a>) -> ArgValue<'a> {
        ArgValue::Ptr(reader.get_u64() as usize)
    }
}

impl<T> LogArg for *mut T {
    fn encoded_size(&self) -> usize {
        8
    }

    fn encode(&self, writer: &mut Writer<'_>) {
        writer.put_u64(*self as usize as u64);
    }

    fn decode<'a>(reader: &mut Reader<'a>) -> ArgValue<'a> {
        ArgValue::Ptr(reader.get_u64() as usize)
    }
}

/// Argument pack of one log statement.
///
/// Implemented for tuples of [`LogArg`] values up to eight elements. The
/// backend stores `Self::decode_args` as a plain function pointer inside the
/// call site's metadata; monomorphisation pins it to the exact argument
/// types, so the decoder never inspects the bytes to learn them.
pub trait ArgTuple {
    fn encoded_size(&self) -> usize;
    fn encode(&self, writer: &mut Writer<'_>);
    fn decode_args<'a>(reader: &mut Reader<'a>, store: &mut ArgStore<'a>);
}

impl ArgTuple for () {
    fn encoded_size(&self) -> usize {
        0
    }

    fn encode(&self, _writer: &mut Writer<'_>) {}

    fn decode_args<'a>(_reader: &mut Reader<'a>, _store: &mut ArgStore<'a>) {}
}

macro_rules! arg_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: LogArg),+> ArgTuple for ($($name,)+) {
            fn encoded_size(&self) -> usize {
                0 $(+ self.$idx.encoded_size())+
            }

            fn encode(&self, writer: &mut Writer<'_>) {
                $(self.$idx.encode(writer);)+
            }

            fn decode_args<'a>(reader: &mut Reader<'a>, store: &mut ArgStore<'a>) {
                $(store.push($name::decode(reader));)+
            }
        }
    };
}

arg_tuple!(A: 0);
arg_tuple!(A: 0, B: 1);
arg_tuple!(A: 0, B: 1, C: 2);
arg_tuple!(A: 0, B: 1, C: 2, D: 3);
arg_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
arg_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
arg_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
arg_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);
