//! Property tests: argument packs survive encode/decode exactly.

use blazelog::{ArgStore, ArgTuple, ArgValue, Reader, Writer};
use proptest::prelude::*;

fn encode<A: ArgTuple>(args: &A) -> Vec<u8> {
    let mut buf = vec![0u8; args.encoded_size()];
    let mut writer = Writer::new(&mut buf);
    args.encode(&mut writer);
    assert_eq!(writer.written(), buf.len(), "declared size must match encoding");
    buf
}

proptest! {
    #[test]
    fn scalars_round_trip(unsigned in any::<u64>(), signed in any::<i64>(), flag in any::<bool>()) {
        let args = (&unsigned, &signed, &flag);
        let buf = encode(&args);

        let mut reader = Reader::new(&buf);
        let mut store = ArgStore::default();
        <(&u64, &i64, &bool)>::decode_args(&mut reader, &mut store);

        prop_assert_eq!(reader.remaining(), 0);
        prop_assert_eq!(store.get(0), Some(&ArgValue::Uint(unsigned)));
        prop_assert_eq!(store.get(1), Some(&ArgValue::Int(signed)));
        prop_assert_eq!(store.get(2), Some(&ArgValue::Bool(flag)));
    }

    #[test]
    fn strings_round_trip(text in ".{0,200}", number in any::<u32>()) {
        let args = (&text, &number);
        let buf = encode(&args);

        let mut reader = Reader::new(&buf);
        let mut store = ArgStore::default();
        <(&String, &u32)>::decode_args(&mut reader, &mut store);

        prop_assert_eq!(reader.remaining(), 0);
        prop_assert_eq!(store.get(0), Some(&ArgValue::Str(text.as_str())));
        prop_assert_eq!(store.get(1), Some(&ArgValue::Uint(u64::from(number))));
    }

    #[test]
    fn floats_round_trip(value in any::<f64>().prop_filter("NaN never compares equal", |v| !v.is_nan())) {
        let args = (&value,);
        let buf = encode(&args);

        let mut reader = Reader::new(&buf);
        let mut store = ArgStore::default();
        <(&f64,)>::decode_args(&mut reader, &mut store);

        prop_assert_eq!(store.get(0), Some(&ArgValue::Float(value)));
    }
}
