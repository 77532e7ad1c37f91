//! Encoding an arbitrary record and decoding it back must reproduce the
//! record exactly.
#![no_main]
use {
    arbitrary::Arbitrary,
    beancode::{Externalizable, WireList},
    libfuzzer_sys::fuzz_target,
};

#[derive(Arbitrary, Debug)]
struct Seed {
    number: i32,
    long: i64,
    flag: bool,
    text: Option<String>,
    longs: Option<Vec<i64>>,
    texts: Option<Vec<Option<String>>>,
    names: Option<Vec<Option<String>>>,
    inner: Option<i32>,
}

#[derive(Externalizable, Default, Debug, PartialEq)]
struct Inner {
    #[externalize(index = 0)]
    value: i32,
}

#[derive(Externalizable, Default, Debug, PartialEq)]
struct Bean {
    #[externalize(index = 0)]
    number: i32,
    #[externalize(index = 1)]
    long: i64,
    #[externalize(index = 2)]
    flag: bool,
    #[externalize(index = 3)]
    text: Option<String>,
    #[externalize(index = 4)]
    longs: Option<Vec<i64>>,
    #[externalize(index = 5)]
    texts: Option<Vec<Option<String>>>,
    #[externalize(index = 6)]
    names: Option<WireList<String>>,
    #[externalize(index = 7)]
    inner: Option<Inner>,
}

fuzz_target!(|seed: Seed| {
    let bean = Bean {
        number: seed.number,
        long: seed.long,
        flag: seed.flag,
        text: seed.text,
        longs: seed.longs,
        texts: seed.texts,
        names: seed.names.map(|items| items.into_iter().collect()),
        inner: seed.inner.map(|value| Inner { value }),
    };
    let bytes = match beancode::encode_to_vec(&bean) {
        Ok(bytes) => bytes,
        // Strings that overflow the 16-bit UTF length prefix are a
        // legitimate encode error, not a roundtrip failure.
        Err(_) => return,
    };
    let back: Bean = beancode::decode_from_slice(&bytes).unwrap();
    assert_eq!(back, bean);
});
