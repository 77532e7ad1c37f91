//! Arbitrary bytes must never panic the decoder; every outcome is either a
//! decoded record or an error value.
#![no_main]
use {
    beancode::{EnumSet, EnumValue, Externalizable, WireList},
    libfuzzer_sys::fuzz_target,
};

#[derive(EnumValue, Debug, Clone, Copy)]
enum Level {
    Low,
    Mid,
    High,
}

#[derive(Externalizable, Default, Debug)]
struct Inner {
    #[externalize(index = 0)]
    value: i32,
}

#[derive(Externalizable, Default, Debug)]
struct Probe {
    #[externalize(index = 0)]
    number: i32,
    #[externalize(index = 1)]
    text: Option<String>,
    #[externalize(index = 2)]
    when: Option<chrono::DateTime<chrono::Utc>>,
    #[externalize(index = 3)]
    id: Option<uuid::Uuid>,
    #[externalize(index = 4)]
    inner: Option<Inner>,
    #[externalize(index = 5)]
    longs: Option<Vec<i64>>,
    #[externalize(index = 6)]
    texts: Option<Vec<Option<String>>>,
    #[externalize(index = 7)]
    grid: Option<Vec<Option<Vec<i32>>>>,
    #[externalize(index = 8, enum_value)]
    level: Option<Level>,
    #[externalize(index = 9)]
    levels: Option<EnumSet<Level>>,
    #[externalize(index = 10)]
    names: Option<WireList<String>>,
    #[externalize(index = 11)]
    children: Option<Vec<Option<Inner>>>,
}

fuzz_target!(|data: &[u8]| {
    let _ = beancode::decode_from_slice::<Probe>(data);
});
