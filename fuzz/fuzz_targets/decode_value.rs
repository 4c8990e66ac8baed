#![no_main]
use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;
use msgpack_decode::{Decoder, Value};

fuzz_target!(|data: &[u8]| {
    let mut value = Value::Nil;
    let _ = Decoder::new(data).decode(&mut value);
    let mut typed = BTreeMap::<String, Vec<Option<i64>>>::new();
    let _ = Decoder::new(data).decode(&mut typed);
    let _ = msgpack_decode::from_slice::<Value>(data);
});
