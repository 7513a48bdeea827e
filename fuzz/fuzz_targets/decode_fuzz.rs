#![no_main]
use libfuzzer_sys::fuzz_target;
use tscodec::{codec, engine};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics.
    let _ = codec::decode(data);
    let _ = codec::inspect(data);
    let _ = engine::decode(data);
});
