#![no_main]
use libfuzzer_sys::fuzz_target;
use tscodec::{CodecError, codec};

fuzz_target!(|data: &[u8]| {
    let values: Vec<i64> = data
        .chunks_exact(8)
        .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect();

    match codec::encode(&values) {
        Ok(encoded) => {
            let decoded = codec::decode(&encoded).expect("encoder output must decode");
            assert_eq!(decoded, values);
        }
        Err(CodecError::TooFewValues { .. } | CodecError::TruncationRisk { .. }) => {}
        Err(e) => panic!("unexpected encode error: {e}"),
    }
});
