#![no_main]
use libfuzzer_sys::fuzz_target;
use tscodec::compress::{self, secondary::ZlibBackend};
use tscodec::codec;

fuzz_target!(|data: &[u8]| {
    // Unwrapping arbitrary frames must not panic.
    let _ = compress::unwrap(data);

    // Any stream the codec accepts survives a wrap/unwrap cycle unchanged.
    if codec::decode(data).is_ok() {
        let wrapped = compress::wrap(data, &ZlibBackend::default()).expect("wrap valid stream");
        let restored = compress::unwrap(&wrapped).expect("unwrap own frame");
        assert_eq!(restored.as_ref(), data);
    }
});
