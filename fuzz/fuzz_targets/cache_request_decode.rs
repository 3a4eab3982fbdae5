//! Cache request decoding never fails and never panics. Salvaged entries
//! must re-encode to a prefix of the walked bytes.

#![no_main]

use hamgo_harness::SimContact;
use hamgo_proto::CacheRequest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let decoded = CacheRequest::<SimContact>::decode(data);
    assert!(decoded.value.len() <= decoded.value.declared_count() as usize);

    if decoded.is_clean() {
        assert_eq!(&decoded.value.encode()[..], data);
    }
});
