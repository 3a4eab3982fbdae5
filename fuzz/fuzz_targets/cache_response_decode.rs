//! Cache response decoding never fails and never panics, whatever the
//! length prefixes and entry count claim.

#![no_main]

use hamgo_harness::SimMessage;
use hamgo_proto::{CacheResponse, DecodeConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = DecodeConfig::with_max_entries(1024);
    let decoded = CacheResponse::<SimMessage>::decode_with(data, &config);

    let walked = decoded.value.len() + decoded.diagnostics.len();
    assert!(decoded.value.len() <= config.max_entries as usize);
    assert!(walked <= config.max_entries as usize + 2);

    if decoded.is_clean() {
        assert_eq!(&decoded.value.encode()[..], data);
    }
});
