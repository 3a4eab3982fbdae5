//! Envelope decoding must never panic, and anything it accepts must
//! re-encode to the bytes it was read from.

#![no_main]

use hamgo_proto::{Envelope, EnvelopeHeader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(envelope) = Envelope::decode(data) {
        let declared = EnvelopeHeader::SIZE + envelope.data().len();
        assert!(declared <= data.len());
        assert_eq!(&envelope.encode()[..], &data[..declared]);
    }
});
