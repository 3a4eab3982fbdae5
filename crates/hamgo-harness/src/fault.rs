//! Link faults applied to enveloped cache responses.
//!
//! Faults operate on raw bytes after the responder has encoded its answer,
//! the way a noisy radio link would. Entry-aware faults locate message
//! entries through the response framing so a test can aim at exactly one.

use std::ops::Range;

use hamgo_proto::{Cursor, EnvelopeHeader, payloads::COUNT_SIZE};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A single corruption applied to a response in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Deliver unchanged
    None,
    /// Corrupt the message bytes of the entry at `index`, keeping its length
    /// prefix intact
    GarbleEntry {
        /// Zero-based entry index
        index: usize,
    },
    /// Cut the envelope data to `keep` bytes and shrink the declared length
    /// to match, so the envelope still parses
    TruncateData {
        /// Data bytes to keep
        keep: usize,
    },
    /// Overwrite the declared entry count
    LieCount {
        /// Count to claim
        count: u32,
    },
    /// Flip one bit anywhere in the buffer
    FlipBit {
        /// Byte offset into the enveloped response
        offset: usize,
        /// Bit within the byte, 0 to 7
        bit: u8,
    },
}

impl Fault {
    /// Apply the fault to an enveloped response.
    ///
    /// Faults that point outside the buffer leave it unchanged.
    pub fn apply(&self, response: &[u8]) -> Vec<u8> {
        let mut out = response.to_vec();
        match *self {
            Self::None => {},
            Self::GarbleEntry { index } => {
                if let Some(span) = entry_spans(response).into_iter().nth(index) {
                    for byte in &mut out[span] {
                        *byte ^= 0x5A;
                    }
                }
            },
            Self::TruncateData { keep } => {
                let data_len = out.len().saturating_sub(EnvelopeHeader::SIZE);
                if keep < data_len {
                    out.truncate(EnvelopeHeader::SIZE + keep);
                    out[1..EnvelopeHeader::SIZE].copy_from_slice(&(keep as u16).to_le_bytes());
                }
            },
            Self::LieCount { count } => {
                let start = EnvelopeHeader::SIZE;
                if let Some(slot) = out.get_mut(start..start + COUNT_SIZE) {
                    slot.copy_from_slice(&count.to_le_bytes());
                }
            },
            Self::FlipBit { offset, bit } => {
                if let Some(byte) = out.get_mut(offset) {
                    *byte ^= 1 << (bit % 8);
                }
            },
        }
        out
    }
}

/// Byte ranges of each well-framed message in an enveloped response,
/// excluding the length prefixes.
///
/// Walking stops at the first prefix that does not fit.
pub fn entry_spans(response: &[u8]) -> Vec<Range<usize>> {
    let Ok(header) = EnvelopeHeader::from_bytes(response) else {
        return Vec::new();
    };
    let end = (EnvelopeHeader::SIZE + usize::from(header.data_len())).min(response.len());
    let base = EnvelopeHeader::SIZE;

    let mut cursor = Cursor::new(&response[base..end]);
    if cursor.read_u32().is_none() {
        return Vec::new();
    }

    let mut spans = Vec::new();
    while !cursor.is_empty() {
        let Ok(message) = cursor.framed() else {
            break;
        };
        let stop = base + cursor.position();
        spans.push(stop - message.len()..stop);
    }
    spans
}

/// Seeded source of faults for randomized scenarios.
///
/// The same seed yields the same fault sequence for the same responses.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    rng: ChaCha8Rng,
    rate: f64,
}

impl FaultInjector {
    /// Injector that faults a response with probability `rate`.
    ///
    /// `rate` is clamped to `0.0..=1.0`. A NaN or infinite rate never faults.
    pub fn new(seed: u64, rate: f64) -> Self {
        let rate = if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 };
        Self { rng: ChaCha8Rng::seed_from_u64(seed), rate }
    }

    /// Injector that never faults.
    pub fn clean() -> Self {
        Self::new(0, 0.0)
    }

    /// Pick a fault for `response`.
    ///
    /// Most faults garble a single entry; the rest flip a random bit or cut
    /// the data short.
    pub fn next_fault(&mut self, response: &[u8]) -> Fault {
        if !self.rng.gen_bool(self.rate) {
            return Fault::None;
        }

        let entries = entry_spans(response).len();
        let data_len = response.len().saturating_sub(EnvelopeHeader::SIZE);
        match self.rng.gen_range(0..10u8) {
            0..=6 if entries > 0 => Fault::GarbleEntry { index: self.rng.gen_range(0..entries) },
            7 | 8 if data_len > 0 => Fault::FlipBit {
                offset: EnvelopeHeader::SIZE + self.rng.gen_range(0..data_len),
                bit: self.rng.gen_range(0..8),
            },
            _ if data_len > COUNT_SIZE => {
                Fault::TruncateData { keep: self.rng.gen_range(COUNT_SIZE..data_len) }
            },
            _ => Fault::None,
        }
    }

    /// Pick a fault for `response` and apply it.
    pub fn corrupt(&mut self, response: &[u8]) -> (Fault, Vec<u8>) {
        let fault = self.next_fault(response);
        (fault, fault.apply(response))
    }
}

#[cfg(test)]
mod tests {
    use hamgo_proto::{Envelope, Operation, exchange};

    use super::*;

    fn response(bodies: &[&[u8]]) -> Vec<u8> {
        let messages: Vec<Vec<u8>> = bodies.iter().map(|b| b.to_vec()).collect();
        let payload = hamgo_proto::CacheResponse::new(messages).encode();
        Envelope::new(Operation::CacheResponse, payload).unwrap().encode().to_vec()
    }

    #[test]
    fn entry_spans_locate_messages() {
        let bytes = response(&[b"ab", b"", b"xyz"]);
        // header 3, count 4, prefix 4
        assert_eq!(entry_spans(&bytes), vec![11..13, 17..17, 21..24]);
        assert_eq!(&bytes[21..24], b"xyz");
    }

    #[test]
    fn garble_entry_changes_only_that_entry() {
        let bytes = response(&[b"ab", b"cd", b"ef"]);
        let garbled = Fault::GarbleEntry { index: 1 }.apply(&bytes);

        let differing: Vec<usize> =
            (0..bytes.len()).filter(|&i| bytes[i] != garbled[i]).collect();
        assert_eq!(differing, vec![17, 18]);
    }

    #[test]
    fn truncate_data_keeps_envelope_valid() {
        let bytes = response(&[b"abcdef", b"ghijkl"]);
        let cut = Fault::TruncateData { keep: 16 }.apply(&bytes);

        let envelope = Envelope::decode(&cut).unwrap();
        assert_eq!(envelope.data().len(), 16);

        let decoded = exchange::accept_response::<Vec<u8>>(&cut).unwrap();
        assert_eq!(decoded.value, vec![b"abcdef".to_vec()]);
        assert!(!decoded.is_clean());
    }

    #[test]
    fn lie_count_overwrites_count() {
        let bytes = response(&[b"a"]);
        let lied = Fault::LieCount { count: 9 }.apply(&bytes);
        assert_eq!(&lied[3..7], &9u32.to_le_bytes());
    }

    #[test]
    fn out_of_range_faults_are_noops() {
        let bytes = response(&[b"a"]);
        assert_eq!(Fault::GarbleEntry { index: 5 }.apply(&bytes), bytes);
        assert_eq!(Fault::FlipBit { offset: 999, bit: 0 }.apply(&bytes), bytes);
        assert_eq!(Fault::TruncateData { keep: 999 }.apply(&bytes), bytes);
    }

    #[test]
    fn injector_is_deterministic() {
        let bytes = response(&[b"one", b"two", b"three"]);
        let mut a = FaultInjector::new(7, 0.5);
        let mut b = FaultInjector::new(7, 0.5);

        for _ in 0..32 {
            assert_eq!(a.next_fault(&bytes), b.next_fault(&bytes));
        }
    }

    #[test]
    fn clean_injector_never_faults() {
        let bytes = response(&[b"one"]);
        let mut injector = FaultInjector::clean();
        for _ in 0..16 {
            assert_eq!(injector.next_fault(&bytes), Fault::None);
        }
    }

    #[test]
    fn non_finite_rate_never_faults() {
        let bytes = response(&[b"one"]);
        for rate in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut injector = FaultInjector::new(3, rate);
            for _ in 0..16 {
                assert_eq!(injector.next_fault(&bytes), Fault::None);
            }
        }
    }

    #[test]
    fn out_of_range_rate_is_clamped() {
        let bytes = response(&[b"one"]);
        let mut always = FaultInjector::new(3, 7.5);
        let mut never = FaultInjector::new(3, -2.0);
        for _ in 0..16 {
            assert_ne!(always.next_fault(&bytes), Fault::None);
            assert_eq!(never.next_fault(&bytes), Fault::None);
        }
    }
}
