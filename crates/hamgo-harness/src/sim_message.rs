//! Simulated cached message.

use bytes::{BufMut, BytesMut};
use hamgo_proto::{Contact, Message};

use crate::sim_contact::SimContact;

/// A message published by `source` with sequence counter `seq`.
///
/// Wire form:
///
/// ```text
/// magic (1) | source contact | seq (8, LE) | body len (2, LE) | body | checksum (1)
/// ```
///
/// The checksum is the XOR of every preceding byte, so any single corrupted
/// byte makes the message fail to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimMessage {
    /// Publishing node
    pub source: SimContact,
    /// Per-source sequence counter, starting at 1
    pub seq: u64,
    /// Application payload
    pub body: Vec<u8>,
}

impl SimMessage {
    /// Leading byte of every encoded message.
    pub const MAGIC: u8 = 0x48;

    /// Message from `source` with counter `seq`.
    pub fn new(source: SimContact, seq: u64, body: impl Into<Vec<u8>>) -> Self {
        Self { source, seq, body: body.into() }
    }

    fn checksum(bytes: &[u8]) -> u8 {
        bytes.iter().fold(0, |acc, b| acc ^ b)
    }
}

impl Message for SimMessage {
    fn encode(&self, buf: &mut BytesMut) {
        let start = buf.len();
        buf.put_u8(Self::MAGIC);
        self.source.encode(buf);
        buf.put_u64_le(self.seq);
        buf.put_u16_le(self.body.len() as u16);
        buf.put_slice(&self.body);
        let checksum = Self::checksum(&buf[start..]);
        buf.put_u8(checksum);
    }

    fn decode(buf: &[u8]) -> Option<Self> {
        let (&checksum, signed) = buf.split_last()?;
        if Self::checksum(signed) != checksum {
            return None;
        }

        let (&magic, rest) = signed.split_first()?;
        if magic != Self::MAGIC {
            return None;
        }

        let (source, rest) = SimContact::decode(rest)?;
        let (seq, rest) = rest.split_first_chunk::<8>()?;
        let (len, body) = rest.split_first_chunk::<2>()?;
        if body.len() != usize::from(u16::from_le_bytes(*len)) {
            return None;
        }

        Some(Self { source, seq: u64::from_le_bytes(*seq), body: body.to_vec() })
    }
}
