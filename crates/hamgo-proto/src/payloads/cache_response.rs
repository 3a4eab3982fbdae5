//! Cache response: the messages a requester is missing.
//!
//! Every message is preceded by its byte length. The length is what lets a
//! receiver step over a message it cannot parse and land exactly on the next
//! one, so one corrupted message costs one entry instead of the whole reply.

use bytes::{BufMut, Bytes, BytesMut};

use super::{COUNT_SIZE, decode_entries};
use crate::{
    codec::Message,
    config::DecodeConfig,
    cursor::{Cursor, FrameError, LENGTH_PREFIX_SIZE},
    diagnostics::{Decoded, SkipReason},
};

/// One cache-response entry: a message and its declared byte length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedMessage<M> {
    length: u32,
    message: M,
}

impl<M: Message> FramedMessage<M> {
    /// Frame `message`, recording the length of its actual encoding.
    ///
    /// [`Message::encoded_len`] is only a capacity hint here.
    pub fn new(message: M) -> Self {
        let mut scratch = BytesMut::with_capacity(message.encoded_len());
        message.encode(&mut scratch);
        Self { length: frame_len(scratch.len()), message }
    }

    /// Declared byte length of the message.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// The framed message.
    pub fn message(&self) -> &M {
        &self.message
    }

    /// Unwrap the message.
    pub fn into_message(self) -> M {
        self.message
    }

    /// Append `[len (4)][message]` to `buf`.
    ///
    /// The prefix is patched in after the message is written, so it always
    /// matches the bytes actually produced.
    pub fn encode(&self, buf: &mut BytesMut) {
        let start = buf.len();
        buf.put_u32_le(0);
        self.message.encode(buf);

        let written = frame_len(buf.len() - start - LENGTH_PREFIX_SIZE);
        debug_assert_eq!(written, self.length, "message encoding changed after framing");
        buf[start..start + LENGTH_PREFIX_SIZE].copy_from_slice(&written.to_le_bytes());
    }

    /// Encode this entry on its own.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + self.length as usize);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode one entry at the cursor.
    ///
    /// If the length prefix is missing or overruns the buffer, the cursor
    /// does not move and the reason is terminal. If the prefix is sound but
    /// the message is not, the cursor has already moved past the declared
    /// length and [`SkipReason::CorruptMessage`] is returned.
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self, SkipReason> {
        let region = cursor.framed().map_err(|err| match err {
            FrameError::TruncatedPrefix { remaining } => {
                SkipReason::TruncatedLengthPrefix { remaining }
            },
            FrameError::LengthExceedsBuffer { declared, remaining } => {
                SkipReason::LengthExceedsBuffer { declared, remaining }
            },
        })?;

        let length = region.len() as u32;
        let message = M::decode(region).ok_or(SkipReason::CorruptMessage { declared: length })?;
        Ok(Self { length, message })
    }
}

/// Length prefix for `len` bytes of message.
///
/// Saturates at `u32::MAX`; a message that large never fits an envelope, so
/// [`crate::Envelope::new`] rejects the response before it is sent.
fn frame_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// List of framed messages answering a cache request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheResponse<M> {
    declared_count: u32,
    entries: Vec<FramedMessage<M>>,
}

impl<M: Message> CacheResponse<M> {
    /// Response carrying `messages`, in order.
    pub fn new(messages: Vec<M>) -> Self {
        messages.into_iter().collect()
    }

    /// Response from already-framed entries.
    pub fn from_entries(entries: Vec<FramedMessage<M>>) -> Self {
        Self { declared_count: entries.len() as u32, entries }
    }

    /// Append a message.
    pub fn push(&mut self, message: M) {
        self.entries.push(FramedMessage::new(message));
        self.declared_count = self.entries.len() as u32;
    }

    /// Entry count from the wire header.
    ///
    /// For a decoded response this may exceed [`CacheResponse::len`]; callers
    /// must not assume they match.
    pub fn declared_count(&self) -> u32 {
        self.declared_count
    }

    /// Framed entries actually recovered.
    pub fn entries(&self) -> &[FramedMessage<M>] {
        &self.entries
    }

    /// Iterate over the recovered messages.
    pub fn messages(&self) -> impl Iterator<Item = &M> {
        self.entries.iter().map(FramedMessage::message)
    }

    /// Take ownership of the recovered messages.
    pub fn into_messages(self) -> Vec<M> {
        self.entries.into_iter().map(FramedMessage::into_message).collect()
    }

    /// Number of entries actually recovered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries were recovered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the response. The count written is the entry list length.
    pub fn encode(&self) -> Bytes {
        encode_cache_response(&self.entries)
    }

    /// Decode a response, skipping corrupted messages.
    pub fn decode(buf: &[u8]) -> Decoded<Self> {
        Self::decode_with(buf, &DecodeConfig::default())
    }

    /// [`CacheResponse::decode`] with explicit decoder limits.
    pub fn decode_with(buf: &[u8], config: &DecodeConfig) -> Decoded<Self> {
        decode_entries(buf, config, LENGTH_PREFIX_SIZE, FramedMessage::<M>::decode)
            .map(|list| Self { declared_count: list.declared, entries: list.entries })
    }
}

impl<M: Message> FromIterator<M> for CacheResponse<M> {
    fn from_iter<I: IntoIterator<Item = M>>(iter: I) -> Self {
        Self::from_entries(iter.into_iter().map(FramedMessage::new).collect())
    }
}

/// Serialize a cache response carrying `entries`.
pub fn encode_cache_response<M: Message>(entries: &[FramedMessage<M>]) -> Bytes {
    let body: usize = entries.iter().map(|e| LENGTH_PREFIX_SIZE + e.length as usize).sum();
    let mut buf = BytesMut::with_capacity(COUNT_SIZE + body);
    buf.put_u32_le(entries.len() as u32);
    for entry in entries {
        entry.encode(&mut buf);
    }
    buf.freeze()
}

/// Decode a cache response with default limits.
pub fn decode_cache_response<M: Message>(buf: &[u8]) -> Decoded<CacheResponse<M>> {
    CacheResponse::decode(buf)
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;
    use crate::{codec::test_support::Note, diagnostics::Diagnostic};

    fn notes() -> Vec<Note> {
        vec![Note::new(1, b"one"), Note::new(2, b"two"), Note::new(3, b"three")]
    }

    /// Offsets of each entry's length prefix in an encoded response.
    fn entry_offsets(bytes: &[u8]) -> Vec<usize> {
        let mut cursor = Cursor::new(bytes);
        let count = cursor.read_u32().unwrap();
        (0..count)
            .map(|_| {
                let offset = cursor.position();
                cursor.framed().unwrap();
                offset
            })
            .collect()
    }

    #[test]
    fn entry_wire_layout() {
        let bytes = FramedMessage::new(Bytes::from_static(b"hi")).to_bytes();
        insta::assert_snapshot!(hex::encode(&bytes), @"020000006869");
    }

    #[test]
    fn round_trip_preserves_order() {
        let response = CacheResponse::new(notes());
        let decoded = CacheResponse::<Note>::decode(&response.encode());

        assert!(decoded.is_clean());
        assert_eq!(decoded.value, response);
        assert_eq!(decoded.value.into_messages(), notes());
    }

    #[test]
    fn corrupted_middle_entry_is_skipped() {
        let mut bytes = CacheResponse::new(notes()).encode().to_vec();
        let offsets = entry_offsets(&bytes);

        // garbage of the same declared length
        let start = offsets[1] + LENGTH_PREFIX_SIZE;
        bytes[start..offsets[2]].fill(0xFF);

        let decoded = CacheResponse::<Note>::decode(&bytes);
        assert_eq!(decoded.value.declared_count(), 3);
        assert_eq!(
            decoded.value.into_messages(),
            vec![Note::new(1, b"one"), Note::new(3, b"three")]
        );
        assert_eq!(
            decoded.diagnostics,
            vec![Diagnostic {
                entry: 1,
                offset: offsets[1],
                reason: SkipReason::CorruptMessage { declared: 13 },
            }]
        );
    }

    #[test]
    fn every_entry_corrupted_still_succeeds() {
        let mut bytes = CacheResponse::new(notes()).encode().to_vec();
        for offset in entry_offsets(&bytes) {
            bytes[offset + LENGTH_PREFIX_SIZE] ^= 0xFF;
        }

        let decoded = CacheResponse::<Note>::decode(&bytes);
        assert!(decoded.value.is_empty());
        assert_eq!(decoded.diagnostics.len(), 3);
        assert!(decoded.diagnostics.iter().all(|d| !d.reason.is_terminal()));
    }

    #[test]
    fn length_past_end_stops() {
        let mut bytes = CacheResponse::new(notes()).encode().to_vec();
        let offsets = entry_offsets(&bytes);
        bytes[offsets[1]..offsets[1] + 4].copy_from_slice(&1000u32.to_le_bytes());

        let remaining = bytes.len() - offsets[1] - LENGTH_PREFIX_SIZE;

        let decoded = CacheResponse::<Note>::decode(&bytes);
        assert_eq!(decoded.value.into_messages(), vec![Note::new(1, b"one")]);
        assert_eq!(
            decoded.diagnostics[0].reason,
            SkipReason::LengthExceedsBuffer { declared: 1000, remaining }
        );
    }

    #[test]
    fn truncated_length_prefix_stops() {
        let mut bytes = CacheResponse::new(vec![Note::new(1, b"one")]).encode().to_vec();
        bytes[..4].copy_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[0x05, 0x00]);

        let decoded = CacheResponse::<Note>::decode(&bytes);
        assert_eq!(decoded.value.len(), 1);
        assert_eq!(
            decoded.diagnostics[0].reason,
            SkipReason::TruncatedLengthPrefix { remaining: 2 }
        );
    }

    #[test]
    fn empty_response_is_four_zero_bytes() {
        let bytes = CacheResponse::<Note>::new(Vec::new()).encode();
        insta::assert_snapshot!(hex::encode(&bytes), @"00000000");

        let decoded = CacheResponse::<Note>::decode(&bytes);
        assert!(decoded.is_clean());
        assert!(decoded.value.is_empty());
    }

    #[test]
    fn declared_count_exceeding_entries() {
        let decoded = CacheResponse::<Bytes>::decode(&hex!("05000000 01000000 aa 02000000 bbcc"));

        let messages: Vec<_> = decoded.value.messages().cloned().collect();
        assert_eq!(messages, vec![Bytes::from_static(&[0xaa]), Bytes::from_static(&[0xbb, 0xcc])]);
        assert_eq!(
            decoded.diagnostics[0].reason,
            SkipReason::CountExceedsEntries { declared: 5, walked: 2 }
        );
    }

    #[test]
    fn zero_length_entry_with_raw_messages() {
        let decoded = CacheResponse::<Vec<u8>>::decode(&hex!("02000000 00000000 01000000 7f"));
        assert!(decoded.is_clean());
        assert_eq!(decoded.value.into_messages(), vec![vec![], vec![0x7f]]);
    }

    #[test]
    fn decoded_entry_records_declared_length() {
        let decoded = CacheResponse::<Note>::decode(&CacheResponse::new(notes()).encode());
        let lengths: Vec<u32> = decoded.value.entries().iter().map(FramedMessage::length).collect();
        assert_eq!(lengths, vec![13, 13, 15]);
    }

    /// Message whose length hint is always wrong.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Misreported(Vec<u8>);

    impl Message for Misreported {
        fn encode(&self, buf: &mut BytesMut) {
            buf.put_slice(&self.0);
        }

        fn decode(buf: &[u8]) -> Option<Self> {
            Some(Self(buf.to_vec()))
        }

        fn encoded_len(&self) -> usize {
            self.0.len() + 7
        }
    }

    #[test]
    fn length_follows_encoding_not_hint() {
        let entry = FramedMessage::new(Misreported(b"abc".to_vec()));
        assert_eq!(entry.length(), 3);

        let bytes = entry.to_bytes();
        insta::assert_snapshot!(hex::encode(&bytes), @"03000000616263");

        let response = CacheResponse::from_entries(vec![entry.clone(), entry]);
        let decoded = CacheResponse::<Misreported>::decode(&response.encode());
        assert!(decoded.is_clean());
        assert_eq!(decoded.value, response);
    }

    #[test]
    fn more_than_sixteen_thousand_entries_round_trip() {
        let messages: Vec<Vec<u8>> =
            (0..20_000u32).map(|i| i.to_le_bytes()[..2].to_vec()).collect();
        let response = CacheResponse::new(messages.clone());
        let decoded = decode_cache_response::<Vec<u8>>(&response.encode());
        assert!(decoded.is_clean());
        assert_eq!(decoded.value.declared_count(), 20_000);
        assert_eq!(decoded.value.into_messages(), messages);
    }

    fn note_strategy() -> impl Strategy<Value = Note> {
        (any::<u64>(), proptest::collection::vec(any::<u8>(), 0..32))
            .prop_map(|(id, body)| Note { id, body })
    }

    proptest! {
        #[test]
        fn round_trip(messages in proptest::collection::vec(note_strategy(), 0..16)) {
            let response = CacheResponse::new(messages.clone());
            let decoded = CacheResponse::<Note>::decode(&response.encode());
            prop_assert!(decoded.is_clean());
            prop_assert_eq!(decoded.value.into_messages(), messages);
        }

        #[test]
        fn corrupting_one_entry_loses_only_that_entry(
            messages in proptest::collection::vec(note_strategy(), 1..10),
            victim in any::<prop::sample::Index>(),
        ) {
            let mut bytes = CacheResponse::new(messages.clone()).encode().to_vec();
            let offsets = entry_offsets(&bytes);
            let victim = victim.index(messages.len());
            // break the magic byte
            bytes[offsets[victim] + LENGTH_PREFIX_SIZE] = 0x00;

            let mut expected = messages;
            expected.remove(victim);

            let decoded = CacheResponse::<Note>::decode(&bytes);
            prop_assert_eq!(decoded.diagnostics.len(), 1);
            prop_assert_eq!(decoded.value.into_messages(), expected);
        }

        #[test]
        fn decode_never_panics(buf in proptest::collection::vec(any::<u8>(), 0..256)) {
            let decoded = CacheResponse::<Note>::decode(&buf);
            prop_assert!(decoded.value.len() <= decoded.value.declared_count() as usize);
        }
    }
}
