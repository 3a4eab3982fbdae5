//! Cache request: what the requester already holds, per source.
//!
//! Each entry names a source contact and the highest sequence counter cached
//! from it. Contacts carry no length prefix, so a contact that fails to
//! decode hides where the next entry starts. The decoder stops there and
//! keeps the entries before it.

use bytes::{BufMut, Bytes, BytesMut};

use super::{COUNT_SIZE, decode_entries};
use crate::{
    codec::Contact,
    config::DecodeConfig,
    cursor::Cursor,
    diagnostics::{Decoded, SkipReason},
};

/// Size of the sequence counter preceding each contact.
pub const SEQ_SIZE: usize = 8;

/// One cache-request entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheSourceRef<C> {
    /// Highest sequence counter cached from `source`
    pub seq: u64,
    /// Originating contact
    pub source: C,
}

impl<C: Contact> CacheSourceRef<C> {
    /// Entry for `source` up to `seq`.
    pub fn new(seq: u64, source: C) -> Self {
        Self { seq, source }
    }

    /// Append `[seq (8)][contact]` to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64_le(self.seq);
        self.source.encode(buf);
    }

    /// Encode this entry on its own.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode one entry at the cursor.
    ///
    /// On success the cursor sits on the next entry. On failure it does not
    /// move, and the reason is always terminal.
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self, SkipReason> {
        let mut probe = *cursor;
        let seq = probe
            .read_u64()
            .ok_or(SkipReason::TruncatedSequence { remaining: cursor.remaining() })?;

        let (source, tail) = C::decode(probe.rest()).ok_or(SkipReason::CorruptContact)?;
        probe.advance_to(tail).ok_or(SkipReason::CorruptContact)?;

        *cursor = probe;
        Ok(Self { seq, source })
    }
}

/// List of entries describing the requester's cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest<C> {
    declared_count: u32,
    entries: Vec<CacheSourceRef<C>>,
}

impl<C: Contact> CacheRequest<C> {
    /// Smallest possible entry: sequence counter plus one contact byte.
    const MIN_ENTRY_SIZE: usize = SEQ_SIZE + 1;

    /// Request listing `entries`.
    pub fn new(entries: Vec<CacheSourceRef<C>>) -> Self {
        Self { declared_count: entries.len() as u32, entries }
    }

    /// Append an entry.
    pub fn push(&mut self, entry: CacheSourceRef<C>) {
        self.entries.push(entry);
        self.declared_count = self.entries.len() as u32;
    }

    /// Entry count from the wire header.
    ///
    /// For a decoded request this may exceed [`CacheRequest::len`].
    pub fn declared_count(&self) -> u32 {
        self.declared_count
    }

    /// Entries actually present.
    pub fn entries(&self) -> &[CacheSourceRef<C>] {
        &self.entries
    }

    /// Take ownership of the entries.
    pub fn into_entries(self) -> Vec<CacheSourceRef<C>> {
        self.entries
    }

    /// Number of entries actually present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the request lists no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the request. The count written is the entry list length.
    pub fn encode(&self) -> Bytes {
        encode_cache_request(&self.entries)
    }

    /// Decode a request, salvaging what it can.
    pub fn decode(buf: &[u8]) -> Decoded<Self> {
        Self::decode_with(buf, &DecodeConfig::default())
    }

    /// [`CacheRequest::decode`] with explicit decoder limits.
    pub fn decode_with(buf: &[u8], config: &DecodeConfig) -> Decoded<Self> {
        decode_entries(buf, config, Self::MIN_ENTRY_SIZE, CacheSourceRef::<C>::decode)
            .map(|list| Self { declared_count: list.declared, entries: list.entries })
    }
}

impl<C: Contact> FromIterator<CacheSourceRef<C>> for CacheRequest<C> {
    fn from_iter<I: IntoIterator<Item = CacheSourceRef<C>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Serialize a cache request listing `entries`.
pub fn encode_cache_request<C: Contact>(entries: &[CacheSourceRef<C>]) -> Bytes {
    let capacity = COUNT_SIZE + entries.len() * CacheRequest::<C>::MIN_ENTRY_SIZE;
    let mut buf = BytesMut::with_capacity(capacity);
    buf.put_u32_le(entries.len() as u32);
    for entry in entries {
        entry.encode(&mut buf);
    }
    buf.freeze()
}

/// Decode a cache request with default limits.
pub fn decode_cache_request<C: Contact>(buf: &[u8]) -> Decoded<CacheRequest<C>> {
    CacheRequest::decode(buf)
}
