//! Cache synchronization payloads.
//!
//! Both payloads are a 4-byte little-endian entry count followed by the
//! entries back to back:
//!
//! ```text
//! CacheRequest:  count (4) | { seq (8) | contact (self-delimiting) }*
//! CacheResponse: count (4) | { len (4) | message (len) }*
//! ```
//!
//! Decoding never fails. The count is an upper bound on how many entries are
//! attempted, not a promise about how many come back.

pub mod cache_request;
pub mod cache_response;

use bytes::Bytes;
pub use cache_request::{CacheRequest, CacheSourceRef, decode_cache_request, encode_cache_request};
pub use cache_response::{
    CacheResponse, FramedMessage, decode_cache_response, encode_cache_response,
};

use crate::{
    codec::{Contact, Message},
    config::DecodeConfig,
    cursor::Cursor,
    diagnostics::{Decoded, Diagnostic, SkipReason},
    envelope::Envelope,
    errors::Result,
    operation::Operation,
};

/// Size of the entry count that opens both payloads.
pub const COUNT_SIZE: usize = 4;

/// A decoded payload, dispatched by its envelope operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<C, M> {
    /// What the requester already holds
    CacheRequest(CacheRequest<C>),
    /// Messages the requester is missing
    CacheResponse(CacheResponse<M>),
}

impl<C: Contact, M: Message> Payload<C, M> {
    /// Operation tag for this payload.
    pub fn operation(&self) -> Operation {
        match self {
            Self::CacheRequest(_) => Operation::CacheRequest,
            Self::CacheResponse(_) => Operation::CacheResponse,
        }
    }

    /// Serialize the payload body (without envelope).
    pub fn encode(&self) -> Bytes {
        match self {
            Self::CacheRequest(request) => request.encode(),
            Self::CacheResponse(response) => response.encode(),
        }
    }

    /// Wrap the payload in an envelope.
    pub fn to_envelope(&self) -> Result<Envelope> {
        Envelope::new(self.operation(), self.encode())
    }

    /// Decode the envelope's data according to its operation.
    pub fn from_envelope(envelope: &Envelope) -> Decoded<Self> {
        Self::from_envelope_with(envelope, &DecodeConfig::default())
    }

    /// [`Payload::from_envelope`] with explicit decoder limits.
    pub fn from_envelope_with(envelope: &Envelope, config: &DecodeConfig) -> Decoded<Self> {
        match envelope.operation() {
            Operation::CacheRequest => {
                CacheRequest::decode_with(envelope.data(), config).map(Self::CacheRequest)
            },
            Operation::CacheResponse => {
                CacheResponse::decode_with(envelope.data(), config).map(Self::CacheResponse)
            },
        }
    }

    /// Parse an envelope and its payload in one step.
    ///
    /// Fails only if the envelope itself is malformed.
    pub fn decode(buf: &[u8]) -> Result<Decoded<Self>> {
        Ok(Self::from_envelope(&Envelope::decode(buf)?))
    }
}

/// Entries recovered by [`decode_entries`].
pub(crate) struct EntryList<T> {
    pub declared: u32,
    pub entries: Vec<T>,
}

/// Shared list-decoding loop.
///
/// Reads the count, then calls `decode_entry` at most
/// `config.entry_budget(count)` times. A non-terminal [`SkipReason`] drops the
/// entry and continues; the entry decoder must already have moved the cursor
/// past it. A terminal reason ends the walk.
pub(crate) fn decode_entries<'a, T>(
    buf: &'a [u8],
    config: &DecodeConfig,
    min_entry_size: usize,
    mut decode_entry: impl FnMut(&mut Cursor<'a>) -> std::result::Result<T, SkipReason>,
) -> Decoded<EntryList<T>> {
    let mut cursor = Cursor::new(buf);
    let mut diagnostics = Vec::new();

    let Some(declared) = cursor.read_u32() else {
        diagnostics.push(Diagnostic {
            entry: 0,
            offset: 0,
            reason: SkipReason::MissingCount { remaining: buf.len() },
        });
        return Decoded::new(EntryList { declared: 0, entries: Vec::new() }, diagnostics);
    };

    let budget = config.entry_budget(declared);
    let capacity = (budget as usize).min(cursor.remaining() / min_entry_size.max(1));
    let mut entries = Vec::with_capacity(capacity);
    let mut stopped = false;

    for index in 0..budget {
        let offset = cursor.position();
        if cursor.is_empty() {
            diagnostics.push(Diagnostic {
                entry: index,
                offset,
                reason: SkipReason::CountExceedsEntries { declared, walked: index },
            });
            stopped = true;
            break;
        }

        match decode_entry(&mut cursor) {
            Ok(entry) => entries.push(entry),
            Err(reason) => {
                diagnostics.push(Diagnostic { entry: index, offset, reason });
                if reason.is_terminal() {
                    stopped = true;
                    break;
                }
            },
        }
    }

    if !stopped {
        if budget < declared {
            diagnostics.push(Diagnostic {
                entry: budget,
                offset: cursor.position(),
                reason: SkipReason::EntryLimitReached { declared, limit: config.max_entries },
            });
        } else if !cursor.is_empty() {
            diagnostics.push(Diagnostic {
                entry: budget,
                offset: cursor.position(),
                reason: SkipReason::TrailingBytes { len: cursor.remaining() },
            });
        }
    }

    Decoded::new(EntryList { declared, entries }, diagnostics)
}
