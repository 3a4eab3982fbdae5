//! Cache synchronization exchange over byte buffers.
//!
//! ```text
//! requester: build_request ──bytes──▶ responder: answer_request(lookup)
//! requester: accept_response ◀──bytes──┘
//! ```
//!
//! The helpers only frame and unframe. Deciding when to sync, looking up
//! messages and storing what arrives stay with the caller.

use bytes::Bytes;
use tracing::debug;

use crate::{
    codec::{Contact, Message},
    config::DecodeConfig,
    cursor::LENGTH_PREFIX_SIZE,
    diagnostics::Decoded,
    envelope::{Envelope, EnvelopeHeader},
    errors::{ProtocolError, Result},
    operation::Operation,
    payloads::{COUNT_SIZE, CacheRequest, CacheResponse, CacheSourceRef, FramedMessage},
};

/// Build an enveloped cache request listing what the caller already holds.
pub fn build_request<C: Contact>(entries: Vec<CacheSourceRef<C>>) -> Result<Bytes> {
    let request = CacheRequest::new(entries);
    let envelope = Envelope::new(Operation::CacheRequest, request.encode())?;

    debug!(entries = request.len(), bytes = envelope.encoded_len(), "built cache request");
    Ok(envelope.encode())
}

/// Outcome of answering a cache request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Enveloped cache response, ready to send
    pub response: Bytes,
    /// Messages included in the response
    pub sent: usize,
    /// Messages left out because the envelope was full
    pub deferred: usize,
}

/// Answer an enveloped cache request.
///
/// `lookup` receives the salvaged request and returns the messages the
/// requester is missing, in the order they should be delivered. Messages
/// that do not fit a single envelope are left out and counted in
/// [`Answer::deferred`]; the requester picks them up on its next request.
///
/// Fails if the envelope is malformed or does not carry a cache request.
/// The returned diagnostics describe what was skipped while decoding the
/// request.
pub fn answer_request<C, M, F>(request: &[u8], lookup: F) -> Result<Decoded<Answer>>
where
    C: Contact,
    M: Message,
    F: FnOnce(&CacheRequest<C>) -> Vec<M>,
{
    answer_request_with(request, &DecodeConfig::default(), lookup)
}

/// [`answer_request`] with explicit decoder limits.
pub fn answer_request_with<C, M, F>(
    request: &[u8],
    config: &DecodeConfig,
    lookup: F,
) -> Result<Decoded<Answer>>
where
    C: Contact,
    M: Message,
    F: FnOnce(&CacheRequest<C>) -> Vec<M>,
{
    let envelope = expect_operation(request, Operation::CacheRequest)?;
    let decoded = CacheRequest::<C>::decode_with(envelope.data(), config);

    let messages = lookup(&decoded.value);
    let total = messages.len();
    let entries = fill_envelope(messages);
    let sent = entries.len();

    let response = CacheResponse::from_entries(entries);
    let envelope = Envelope::new(Operation::CacheResponse, response.encode())?;

    debug!(
        requested = decoded.value.len(),
        sent,
        deferred = total - sent,
        bytes = envelope.encoded_len(),
        "answered cache request"
    );

    Ok(decoded.map(|_| Answer { response: envelope.encode(), sent, deferred: total - sent }))
}

/// Unwrap an enveloped cache response into the recovered messages.
///
/// Fails only if the envelope is malformed or carries something other than
/// a cache response. Corrupted messages are dropped and reported in the
/// diagnostics.
pub fn accept_response<M: Message>(response: &[u8]) -> Result<Decoded<Vec<M>>> {
    accept_response_with(response, &DecodeConfig::default())
}

/// [`accept_response`] with explicit decoder limits.
pub fn accept_response_with<M: Message>(
    response: &[u8],
    config: &DecodeConfig,
) -> Result<Decoded<Vec<M>>> {
    let envelope = expect_operation(response, Operation::CacheResponse)?;
    let decoded = CacheResponse::<M>::decode_with(envelope.data(), config);

    debug!(
        declared = decoded.value.declared_count(),
        recovered = decoded.value.len(),
        skipped = decoded.diagnostics.len(),
        "accepted cache response"
    );

    Ok(decoded.map(CacheResponse::into_messages))
}

fn expect_operation(buf: &[u8], expected: Operation) -> Result<Envelope> {
    let envelope = Envelope::decode(buf)?;
    if envelope.operation() != expected {
        return Err(ProtocolError::UnexpectedOperation { expected, actual: envelope.operation() });
    }
    Ok(envelope)
}

/// Frame messages in order until the next one would overflow an envelope.
fn fill_envelope<M: Message>(messages: Vec<M>) -> Vec<FramedMessage<M>> {
    let mut used = COUNT_SIZE;
    let mut entries = Vec::with_capacity(messages.len());

    for message in messages {
        let entry = FramedMessage::new(message);
        let size = LENGTH_PREFIX_SIZE + entry.length() as usize;
        if used + size > EnvelopeHeader::MAX_DATA_LEN {
            break;
        }
        used += size;
        entries.push(entry);
    }

    entries
}

/// Size of the enveloped response that would carry `messages`.
pub fn response_size<M: Message>(messages: &[M]) -> usize {
    EnvelopeHeader::SIZE
        + COUNT_SIZE
        + messages.iter().map(|m| LENGTH_PREFIX_SIZE + m.encoded_len()).sum::<usize>()
}
