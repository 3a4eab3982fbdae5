//! In-memory node that caches messages and speaks the sync protocol.
//!
//! The node plays both roles: it builds requests describing its own cache
//! gaps, answers requests from peers out of its cache, and ingests the
//! messages a response delivers.
//!
//! Gaps are described per source as the highest sequence counter `n` such
//! that `1..=n` are all cached. A message lost to corruption therefore keeps
//! the counter from advancing, and the next request asks for it again.

use std::collections::{BTreeMap, btree_map::Entry};

use bytes::Bytes;
use hamgo_proto::{
    CacheRequest, CacheSourceRef, Decoded, Diagnostic, Result,
    exchange::{self, Answer},
};
use tracing::debug;

use crate::{sim_contact::SimContact, sim_message::SimMessage};

/// What a node learned from one cache response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Messages recovered from the response
    pub received: usize,
    /// Messages that were new to this node's cache
    pub stored: usize,
    /// Entries the decoder had to skip
    pub diagnostics: Vec<Diagnostic>,
}

/// A node with its own message cache.
#[derive(Debug, Clone)]
pub struct SimNode {
    contact: SimContact,
    next_seq: u64,
    cache: BTreeMap<SimContact, BTreeMap<u64, SimMessage>>,
}

impl SimNode {
    /// Node identified by `contact`, with an empty cache.
    pub fn new(contact: SimContact) -> Self {
        Self { contact, next_seq: 1, cache: BTreeMap::new() }
    }

    /// This node's identity.
    pub fn contact(&self) -> &SimContact {
        &self.contact
    }

    /// Publish a new message from this node and cache it locally.
    pub fn publish(&mut self, body: impl Into<Vec<u8>>) -> SimMessage {
        let message = SimMessage::new(self.contact.clone(), self.next_seq, body);
        self.next_seq += 1;
        self.store(message.clone());
        message
    }

    /// Cache `message`. Returns false if it was already cached.
    pub fn store(&mut self, message: SimMessage) -> bool {
        let per_source = self.cache.entry(message.source.clone()).or_default();
        match per_source.entry(message.seq) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(message);
                true
            },
        }
    }

    /// True if the message from `source` with `seq` is cached.
    pub fn has(&self, source: &SimContact, seq: u64) -> bool {
        self.cache.get(source).is_some_and(|messages| messages.contains_key(&seq))
    }

    /// Cached message from `source` with `seq`.
    pub fn get(&self, source: &SimContact, seq: u64) -> Option<&SimMessage> {
        self.cache.get(source).and_then(|messages| messages.get(&seq))
    }

    /// Total number of cached messages.
    pub fn cached(&self) -> usize {
        self.cache.values().map(BTreeMap::len).sum()
    }

    /// `(source, seq)` of every cached message.
    pub fn cached_keys(&self) -> impl Iterator<Item = (SimContact, u64)> + '_ {
        self.cache
            .iter()
            .flat_map(|(source, messages)| messages.keys().map(move |&seq| (source.clone(), seq)))
    }

    /// Highest `n` such that messages `1..=n` from `source` are all cached.
    pub fn contiguous_seq(&self, source: &SimContact) -> u64 {
        let Some(messages) = self.cache.get(source) else {
            return 0;
        };

        let mut expected = 1;
        for &seq in messages.keys() {
            if seq != expected {
                break;
            }
            expected += 1;
        }
        expected - 1
    }

    /// Cache entries describing what this node already holds.
    pub fn cache_gaps(&self) -> Vec<CacheSourceRef<SimContact>> {
        self.cache
            .keys()
            .map(|source| CacheSourceRef::new(self.contiguous_seq(source), source.clone()))
            .collect()
    }

    /// Messages a peer described by `request` is missing, in source then
    /// sequence order.
    ///
    /// Sources the request does not mention are sent in full.
    pub fn missing_for(&self, request: &CacheRequest<SimContact>) -> Vec<SimMessage> {
        let known: BTreeMap<&SimContact, u64> =
            request.entries().iter().map(|entry| (&entry.source, entry.seq)).collect();

        self.cache
            .iter()
            .flat_map(|(source, messages)| {
                let after = known.get(source).copied().unwrap_or(0);
                messages.range(after.saturating_add(1)..).map(|(_, message)| message.clone())
            })
            .collect()
    }

    /// Build an enveloped cache request.
    pub fn request(&self) -> Result<Bytes> {
        exchange::build_request(self.cache_gaps())
    }

    /// Answer an enveloped cache request from a peer.
    pub fn answer(&self, request: &[u8]) -> Result<Decoded<Answer>> {
        exchange::answer_request(request, |request: &CacheRequest<SimContact>| {
            self.missing_for(request)
        })
    }

    /// Ingest an enveloped cache response.
    pub fn accept(&mut self, response: &[u8]) -> Result<SyncReport> {
        let decoded = exchange::accept_response::<SimMessage>(response)?;
        decoded.report(&self.contact.to_string());

        let received = decoded.value.len();
        let mut stored = 0;
        for message in decoded.value {
            if self.store(message) {
                stored += 1;
            }
        }
        debug!(node = %self.contact, received, stored, "ingested cache response");

        Ok(SyncReport { received, stored, diagnostics: decoded.diagnostics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u32, callsign: &str) -> SimNode {
        SimNode::new(SimContact::new(id, callsign))
    }

    #[test]
    fn publish_assigns_increasing_seq() {
        let mut alpha = node(1, "ALPHA");
        assert_eq!(alpha.publish(b"a".to_vec()).seq, 1);
        assert_eq!(alpha.publish(b"b".to_vec()).seq, 2);
        assert_eq!(alpha.contiguous_seq(alpha.contact()), 2);
    }

    #[test]
    fn contiguous_seq_stops_at_gap() {
        let mut alpha = node(1, "ALPHA");
        let source = SimContact::new(9, "REMOTE");
        for seq in [1, 2, 4, 5] {
            alpha.store(SimMessage::new(source.clone(), seq, Vec::new()));
        }

        assert_eq!(alpha.contiguous_seq(&source), 2);
        assert_eq!(alpha.contiguous_seq(&SimContact::new(10, "NOBODY")), 0);
    }

    #[test]
    fn store_deduplicates() {
        let mut alpha = node(1, "ALPHA");
        let message = SimMessage::new(SimContact::new(2, "BRAVO"), 1, b"x".to_vec());

        assert!(alpha.store(message.clone()));
        assert!(!alpha.store(message));
        assert_eq!(alpha.cached(), 1);
    }

    #[test]
    fn missing_for_respects_known_counters() {
        let mut bravo = node(2, "BRAVO");
        for body in ["one", "two", "three"] {
            bravo.publish(body.as_bytes().to_vec());
        }

        let request = CacheRequest::new(vec![CacheSourceRef::new(2, bravo.contact().clone())]);
        let missing = bravo.missing_for(&request);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].seq, 3);

        let everything = bravo.missing_for(&CacheRequest::new(Vec::new()));
        assert_eq!(everything.len(), 3);
    }

    #[test]
    fn one_round_syncs_two_nodes() {
        let mut alpha = node(1, "ALPHA");
        let mut bravo = node(2, "BRAVO");
        alpha.publish(b"from alpha".to_vec());
        bravo.publish(b"from bravo".to_vec());
        bravo.publish(b"again".to_vec());

        let request = alpha.request().unwrap();
        let answer = bravo.answer(&request).unwrap();
        let report = alpha.accept(&answer.value.response).unwrap();

        assert_eq!(report.received, 2);
        assert_eq!(report.stored, 2);
        assert!(report.diagnostics.is_empty());
        assert!(alpha.has(bravo.contact(), 1));
        assert!(alpha.has(bravo.contact(), 2));
    }
}
