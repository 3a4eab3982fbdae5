//! Structured outcome of lenient list decoding.
//!
//! List decoders never fail. Anything they had to drop or could not read is
//! described by a [`Diagnostic`] and handed back next to the salvaged value,
//! so the caller decides whether to log it, count it, or ignore it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a decoder dropped an entry or stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Payload too short for the 4-byte entry count
    MissingCount {
        /// Bytes in the payload
        remaining: usize,
    },
    /// Buffer ran out cleanly before the declared count was reached
    CountExceedsEntries {
        /// Count from the payload header
        declared: u32,
        /// Entries walked before the buffer ran out
        walked: u32,
    },
    /// Decoder stopped at the configured entry bound
    EntryLimitReached {
        /// Count from the payload header
        declared: u32,
        /// Configured bound
        limit: u32,
    },
    /// Fewer than 4 bytes left where a length prefix was expected
    TruncatedLengthPrefix {
        /// Bytes remaining
        remaining: usize,
    },
    /// Length prefix runs past the end of the buffer
    LengthExceedsBuffer {
        /// Length from the prefix
        declared: u32,
        /// Bytes remaining after the prefix
        remaining: usize,
    },
    /// Message bytes did not decode; skipped by declared length
    CorruptMessage {
        /// Bytes skipped
        declared: u32,
    },
    /// Fewer than 8 bytes left where a sequence counter was expected
    TruncatedSequence {
        /// Bytes remaining
        remaining: usize,
    },
    /// Contact did not decode; no later entry boundary can be found
    CorruptContact,
    /// Bytes left over after the last declared entry
    TrailingBytes {
        /// Number of unread bytes
        len: usize,
    },
}

impl SkipReason {
    /// True when decoding stopped at this point rather than skipping one
    /// entry and carrying on.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::CorruptMessage { .. } | Self::TrailingBytes { .. })
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCount { remaining } => {
                write!(f, "payload too short for entry count ({remaining} bytes)")
            },
            Self::CountExceedsEntries { declared, walked } => {
                write!(f, "declared {declared} entries but buffer ended after {walked}")
            },
            Self::EntryLimitReached { declared, limit } => {
                write!(f, "declared {declared} entries, stopped at limit {limit}")
            },
            Self::TruncatedLengthPrefix { remaining } => {
                write!(f, "length prefix truncated ({remaining} bytes left)")
            },
            Self::LengthExceedsBuffer { declared, remaining } => {
                write!(f, "declared length {declared} exceeds remaining {remaining} bytes")
            },
            Self::CorruptMessage { declared } => {
                write!(f, "message failed to decode, skipped {declared} bytes")
            },
            Self::TruncatedSequence { remaining } => {
                write!(f, "sequence counter truncated ({remaining} bytes left)")
            },
            Self::CorruptContact => f.write_str("contact failed to decode"),
            Self::TrailingBytes { len } => write!(f, "{len} trailing bytes after last entry"),
        }
    }
}

/// A single skip event recorded during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Zero-based index of the entry being decoded
    pub entry: u32,
    /// Payload offset where the problem was found
    pub offset: usize,
    /// What went wrong
    pub reason: SkipReason,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry {} at offset {}: {}", self.entry, self.offset, self.reason)
    }
}

/// A decoded value together with everything the decoder had to skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<T> {
    /// Salvaged value
    pub value: T,
    /// Skip events, in payload order
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Decoded<T> {
    /// Wrap a value with its diagnostics.
    pub fn new(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self { value, diagnostics }
    }

    /// True when nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Discard the diagnostics.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Transform the value, keeping the diagnostics.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        Decoded { value: f(self.value), diagnostics: self.diagnostics }
    }

    /// Emit every diagnostic as a `tracing` warning.
    ///
    /// `context` names the payload being decoded, e.g. the operation.
    pub fn report(&self, context: &str) {
        for diagnostic in &self.diagnostics {
            tracing::warn!(
                context,
                entry = diagnostic.entry,
                offset = diagnostic.offset,
                terminal = diagnostic.reason.is_terminal(),
                "skipped cache entry: {}",
                diagnostic.reason
            );
        }
    }
}
