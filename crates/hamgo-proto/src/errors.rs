//! Error types for envelope framing.
//!
//! Only the envelope layer can fail outright. List payloads never return an
//! error; they report skipped entries through [`crate::Diagnostic`] instead.

use thiserror::Error;

use crate::operation::Operation;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while framing or unframing an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Buffer too short to hold the envelope header.
    #[error("envelope header truncated: expected {expected} bytes, got {actual}")]
    HeaderTooShort {
        /// Header size in bytes
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Declared data length runs past the end of the buffer.
    #[error("envelope declares {declared} data bytes but only {available} remain")]
    DataTruncated {
        /// Length from the header
        declared: usize,
        /// Bytes remaining after the header
        available: usize,
    },

    /// Operation byte does not name a known operation.
    #[error("unknown operation code: {0:#04x}")]
    UnknownOperation(u8),

    /// Payload does not fit the 16-bit length field.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload size in bytes
        size: usize,
        /// Largest encodable payload
        max: usize,
    },

    /// Envelope carried a different operation than the caller expected.
    #[error("unexpected operation: expected {expected}, got {actual}")]
    UnexpectedOperation {
        /// Operation the caller can handle
        expected: Operation,
        /// Operation found in the envelope
        actual: Operation,
    },
}
