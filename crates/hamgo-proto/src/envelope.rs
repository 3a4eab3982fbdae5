//! Outer envelope framing.
//!
//! ```text
//! offset 0: operation    (1 byte)
//! offset 1: data length  (2 bytes, little-endian)
//! offset 3: data         (data length bytes)
//! ```
//!
//! The envelope is the outermost frame, so there is no later boundary to
//! resynchronize against. Any malformation is a hard error and no partial
//! data is returned.

use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, byteorder::little_endian::U16,
};

use crate::{
    errors::{ProtocolError, Result},
    operation::Operation,
};

/// Fixed 3-byte envelope header.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
#[repr(C)]
pub struct EnvelopeHeader {
    operation: u8,
    data_len: U16,
}

impl EnvelopeHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 3;

    /// Largest payload the 16-bit length field can describe.
    pub const MAX_DATA_LEN: usize = u16::MAX as usize;

    /// Header for `data_len` bytes of `operation` payload.
    pub fn new(operation: Operation, data_len: u16) -> Self {
        Self { operation: operation.to_u8(), data_len: U16::new(data_len) }
    }

    /// Parse a header from the front of `buf`.
    ///
    /// Only checks that enough bytes are present; the operation byte is
    /// validated by [`EnvelopeHeader::operation`].
    pub fn from_bytes(buf: &[u8]) -> Result<&Self> {
        let (header, _) = Self::ref_from_prefix(buf).map_err(|_| {
            ProtocolError::HeaderTooShort { expected: Self::SIZE, actual: buf.len() }
        })?;
        Ok(header)
    }

    /// Raw operation byte.
    pub fn operation_raw(&self) -> u8 {
        self.operation
    }

    /// Decoded operation.
    pub fn operation(&self) -> Result<Operation> {
        Operation::from_u8(self.operation).ok_or(ProtocolError::UnknownOperation(self.operation))
    }

    /// Declared payload length.
    pub fn data_len(&self) -> u16 {
        self.data_len.get()
    }
}

/// An operation-tagged payload.
///
/// Only [`Envelope::new`] and [`Envelope::decode`] construct one, so `data`
/// always fits the 16-bit length field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    operation: Operation,
    data: Bytes,
}

impl Envelope {
    /// Envelope around `data`.
    ///
    /// Fails if `data` does not fit the 16-bit length field.
    pub fn new(operation: Operation, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if data.len() > EnvelopeHeader::MAX_DATA_LEN {
            return Err(ProtocolError::PayloadTooLarge {
                size: data.len(),
                max: EnvelopeHeader::MAX_DATA_LEN,
            });
        }
        Ok(Self { operation, data })
    }

    /// What the payload is.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Payload bytes, exactly as long as the header declares.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Take the payload bytes.
    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// Header describing this envelope.
    pub fn header(&self) -> EnvelopeHeader {
        EnvelopeHeader::new(self.operation, self.data.len() as u16)
    }

    /// Total encoded size.
    pub fn encoded_len(&self) -> usize {
        EnvelopeHeader::SIZE + self.data.len()
    }

    /// Serialize header and payload into a single buffer.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_slice(self.header().as_bytes());
        buf.put_slice(&self.data);
        buf.freeze()
    }

    /// Parse an envelope from `buf`.
    ///
    /// Bytes beyond the declared data length are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = EnvelopeHeader::from_bytes(buf)?;
        let operation = header.operation()?;

        let declared = usize::from(header.data_len());
        let body = &buf[EnvelopeHeader::SIZE..];
        let data = body.get(..declared).ok_or(ProtocolError::DataTruncated {
            declared,
            available: body.len(),
        })?;

        Ok(Self { operation, data: Bytes::copy_from_slice(data) })
    }
}

/// Wrap `data` in an envelope and serialize it.
pub fn encode_envelope(operation: Operation, data: &[u8]) -> Result<Bytes> {
    Ok(Envelope::new(operation, Bytes::copy_from_slice(data))?.encode())
}

/// Parse an envelope from `buf`.
pub fn decode_envelope(buf: &[u8]) -> Result<Envelope> {
    Envelope::decode(buf)
}
