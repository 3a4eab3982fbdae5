//! Operation codes carried in the envelope header.

use std::fmt;

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Operation tag identifying the payload inside an envelope.
///
/// The discriminants are the on-wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Operation {
    /// Requester lists what it already holds, per source
    CacheRequest = 0,
    /// Responder delivers the messages the requester is missing
    CacheResponse = 1,
}

impl Operation {
    /// Decode an operation from its wire value.
    ///
    /// Returns `None` for unassigned codes.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::CacheRequest),
            1 => Some(Self::CacheResponse),
            _ => None,
        }
    }

    /// Wire value of this operation.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheRequest => f.write_str("cache-request"),
            Self::CacheResponse => f.write_str("cache-response"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_are_stable() {
        assert_eq!(Operation::CacheRequest.to_u8(), 0);
        assert_eq!(Operation::CacheResponse.to_u8(), 1);
    }

    #[test]
    fn from_u8_rejects_unassigned_codes() {
        assert_eq!(Operation::from_u8(0), Some(Operation::CacheRequest));
        assert_eq!(Operation::from_u8(1), Some(Operation::CacheResponse));
        assert_eq!(Operation::from_u8(2), None);
        assert_eq!(Operation::from_u8(0xff), None);
    }
}
