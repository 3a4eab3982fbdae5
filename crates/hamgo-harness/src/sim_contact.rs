//! Simulated peer identity.

use std::fmt;

use bytes::{BufMut, BytesMut};
use hamgo_proto::Contact;

/// Peer identity: numeric node id plus a callsign.
///
/// Wire form is `[node_id (4, LE)][len (1)][callsign]`. The callsign must be
/// 1 to [`SimContact::MAX_CALLSIGN`] ASCII uppercase letters or digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimContact {
    /// Numeric node id
    pub node_id: u32,
    /// Callsign, uppercase ASCII alphanumerics
    pub callsign: String,
}

impl SimContact {
    /// Longest accepted callsign.
    pub const MAX_CALLSIGN: usize = 16;

    /// Contact for `node_id` with `callsign`.
    pub fn new(node_id: u32, callsign: impl Into<String>) -> Self {
        Self { node_id, callsign: callsign.into() }
    }

    fn valid_callsign(bytes: &[u8]) -> bool {
        (1..=Self::MAX_CALLSIGN).contains(&bytes.len())
            && bytes.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    }
}

impl Contact for SimContact {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.node_id);
        buf.put_u8(self.callsign.len() as u8);
        buf.put_slice(self.callsign.as_bytes());
    }

    fn decode(buf: &[u8]) -> Option<(Self, &[u8])> {
        let (id, rest) = buf.split_first_chunk::<4>()?;
        let (&len, rest) = rest.split_first()?;
        let len = usize::from(len);
        if rest.len() < len {
            return None;
        }

        let (callsign, rest) = rest.split_at(len);
        if !Self::valid_callsign(callsign) {
            return None;
        }

        let callsign = String::from_utf8(callsign.to_vec()).ok()?;
        Some((Self { node_id: u32::from_le_bytes(*id), callsign }, rest))
    }
}

impl fmt::Display for SimContact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.callsign, self.node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(contact: &SimContact) -> BytesMut {
        let mut buf = BytesMut::new();
        contact.encode(&mut buf);
        buf
    }

    #[test]
    fn decode_returns_unconsumed_tail() {
        let mut buf = encoded(&SimContact::new(7, "DL1ABC"));
        buf.put_slice(&[0xEE]);

        let (contact, rest) = SimContact::decode(&buf).unwrap();
        assert_eq!(contact, SimContact::new(7, "DL1ABC"));
        assert_eq!(rest, &[0xEE]);
    }

    #[test]
    fn rejects_invalid_callsigns() {
        for callsign in ["", "lower", "WAY2LONGCALLSIGN0", "AB-1"] {
            let buf = encoded(&SimContact::new(1, callsign));
            assert!(SimContact::decode(&buf).is_none(), "accepted {callsign:?}");
        }
    }

    #[test]
    fn rejects_truncated_contact() {
        let buf = encoded(&SimContact::new(1, "OE3XYZ"));
        for cut in 0..buf.len() {
            assert!(SimContact::decode(&buf[..cut]).is_none());
        }
    }
}
