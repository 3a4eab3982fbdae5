//! Codec contracts for the opaque types carried by cache payloads.
//!
//! Contacts and messages are defined outside this crate. The payload codecs
//! only need to know how to write them and how to read them back, so that is
//! all these traits ask for.

use bytes::{BufMut, Bytes, BytesMut};

/// Peer identity naming the source of cached messages.
///
/// The contact encoding must be self-delimiting: a cache request places
/// contacts back to back with no length prefix, so the decoder alone decides
/// where one ends.
pub trait Contact: Sized {
    /// Append the wire encoding of this contact to `buf`.
    fn encode(&self, buf: &mut BytesMut);

    /// Decode a contact from the front of `buf`.
    ///
    /// Returns the contact and the unconsumed tail of `buf`, or `None` if the
    /// bytes do not start with a valid contact.
    fn decode(buf: &[u8]) -> Option<(Self, &[u8])>;
}

/// Application message synchronized between caches.
///
/// Messages are always framed by an outer length prefix, so the decoder sees
/// exactly the bytes of one message and need not be self-delimiting.
pub trait Message: Sized {
    /// Append the wire encoding of this message to `buf`.
    fn encode(&self, buf: &mut BytesMut);

    /// Decode a message occupying all of `buf`.
    ///
    /// Returns `None` if the bytes are not a valid message.
    fn decode(buf: &[u8]) -> Option<Self>;

    /// Length of the wire encoding in bytes.
    ///
    /// The default encodes into a scratch buffer; override it when the length
    /// is cheaper to compute directly.
    fn encoded_len(&self) -> usize {
        let mut scratch = BytesMut::new();
        self.encode(&mut scratch);
        scratch.len()
    }
}

/// Raw passthrough for callers that keep messages opaque.
impl Message for Bytes {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(self);
    }

    fn decode(buf: &[u8]) -> Option<Self> {
        Some(Self::copy_from_slice(buf))
    }

    fn encoded_len(&self) -> usize {
        self.len()
    }
}

impl Message for Vec<u8> {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(self);
    }

    fn decode(buf: &[u8]) -> Option<Self> {
        Some(buf.to_vec())
    }

    fn encoded_len(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Minimal contact and message types for unit tests.

    use bytes::{BufMut, BytesMut};

    use super::{Contact, Message};

    /// Contact encoded as `[len (1)][ascii name]`; empty or non-ascii names
    /// are rejected.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Name(pub String);

    impl Name {
        pub fn new(name: &str) -> Self {
            Self(name.to_string())
        }
    }

    impl Contact for Name {
        fn encode(&self, buf: &mut BytesMut) {
            buf.put_u8(self.0.len() as u8);
            buf.put_slice(self.0.as_bytes());
        }

        fn decode(buf: &[u8]) -> Option<(Self, &[u8])> {
            let (&len, rest) = buf.split_first()?;
            let len = usize::from(len);
            if len == 0 || rest.len() < len {
                return None;
            }
            let (name, rest) = rest.split_at(len);
            if !name.iter().all(u8::is_ascii_alphanumeric) {
                return None;
            }
            let name = std::str::from_utf8(name).ok()?;
            Some((Self(name.to_string()), rest))
        }
    }

    /// Message encoded as `[0xA5][id (8, LE)][body][xor of body]`.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Note {
        pub id: u64,
        pub body: Vec<u8>,
    }

    impl Note {
        pub const MAGIC: u8 = 0xA5;

        pub fn new(id: u64, body: &[u8]) -> Self {
            Self { id, body: body.to_vec() }
        }

        fn checksum(body: &[u8]) -> u8 {
            body.iter().fold(0, |acc, b| acc ^ b)
        }
    }

    impl Message for Note {
        fn encode(&self, buf: &mut BytesMut) {
            buf.put_u8(Self::MAGIC);
            buf.put_u64_le(self.id);
            buf.put_slice(&self.body);
            buf.put_u8(Self::checksum(&self.body));
        }

        fn decode(buf: &[u8]) -> Option<Self> {
            if buf.len() < 10 || buf[0] != Self::MAGIC {
                return None;
            }
            let id = u64::from_le_bytes(buf[1..9].try_into().ok()?);
            let (body, check) = buf[9..].split_at(buf.len() - 10);
            if check[0] != Self::checksum(body) {
                return None;
            }
            Some(Self { id, body: body.to_vec() })
        }
    }
}
