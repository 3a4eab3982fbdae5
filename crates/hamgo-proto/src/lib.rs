//! Wire format for the hamgo cache-synchronization protocol.
//!
//! A node that wants to catch up asks a peer for the messages it is missing by
//! sending a [`CacheRequest`]: one entry per known source, carrying the highest
//! sequence counter it already holds. The peer answers with a
//! [`CacheResponse`] carrying the missing messages. Both travel inside an
//! [`Envelope`], a 3-byte header tagging the payload with its [`Operation`]
//! and exact length.
//!
//! # Failure model
//!
//! The envelope is the outermost framing, so a malformed envelope is a hard
//! [`ProtocolError`]. The list payloads inside it are decoded leniently:
//! declared counts are treated as upper bounds, and every response entry is
//! length-prefixed so a single corrupted message is skipped without losing
//! the entries that follow it. What was skipped and why is returned to the
//! caller as [`Diagnostic`]s alongside the value ([`Decoded`]), never logged
//! from inside the parser.
//!
//! Contacts and messages are opaque to this crate. Callers plug in their own
//! types through the [`Contact`] and [`Message`] traits.
//!
//! ```text
//! requester                                   responder
//! ─────────                                   ─────────
//! CacheRequest ─▶ Envelope(op=0) ──────────▶ Envelope ─▶ CacheRequest
//!                                                          │ lookup
//! messages ◀─ CacheResponse ◀─ Envelope ◀──── Envelope(op=1) ◀┘
//! ```
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod cursor;
pub mod diagnostics;
pub mod envelope;
pub mod errors;
pub mod exchange;
pub mod operation;
pub mod payloads;

pub use codec::{Contact, Message};
pub use config::DecodeConfig;
pub use cursor::Cursor;
pub use diagnostics::{Decoded, Diagnostic, SkipReason};
pub use envelope::{Envelope, EnvelopeHeader};
pub use errors::{ProtocolError, Result};
pub use operation::Operation;
pub use payloads::{CacheRequest, CacheResponse, CacheSourceRef, FramedMessage, Payload};
