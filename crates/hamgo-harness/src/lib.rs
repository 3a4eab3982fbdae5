//! Deterministic simulation harness for hamgo cache synchronization.
//!
//! Concrete [`Contact`](hamgo_proto::Contact) and
//! [`Message`](hamgo_proto::Message) types, an in-memory node that keeps its
//! own cache and speaks the protocol over byte buffers, and seeded fault
//! injection for the links between nodes. Scenario tests drive full
//! request/response exchanges through all of it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fault;
pub mod scenario;
pub mod sim_contact;
pub mod sim_message;
pub mod sim_node;

pub use fault::{Fault, FaultInjector, entry_spans};
pub use scenario::{OracleFn, RunnableScenario, Scenario, SyncStats, World};
pub use sim_contact::SimContact;
pub use sim_message::SimMessage;
pub use sim_node::{SimNode, SyncReport};
