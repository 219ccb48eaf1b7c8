//! # CertSync Sync
//!
//! Two-party set reconciliation over rateless invertible Bloom filters.
//!
//! ## Overview
//!
//! One party transmits deterministic batches of filter cells; the other
//! accumulates them next to its own filter, subtracts, and runs the peeling
//! decoder after every batch. Because the mappings are rateless, the sender
//! can keep producing batches until the decode completes; because they are
//! chosen for listing guarantees, it eventually does, with the exact
//! difference split.
//!
//! For very large element domains (256-bit hashes), optional universe
//! reduction projects the working sets through a salted hash into a domain
//! sized by a collision budget and lifts decoded values back to originals,
//! repeating with fresh salts until a round finds nothing new.
//!
//! ## Key Properties
//!
//! - **Exact**: the recovered difference is the true difference, not an
//!   approximation with a failure probability
//! - **Rateless**: no code rate is committed up front; bandwidth scales with
//!   the actual difference size
//! - **Transport-agnostic**: the protocol is synchronous request/response
//!   over a [`Transport`] supplied by the caller
//!
//! ## Usage
//!
//! ```rust,no_run
//! use certsync_core::{Symbol, Universe};
//! use certsync_sync::{SessionParams, SyncSession, Transport};
//!
//! fn example<T: Transport>(transport: T, local_set: Vec<Symbol>) {
//!     let params = SessionParams::egh(Universe::Bounded(1_000_000));
//!     let mut session = SyncSession::new(transport, params).unwrap();
//!     session.add_local(&local_set);
//!     // One party runs run_initiator(), the other run_responder().
//!     // let report = session.run_initiator().unwrap();
//!     // println!("missing locally: {:?}", report.peer_exclusive);
//! }
//! ```

pub mod error;
pub mod messages;
pub mod protocol;
pub mod reduce;
pub mod session;
pub mod transport;

pub use error::{Result, SyncError};
pub use messages::{
    limits, HasherChoice, MappingChoice, ReduceParams, SessionParams, SyncErrorCode, SyncMessage,
    PROTOCOL_VERSION,
};
pub use protocol::{ReconcileReport, SyncConfig, SyncSession};
pub use reduce::{expected_collisions, reduce_set, reduced_universe, round_salt, ReducedSet};
pub use session::{
    reconcile_sets, BatchPayload, IterateOutcome, ReceiverSession, SenderSession, SetDifference,
};
pub use transport::{memory::MemoryTransport, Transport};
