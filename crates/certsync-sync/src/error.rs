//! Error types for the sync protocol.

use thiserror::Error;

use certsync_core::{CoreError, WireError};

use crate::messages::SyncErrorCode;

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur during a reconciliation session.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Protocol version mismatch with peer.
    #[error("protocol version mismatch: local={local}, peer={peer}")]
    VersionMismatch { local: u8, peer: u8 },

    /// Session parameters differ between the two parties. Fatal: detected at
    /// setup, before any cells flow.
    #[error("session parameters differ from peer: {0}")]
    MappingMismatch(String),

    /// Message arrived out of protocol order or with inconsistent fields.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A message exceeded the negotiated size limits.
    #[error("message limit exceeded: {0}")]
    LimitExceeded(&'static str),

    /// A batch arrived for an unexpected iteration.
    #[error("batch for iteration {got} out of order (expected {expected})")]
    OutOfOrderBatch { expected: u64, got: u64 },

    /// The outer round loop failed to terminate within the configured bound.
    #[error("round limit of {limit} exceeded")]
    RoundLimit { limit: u64 },

    /// Timed out waiting for a peer message.
    #[error("timed out {0}")]
    Timeout(String),

    /// Transport-level failure.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The peer reported an error.
    #[error("peer error {code:?}: {message}")]
    PeerError {
        code: SyncErrorCode,
        message: String,
    },

    /// Filter-level failure (mismatched widths, sizes, or mappings).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Malformed cell bytes on receive.
    #[error("malformed cell bytes: {0}")]
    Serialization(#[from] WireError),
}
