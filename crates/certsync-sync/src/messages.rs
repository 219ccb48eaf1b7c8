//! Sync protocol message types.
//!
//! These messages are exchanged between the two parties of a reconciliation
//! session. Cell batches travel pre-encoded (the bit-exact codec lives in
//! `certsync_core::wire`); everything else is plain data the transport may
//! serialize however it likes.

use serde::{Deserialize, Serialize};

use certsync_core::{CellHasher, Mapping, Symbol, Universe};

use crate::error::SyncError;

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 0;

/// Message size limits.
pub mod limits {
    /// Max encoded cell bytes in a single Batch message.
    pub const MAX_BATCH_BYTES: usize = 1 << 22;
    /// Max symbols in a RoundResult or Originals message.
    pub const MAX_SYMBOLS_PER_MESSAGE: usize = 1 << 20;
}

/// Which placement rule a session uses.
///
/// A fixed Latin-square order only makes sense when the working universe is
/// fixed; sessions with universe reduction re-derive the order from each
/// round's reduced universe, so `Ols { order: None }` defers the choice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MappingChoice {
    /// Prime-moduli batches.
    Egh,
    /// Latin-square batches, with an optional fixed order.
    Ols { order: Option<u64> },
}

/// Cell hasher selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HasherChoice {
    /// Pick by universe size.
    Auto,
    /// Use a specific variant regardless of universe.
    Explicit(CellHasher),
}

/// Universe-reduction settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReduceParams {
    /// Collision-expectation budget per round. Typical values: 1, 10, 100.
    pub delta: f64,
}

/// Everything both parties must agree on before reconciling.
///
/// Established out of band or through the Hello exchange; a structural
/// mismatch is fatal to the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionParams {
    /// Placement rule.
    pub mapping: MappingChoice,
    /// Element domain of the original sets.
    pub universe: Universe,
    /// Cell hash selection.
    pub hasher: HasherChoice,
    /// Universe reduction, or `None` to reconcile in the raw universe.
    pub reduce: Option<ReduceParams>,
}

impl SessionParams {
    /// Plain EGH parameters over a bounded universe, hasher by size.
    pub fn egh(universe: Universe) -> Self {
        Self {
            mapping: MappingChoice::Egh,
            universe,
            hasher: HasherChoice::Auto,
            reduce: None,
        }
    }

    /// Latin-square parameters with the order derived from the universe.
    pub fn ols(universe: Universe) -> Self {
        Self {
            mapping: MappingChoice::Ols { order: None },
            universe,
            hasher: HasherChoice::Auto,
            reduce: None,
        }
    }

    /// Enable universe reduction with the given collision budget.
    pub fn with_reduce(mut self, delta: f64) -> Self {
        self.reduce = Some(ReduceParams { delta });
        self
    }

    /// Resolve the concrete mapping for a working universe.
    pub fn mapping_for(&self, universe: &Universe) -> Result<Mapping, SyncError> {
        let mapping = match self.mapping {
            MappingChoice::Egh => Mapping::Egh,
            MappingChoice::Ols { order: Some(order) } => Mapping::Ols { order },
            MappingChoice::Ols { order: None } => Mapping::ols_for_universe(universe)?,
        };
        mapping.validate(universe)?;
        Ok(mapping)
    }

    /// Resolve the cell hasher for a working universe.
    pub fn hasher_for(&self, universe: &Universe) -> CellHasher {
        match self.hasher {
            HasherChoice::Auto => CellHasher::for_universe(universe),
            HasherChoice::Explicit(hasher) => hasher,
        }
    }

    /// Sanity-check the parameter combination at session construction.
    pub fn validate(&self) -> Result<(), SyncError> {
        if let Some(reduce) = &self.reduce {
            if !(reduce.delta > 0.0) {
                return Err(SyncError::InvalidMessage(format!(
                    "collision budget must be positive, got {}",
                    reduce.delta
                )));
            }
        } else {
            // Without reduction the session universe is the working
            // universe; the mapping must be able to serve it directly.
            self.mapping_for(&self.universe)?;
        }
        Ok(())
    }
}

/// Error codes carried in [`SyncMessage::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum SyncErrorCode {
    /// Unknown/unspecified error.
    Unknown = 0,
    /// Protocol version mismatch.
    VersionMismatch = 1,
    /// Session parameters differ.
    MappingMismatch = 2,
    /// Message too large.
    MessageTooLarge = 3,
    /// Invalid message format or contents.
    InvalidMessage = 4,
    /// Internal error on peer.
    InternalError = 5,
}

/// Sync protocol messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Setup phase: advertise version and parameters.
    Hello {
        /// Protocol version for compatibility checking.
        protocol_version: u8,
        /// The sender's view of the session parameters.
        params: SessionParams,
    },

    /// Open an outer round, advertising the local working-set size (both
    /// sides need the combined size to derive the round's reduced universe).
    RoundOpen {
        /// 1-based round number.
        round: u64,
        /// Number of elements in the sender's working set.
        set_size: u64,
    },

    /// One batch of encoded cells.
    Batch {
        /// The round this batch belongs to.
        round: u64,
        /// 1-based inner iteration.
        iteration: u64,
        /// Length-framed cells, encoded by `certsync_core::wire`.
        cells: Vec<u8>,
    },

    /// The receiver could not complete a decode; send the next batch.
    NeedMore {
        /// The round being extended.
        round: u64,
        /// The iteration that failed to decode.
        iteration: u64,
    },

    /// The receiver decoded this round's difference.
    RoundResult {
        /// The round that decoded.
        round: u64,
        /// Receiver-exclusive elements, lifted back to originals.
        originals: Vec<Symbol>,
        /// Sender-exclusive elements, still in the round's reduced universe;
        /// the sender lifts them through its own back-map.
        hints: Vec<Symbol>,
        /// Total reduced differences decoded this round; zero means the
        /// working sets have converged.
        reduced_count: u64,
    },

    /// The sender's lifted originals answering a RoundResult's hints.
    Originals {
        /// The round being answered.
        round: u64,
        /// Sender-exclusive elements as originals.
        symbols: Vec<Symbol>,
    },

    /// Session complete.
    Done {
        /// The final round.
        round: u64,
    },

    /// Error condition.
    Error {
        /// Error code for programmatic handling.
        code: SyncErrorCode,
        /// Human-readable description.
        message: String,
    },
}

impl SyncMessage {
    /// Check that this message respects size limits.
    pub fn validate_limits(&self) -> Result<(), &'static str> {
        match self {
            SyncMessage::Batch { cells, .. } => {
                if cells.len() > limits::MAX_BATCH_BYTES {
                    return Err("batch cell bytes exceed limit");
                }
            }
            SyncMessage::RoundResult {
                originals, hints, ..
            } => {
                if originals.len() + hints.len() > limits::MAX_SYMBOLS_PER_MESSAGE {
                    return Err("too many symbols in round result");
                }
            }
            SyncMessage::Originals { symbols, .. } => {
                if symbols.len() > limits::MAX_SYMBOLS_PER_MESSAGE {
                    return Err("too many symbols in originals");
                }
            }
            SyncMessage::Hello { .. }
            | SyncMessage::RoundOpen { .. }
            | SyncMessage::NeedMore { .. }
            | SyncMessage::Done { .. }
            | SyncMessage::Error { .. } => {}
        }
        Ok(())
    }
}
