//! Error types for the certsync core.

use thiserror::Error;

use crate::symbol::{SymbolKind, Universe};

/// Errors from filter construction and arithmetic.
///
/// All of these indicate integration mistakes (divergent session parameters,
/// wrong element widths), not recoverable runtime conditions: an incomplete
/// decode is a normal outcome, not an error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("symbol width {got:?} incompatible with session width {expected:?}")]
    InvalidSymbolKind { expected: SymbolKind, got: SymbolKind },

    #[error("symbols must be in [1, n]; zero is not a valid element")]
    ZeroSymbol,

    #[error("iteration {iteration} exceeds the mapping's limit of {limit}")]
    IterationLimit { iteration: u64, limit: u64 },

    #[error("filter size mismatch: {left} cells vs {right}")]
    SizeMismatch { left: u64, right: u64 },

    #[error("filter iteration mismatch: {left} vs {right}")]
    IterationMismatch { left: u64, right: u64 },

    #[error("filters were built with different mapping, universe, or hasher parameters")]
    MappingMismatch,

    #[error("latin-square mapping requires a bounded universe")]
    UnboundedUniverse,

    #[error("latin-square order {order} is too small (minimum 2)")]
    OrderTooSmall { order: u64 },

    #[error("latin-square order {order} does not cover universe {universe}")]
    OrderTooSmallForUniverse { order: u64, universe: Universe },

    #[error("batch length {got} does not match the mapping's batch size {expected}")]
    BatchSizeMismatch { expected: u64, got: u64 },
}

/// Errors from decoding received cell bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated input: needed {needed} more byte(s), {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    #[error("{field} length {len} exceeds the maximum of {max}")]
    LengthOverflow {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{count} trailing byte(s) after the last field of a cell")]
    TrailingBytes { count: usize },
}
