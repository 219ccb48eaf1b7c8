//! # CertSync Core
//!
//! Rateless invertible Bloom filter primitives for exact set reconciliation.
//!
//! This crate contains no I/O, no networking, no logging. It is pure
//! computation over the filter data structures; the two-party protocol that
//! drives them lives in `certsync-sync`.
//!
//! ## Key Types
//!
//! - [`Symbol`] - A fixed-width element (32, 64, or 256 bits)
//! - [`Cell`] - Count/xor-sum/hash-sum triple, the filter's unit of state
//! - [`Mapping`] - Deterministic element-to-cell placement (prime moduli or
//!   orthogonal Latin squares)
//! - [`Ibf`] - The append-only batched filter with the peeling decoder
//! - [`CellHasher`] - Universe-sized hash family backing purity checks
//!
//! ## Guarantee
//!
//! Filters grow in deterministic batches, so two parties that agree on a
//! mapping can keep extending until the peeling decoder drains every cell.
//! The mapping constructions bound how often distinct elements can share
//! cells, which turns "decode succeeds with high probability" into "decode
//! succeeds once enough batches exist for the true difference size".

pub mod cell;
pub mod error;
pub mod hasher;
pub mod ibf;
pub mod mapping;
pub mod symbol;
pub mod wire;

pub use cell::Cell;
pub use error::{CoreError, WireError};
pub use hasher::{salted_hash_u64, CellHasher};
pub use ibf::{DecodeResult, Ibf};
pub use mapping::{primes, Mapping, PRIME_CEILING};
pub use symbol::{Symbol, SymbolKind, Universe};
