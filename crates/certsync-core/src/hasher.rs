//! Size-adaptive cell hash family.
//!
//! Purity checks compare a cell's `hash_sum` against the hash of its
//! `xor_sum`, so a hash collision inside one batch can fake a pure cell. The
//! family is sized by the universe so the per-check false-positive
//! probability (about `2^-W` for hash width `W`) stays negligible for the
//! configured domain: a cheap 32-bit hash for small universes, 64-bit for
//! mid-sized ones, SHA-256 beyond that.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use xxhash_rust::xxh32::xxh32;
use xxhash_rust::xxh64::xxh64;

use crate::symbol::{Symbol, SymbolKind, Universe};

/// Universe bound below which the 32-bit hash keeps the expected intra-batch
/// collision probability under 10^-3.
pub const XXH32_UNIVERSE_LIMIT: u128 = 2_500;

/// Universe bound below which the 64-bit hash suffices.
pub const XXH64_UNIVERSE_LIMIT: u128 = 150_000_000;

/// Keyless hash over symbols, one of three widths.
///
/// Both parties must agree on the variant at session setup; it is fixed for
/// the lifetime of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellHasher {
    /// 32-bit xxHash, for small universes.
    Xxh32,
    /// 64-bit xxHash.
    Xxh64,
    /// SHA-256, for very large universes.
    Sha256,
}

impl CellHasher {
    /// Pick the cheapest variant whose collision probability is negligible
    /// for the given universe.
    pub fn for_universe(universe: &Universe) -> Self {
        match universe {
            Universe::Bounded(n) if *n < XXH32_UNIVERSE_LIMIT => CellHasher::Xxh32,
            Universe::Bounded(n) if *n < XXH64_UNIVERSE_LIMIT => CellHasher::Xxh64,
            _ => CellHasher::Sha256,
        }
    }

    /// Hash a symbol; the result width is the hasher width.
    pub fn hash(&self, symbol: &Symbol) -> Symbol {
        let bytes = symbol.to_be_bytes();
        match self {
            CellHasher::Xxh32 => Symbol::U32(xxh32(&bytes, 0)),
            CellHasher::Xxh64 => Symbol::U64(xxh64(&bytes, 0)),
            CellHasher::Sha256 => {
                let digest = Sha256::digest(&bytes);
                let mut out = [0u8; 32];
                out.copy_from_slice(&digest);
                Symbol::U256(out)
            }
        }
    }

    /// The width of hash values produced by this variant.
    pub const fn output_kind(&self) -> SymbolKind {
        match self {
            CellHasher::Xxh32 => SymbolKind::U32,
            CellHasher::Xxh64 => SymbolKind::U64,
            CellHasher::Sha256 => SymbolKind::U256,
        }
    }

    /// Hash width in bits.
    pub const fn width_bits(&self) -> u32 {
        self.output_kind().width_bits()
    }
}

/// Salted 64-bit hash of a byte string, used by the universe reducer to
/// project large-universe elements into a small domain. The salt changes per
/// outer round so collisions do not repeat.
pub fn salted_hash_u64(bytes: &[u8], salt: u32) -> u64 {
    xxh64(bytes, salt as u64)
}
