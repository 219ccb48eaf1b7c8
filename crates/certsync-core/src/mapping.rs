//! Deterministic symbol-to-cell mappings.
//!
//! A mapping answers two questions for every iteration i (1-based): how many
//! cells does batch i contribute, and at which index within that batch does a
//! given symbol land. Both parties share the mapping, so the same element
//! always occupies the same cells on both sides.
//!
//! Two constructions are provided:
//!
//! - **Prime moduli** ([`Mapping::Egh`]): batch i has `p_i` cells (the i-th
//!   prime) and symbol `s` lands at `s mod p_i`. After iterations `1..=i`,
//!   any two distinct elements of a universe no larger than `p_1 * .. * p_i`
//!   collide in strictly fewer than i batches, which makes the peeling
//!   decoder terminate deterministically once enough batches cover the true
//!   difference size.
//! - **Orthogonal Latin squares** ([`Mapping::Ols`]): every batch has `q`
//!   cells; batch 1 projects the element's row, batch k > 1 applies the
//!   (k-1)-th square of a mutually orthogonal family of order q, in closed
//!   form. The family supports `q` batches before placements repeat.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::symbol::{Symbol, Universe};

/// Upper bound of the process-wide prime table.
pub const PRIME_CEILING: u64 = 1_000_000;

static PRIMES: OnceLock<Vec<u64>> = OnceLock::new();

/// The shared prime table, built once on first use.
pub fn primes() -> &'static [u64] {
    PRIMES.get_or_init(|| sieve(PRIME_CEILING as usize))
}

fn sieve(limit: usize) -> Vec<u64> {
    let mut composite = vec![false; limit + 1];
    let mut out = Vec::new();
    for n in 2..=limit {
        if composite[n] {
            continue;
        }
        out.push(n as u64);
        let mut multiple = n * n;
        while multiple <= limit {
            composite[multiple] = true;
            multiple += n;
        }
    }
    out
}

/// Ceiling of the integer square root.
fn isqrt_ceil(n: u128) -> u64 {
    if n <= 1 {
        return n as u64;
    }
    let mut lo: u128 = 1;
    let mut hi: u128 = 1 << 64;
    // Smallest r with r*r >= n.
    while lo < hi {
        let mid = (lo + hi) / 2;
        if mid.checked_mul(mid).map_or(true, |sq| sq >= n) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo as u64
}

/// A deterministic `(element, iteration) -> cell` placement rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mapping {
    /// Prime-moduli batches: batch i spans the i-th prime's worth of cells.
    Egh,
    /// Orthogonal-Latin-square batches of constant size `order`.
    Ols {
        /// Order of each square; elements live in `[1, order^2]`.
        order: u64,
    },
}

impl Mapping {
    /// A Latin-square mapping sized for the universe: `order = ceil(sqrt(n))`.
    pub fn ols_for_universe(universe: &Universe) -> Result<Self, CoreError> {
        let n = universe.bound().ok_or(CoreError::UnboundedUniverse)?;
        let order = isqrt_ceil(n).max(2);
        Ok(Mapping::Ols { order })
    }

    /// Check that this mapping can serve the given universe.
    pub fn validate(&self, universe: &Universe) -> Result<(), CoreError> {
        match self {
            Mapping::Egh => Ok(()),
            Mapping::Ols { order } => {
                if *order < 2 {
                    return Err(CoreError::OrderTooSmall { order: *order });
                }
                let n = universe.bound().ok_or(CoreError::UnboundedUniverse)?;
                let square = (*order as u128) * (*order as u128);
                if square < n {
                    return Err(CoreError::OrderTooSmallForUniverse {
                        order: *order,
                        universe: *universe,
                    });
                }
                Ok(())
            }
        }
    }

    /// Number of cells contributed by batch `iteration` (1-based).
    ///
    /// Callers must keep `iteration` within [`Mapping::max_iterations`]; the
    /// filter enforces this before growing.
    pub fn batch_size(&self, iteration: u64) -> u64 {
        match self {
            Mapping::Egh => primes()[(iteration - 1) as usize],
            Mapping::Ols { order } => *order,
        }
    }

    /// Total cells across batches `1..iteration` (the start offset of batch
    /// `iteration` in the flattened cell list).
    pub fn offset(&self, iteration: u64) -> u64 {
        match self {
            Mapping::Egh => primes()[..(iteration - 1) as usize].iter().sum(),
            Mapping::Ols { order } => (iteration - 1) * order,
        }
    }

    /// Index within batch `iteration` at which `symbol` is placed.
    pub fn place(&self, symbol: &Symbol, iteration: u64) -> u64 {
        match self {
            Mapping::Egh => symbol.mod_u64(self.batch_size(iteration)),
            Mapping::Ols { order } => {
                let q = *order as u128;
                // Values beyond 128 bits only reach a latin-square mapping
                // through a misconfigured session; fold them into range
                // rather than index out of bounds.
                let value = symbol
                    .to_u128()
                    .unwrap_or_else(|| symbol.mod_u64(u64::MAX) as u128)
                    .max(1);
                let index = value - 1;
                let row = (index / q) % q;
                let col = index % q;
                match iteration {
                    1 => row as u64,
                    k => ((col + row * ((k as u128 - 1) % q)) % q) as u64,
                }
            }
        }
    }

    /// Largest iteration this mapping can serve.
    pub fn max_iterations(&self) -> u64 {
        match self {
            Mapping::Egh => primes().len() as u64,
            Mapping::Ols { order } => *order,
        }
    }
}
