//! Universe reduction.
//!
//! Reconciling 256-bit values directly wastes cells: every cell carries
//! full-width sums even though the expected difference is tiny. The reducer
//! projects each element through a salted hash into a small universe sized by
//! a collision-expectation budget, reconciles there, and lifts the decoded
//! values back to originals through a per-party back-map.
//!
//! Collisions merge distinct originals onto one reduced value, which can hide
//! part of the difference for a round. The outer protocol handles that: each
//! party adds the peer's recovered originals to its working set and opens
//! another round with a fresh salt (and a universe one power of two larger),
//! so the remaining hidden differences shrink every round.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use certsync_core::{salted_hash_u64, Symbol, SymbolKind, Universe};

/// Expected number of pairwise collisions when `m` elements hash into a
/// universe of size `n`: `m(m-1) / 2n`.
pub fn expected_collisions(n: u128, m: u64) -> f64 {
    (m as f64) * (m.saturating_sub(1) as f64) / (2.0 * n as f64)
}

/// Size of the reduced universe for outer round `round` (1-based): the
/// smallest power of two at least `2^(ceil(log2 m) + round - 1)` whose
/// expected collision count stays within `delta`.
pub fn reduced_universe(m: u64, delta: f64, round: u64) -> Universe {
    let m = m.max(2);
    let base = u64::BITS as u64 - (m - 1).leading_zeros() as u64;
    let mut exp = (base + round.saturating_sub(1)).min(127);
    loop {
        let n = 1u128 << exp;
        if expected_collisions(n, m) <= delta || exp == 127 {
            return Universe::Bounded(n);
        }
        exp += 1;
    }
}

/// Derive the shared 32-bit salt for an outer round. Both parties run the
/// same derivation, so the projections agree without exchanging salts.
pub fn round_salt(round: u64) -> u32 {
    ChaCha8Rng::seed_from_u64(round).next_u32()
}

/// A working set projected into a reduced universe, with the back-map needed
/// to lift decoded values to originals.
#[derive(Debug, Clone, Default)]
pub struct ReducedSet {
    symbols: Vec<Symbol>,
    back_map: HashMap<Symbol, Vec<Symbol>>,
}

impl ReducedSet {
    /// The deduplicated reduced symbols, in first-seen order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Lift decoded reduced values back to the originals that produced them.
    ///
    /// A collision group expands to all of its originals; values with no
    /// local preimage (a decode anomaly) are skipped.
    pub fn expand(&self, reduced: &[Symbol]) -> Vec<Symbol> {
        let mut out = Vec::new();
        for value in reduced {
            match self.back_map.get(value) {
                Some(originals) => out.extend(originals.iter().copied()),
                None => warn!(%value, "decoded reduced value has no local preimage"),
            }
        }
        out
    }
}

/// Project a working set into the reduced universe:
/// `e' = (H(e, salt) mod n) + 1`, grouping originals by their projection.
pub fn reduce_set(originals: &[Symbol], salt: u32, universe: &Universe) -> ReducedSet {
    // Reducer universes are always bounded powers of two.
    let n = universe.bound().unwrap_or(u128::MAX);
    let kind = SymbolKind::for_universe(universe);

    let mut set = ReducedSet::default();
    for original in originals {
        let hashed = salted_hash_u64(&original.to_be_bytes_min(), salt) as u128;
        let reduced = Symbol::from_u128(kind, (hashed % n) + 1);
        match set.back_map.entry(reduced) {
            Entry::Occupied(mut entry) => entry.get_mut().push(*original),
            Entry::Vacant(entry) => {
                entry.insert(vec![*original]);
                set.symbols.push(reduced);
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salt_is_deterministic_and_round_dependent() {
        assert_eq!(round_salt(1), round_salt(1));
        assert_ne!(round_salt(1), round_salt(2));
    }

    #[test]
    fn test_reduced_universe_honors_budget() {
        for m in [10u64, 100, 5_000, 1_000_000] {
            for delta in [1.0, 10.0, 100.0] {
                let universe = reduced_universe(m, delta, 1);
                let n = universe.bound().unwrap();
                assert!(n.is_power_of_two());
                assert!(expected_collisions(n, m) <= delta);
            }
        }
    }

    #[test]
    fn test_reduced_universe_grows_with_round() {
        let r1 = reduced_universe(1000, 10.0, 1).bound().unwrap();
        let r2 = reduced_universe(1000, 10.0, 2).bound().unwrap();
        let r3 = reduced_universe(1000, 10.0, 3).bound().unwrap();
        assert!(r2 >= r1 * 2 || r2 == r1); // budget may already dominate
        assert!(r3 >= r2);
    }

    #[test]
    fn test_reduce_dedups_and_expands() {
        let originals: Vec<Symbol> = (1..=100u64)
            .map(|v| Symbol::from_u64(SymbolKind::U256, v))
            .collect();
        let universe = reduced_universe(100, 10.0, 1);
        let set = reduce_set(&originals, round_salt(1), &universe);

        // Every reduced value expands back to its full collision group, so
        // expanding all of them recovers every original exactly once.
        let mut recovered = set.expand(set.symbols());
        recovered.sort();
        let mut expected = originals.clone();
        expected.sort();
        assert_eq!(recovered, expected);
        assert!(set.symbols().len() <= originals.len());
    }

    #[test]
    fn test_tiny_universe_groups_collisions() {
        let originals: Vec<Symbol> = (1..=10u64)
            .map(|v| Symbol::from_u64(SymbolKind::U64, v))
            .collect();
        let universe = Universe::Bounded(2);
        let set = reduce_set(&originals, 7, &universe);

        assert!(set.symbols().len() <= 2);
        assert_eq!(set.expand(set.symbols()).len(), 10);
        for symbol in set.symbols() {
            let value = symbol.to_u128().unwrap();
            assert!((1..=2).contains(&value));
        }
    }

    #[test]
    fn test_unknown_hint_expands_to_nothing() {
        let originals = [Symbol::U64(1)];
        let set = reduce_set(&originals, 1, &Universe::Bounded(1 << 10));
        let bogus = Symbol::from_u64(SymbolKind::U32, 999);
        assert!(set.expand(&[bogus]).is_empty());
    }

    #[test]
    fn test_same_salt_same_projection() {
        let originals: Vec<Symbol> = (1..=50u64).map(Symbol::U64).collect();
        let universe = Universe::Bounded(1 << 12);
        let a = reduce_set(&originals, 42, &universe);
        let b = reduce_set(&originals, 42, &universe);
        assert_eq!(a.symbols(), b.symbols());
    }
}
