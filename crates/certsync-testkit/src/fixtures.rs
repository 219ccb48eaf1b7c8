//! Deterministic set-pair fixtures.
//!
//! Seeded builders for the scenarios reconciliation tests exercise over and
//! over: a full universe with a few elements removed on one side, and pairs
//! of wide random values with a small two-sided difference.

use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use certsync_core::{Symbol, SymbolKind, Universe};

/// Build `B = [1, n]` and `A = B` minus the given elements.
pub fn superset_pair(universe: u64, missing: &[u64]) -> (Vec<Symbol>, Vec<Symbol>) {
    let kind = SymbolKind::for_universe(&Universe::Bounded(universe as u128));
    let b: Vec<Symbol> = (1..=universe).map(|v| Symbol::from_u64(kind, v)).collect();
    let a: Vec<Symbol> = (1..=universe)
        .filter(|v| !missing.contains(v))
        .map(|v| Symbol::from_u64(kind, v))
        .collect();
    (a, b)
}

/// Build `B = [1, n]` and `A = B` minus `diff_size` elements chosen by the
/// seeded generator. Returns `(a, b, missing)` with `missing` sorted.
pub fn random_superset_pair(
    universe: u64,
    diff_size: usize,
    seed: u64,
) -> (Vec<Symbol>, Vec<Symbol>, Vec<u64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut values: Vec<u64> = (1..=universe).collect();
    values.shuffle(&mut rng);
    let mut missing: Vec<u64> = values[..diff_size].to_vec();
    missing.sort_unstable();

    let (a, b) = superset_pair(universe, &missing);
    (a, b, missing)
}

/// Build two sets of random 256-bit values sharing `shared` elements, with
/// `a_extra` extras on the A side and `b_extra` extras on the B side.
/// Returns `(a, b, a_only, b_only)`.
pub fn hash256_pair(
    shared: usize,
    a_extra: usize,
    b_extra: usize,
    seed: u64,
) -> (Vec<Symbol>, Vec<Symbol>, Vec<Symbol>, Vec<Symbol>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut draw = || {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Symbol::U256(bytes)
    };

    let common: Vec<Symbol> = (0..shared).map(|_| draw()).collect();
    let a_only: Vec<Symbol> = (0..a_extra).map(|_| draw()).collect();
    let b_only: Vec<Symbol> = (0..b_extra).map(|_| draw()).collect();

    let mut a = common.clone();
    a.extend_from_slice(&a_only);
    let mut b = common;
    b.extend_from_slice(&b_only);
    (a, b, a_only, b_only)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superset_pair_shapes() {
        let (a, b) = superset_pair(100, &[7, 50]);
        assert_eq!(b.len(), 100);
        assert_eq!(a.len(), 98);
        assert!(!a.contains(&Symbol::U32(7)));
        assert!(b.contains(&Symbol::U32(7)));
    }

    #[test]
    fn test_random_superset_pair_is_seeded() {
        let (a1, b1, m1) = random_superset_pair(1000, 10, 42);
        let (a2, b2, m2) = random_superset_pair(1000, 10, 42);
        assert_eq!(a1, a2);
        assert_eq!(b1, b2);
        assert_eq!(m1, m2);

        let (_, _, m3) = random_superset_pair(1000, 10, 43);
        assert_ne!(m1, m3);
    }

    #[test]
    fn test_hash256_pair_split() {
        let (a, b, a_only, b_only) = hash256_pair(50, 2, 3, 7);
        assert_eq!(a.len(), 52);
        assert_eq!(b.len(), 53);
        for symbol in &a_only {
            assert!(a.contains(symbol) && !b.contains(symbol));
        }
        for symbol in &b_only {
            assert!(b.contains(symbol) && !a.contains(symbol));
        }
    }
}
