//! Proptest generators for property-based testing.

use proptest::prelude::*;

use certsync_core::{Symbol, SymbolKind, Universe};

/// Generate a nonzero symbol of the given width.
pub fn symbol(kind: SymbolKind) -> impl Strategy<Value = Symbol> {
    match kind {
        SymbolKind::U32 => (1u32..=u32::MAX).prop_map(Symbol::U32).boxed(),
        SymbolKind::U64 => (1u64..=u64::MAX).prop_map(Symbol::U64).boxed(),
        SymbolKind::U256 => any::<[u8; 32]>()
            .prop_filter("zero is not a valid element", |bytes| {
                bytes.iter().any(|b| *b != 0)
            })
            .prop_map(Symbol::U256)
            .boxed(),
    }
}

/// Generate an element of the universe `[1, n]`, at the universe's natural
/// width.
pub fn element(universe: Universe) -> impl Strategy<Value = Symbol> {
    let kind = SymbolKind::for_universe(&universe);
    let bound = universe.bound().unwrap_or(u128::MAX).min(u64::MAX as u128) as u64;
    (1u64..=bound).prop_map(move |v| Symbol::from_u64(kind, v))
}

/// Generate a duplicate-free set of universe elements.
pub fn element_set(universe: Universe, max_size: usize) -> impl Strategy<Value = Vec<Symbol>> {
    let kind = SymbolKind::for_universe(&universe);
    let bound = universe.bound().unwrap_or(u128::MAX).min(u64::MAX as u128) as u64;
    prop::collection::btree_set(1u64..=bound, 0..=max_size)
        .prop_map(move |values| values.into_iter().map(|v| Symbol::from_u64(kind, v)).collect())
}

/// A pair of sets with a known difference split.
#[derive(Debug, Clone)]
pub struct SetPair {
    /// The first set.
    pub a: Vec<Symbol>,
    /// The second set.
    pub b: Vec<Symbol>,
    /// Elements only in `a`.
    pub a_only: Vec<Symbol>,
    /// Elements only in `b`.
    pub b_only: Vec<Symbol>,
}

/// Generate two overlapping sets, recording the exact difference split.
///
/// Distinct elements are drawn once and partitioned, so the recorded split
/// is the ground truth a reconciliation must reproduce.
pub fn set_pair(
    universe: Universe,
    max_shared: usize,
    max_diff: usize,
) -> impl Strategy<Value = SetPair> {
    let kind = SymbolKind::for_universe(&universe);
    let bound = universe.bound().unwrap_or(u128::MAX).min(u64::MAX as u128) as u64;
    (
        prop::collection::btree_set(1u64..=bound, 0..=(max_shared + 2 * max_diff)),
        0usize..=max_diff,
        0usize..=max_diff,
    )
        .prop_map(move |(values, a_cut, b_cut)| {
            let values: Vec<Symbol> = values
                .into_iter()
                .map(|v| Symbol::from_u64(kind, v))
                .collect();
            let a_cut = a_cut.min(values.len());
            let b_cut = b_cut.min(values.len() - a_cut);

            let a_only = values[..a_cut].to_vec();
            let b_only = values[a_cut..a_cut + b_cut].to_vec();
            let shared = &values[a_cut + b_cut..];

            let mut a = a_only.clone();
            a.extend_from_slice(shared);
            let mut b = b_only.clone();
            b.extend_from_slice(shared);

            SetPair {
                a,
                b,
                a_only,
                b_only,
            }
        })
}
