//! The rateless invertible Bloom filter.
//!
//! An [`Ibf`] is an append-only list of cells divided into batches, one batch
//! per iteration. Both parties grow their filters in lockstep (same mapping,
//! same iteration count), the receiver subtracts the two cellwise, and the
//! peeling decoder extracts the symmetric difference from the result. When
//! peeling stalls, the caller adds one more batch on both sides and retries;
//! no rate is committed up front.

use std::ops::Range;

use crate::cell::Cell;
use crate::error::CoreError;
use crate::hasher::CellHasher;
use crate::mapping::Mapping;
use crate::symbol::{Symbol, SymbolKind, Universe};

/// Outcome of a peeling decode.
///
/// For a filter built as `local.subtract(remote)`, positive-count cells
/// yield elements only the local side holds and negative-count cells yield
/// elements only the remote side holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeResult {
    /// Elements present locally and absent remotely.
    pub local_exclusive: Vec<Symbol>,
    /// Elements present remotely and absent locally.
    pub remote_exclusive: Vec<Symbol>,
    /// Whether every cell peeled to zero. `false` means more batches are
    /// needed, not that anything went wrong.
    pub complete: bool,
}

/// A rateless invertible Bloom filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ibf {
    cells: Vec<Cell>,
    iteration: u64,
    size: u64,
    mapping: Mapping,
    universe: Universe,
    hasher: CellHasher,
    symbol_kind: SymbolKind,
}

impl Ibf {
    /// Create an empty filter; hasher and symbol width are derived from the
    /// universe.
    pub fn new(universe: Universe, mapping: Mapping) -> Result<Self, CoreError> {
        Self::with_hasher(universe, mapping, CellHasher::for_universe(&universe))
    }

    /// Create an empty filter with an explicitly chosen hasher.
    pub fn with_hasher(
        universe: Universe,
        mapping: Mapping,
        hasher: CellHasher,
    ) -> Result<Self, CoreError> {
        mapping.validate(&universe)?;
        Ok(Self {
            cells: Vec::new(),
            iteration: 0,
            size: 0,
            mapping,
            universe,
            hasher,
            symbol_kind: SymbolKind::for_universe(&universe),
        })
    }

    /// Batches added so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Total cells across all batches.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The cell list.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// The placement rule shared with the peer.
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// The configured element domain.
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// The cell hash variant.
    pub fn hasher(&self) -> &CellHasher {
        &self.hasher
    }

    /// The symbol width this filter accepts.
    pub fn symbol_kind(&self) -> SymbolKind {
        self.symbol_kind
    }

    /// The cell span of one batch in the flattened list.
    pub fn batch_range(&self, iteration: u64) -> Range<usize> {
        let start = self.mapping.offset(iteration) as usize;
        start..start + self.mapping.batch_size(iteration) as usize
    }

    fn check_symbols(&self, symbols: &[Symbol]) -> Result<(), CoreError> {
        for symbol in symbols {
            if symbol.kind() != self.symbol_kind {
                return Err(CoreError::InvalidSymbolKind {
                    expected: self.symbol_kind,
                    got: symbol.kind(),
                });
            }
            if symbol.is_zero() {
                return Err(CoreError::ZeroSymbol);
            }
        }
        Ok(())
    }

    fn next_iteration(&self) -> Result<u64, CoreError> {
        let next = self.iteration + 1;
        let limit = self.mapping.max_iterations();
        if next > limit {
            return Err(CoreError::IterationLimit {
                iteration: next,
                limit,
            });
        }
        Ok(next)
    }

    /// Grow the filter by one batch and insert every symbol into its cell.
    ///
    /// Earlier batches are untouched, so batch indices stay valid across
    /// iterations. The same set is expected on every call.
    pub fn add_symbols(&mut self, symbols: &[Symbol]) -> Result<(), CoreError> {
        let next = self.next_iteration()?;
        self.check_symbols(symbols)?;

        let batch = self.mapping.batch_size(next);
        let empty = Cell::empty(self.symbol_kind, self.hasher.output_kind());
        self.cells.resize((self.size + batch) as usize, empty);

        for symbol in symbols {
            let j = self.size + self.mapping.place(symbol, next);
            self.cells[j as usize].insert(symbol, &self.hasher);
        }

        self.iteration = next;
        self.size += batch;
        Ok(())
    }

    /// Append a batch of cells received from the peer.
    ///
    /// The receive-side counterpart of [`Ibf::add_symbols`]: the cells were
    /// built remotely, this filter only accumulates them.
    pub fn append_batch(&mut self, cells: Vec<Cell>) -> Result<(), CoreError> {
        let next = self.next_iteration()?;
        let expected = self.mapping.batch_size(next);
        if cells.len() as u64 != expected {
            return Err(CoreError::BatchSizeMismatch {
                expected,
                got: cells.len() as u64,
            });
        }
        self.cells.extend(cells);
        self.iteration = next;
        self.size += expected;
        Ok(())
    }

    /// Cellwise difference of two filters at the same iteration and size.
    pub fn subtract(&self, other: &Ibf) -> Result<Ibf, CoreError> {
        if self.mapping != other.mapping
            || self.universe != other.universe
            || self.hasher != other.hasher
        {
            return Err(CoreError::MappingMismatch);
        }
        if self.iteration != other.iteration {
            return Err(CoreError::IterationMismatch {
                left: self.iteration,
                right: other.iteration,
            });
        }
        if self.size != other.size {
            return Err(CoreError::SizeMismatch {
                left: self.size,
                right: other.size,
            });
        }

        let mut difference = self.clone();
        for (cell, other_cell) in difference.cells.iter_mut().zip(&other.cells) {
            cell.subtract(other_cell);
        }
        Ok(difference)
    }

    /// Run the peeling decoder, consuming the filter.
    ///
    /// Pops pure cells off a worklist, emits their element, and removes the
    /// element's footprint from every cell it was placed into across all
    /// added batches; cells freed by that removal are found by periodic
    /// rescans. Emitted elements are deliberately not deduplicated: a
    /// coincidental repeat must be subtracted once per cell it occupies, or
    /// the filter cannot drain to zero.
    pub fn decode(mut self) -> DecodeResult {
        let mut result = DecodeResult::default();
        let mut pure: Vec<usize> = Vec::new();

        loop {
            let j = match pure.pop() {
                Some(j) => j,
                None => {
                    pure.extend(
                        (0..self.size as usize).filter(|&j| self.cells[j].is_pure(&self.hasher)),
                    );
                    match pure.pop() {
                        Some(j) => j,
                        None => break,
                    }
                }
            };

            // Earlier peels may have emptied or overloaded this cell.
            if !self.cells[j].is_pure(&self.hasher) {
                continue;
            }

            let peeled = self.cells[j];
            let symbol = peeled.xor_sum;
            if peeled.count > 0 {
                result.local_exclusive.push(symbol);
            } else {
                result.remote_exclusive.push(symbol);
            }

            for i in 1..=self.iteration {
                let k = (self.mapping.offset(i) + self.mapping.place(&symbol, i)) as usize;
                if k != j {
                    self.cells[k].subtract(&peeled);
                }
            }
            self.cells[j].subtract(&peeled);
        }

        result.complete = self.cells[..self.size as usize].iter().all(Cell::is_zero);
        result
    }

    /// Whether every cell is zero.
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Cell::is_zero)
    }

    /// Bits this filter's cells occupy under the length-framed wire
    /// encoding. Accounting only; serialization itself lives in [`crate::wire`].
    pub fn transmitted_bits(&self) -> u64 {
        self.cells
            .iter()
            .map(|cell| 8 * (1 + cell.encoded_len()) as u64)
            .sum()
    }

    /// Discard all cells and return to iteration zero, keeping the session
    /// configuration.
    pub fn reset(&mut self) {
        self.cells.clear();
        self.iteration = 0;
        self.size = 0;
    }
}
