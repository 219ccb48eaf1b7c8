//! Per-party inner-loop state machines.
//!
//! One inner loop reconciles a pair of working sets at a fixed universe and
//! mapping. The transmit side ([`SenderSession`]) grows its filter one batch
//! at a time and emits each batch's encoded cells; the receive side
//! ([`ReceiverSession`]) accumulates the peer's batches next to its own
//! filter, subtracts, and attempts a peeling decode after every batch. The
//! two halves are transport-free; the protocol driver (or an in-process
//! caller) moves the bytes.

use tracing::debug;

use certsync_core::{wire, CellHasher, CoreError, Ibf, Mapping, Symbol, Universe};

use crate::error::{Result, SyncError};

/// Outcome of absorbing one batch on the receive side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterateOutcome {
    /// The difference decoded completely.
    Done {
        /// Elements only the receiver holds.
        local_exclusive: Vec<Symbol>,
        /// Elements only the sender holds.
        remote_exclusive: Vec<Symbol>,
    },
    /// Peeling stalled; the sender must produce another batch.
    NeedMore,
}

/// One encoded batch ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPayload {
    /// The 1-based iteration this batch extends.
    pub iteration: u64,
    /// Length-framed cells.
    pub bytes: Vec<u8>,
}

fn check_working(ibf: &Ibf, working: &[Symbol]) -> Result<()> {
    for symbol in working {
        if symbol.kind() != ibf.symbol_kind() {
            return Err(SyncError::Core(CoreError::InvalidSymbolKind {
                expected: ibf.symbol_kind(),
                got: symbol.kind(),
            }));
        }
        if symbol.is_zero() {
            return Err(SyncError::Core(CoreError::ZeroSymbol));
        }
    }
    Ok(())
}

/// Transmit-side state: a working set and the filter being grown over it.
#[derive(Debug, Clone)]
pub struct SenderSession {
    working: Vec<Symbol>,
    ibf: Ibf,
    transmitted_bits: u64,
}

impl SenderSession {
    /// Create a sender over a working set.
    pub fn new(
        universe: Universe,
        mapping: Mapping,
        hasher: CellHasher,
        working: Vec<Symbol>,
    ) -> Result<Self> {
        let ibf = Ibf::with_hasher(universe, mapping, hasher)?;
        check_working(&ibf, &working)?;
        Ok(Self {
            working,
            ibf,
            transmitted_bits: 0,
        })
    }

    /// Add elements to the working set. Only valid before the first batch.
    pub fn add_local(&mut self, symbols: &[Symbol]) -> Result<()> {
        if self.ibf.iteration() > 0 {
            return Err(SyncError::InvalidMessage(
                "working set is frozen once batches have been emitted".into(),
            ));
        }
        check_working(&self.ibf, symbols)?;
        self.working.extend_from_slice(symbols);
        Ok(())
    }

    /// Grow the filter by one batch and return its encoded cells.
    pub fn next_batch(&mut self) -> Result<BatchPayload> {
        self.ibf.add_symbols(&self.working)?;
        let range = self.ibf.batch_range(self.ibf.iteration());
        let bytes = wire::encode_batch(&self.ibf.cells()[range]);
        self.transmitted_bits += 8 * bytes.len() as u64;
        debug!(
            iteration = self.ibf.iteration(),
            cells = self.ibf.size(),
            bytes = bytes.len(),
            "emitted batch"
        );
        Ok(BatchPayload {
            iteration: self.ibf.iteration(),
            bytes,
        })
    }

    /// Batches emitted so far.
    pub fn iteration(&self) -> u64 {
        self.ibf.iteration()
    }

    /// Bits placed on the wire by this sender.
    pub fn transmitted_bits(&self) -> u64 {
        self.transmitted_bits
    }

    /// Discard filter state, keeping the working set and configuration.
    pub fn reset(&mut self) {
        self.ibf.reset();
        self.transmitted_bits = 0;
    }
}

/// Receive-side state: a working set, the local filter, and the accumulated
/// remote filter.
#[derive(Debug, Clone)]
pub struct ReceiverSession {
    working: Vec<Symbol>,
    local: Ibf,
    remote: Ibf,
}

impl ReceiverSession {
    /// Create a receiver over a working set.
    pub fn new(
        universe: Universe,
        mapping: Mapping,
        hasher: CellHasher,
        working: Vec<Symbol>,
    ) -> Result<Self> {
        let local = Ibf::with_hasher(universe, mapping, hasher)?;
        check_working(&local, &working)?;
        let remote = local.clone();
        Ok(Self {
            working,
            local,
            remote,
        })
    }

    /// Add elements to the working set. Only valid before the first batch.
    pub fn add_local(&mut self, symbols: &[Symbol]) -> Result<()> {
        if self.local.iteration() > 0 {
            return Err(SyncError::InvalidMessage(
                "working set is frozen once batches have been absorbed".into(),
            ));
        }
        check_working(&self.local, symbols)?;
        self.working.extend_from_slice(symbols);
        Ok(())
    }

    /// Absorb one peer batch, extend the local filter, and attempt a decode.
    ///
    /// Malformed bytes and out-of-order iterations fail before any state
    /// changes, so a bad message leaves the session where it was.
    pub fn absorb_batch(&mut self, iteration: u64, bytes: &[u8]) -> Result<IterateOutcome> {
        let cells = wire::decode_batch(
            bytes,
            self.remote.symbol_kind(),
            self.remote.hasher().output_kind(),
        )?;
        let expected = self.remote.iteration() + 1;
        if iteration != expected {
            return Err(SyncError::OutOfOrderBatch {
                expected,
                got: iteration,
            });
        }

        self.remote.append_batch(cells)?;
        self.local.add_symbols(&self.working)?;

        let result = self.local.subtract(&self.remote)?.decode();
        debug!(
            iteration,
            complete = result.complete,
            decoded = result.local_exclusive.len() + result.remote_exclusive.len(),
            "absorbed batch"
        );
        if result.complete {
            Ok(IterateOutcome::Done {
                local_exclusive: result.local_exclusive,
                remote_exclusive: result.remote_exclusive,
            })
        } else {
            Ok(IterateOutcome::NeedMore)
        }
    }

    /// Batches absorbed so far.
    pub fn iteration(&self) -> u64 {
        self.local.iteration()
    }

    /// Bits the local filter would occupy on the wire (accounting only; the
    /// receiver transmits no cells).
    pub fn local_filter_bits(&self) -> u64 {
        self.local.transmitted_bits()
    }

    /// Discard both filters, keeping the working set and configuration.
    pub fn reset(&mut self) {
        self.local.reset();
        self.remote.reset();
    }
}

/// Result of an in-process reconciliation of two sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDifference {
    /// Elements only set A holds.
    pub a_minus_b: Vec<Symbol>,
    /// Elements only set B holds.
    pub b_minus_a: Vec<Symbol>,
    /// Inner iterations until the decode completed.
    pub iterations: u64,
    /// Bits the A side placed on the wire.
    pub transmitted_bits: u64,
}

/// Reconcile two in-process sets at a fixed universe and mapping, without a
/// transport: drive a sender over `a` against a receiver over `b` until the
/// decoder completes.
///
/// This is the measurement loop benchmark harnesses use; the two-party
/// protocol in [`crate::protocol`] composes the same halves over a transport.
pub fn reconcile_sets(
    a: &[Symbol],
    b: &[Symbol],
    universe: Universe,
    mapping: Mapping,
) -> Result<SetDifference> {
    let hasher = CellHasher::for_universe(&universe);
    let mut sender = SenderSession::new(universe, mapping, hasher, a.to_vec())?;
    let mut receiver = ReceiverSession::new(universe, mapping, hasher, b.to_vec())?;

    loop {
        let batch = sender.next_batch()?;
        match receiver.absorb_batch(batch.iteration, &batch.bytes)? {
            IterateOutcome::Done {
                local_exclusive,
                remote_exclusive,
            } => {
                return Ok(SetDifference {
                    a_minus_b: remote_exclusive,
                    b_minus_a: local_exclusive,
                    iterations: sender.iteration(),
                    transmitted_bits: sender.transmitted_bits(),
                });
            }
            IterateOutcome::NeedMore => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certsync_core::WireError;

    fn u32_symbols(values: impl IntoIterator<Item = u32>) -> Vec<Symbol> {
        values.into_iter().map(Symbol::U32).collect()
    }

    #[test]
    fn test_reconcile_superset() {
        let b = u32_symbols(1..=1000);
        let a = u32_symbols((1..=1000).filter(|v| *v != 7));
        let diff = reconcile_sets(&a, &b, Universe::Bounded(1000), Mapping::Egh).unwrap();

        assert_eq!(diff.b_minus_a, vec![Symbol::U32(7)]);
        assert!(diff.a_minus_b.is_empty());
        assert_eq!(diff.iterations, 1);
        assert!(diff.transmitted_bits > 0);
    }

    #[test]
    fn test_reconcile_two_sided() {
        let a = u32_symbols((1..=200).filter(|v| *v % 31 != 0));
        let b = u32_symbols((1..=200).filter(|v| *v % 47 != 0));
        let diff = reconcile_sets(&a, &b, Universe::Bounded(200), Mapping::Egh).unwrap();

        let mut a_only = diff.a_minus_b.clone();
        a_only.sort();
        let expected_a_only = u32_symbols((1..=200).filter(|v| v % 47 == 0 && v % 31 != 0));
        assert_eq!(a_only, expected_a_only);

        let mut b_only = diff.b_minus_a.clone();
        b_only.sort();
        let expected_b_only = u32_symbols((1..=200).filter(|v| v % 31 == 0 && v % 47 != 0));
        assert_eq!(b_only, expected_b_only);
    }

    #[test]
    fn test_malformed_batch_leaves_receiver_untouched() {
        let universe = Universe::Bounded(100);
        let hasher = CellHasher::for_universe(&universe);
        let working = u32_symbols(1..=10);
        let mut sender =
            SenderSession::new(universe, Mapping::Egh, hasher, working.clone()).unwrap();
        let mut receiver = ReceiverSession::new(universe, Mapping::Egh, hasher, working).unwrap();

        let batch = sender.next_batch().unwrap();
        let truncated = &batch.bytes[..batch.bytes.len() - 1];
        let err = receiver.absorb_batch(batch.iteration, truncated).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Serialization(WireError::UnexpectedEof { .. })
        ));
        assert_eq!(receiver.iteration(), 0);

        // The intact batch still applies cleanly afterwards.
        let outcome = receiver.absorb_batch(batch.iteration, &batch.bytes).unwrap();
        assert!(matches!(outcome, IterateOutcome::Done { .. }));
    }

    #[test]
    fn test_out_of_order_batch_is_rejected() {
        let universe = Universe::Bounded(100);
        let hasher = CellHasher::for_universe(&universe);
        let working = u32_symbols(1..=5);
        let mut sender =
            SenderSession::new(universe, Mapping::Egh, hasher, working.clone()).unwrap();
        let mut receiver = ReceiverSession::new(universe, Mapping::Egh, hasher, working).unwrap();

        let first = sender.next_batch().unwrap();
        let second = sender.next_batch().unwrap();
        let err = receiver
            .absorb_batch(second.iteration, &second.bytes)
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::OutOfOrderBatch {
                expected: 1,
                got: 2
            }
        ));

        receiver.absorb_batch(first.iteration, &first.bytes).unwrap();
    }

    #[test]
    fn test_add_local_frozen_after_first_batch() {
        let universe = Universe::Bounded(100);
        let hasher = CellHasher::for_universe(&universe);
        let mut sender =
            SenderSession::new(universe, Mapping::Egh, hasher, u32_symbols(1..=5)).unwrap();
        sender.add_local(&u32_symbols(6..=10)).unwrap();
        sender.next_batch().unwrap();
        assert!(sender.add_local(&u32_symbols(11..=12)).is_err());
    }

    #[test]
    fn test_reset_allows_reuse() {
        let b = u32_symbols(1..=50);
        let a = u32_symbols(2..=50);
        let universe = Universe::Bounded(50);
        let hasher = CellHasher::for_universe(&universe);

        let mut sender = SenderSession::new(universe, Mapping::Egh, hasher, a).unwrap();
        sender.next_batch().unwrap();
        sender.reset();
        assert_eq!(sender.iteration(), 0);
        assert_eq!(sender.transmitted_bits(), 0);

        let mut receiver = ReceiverSession::new(universe, Mapping::Egh, hasher, b).unwrap();
        let batch = sender.next_batch().unwrap();
        receiver.absorb_batch(batch.iteration, &batch.bytes).unwrap();
        receiver.reset();
        assert_eq!(receiver.iteration(), 0);
    }

    #[test]
    fn test_sender_bits_match_emitted_bytes() {
        let universe = Universe::Bounded(1000);
        let hasher = CellHasher::for_universe(&universe);
        let mut sender =
            SenderSession::new(universe, Mapping::Egh, hasher, u32_symbols(1..=100)).unwrap();
        let mut total = 0u64;
        for _ in 0..5 {
            total += 8 * sender.next_batch().unwrap().bytes.len() as u64;
        }
        assert_eq!(sender.transmitted_bits(), total);
    }
}
