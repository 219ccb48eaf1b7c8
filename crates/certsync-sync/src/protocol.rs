//! Two-party reconciliation protocol.
//!
//! Composes the inner-loop sessions, the universe reducer, and a transport
//! into the full request/response exchange:
//!
//! ```text
//! Initiator (A)                       Responder (B)
//!   |-------- Hello ------------------->|
//!   |<------- Hello --------------------|   (params compared; divergence is fatal)
//!   |-------- RoundOpen --------------->|
//!   |<------- RoundOpen ----------------|   (both derive the round universe)
//!   |-------- Batch 1 ----------------->|
//!   |<------- NeedMore -----------------|
//!   |-------- Batch 2 ----------------->|
//!   |<------- RoundResult --------------|   (decode completed)
//!   |-------- Originals --------------->|
//!   |            ... next round, or ... |
//!   |-------- Done -------------------->|
//! ```
//!
//! Rounds repeat only when universe reduction is active and the last round
//! decoded a nonzero reduced difference; each party folds the peer's
//! recovered originals into its working set so later rounds reconcile only
//! what collisions hid.

use std::collections::HashSet;

use tracing::{info, warn};

use certsync_core::{CellHasher, Mapping, Symbol, Universe};

use crate::error::{Result, SyncError};
use crate::messages::{
    SessionParams, SyncErrorCode, SyncMessage, PROTOCOL_VERSION,
};
use crate::reduce::{reduce_set, reduced_universe, round_salt, ReducedSet};
use crate::session::{BatchPayload, IterateOutcome, ReceiverSession, SenderSession};
use crate::transport::Transport;

/// Configuration for protocol behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Timeout for waiting for peer messages.
    pub message_timeout: std::time::Duration,
    /// Upper bound on outer rounds; exceeding it means the peers disagree on
    /// parameters in a way setup validation could not see.
    pub max_rounds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            message_timeout: std::time::Duration::from_secs(30),
            max_rounds: 64,
        }
    }
}

/// Result of a reconciliation session, from one party's point of view.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Original elements only this party holds.
    pub local_exclusive: Vec<Symbol>,
    /// Original elements only the peer holds.
    pub peer_exclusive: Vec<Symbol>,
    /// Outer rounds run.
    pub rounds: u64,
    /// Total inner iterations across all rounds.
    pub iterations: u64,
    /// Bits this party placed on the wire (cell batches and symbol
    /// payloads).
    pub transmitted_bits: u64,
    /// Whether the session ran to completion.
    pub success: bool,
}

/// Working state for one round: the resolved universe, mapping, hasher, and
/// (when reduction is active) the projected set with its back-map.
struct RoundSetup {
    universe: Universe,
    mapping: Mapping,
    hasher: CellHasher,
    reduced: Option<ReducedSet>,
    symbols: Vec<Symbol>,
}

/// A reconciliation session bound to a transport.
///
/// Exactly one party calls [`SyncSession::run_initiator`] (it transmits cell
/// batches) and the other [`SyncSession::run_responder`] (it decodes). Both
/// obtain the full difference split in their reports.
pub struct SyncSession<T: Transport> {
    transport: T,
    params: SessionParams,
    config: SyncConfig,
    working: Vec<Symbol>,
    seen: HashSet<Symbol>,
}

impl<T: Transport> SyncSession<T> {
    /// Create a session with default configuration.
    pub fn new(transport: T, params: SessionParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            transport,
            params,
            config: SyncConfig::default(),
            working: Vec::new(),
            seen: HashSet::new(),
        })
    }

    /// Override the configuration.
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Add elements to the local working set. Valid before the run starts.
    pub fn add_local(&mut self, symbols: &[Symbol]) {
        for symbol in symbols {
            if self.seen.insert(*symbol) {
                self.working.push(*symbol);
            }
        }
    }

    /// Discard the working set so the session can be reused.
    pub fn reset(&mut self) {
        self.working.clear();
        self.seen.clear();
    }

    fn send(&self, message: SyncMessage) -> Result<()> {
        message
            .validate_limits()
            .map_err(SyncError::LimitExceeded)?;
        self.transport.send(message)
    }

    fn recv(&self, expecting: &'static str) -> Result<SyncMessage> {
        let message = self
            .transport
            .recv_timeout(self.config.message_timeout)?
            .ok_or_else(|| SyncError::Timeout(format!("waiting for {expecting}")))?;
        message
            .validate_limits()
            .map_err(SyncError::LimitExceeded)?;
        match message {
            SyncMessage::Error { code, message } => Err(SyncError::PeerError { code, message }),
            other => Ok(other),
        }
    }

    fn send_error(&self, code: SyncErrorCode, message: impl Into<String>) {
        // Best effort; the session is failing anyway.
        let _ = self.transport.send(SyncMessage::Error {
            code,
            message: message.into(),
        });
    }

    /// Exchange Hello messages and compare parameters structurally.
    fn exchange_hello(&self, send_first: bool) -> Result<()> {
        let hello = SyncMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
            params: self.params.clone(),
        };

        let received = if send_first {
            self.send(hello)?;
            self.recv("Hello")?
        } else {
            let received = self.recv("Hello")?;
            self.send(hello)?;
            received
        };

        match received {
            SyncMessage::Hello {
                protocol_version,
                params,
            } => {
                if protocol_version != PROTOCOL_VERSION {
                    self.send_error(SyncErrorCode::VersionMismatch, "protocol version differs");
                    return Err(SyncError::VersionMismatch {
                        local: PROTOCOL_VERSION,
                        peer: protocol_version,
                    });
                }
                if params != self.params {
                    self.send_error(SyncErrorCode::MappingMismatch, "session parameters differ");
                    return Err(SyncError::MappingMismatch(format!(
                        "local {:?} vs peer {:?}",
                        self.params, params
                    )));
                }
                Ok(())
            }
            other => Err(SyncError::InvalidMessage(format!(
                "expected Hello, got {:?}",
                std::mem::discriminant(&other)
            ))),
        }
    }

    /// Resolve the working universe, mapping, and hasher for one round, and
    /// project the working set when reduction is active.
    fn round_setup(&self, combined_size: u64, round: u64) -> Result<RoundSetup> {
        match &self.params.reduce {
            None => {
                let universe = self.params.universe;
                Ok(RoundSetup {
                    universe,
                    mapping: self.params.mapping_for(&universe)?,
                    hasher: self.params.hasher_for(&universe),
                    reduced: None,
                    symbols: self.working.clone(),
                })
            }
            Some(reduce) => {
                let universe = reduced_universe(combined_size, reduce.delta, round);
                let salt = round_salt(round);
                let reduced = reduce_set(&self.working, salt, &universe);
                let symbols = reduced.symbols().to_vec();
                info!(
                    round,
                    universe = %universe,
                    reduced = symbols.len(),
                    originals = self.working.len(),
                    "reduced working set"
                );
                Ok(RoundSetup {
                    universe,
                    mapping: self.params.mapping_for(&universe)?,
                    hasher: self.params.hasher_for(&universe),
                    reduced: Some(reduced),
                    symbols,
                })
            }
        }
    }

    fn absorb_peer_originals(&mut self, symbols: &[Symbol]) {
        self.add_local(symbols);
    }

    /// Run the session as the batch-transmitting party.
    pub fn run_initiator(&mut self) -> Result<ReconcileReport> {
        self.exchange_hello(true)?;

        let mut report = ReconcileReport::default();
        let mut round: u64 = 1;

        loop {
            if round > self.config.max_rounds {
                return Err(SyncError::RoundLimit {
                    limit: self.config.max_rounds,
                });
            }

            self.send(SyncMessage::RoundOpen {
                round,
                set_size: self.working.len() as u64,
            })?;
            let peer_size = match self.recv("RoundOpen")? {
                SyncMessage::RoundOpen {
                    round: peer_round,
                    set_size,
                } if peer_round == round => set_size,
                other => {
                    return Err(SyncError::InvalidMessage(format!(
                        "expected RoundOpen for round {round}, got {other:?}"
                    )))
                }
            };

            let setup =
                self.round_setup(self.working.len() as u64 + peer_size, round)?;
            let mut sender = SenderSession::new(
                setup.universe,
                setup.mapping,
                setup.hasher,
                setup.symbols,
            )?;

            // Inner loop: emit batches until the peer reports a decode.
            let (peer_originals, hints, reduced_count) = loop {
                let BatchPayload { iteration, bytes } = sender.next_batch()?;
                self.send(SyncMessage::Batch {
                    round,
                    iteration,
                    cells: bytes,
                })?;

                match self.recv("NeedMore or RoundResult")? {
                    SyncMessage::NeedMore { .. } => continue,
                    SyncMessage::RoundResult {
                        round: result_round,
                        originals,
                        hints,
                        reduced_count,
                    } if result_round == round => break (originals, hints, reduced_count),
                    other => {
                        return Err(SyncError::InvalidMessage(format!(
                            "expected NeedMore or RoundResult, got {other:?}"
                        )))
                    }
                }
            };

            report.iterations += sender.iteration();
            report.transmitted_bits += sender.transmitted_bits();

            // Lift the peer's hints (our exclusives, still reduced) through
            // our back-map and answer with the originals.
            let mine = match &setup.reduced {
                Some(reduced) => reduced.expand(&hints),
                None => hints.clone(),
            };
            self.send(SyncMessage::Originals {
                round,
                symbols: mine.clone(),
            })?;
            report.transmitted_bits += symbol_bits(&mine);

            report.local_exclusive.extend(mine);
            report.peer_exclusive.extend(peer_originals.iter().copied());
            self.absorb_peer_originals(&peer_originals);

            info!(
                round,
                iterations = sender.iteration(),
                reduced_count,
                "round complete"
            );

            if self.params.reduce.is_none() || reduced_count == 0 {
                self.send(SyncMessage::Done { round })?;
                break;
            }
            round += 1;
        }

        report.rounds = round;
        report.success = true;
        Ok(report)
    }

    /// Run the session as the decoding party.
    pub fn run_responder(&mut self) -> Result<ReconcileReport> {
        self.exchange_hello(false)?;

        let mut report = ReconcileReport::default();
        let mut round: u64 = 1;

        loop {
            if round > self.config.max_rounds {
                return Err(SyncError::RoundLimit {
                    limit: self.config.max_rounds,
                });
            }

            let peer_size = match self.recv("RoundOpen")? {
                SyncMessage::RoundOpen {
                    round: peer_round,
                    set_size,
                } if peer_round == round => set_size,
                other => {
                    return Err(SyncError::InvalidMessage(format!(
                        "expected RoundOpen for round {round}, got {other:?}"
                    )))
                }
            };
            self.send(SyncMessage::RoundOpen {
                round,
                set_size: self.working.len() as u64,
            })?;

            let setup =
                self.round_setup(self.working.len() as u64 + peer_size, round)?;
            let mut receiver = ReceiverSession::new(
                setup.universe,
                setup.mapping,
                setup.hasher,
                setup.symbols,
            )?;

            // Inner loop: absorb batches until a decode completes.
            let (mine_reduced, theirs_reduced) = loop {
                let (iteration, cells) = match self.recv("Batch")? {
                    SyncMessage::Batch {
                        round: batch_round,
                        iteration,
                        cells,
                    } if batch_round == round => (iteration, cells),
                    other => {
                        return Err(SyncError::InvalidMessage(format!(
                            "expected Batch for round {round}, got {other:?}"
                        )))
                    }
                };

                match receiver.absorb_batch(iteration, &cells) {
                    Ok(IterateOutcome::Done {
                        local_exclusive,
                        remote_exclusive,
                    }) => break (local_exclusive, remote_exclusive),
                    Ok(IterateOutcome::NeedMore) => {
                        self.send(SyncMessage::NeedMore { round, iteration })?;
                    }
                    Err(err) => {
                        warn!(round, iteration, %err, "failed to absorb batch");
                        self.send_error(SyncErrorCode::InvalidMessage, err.to_string());
                        return Err(err);
                    }
                }
            };

            report.iterations += receiver.iteration();

            let reduced_count = (mine_reduced.len() + theirs_reduced.len()) as u64;
            let originals = match &setup.reduced {
                Some(reduced) => reduced.expand(&mine_reduced),
                None => mine_reduced.clone(),
            };
            self.send(SyncMessage::RoundResult {
                round,
                originals: originals.clone(),
                hints: theirs_reduced.clone(),
                reduced_count,
            })?;
            report.transmitted_bits += symbol_bits(&originals) + symbol_bits(&theirs_reduced);
            report.local_exclusive.extend(originals);

            let peer_originals = match self.recv("Originals")? {
                SyncMessage::Originals {
                    round: result_round,
                    symbols,
                } if result_round == round => symbols,
                other => {
                    return Err(SyncError::InvalidMessage(format!(
                        "expected Originals for round {round}, got {other:?}"
                    )))
                }
            };
            report.peer_exclusive.extend(peer_originals.iter().copied());
            self.absorb_peer_originals(&peer_originals);

            info!(
                round,
                iterations = receiver.iteration(),
                reduced_count,
                "round complete"
            );

            if self.params.reduce.is_none() || reduced_count == 0 {
                match self.recv("Done")? {
                    SyncMessage::Done { .. } => break,
                    other => {
                        return Err(SyncError::InvalidMessage(format!(
                            "expected Done, got {other:?}"
                        )))
                    }
                }
            }
            round += 1;
        }

        report.rounds = round;
        report.success = true;
        Ok(report)
    }
}

/// Wire size of a symbol payload: one full-width value per symbol.
fn symbol_bits(symbols: &[Symbol]) -> u64 {
    symbols
        .iter()
        .map(|symbol| symbol.kind().width_bits() as u64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory;
    use certsync_core::SymbolKind;

    fn run_pair(
        params: SessionParams,
        a: Vec<Symbol>,
        b: Vec<Symbol>,
    ) -> (Result<ReconcileReport>, Result<ReconcileReport>) {
        let (transport_a, transport_b) = memory::duplex();

        let params_b = params.clone();
        let handle = std::thread::spawn(move || -> Result<ReconcileReport> {
            let mut session = SyncSession::new(transport_b, params_b)?;
            session.add_local(&b);
            session.run_responder()
        });

        let result_a = SyncSession::new(transport_a, params).and_then(|mut session| {
            session.add_local(&a);
            session.run_initiator()
        });
        let result_b = handle.join().expect("responder thread panicked");
        (result_a, result_b)
    }

    fn sorted(mut symbols: Vec<Symbol>) -> Vec<Symbol> {
        symbols.sort();
        symbols
    }

    #[test]
    fn test_protocol_superset_egh() {
        let params = SessionParams::egh(Universe::Bounded(1000));
        let b: Vec<Symbol> = (1u32..=1000).map(Symbol::U32).collect();
        let a: Vec<Symbol> = (1u32..=1000).filter(|v| *v != 7).map(Symbol::U32).collect();

        let (report_a, report_b) = run_pair(params, a, b);
        let report_a = report_a.unwrap();
        let report_b = report_b.unwrap();

        assert!(report_a.success && report_b.success);
        assert_eq!(report_a.peer_exclusive, vec![Symbol::U32(7)]);
        assert!(report_a.local_exclusive.is_empty());
        assert_eq!(report_b.local_exclusive, vec![Symbol::U32(7)]);
        assert_eq!(report_a.rounds, 1);
        assert_eq!(report_a.iterations, 1);
    }

    #[test]
    fn test_protocol_two_sided_difference() {
        let params = SessionParams::egh(Universe::Bounded(500));
        let a: Vec<Symbol> = (1u32..=500).filter(|v| v % 71 != 0).map(Symbol::U32).collect();
        let b: Vec<Symbol> = (1u32..=500).filter(|v| v % 83 != 0).map(Symbol::U32).collect();

        let (report_a, report_b) = run_pair(params, a, b);
        let report_a = report_a.unwrap();
        let report_b = report_b.unwrap();

        let a_only: Vec<Symbol> = (1u32..=500)
            .filter(|v| v % 83 == 0 && v % 71 != 0)
            .map(Symbol::U32)
            .collect();
        let b_only: Vec<Symbol> = (1u32..=500)
            .filter(|v| v % 71 == 0 && v % 83 != 0)
            .map(Symbol::U32)
            .collect();

        assert_eq!(sorted(report_a.local_exclusive), a_only);
        assert_eq!(sorted(report_a.peer_exclusive), b_only);
        assert_eq!(sorted(report_b.local_exclusive), b_only);
        assert_eq!(sorted(report_b.peer_exclusive), a_only);
    }

    #[test]
    fn test_protocol_with_reduction_recovers_256bit_differences() {
        let params = SessionParams::egh(Universe::Unbounded).with_reduce(10.0);

        let shared: Vec<Symbol> = (1u64..=200)
            .map(|v| Symbol::from_u128(SymbolKind::U256, (v as u128) << 64 | 0x5eed))
            .collect();
        let mut a = shared.clone();
        let mut b = shared;
        let a_extra = Symbol::from_u128(SymbolKind::U256, 0xaaaa_0001);
        let b_extra_1 = Symbol::from_u128(SymbolKind::U256, 0xbbbb_0001);
        let b_extra_2 = Symbol::from_u128(SymbolKind::U256, 0xbbbb_0002);
        a.push(a_extra);
        b.push(b_extra_1);
        b.push(b_extra_2);

        let (report_a, report_b) = run_pair(params, a, b);
        let report_a = report_a.unwrap();
        let report_b = report_b.unwrap();

        assert_eq!(sorted(report_a.local_exclusive), sorted(vec![a_extra]));
        assert_eq!(
            sorted(report_a.peer_exclusive),
            sorted(vec![b_extra_1, b_extra_2])
        );
        assert_eq!(sorted(report_b.local_exclusive), sorted(vec![b_extra_1, b_extra_2]));
        assert_eq!(sorted(report_b.peer_exclusive), sorted(vec![a_extra]));
        // One discovery round plus the clean confirmation round.
        assert!(report_a.rounds >= 2);
        assert_eq!(report_a.rounds, report_b.rounds);
    }

    #[test]
    fn test_protocol_identical_sets_terminate_immediately() {
        let params = SessionParams::egh(Universe::Bounded(100));
        let set: Vec<Symbol> = (1u32..=100).map(Symbol::U32).collect();

        let (report_a, report_b) = run_pair(params, set.clone(), set);
        let report_a = report_a.unwrap();
        let report_b = report_b.unwrap();

        assert!(report_a.local_exclusive.is_empty());
        assert!(report_a.peer_exclusive.is_empty());
        assert!(report_b.local_exclusive.is_empty());
        assert_eq!(report_a.rounds, 1);
    }

    #[test]
    fn test_protocol_rejects_mapping_mismatch_at_setup() {
        let (transport_a, transport_b) = memory::duplex();
        let params_a = SessionParams::egh(Universe::Bounded(1000));
        let params_b = SessionParams::ols(Universe::Bounded(1000));

        let handle = std::thread::spawn(move || -> Result<ReconcileReport> {
            let mut session = SyncSession::new(transport_b, params_b)?;
            session.add_local(&[Symbol::U32(1)]);
            session.run_responder()
        });

        let mut session = SyncSession::new(transport_a, params_a).unwrap();
        session.add_local(&[Symbol::U32(1)]);
        let result_a = session.run_initiator();
        let result_b = handle.join().expect("responder thread panicked");

        assert!(matches!(result_a, Err(SyncError::MappingMismatch(_))));
        assert!(matches!(
            result_b,
            Err(SyncError::MappingMismatch(_)) | Err(SyncError::PeerError { .. })
        ));
    }

    #[test]
    fn test_protocol_ols_mapping() {
        let params = SessionParams::ols(Universe::Bounded(400));
        let b: Vec<Symbol> = (1u32..=400).map(Symbol::U32).collect();
        let a: Vec<Symbol> = (1u32..=400)
            .filter(|v| *v != 20 && *v != 399)
            .map(Symbol::U32)
            .collect();

        let (report_a, report_b) = run_pair(params, a, b);
        let report_a = report_a.unwrap();
        report_b.unwrap();

        assert_eq!(
            sorted(report_a.peer_exclusive),
            vec![Symbol::U32(20), Symbol::U32(399)]
        );
    }
}
