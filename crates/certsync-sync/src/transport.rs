//! Transport abstraction for the sync protocol.
//!
//! The transport delivers whole messages between the two parties; how they
//! are serialized and moved (WebSocket, pipe, QUIC stream) is the caller's
//! business. The trait is synchronous: the protocol core never yields or
//! awaits, and callers that live in an async runtime wrap the session in a
//! blocking task.

use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::messages::SyncMessage;

/// Message transport connecting exactly two parties.
pub trait Transport {
    /// Send a message to the peer.
    fn send(&self, message: SyncMessage) -> Result<()>;

    /// Receive the next message from the peer.
    ///
    /// Returns `None` if the timeout expires before a message arrives.
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<SyncMessage>>;
}

/// A simple in-memory transport for tests and in-process reconciliation.
///
/// Uses channels to simulate message passing between the two endpoints.
pub mod memory {
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// One endpoint of an in-memory duplex link.
    pub struct MemoryTransport {
        sender: Sender<SyncMessage>,
        receiver: Mutex<Receiver<SyncMessage>>,
    }

    /// Create a connected pair of endpoints.
    pub fn duplex() -> (MemoryTransport, MemoryTransport) {
        let (tx_a, rx_b) = mpsc::channel();
        let (tx_b, rx_a) = mpsc::channel();
        (
            MemoryTransport {
                sender: tx_a,
                receiver: Mutex::new(rx_a),
            },
            MemoryTransport {
                sender: tx_b,
                receiver: Mutex::new(rx_b),
            },
        )
    }

    impl Transport for MemoryTransport {
        fn send(&self, message: SyncMessage) -> Result<()> {
            self.sender
                .send(message)
                .map_err(|_| SyncError::TransportError("peer disconnected".into()))
        }

        fn recv_timeout(&self, timeout: Duration) -> Result<Option<SyncMessage>> {
            let receiver = self
                .receiver
                .lock()
                .map_err(|_| SyncError::TransportError("receiver poisoned".into()))?;
            match receiver.recv_timeout(timeout) {
                Ok(message) => Ok(Some(message)),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    Err(SyncError::TransportError("channel closed".into()))
                }
            }
        }
    }
}
