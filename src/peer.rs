use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Bytes queued for one connection. Shared so a broadcast clones a pointer, not the payload.
pub type Payload = Arc<[u8]>;

/// Server-assigned connection identity. Never reused within one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl ConnId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The registry's view of a live connection.
///
/// It does not own the socket: the session worker does. A peer can only
/// enqueue outbound bytes and ask the session to close.
#[derive(Clone)]
pub struct Peer {
    tx: mpsc::Sender<Payload>,
    closed: CancellationToken,
}

impl Peer {
    /// Creates a peer with a bounded outbound queue. The receiver goes to the
    /// writer task of the connection.
    pub fn new(capacity: usize, closed: CancellationToken) -> (Self, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        (Self { tx, closed }, rx)
    }

    /// Enqueue without waiting. A full queue means a slow reader, and the payload is dropped for it.
    pub fn offer(&self, payload: Payload) -> Result<(), TrySendError<Payload>> {
        self.tx.try_send(payload)
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("queue_closed", &self.tx.is_closed())
            .field("closed", &self.closed.is_cancelled())
            .finish()
    }
}
