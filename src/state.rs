use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::peer::{ConnId, Payload, Peer};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection {0} is already registered")]
    Duplicate(ConnId),
}

/// Every connection currently eligible to receive broadcasts.
///
/// One lock guards membership and fan-out alike, so the recipients of a
/// broadcast are exactly the members at the moment it took the lock.
#[derive(Clone, Default)]
pub struct Registry {
    peers: Arc<Mutex<HashMap<ConnId, Peer>>>,
    last_id: Arc<AtomicU64>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out identities starting at 1.
    pub fn next_id(&self) -> ConnId {
        ConnId::new(self.last_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnId, Peer>> {
        // Nothing panics while holding the lock; a poisoned map is still consistent.
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, id: ConnId, peer: Peer) -> Result<(), RegistryError> {
        let mut peers = self.lock();

        if peers.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        peers.insert(id, peer);

        Ok(())
    }

    /// Removes `id`. Absent ids are ignored, since shutdown may have cleared it already.
    pub fn deregister(&self, id: ConnId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Offers `payload` to every member except `excluded`.
    ///
    /// A failed enqueue is logged and skipped; it neither aborts the batch nor
    /// removes the member. Returns how many members accepted the payload.
    pub fn broadcast(&self, payload: impl Into<Payload>, excluded: Option<ConnId>) -> usize {
        let payload = payload.into();
        let peers = self.lock();

        let mut delivered = 0;
        for (&id, peer) in peers.iter() {
            if Some(id) == excluded {
                continue;
            }
            if offer(id, peer, payload.clone()) {
                delivered += 1;
            }
        }

        delivered
    }

    pub fn send_to(&self, id: ConnId, payload: impl Into<Payload>) -> bool {
        let peers = self.lock();

        match peers.get(&id) {
            Some(peer) => offer(id, peer, payload.into()),
            None => false,
        }
    }

    /// Signals every member to close and empties the registry.
    pub fn close_all(&self) -> usize {
        let mut peers = self.lock();
        let count = peers.len();

        for peer in peers.values() {
            peer.close();
        }
        peers.clear();

        count
    }

    pub fn contains(&self, id: ConnId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<ConnId> {
        let mut ids: Vec<ConnId> = self.lock().keys().copied().collect();
        ids.sort();
        ids
    }
}

fn offer(id: ConnId, peer: &Peer, payload: Payload) -> bool {
    match peer.offer(payload) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(conn = %id, "outbound queue full, dropping payload");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(conn = %id, "writer already gone, skipping payload");
            false
        }
    }
}
