//! Outstanding-request registry.
//!
//! Allocates request IDs that never collide with an ID still in flight and
//! routes each reply to the one caller waiting on it. Replies may arrive in
//! any order; correlation is by ID only, and for a single ID there is
//! exactly one reply.

use std::collections::HashMap;

use sftpdiff_platform::{SftpdiffError, SftpdiffResult};
use tokio::sync::oneshot;

/// A reply frame as delivered by the receive loop.
///
/// The body excludes the leading request ID; it starts at the first
/// request-specific field.
#[derive(Debug)]
pub struct Reply {
    /// Raw message type byte
    pub msg_type: u8,
    /// Body bytes after the request ID
    pub body: Vec<u8>,
}

/// Per-connection table of outstanding requests.
pub(crate) struct ReplyRegistry {
    /// Next candidate ID; advanced past any ID still outstanding
    next_id: u32,
    /// Waiters keyed by request ID
    pending: HashMap<u32, oneshot::Sender<Reply>>,
    /// Set once the connection is torn down; no further allocation
    shutdown: bool,
}

impl ReplyRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            pending: HashMap::new(),
            shutdown: false,
        }
    }

    /// Claims a fresh request ID and the receiver its reply will arrive on.
    ///
    /// Wraparound of the 32-bit counter is permitted; IDs still in flight
    /// are skipped so no two simultaneously-outstanding IDs are equal.
    pub(crate) fn allocate(&mut self) -> SftpdiffResult<(u32, oneshot::Receiver<Reply>)> {
        if self.shutdown {
            return Err(SftpdiffError::Shutdown);
        }
        while self.pending.contains_key(&self.next_id) {
            self.next_id = self.next_id.wrapping_add(1);
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        Ok((id, rx))
    }

    /// Forgets an ID whose request was never written to the transport.
    pub(crate) fn release(&mut self, id: u32) {
        self.pending.remove(&id);
    }

    /// Delivers a reply to the waiter for `id`.
    ///
    /// Returns false when no such request is outstanding.
    pub(crate) fn complete(&mut self, id: u32, reply: Reply) -> bool {
        match self.pending.remove(&id) {
            Some(tx) => {
                // A waiter that gave up just discards the reply
                let _ = tx.send(reply);
                true
            }
            None => false,
        }
    }

    /// Fails every outstanding request and refuses new ones.
    ///
    /// Dropping the senders wakes each waiter, which observes `Shutdown`.
    pub(crate) fn fail_all(&mut self) {
        self.shutdown = true;
        self.pending.clear();
    }

    /// Number of requests still awaiting a reply.
    #[cfg(test)]
    pub(crate) fn outstanding(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(tag: u8) -> Reply {
        Reply {
            msg_type: 103,
            body: vec![tag],
        }
    }

    #[test]
    fn test_ids_unique_while_outstanding() {
        let mut reg = ReplyRegistry::new();
        let mut ids = Vec::new();
        let mut rxs = Vec::new();
        for _ in 0..100 {
            let (id, rx) = reg.allocate().unwrap();
            ids.push(id);
            rxs.push(rx);
        }
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
        assert_eq!(reg.outstanding(), 100);
    }

    #[test]
    fn test_wraparound_skips_in_flight_ids() {
        let mut reg = ReplyRegistry::new();
        reg.next_id = u32::MAX;
        let (a, _rx_a) = reg.allocate().unwrap();
        assert_eq!(a, u32::MAX);

        // Counter wrapped; 0 is free
        let (b, _rx_b) = reg.allocate().unwrap();
        assert_eq!(b, 0);

        // Force a lap: everything up to the still-outstanding IDs is taken
        reg.next_id = u32::MAX;
        let (c, _rx_c) = reg.allocate().unwrap();
        assert_eq!(c, 1);
    }

    #[tokio::test]
    async fn test_out_of_order_delivery() {
        let mut reg = ReplyRegistry::new();
        let (id_a, rx_a) = reg.allocate().unwrap();
        let (id_b, rx_b) = reg.allocate().unwrap();
        let (id_c, rx_c) = reg.allocate().unwrap();

        assert!(reg.complete(id_c, reply(3)));
        assert!(reg.complete(id_a, reply(1)));
        assert!(reg.complete(id_b, reply(2)));

        assert_eq!(rx_a.await.unwrap().body, vec![1]);
        assert_eq!(rx_b.await.unwrap().body, vec![2]);
        assert_eq!(rx_c.await.unwrap().body, vec![3]);
        assert_eq!(reg.outstanding(), 0);
    }

    #[test]
    fn test_complete_unknown_id() {
        let mut reg = ReplyRegistry::new();
        assert!(!reg.complete(42, reply(0)));
    }

    #[tokio::test]
    async fn test_fail_all_wakes_waiters() {
        let mut reg = ReplyRegistry::new();
        let (_id_a, rx_a) = reg.allocate().unwrap();
        let (_id_b, rx_b) = reg.allocate().unwrap();

        reg.fail_all();

        assert!(rx_a.await.is_err());
        assert!(rx_b.await.is_err());
        assert!(matches!(reg.allocate(), Err(SftpdiffError::Shutdown)));
    }

    #[test]
    fn test_release_frees_id() {
        let mut reg = ReplyRegistry::new();
        let (id, _rx) = reg.allocate().unwrap();
        reg.release(id);
        assert_eq!(reg.outstanding(), 0);
    }
}
