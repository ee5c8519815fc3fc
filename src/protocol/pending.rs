//! # Pending Command Store
//!
//! Commands the command server is holding between sending a cookie
//! verification request and receiving the matching response.
//!
//! Entries are keyed by a server-generated correlation token that rides
//! inside the verification request/response pair, so a response always
//! resolves the command that produced it; position in a queue carries no
//! meaning. Insertion order is still tracked for capacity eviction: when the
//! store is full the oldest live entry is dropped, bounding growth when the
//! cookie server stops answering.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;

use tracing::warn;

use crate::core::message::Command;
use crate::protocol::PENDING_CAPACITY;

/// A command awaiting verification, plus the address its eventual
/// [`CommandResponse`](crate::core::message::CommandResponse) goes back to.
#[derive(Debug, Clone)]
pub struct PendingCommand {
    pub command: Command,
    pub source: SocketAddr,
}

/// Correlation-token-keyed holding area, owned by one command server engine.
#[derive(Debug)]
pub struct PendingStore {
    entries: HashMap<u16, PendingCommand>,
    insertion_order: VecDeque<u16>,
    next_token: u16,
    capacity: usize,
}

impl PendingStore {
    /// Tokens restart at 1 after wrapping; 0 is never issued, which keeps the
    /// token space disjoint from the client id space's restart value.
    ///
    /// A capacity below 1 is clamped to 1: an inserted command must be
    /// holdable until its verification resolves.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            next_token: 1,
            capacity: capacity.max(1),
        }
    }

    /// Record a command and return the correlation token to carry in the
    /// verification request. Evicts the oldest entry when full.
    pub fn insert(&mut self, command: Command, source: SocketAddr) -> u16 {
        while self.entries.len() >= self.capacity {
            match self.insertion_order.pop_front() {
                Some(token) => {
                    // Stale tokens (already resolved) are skipped silently.
                    if self.entries.remove(&token).is_some() {
                        warn!(token, "pending store full, evicted oldest command");
                    }
                }
                None => break,
            }
        }

        let token = self.next_token;
        self.next_token = match self.next_token.wrapping_add(1) {
            0 => 1,
            next => next,
        };

        self.entries
            .insert(token, PendingCommand { command, source });
        self.insertion_order.push_back(token);
        token
    }

    /// Resolve a verification response. `None` means the token is unknown
    /// (already resolved, evicted, or never issued) and the caller does
    /// nothing.
    pub fn remove(&mut self, token: u16) -> Option<PendingCommand> {
        self.entries.remove(&token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PendingStore {
    fn default() -> Self {
        Self::new(PENDING_CAPACITY)
    }
}
