//! # Cookie Store
//!
//! Fixed-capacity mapping from client address to issued cookie, with lazy
//! TTL-based expiry: no background sweep, an entry older than its TTL is
//! simply treated as absent.
//!
//! Re-issuing for an address already present overwrites the entry: a client
//! holds at most one live cookie, and requesting a new one invalidates the
//! old one immediately, even before its TTL elapses.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, warn};

use crate::error::constants::ERR_SERVER_FULL;
use crate::protocol::{COOKIE_STORE_CAPACITY, COOKIE_TTL};

/// Outcome of a cookie issue request. Rejection is a normal, expected result
/// (the store is full), not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOutcome {
    Issued(i32),
    Rejected(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct IssuedCookie {
    value: i32,
    issued_at: Instant,
}

/// Per-instance store of issued cookies, owned by one cookie server engine.
#[derive(Debug)]
pub struct CookieStore {
    entries: HashMap<SocketAddr, IssuedCookie>,
    ttl: Duration,
    capacity: usize,
}

impl CookieStore {
    /// Create a store with the protocol defaults (60 s TTL, 20 addresses).
    pub fn new() -> Self {
        Self::with_settings(COOKIE_TTL, COOKIE_STORE_CAPACITY)
    }

    /// Create a store with custom TTL and capacity.
    pub fn with_settings(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity,
        }
    }

    /// Issue a cookie for `client`, overwriting any prior entry for that
    /// address. Rejects only when the store is full of *other* addresses.
    pub fn issue(&mut self, client: SocketAddr) -> IssueOutcome {
        if !self.entries.contains_key(&client) && self.entries.len() >= self.capacity {
            warn!(%client, capacity = self.capacity, "cookie store full, rejecting");
            return IssueOutcome::Rejected(ERR_SERVER_FULL);
        }

        // Uniform non-negative 31-bit value.
        let value = rand::rng().random_range(0..i32::MAX);
        self.entries.insert(
            client,
            IssuedCookie {
                value,
                issued_at: Instant::now(),
            },
        );
        debug!(%client, "issued cookie");
        IssueOutcome::Issued(value)
    }

    /// Whether `value` matches any live entry. A linear scan bounded by the
    /// store capacity; no linkage to the requester's address is checked.
    pub fn verify(&self, value: i32) -> bool {
        self.entries
            .values()
            .any(|cookie| cookie.value == value && cookie.issued_at.elapsed() < self.ttl)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CookieStore {
    fn default() -> Self {
        Self::new()
    }
}
