//! # Role Engines
//!
//! One engine per protocol role, each owning its own state and driving a
//! single logical thread of control:
//!
//! - [`client::CpClient`]: cookie acquisition, command dispatch, correlated
//!   receive with bounded retry
//! - [`cookie_server::CookieServer`]: cookie issuance and verification,
//!   backed by [`cookie_store::CookieStore`]
//! - [`command_server::CommandServer`]: command intake, the verification
//!   round trip with the cookie server, and the client-facing reply, backed
//!   by [`pending::PendingStore`]
//!
//! Servers expose a one-datagram `poll()` plus a `run()` loop; the stores are
//! owned exclusively by their engine, so no locking is needed.

use std::time::Duration;

pub mod client;
pub mod command_server;
pub mod cookie_server;
pub mod cookie_store;
pub mod pending;

/// Attempt budget for the client's receive and cookie-acquisition loops.
pub const MAX_ATTEMPTS: u32 = 3;

/// Fixed per-attempt receive timeout for the client loops.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Lifetime of an issued cookie; older entries are treated as absent.
pub const COOKIE_TTL: Duration = Duration::from_millis(60_000);

/// Maximum number of distinct client addresses the cookie store tracks.
pub const COOKIE_STORE_CAPACITY: usize = 20;

/// Maximum number of commands awaiting cookie verification before the oldest
/// entry is evicted.
pub const PENDING_CAPACITY: usize = 64;
