//! # Error Types
//!
//! Error handling for the CP command protocol.
//!
//! This module defines every failure condition the protocol core can surface,
//! from wire-level decode rejects to client-side retry exhaustion.
//!
//! ## Error Categories
//! - **Decode Errors**: malformed envelopes, unknown variants, checksum or
//!   field validation failures ([`DecodeError`])
//! - **Protocol Errors**: sequencing violations, retry exhaustion, rejected
//!   commands
//! - **Transport Errors**: I/O failures and receive timeouts
//!
//! Decode failures are always recoverable: a server discards the offending
//! datagram and keeps servicing its loop, a client consumes one retry attempt.
//! A receive timeout ([`CpError::Timeout`]) is deliberately distinct from
//! other I/O failures so the retry loops can tell them apart.

use std::io;
use thiserror::Error;

/// Reply and rejection text constants shared across roles.
/// Static strings are borrowed, avoiding allocations on common paths.
pub mod constants {
    /// Cookie Store rejection reason when all address slots are taken.
    pub const ERR_SERVER_FULL: &str = "server full";

    /// Command Server reply text for a verified, accepted command.
    pub const MSG_COMMAND_EXECUTED: &str = "command executed";

    /// Command Server reply text when cookie verification fails.
    pub const ERR_BAD_COOKIE: &str = "invalid or expired cookie";

    /// Client-side display text when a successful response carries no payload.
    pub const MSG_SUCCESS: &str = "ok";
}

/// Failures raised while decoding a datagram into a [`Message`].
///
/// Validation is staged: the envelope is checked first, then the variant
/// header, then the trailing checksum, and only then the individual fields.
/// The stage that failed is visible in the variant.
///
/// [`Message`]: crate::core::message::Message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("missing or malformed protocol envelope")]
    MalformedEnvelope,

    #[error("unknown message variant: {0}")]
    UnknownVariant(String),

    #[error("checksum mismatch: declared {declared}, computed {computed}")]
    ChecksumMismatch { declared: u32, computed: u32 },

    #[error("malformed fields: {0}")]
    MalformedFields(String),
}

/// Primary error type for all protocol operations.
#[derive(Error, Debug)]
pub enum CpError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A free-text field contains whitespace the wire format cannot carry
    /// (runs of spaces, tabs/newlines, or leading/trailing spaces).
    #[error("free-text field cannot be encoded: {0}")]
    UnencodableText(String),

    /// `receive` was called without a prior `send`.
    #[error("receive called without a prior send")]
    ProtocolSequence,

    /// The command server did not produce a usable response within the
    /// attempt budget.
    #[error("server timeout after {attempts} attempts")]
    ServerTimeout { attempts: u32 },

    /// The cookie server rejected the request or never answered.
    #[error("cookie acquisition failed: {0}")]
    CookieAcquisitionFailed(String),

    /// The command server explicitly answered `success=false`.
    #[error("command rejected: {0}")]
    CommandRejected(String),

    /// A timed receive elapsed without a datagram arriving.
    #[error("receive timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CpError {
    /// Whether this error represents a timed-out receive, as opposed to a
    /// hard transport failure. Retry loops branch on this.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CpError::Timeout)
    }
}

/// Type alias for Results using CpError
pub type Result<T> = std::result::Result<T, CpError>;
