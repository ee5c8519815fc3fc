//! # Core Wire Components
//!
//! Message grammar, checksumming, and the textual wire codec.
//!
//! This module is the foundation of the protocol: every datagram either
//! originates from [`message::Message::encode`] or is interpreted by
//! [`codec::decode`].
//!
//! ## Wire Format
//! ```text
//! cp <variant-header> <field>... [free-text] [checksum]
//! ```
//!
//! Fields are single-space separated ASCII tokens. Every variant except the
//! cookie request/response pair carries a trailing CRC-32 checksum computed
//! over all preceding tokens. Free-text fields may contain internal single
//! spaces; runs of whitespace are unrepresentable and rejected on both ends.

pub mod checksum;
pub mod codec;
pub mod message;
