//! # cp-protocol
//!
//! A small application-layer datagram protocol ("CP") layering session
//! authentication and command execution over an unreliable transport.
//!
//! Three roles share one message grammar:
//! - a **client** that authenticates via a short-lived cookie and issues
//!   commands ([`protocol::client::CpClient`])
//! - a **cookie server** that issues and verifies cookies
//!   ([`protocol::cookie_server::CookieServer`])
//! - a **command server** that accepts commands, validates their cookie with
//!   the cookie server, and returns a correlated result
//!   ([`protocol::command_server::CommandServer`])
//!
//! The wire form is textual and checksummed (see [`core`]); the transport is
//! any unreliable datagram channel behind the [`transport::Transport`] seam,
//! UDP in production and an in-process hub in tests. Datagrams may be lost,
//! duplicated, or reordered; the client's id-echo check and bounded retry
//! loops are the recovery mechanism.
//!
//! ## Example
//! ```no_run
//! use cp_protocol::protocol::client::CpClient;
//! use cp_protocol::transport::udp::UdpTransport;
//! use cp_protocol::transport::ProtoId;
//!
//! #[tokio::main]
//! async fn main() -> cp_protocol::Result<()> {
//!     let transport = UdpTransport::bind("0.0.0.0:0".parse().unwrap(), ProtoId::CP).await?;
//!     let mut client = CpClient::new(
//!         transport,
//!         "127.0.0.1:2000".parse().unwrap(),
//!         "127.0.0.1:2001".parse().unwrap(),
//!     );
//!
//!     client.send("print hello").await?;
//!     let reply = client.receive().await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;

pub use crate::config::CpConfig;
pub use crate::core::message::Message;
pub use crate::error::{CpError, DecodeError, Result};
pub use crate::protocol::client::CpClient;
pub use crate::protocol::command_server::CommandServer;
pub use crate::protocol::cookie_server::CookieServer;
