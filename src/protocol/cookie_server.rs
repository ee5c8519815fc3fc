//! # Cookie Server Engine
//!
//! Issues session cookies to clients and answers verification requests from
//! command servers. One blocking receive per [`poll`](CookieServer::poll);
//! anything that fails to decode, or arrives under a foreign protocol id, is
//! discarded silently and the loop moves on.

use tracing::{debug, info, warn};

use crate::config::CookieServerConfig;
use crate::core::codec::decode;
use crate::core::message::Message;
use crate::error::Result;
use crate::protocol::cookie_store::{CookieStore, IssueOutcome};
use crate::transport::{ProtoId, Transport};

/// One cookie server instance, sole owner of its [`CookieStore`].
pub struct CookieServer<T: Transport> {
    transport: T,
    store: CookieStore,
}

impl<T: Transport> CookieServer<T> {
    pub fn new(transport: T) -> Self {
        Self::with_store(transport, CookieStore::new())
    }

    /// Use a pre-configured store (custom TTL/capacity).
    pub fn with_store(transport: T, store: CookieStore) -> Self {
        Self { transport, store }
    }

    /// Build a server from a parsed [`CookieServerConfig`] section.
    pub fn from_config(transport: T, config: &CookieServerConfig) -> Self {
        Self::with_store(
            transport,
            CookieStore::with_settings(config.cookie_ttl, config.store_capacity),
        )
    }

    pub fn store(&self) -> &CookieStore {
        &self.store
    }

    /// Service inbound datagrams forever.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.poll().await?;
        }
    }

    /// Receive and handle exactly one datagram.
    pub async fn poll(&mut self) -> Result<()> {
        let datagram = self.transport.recv(None).await?;
        if datagram.proto != ProtoId::CP {
            return Ok(());
        }
        let message = match decode(&datagram.payload) {
            Ok(message) => message,
            Err(e) => {
                debug!(source = %datagram.source, error = %e, "discarding datagram");
                return Ok(());
            }
        };

        match message {
            Message::CookieRequest => {
                let reply = match self.store.issue(datagram.source) {
                    IssueOutcome::Issued(value) => {
                        info!(client = %datagram.source, "cookie issued");
                        Message::CookieResponse {
                            success: true,
                            payload: value.to_string(),
                        }
                    }
                    IssueOutcome::Rejected(reason) => {
                        warn!(client = %datagram.source, reason, "cookie request rejected");
                        Message::CookieResponse {
                            success: false,
                            payload: reason.to_string(),
                        }
                    }
                };
                self.transport.send(reply.encode()?, datagram.source).await?;
            }
            Message::CookieVerificationRequest { id, cookie } => {
                let success = self.store.verify(cookie);
                debug!(token = id, success, "cookie verification");
                // Addressed to the requester (the command server), not the
                // client the cookie was issued to.
                let reply = Message::CookieVerificationResponse { id, success };
                self.transport.send(reply.encode()?, datagram.source).await?;
            }
            other => {
                debug!(?other, "variant not handled by cookie server");
            }
        }
        Ok(())
    }
}
