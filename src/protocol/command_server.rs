//! # Command Server Engine
//!
//! Accepts client commands, validates their cookie with the cookie server,
//! and sends the correlated result back to the client.
//!
//! Command intake never blocks on verification: the command is parked in the
//! [`PendingStore`] under a fresh correlation token, the verification request
//! goes out, and the loop returns to servicing traffic. When the matching
//! verification response arrives the parked command is resolved by token and
//! answered at its captured source address. The command's semantic payload is
//! never interpreted here; "execution" is a log-level side effect.

use std::net::SocketAddr;

use tracing::{debug, info};

use crate::config::CommandServerConfig;
use crate::core::codec::decode;
use crate::core::message::{CommandResponse, Message};
use crate::error::constants::{ERR_BAD_COOKIE, MSG_COMMAND_EXECUTED};
use crate::error::{CpError, Result};
use crate::protocol::pending::PendingStore;
use crate::protocol::PENDING_CAPACITY;
use crate::transport::{ProtoId, Transport};

/// One command server instance, sole owner of its [`PendingStore`].
pub struct CommandServer<T: Transport> {
    transport: T,
    cookie_server: SocketAddr,
    pending: PendingStore,
}

impl<T: Transport> CommandServer<T> {
    pub fn new(transport: T, cookie_server: SocketAddr) -> Self {
        Self {
            transport,
            cookie_server,
            pending: PendingStore::new(PENDING_CAPACITY),
        }
    }

    /// Build a server from a parsed [`CommandServerConfig`] section.
    pub fn from_config(transport: T, config: &CommandServerConfig) -> Result<Self> {
        let cookie_server = config.cookie_server_addr.parse().map_err(|_| {
            CpError::Config(format!(
                "command_server.cookie_server_addr: invalid socket address {:?}",
                config.cookie_server_addr
            ))
        })?;
        Ok(Self {
            transport,
            cookie_server,
            pending: PendingStore::new(config.pending_capacity),
        })
    }

    /// Number of commands currently awaiting verification.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
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
            Message::Command(command) => {
                let cookie = command.cookie;
                let token = self.pending.insert(command, datagram.source);
                debug!(token, cookie, client = %datagram.source, "command pending verification");

                let request = Message::CookieVerificationRequest { id: token, cookie };
                self.transport
                    .send(request.encode()?, self.cookie_server)
                    .await?;
            }
            Message::CookieVerificationResponse { id, success } => {
                let Some(pending) = self.pending.remove(id) else {
                    debug!(token = id, "verification response with no pending command");
                    return Ok(());
                };

                let reply = if success {
                    info!(
                        command = %pending.command.command,
                        message = %pending.command.message,
                        client = %pending.source,
                        "executing command"
                    );
                    CommandResponse {
                        id: pending.command.id,
                        success: true,
                        message: MSG_COMMAND_EXECUTED.to_string(),
                    }
                } else {
                    debug!(token = id, client = %pending.source, "cookie rejected");
                    CommandResponse {
                        id: pending.command.id,
                        success: false,
                        message: ERR_BAD_COOKIE.to_string(),
                    }
                };
                self.transport
                    .send(Message::CommandResponse(reply).encode()?, pending.source)
                    .await?;
            }
            other => {
                debug!(?other, "variant not handled by command server");
            }
        }
        Ok(())
    }
}
