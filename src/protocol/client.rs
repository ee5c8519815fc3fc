//! # Client Engine
//!
//! Cookie acquisition, command dispatch, and correlated receive over the
//! unreliable transport.
//!
//! The session moves `Idle → AwaitingCookie → Ready → AwaitingResponse →
//! Ready`; failures surface as typed errors rather than a dead engine, so the
//! caller may retry at its own level. Both retry loops share the same shape:
//! up to [`MAX_ATTEMPTS`] attempts with a fixed per-attempt timeout (2000 ms
//! by default, the protocol's reference value). Stray traffic (foreign
//! protocol ids, undecodable datagrams, unexpected variants, mismatched ids)
//! consumes the attempt it arrived in; it never extends the deadline.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::debug;

use crate::config::ClientConfig;
use crate::core::codec::decode;
use crate::core::message::{Command, Message};
use crate::error::constants::MSG_SUCCESS;
use crate::error::{CpError, Result};
use crate::protocol::{ATTEMPT_TIMEOUT, MAX_ATTEMPTS};
use crate::transport::{ProtoId, Transport};

/// One client session against a command server / cookie server pair.
pub struct CpClient<T: Transport> {
    transport: T,
    command_server: SocketAddr,
    cookie_server: SocketAddr,
    cookie: Option<i32>,
    next_id: u16,
    last_sent: Option<Command>,
    attempt_timeout: Duration,
    max_attempts: u32,
}

impl<T: Transport> CpClient<T> {
    pub fn new(transport: T, command_server: SocketAddr, cookie_server: SocketAddr) -> Self {
        Self {
            transport,
            command_server,
            cookie_server,
            cookie: None,
            next_id: 0,
            last_sent: None,
            attempt_timeout: ATTEMPT_TIMEOUT,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Build a client from a parsed [`ClientConfig`] section.
    pub fn from_config(transport: T, config: &ClientConfig) -> Result<Self> {
        let command_server = parse_addr("client.command_server_addr", &config.command_server_addr)?;
        let cookie_server = parse_addr("client.cookie_server_addr", &config.cookie_server_addr)?;
        Ok(Self::new(transport, command_server, cookie_server).with_timing(
            config.attempt_timeout,
            config.max_attempts,
        ))
    }

    /// Override the per-attempt timeout and attempt budget. Fixed for the
    /// lifetime of the engine instance.
    pub fn with_timing(mut self, attempt_timeout: Duration, max_attempts: u32) -> Self {
        self.attempt_timeout = attempt_timeout;
        self.max_attempts = max_attempts;
        self
    }

    /// The currently held session cookie, if any.
    pub fn cookie(&self) -> Option<i32> {
        self.cookie
    }

    /// Send `raw` as a command, acquiring a cookie first if none is held.
    ///
    /// The first whitespace-separated token of `raw` is the command keyword;
    /// the remainder is its free-text argument. Returns the correlation id
    /// used, which the next [`receive`](Self::receive) will match against.
    /// Non-blocking with respect to server processing.
    pub async fn send(&mut self, raw: &str) -> Result<u16> {
        if self.cookie.is_none() {
            self.request_cookie().await?;
        }
        let cookie = self
            .cookie
            .ok_or_else(|| CpError::CookieAcquisitionFailed("no cookie held".into()))?;

        let (keyword, argument) = match raw.split_once(' ') {
            Some((keyword, argument)) => (keyword, argument),
            None => (raw, ""),
        };

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let command = Command {
            id,
            cookie,
            command: keyword.to_string(),
            message: argument.to_string(),
        };
        let wire = Message::Command(command.clone()).encode()?;
        self.last_sent = Some(command);

        debug!(id, keyword, "sending command");
        self.transport.send(wire, self.command_server).await?;
        Ok(id)
    }

    /// Await the response to the last sent command.
    ///
    /// Returns the server's reply text (a literal success marker when the
    /// payload is empty). An explicit `success=false` reply surfaces as
    /// [`CpError::CommandRejected`]; an exhausted attempt budget as
    /// [`CpError::ServerTimeout`].
    pub async fn receive(&mut self) -> Result<String> {
        let expected_id = self
            .last_sent
            .as_ref()
            .ok_or(CpError::ProtocolSequence)?
            .id;

        for attempt in 0..self.max_attempts {
            let datagram = match self.transport.recv(Some(self.attempt_timeout)).await {
                Ok(datagram) => datagram,
                Err(e) if e.is_timeout() => {
                    debug!(attempt, "receive attempt timed out");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if datagram.proto != ProtoId::CP {
                debug!(attempt, proto = datagram.proto.0, "foreign protocol id");
                continue;
            }
            let message = match decode(&datagram.payload) {
                Ok(message) => message,
                Err(e) => {
                    debug!(attempt, error = %e, "discarding undecodable datagram");
                    continue;
                }
            };
            let response = match message {
                Message::CommandResponse(response) => response,
                other => {
                    debug!(attempt, ?other, "not a command response");
                    continue;
                }
            };
            if response.id != expected_id {
                debug!(attempt, got = response.id, expected_id, "id mismatch");
                continue;
            }

            if !response.success {
                return Err(CpError::CommandRejected(response.message));
            }
            return Ok(if response.message.is_empty() {
                MSG_SUCCESS.to_string()
            } else {
                response.message
            });
        }

        Err(CpError::ServerTimeout {
            attempts: self.max_attempts,
        })
    }

    /// Run the cookie-acquisition round trip: re-send the request verbatim
    /// each attempt (no backoff) and accept only a cookie response.
    pub async fn request_cookie(&mut self) -> Result<()> {
        let request = Message::CookieRequest.encode()?;

        for attempt in 0..self.max_attempts {
            self.transport
                .send(request.clone(), self.cookie_server)
                .await?;

            let datagram = match self.transport.recv(Some(self.attempt_timeout)).await {
                Ok(datagram) => datagram,
                Err(e) if e.is_timeout() => {
                    debug!(attempt, "cookie request timed out");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if datagram.proto != ProtoId::CP {
                continue;
            }
            let (success, payload) = match decode(&datagram.payload) {
                Ok(Message::CookieResponse { success, payload }) => (success, payload),
                Ok(other) => {
                    debug!(attempt, ?other, "not a cookie response");
                    continue;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "discarding undecodable datagram");
                    continue;
                }
            };

            if !success {
                return Err(CpError::CookieAcquisitionFailed(payload));
            }
            let value: i32 = payload.parse().map_err(|_| {
                CpError::CookieAcquisitionFailed(format!("unparseable cookie value {payload:?}"))
            })?;
            debug!(attempt, "cookie acquired");
            self.cookie = Some(value);
            return Ok(());
        }

        Err(CpError::CookieAcquisitionFailed(
            "no response from cookie server".into(),
        ))
    }
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|_| CpError::Config(format!("{field}: invalid socket address {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::command_server::CommandServer;
    use crate::protocol::cookie_server::CookieServer;
    use crate::transport::memory::MemoryHub;

    #[tokio::test]
    async fn command_ids_wrap_back_to_zero() {
        let hub = MemoryHub::new();
        let cookie_transport = hub.bind(ProtoId::CP);
        let cookie_addr = cookie_transport.local_addr();
        let command_transport = hub.bind(ProtoId::CP);
        let command_addr = command_transport.local_addr();

        let mut cookie_server = CookieServer::new(cookie_transport);
        let mut command_server = CommandServer::new(command_transport, cookie_addr);
        tokio::spawn(async move {
            let _ = cookie_server.run().await;
        });
        tokio::spawn(async move {
            let _ = command_server.run().await;
        });

        let mut client = CpClient::new(hub.bind(ProtoId::CP), command_addr, cookie_addr)
            .with_timing(Duration::from_millis(200), 3);
        client.next_id = u16::MAX;

        assert_eq!(client.send("status").await.unwrap(), u16::MAX);
        assert_eq!(client.receive().await.unwrap(), "command executed");
        // 65535 wraps to the client restart value, not an overflow.
        assert_eq!(client.send("status").await.unwrap(), 0);
        assert_eq!(client.receive().await.unwrap(), "command executed");
    }

    #[tokio::test]
    async fn raw_command_splits_on_first_space() {
        let hub = MemoryHub::new();
        let mut client = CpClient::new(hub.bind(ProtoId::CP), hub.black_hole(), hub.black_hole());
        client.cookie = Some(1);

        client.send("print hello out there").await.unwrap();
        let sent = client.last_sent.as_ref().unwrap();
        assert_eq!(sent.command, "print");
        assert_eq!(sent.message, "hello out there");

        client.send("status").await.unwrap();
        let sent = client.last_sent.as_ref().unwrap();
        assert_eq!(sent.command, "status");
        assert_eq!(sent.message, "");
    }
}
