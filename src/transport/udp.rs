//! UDP transport with one-byte protocol-id framing.
//!
//! Wire frame: `[proto_id(1)] [cp payload(N)]`. The identifier byte is the
//! out-of-band demultiplexing key; it is stripped before the payload reaches
//! the codec.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::{CpError, Result};
use crate::transport::{Datagram, ProtoId, Transport};

/// Largest frame accepted from the wire. CP messages are short text lines;
/// anything near this bound is already garbage.
const MAX_FRAME: usize = 8 * 1024;

/// A [`Transport`] over a bound tokio UDP socket.
pub struct UdpTransport {
    socket: UdpSocket,
    proto: ProtoId,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind a socket and tag all outgoing frames with `proto`.
    pub async fn bind(addr: SocketAddr, proto: ProtoId) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        debug!(%local_addr, proto = proto.0, "udp transport bound");
        Ok(Self {
            socket,
            proto,
            local_addr,
        })
    }
}

impl Transport for UdpTransport {
    async fn send(&self, payload: Bytes, dest: SocketAddr) -> Result<()> {
        let mut frame = BytesMut::with_capacity(payload.len() + 1);
        frame.extend_from_slice(&[self.proto.0]);
        frame.extend_from_slice(&payload);
        self.socket.send_to(&frame, dest).await?;
        Ok(())
    }

    async fn recv(&self, timeout: Option<Duration>) -> Result<Datagram> {
        let mut buf = vec![0u8; MAX_FRAME];
        let (len, source) = match timeout {
            Some(window) => tokio::time::timeout(window, self.socket.recv_from(&mut buf))
                .await
                .map_err(|_| CpError::Timeout)??,
            None => self.socket.recv_from(&mut buf).await?,
        };

        buf.truncate(len);
        let mut frame = Bytes::from(buf);
        let proto = if frame.is_empty() {
            ProtoId::UNKNOWN
        } else {
            ProtoId(frame.split_to(1)[0])
        };

        Ok(Datagram {
            payload: frame,
            source,
            proto,
        })
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
