//! # Datagram Transport Seam
//!
//! The protocol engines are written against the [`Transport`] trait rather
//! than a concrete socket, so they can run over real UDP or entirely
//! in-process for tests.
//!
//! The transport is unreliable by contract: datagrams may be lost, duplicated,
//! or reordered, and a send to an unknown destination vanishes silently. Each
//! datagram carries an out-of-band protocol identifier ([`ProtoId`]) next to
//! the payload; engines discard anything not tagged [`ProtoId::CP`]. The timed
//! receive is the engines' only suspension point, and its timeout surfaces as
//! [`CpError::Timeout`], distinct from hard I/O failures.
//!
//! [`CpError::Timeout`]: crate::error::CpError::Timeout

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

pub mod memory;
pub mod udp;

/// Out-of-band protocol identifier used to demultiplex datagrams sharing one
/// local port. Carried alongside the payload, never inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtoId(pub u8);

impl ProtoId {
    /// The command protocol itself.
    pub const CP: ProtoId = ProtoId(0x43);
    /// Tag for frames whose identifier could not be read.
    pub const UNKNOWN: ProtoId = ProtoId(0x00);
}

/// One received datagram: payload plus the metadata the engines need for
/// addressing replies and demultiplexing.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub payload: Bytes,
    pub source: SocketAddr,
    pub proto: ProtoId,
}

/// An unreliable datagram endpoint bound to one local address.
pub trait Transport {
    /// Fire-and-forget send. Delivery is not guaranteed.
    fn send(
        &self,
        payload: Bytes,
        dest: SocketAddr,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Block until one datagram arrives. With a timeout, elapse surfaces as
    /// [`CpError::Timeout`](crate::error::CpError::Timeout).
    fn recv(
        &self,
        timeout: Option<Duration>,
    ) -> impl std::future::Future<Output = Result<Datagram>> + Send;

    /// The local address replies should be sent to.
    fn local_addr(&self) -> SocketAddr;
}
