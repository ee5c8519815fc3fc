//! In-process datagram transport for tests and demos.
//!
//! A [`MemoryHub`] plays the role of the network: endpoints bind to it and
//! exchange datagrams through unbounded channels. Like UDP, a send to an
//! address nobody is bound to is dropped silently, which makes "the server
//! never answers" trivial to stage in tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{CpError, Result};
use crate::transport::{Datagram, ProtoId, Transport};

/// Shared in-process "network" connecting [`MemoryTransport`] endpoints.
/// Cheap to clone; all clones address the same network.
#[derive(Clone, Default)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

#[derive(Default)]
struct HubState {
    senders: HashMap<SocketAddr, mpsc::UnboundedSender<Datagram>>,
    next_port: u16,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a fresh endpoint with an auto-assigned loopback address.
    pub fn bind(&self, proto: ProtoId) -> MemoryTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr = {
            let mut state = self.lock();
            state.next_port += 1;
            let addr: SocketAddr = ([127, 0, 0, 1], state.next_port).into();
            state.senders.insert(addr, tx);
            addr
        };
        MemoryTransport {
            hub: self.clone(),
            addr,
            proto,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// An address nothing is bound to; datagrams sent there disappear.
    pub fn black_hole(&self) -> SocketAddr {
        let mut state = self.lock();
        state.next_port += 1;
        ([127, 0, 0, 1], state.next_port).into()
    }

    fn deliver(&self, datagram: Datagram, dest: SocketAddr) {
        match self.lock().senders.get(&dest) {
            // A closed receiver is equivalent to a lost datagram.
            Some(tx) => {
                let _ = tx.send(datagram);
            }
            None => trace!(%dest, "datagram to unbound address dropped"),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// One endpoint on a [`MemoryHub`].
pub struct MemoryTransport {
    hub: MemoryHub,
    addr: SocketAddr,
    proto: ProtoId,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
}

impl Transport for MemoryTransport {
    async fn send(&self, payload: Bytes, dest: SocketAddr) -> Result<()> {
        self.hub.deliver(
            Datagram {
                payload,
                source: self.addr,
                proto: self.proto,
            },
            dest,
        );
        Ok(())
    }

    async fn recv(&self, timeout: Option<Duration>) -> Result<Datagram> {
        let mut rx = self.rx.lock().await;
        let received = match timeout {
            Some(window) => tokio::time::timeout(window, rx.recv())
                .await
                .map_err(|_| CpError::Timeout)?,
            None => rx.recv().await,
        };
        received.ok_or_else(|| CpError::Transport("memory hub closed".into()))
    }

    fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}
