//! End-to-end engine tests over the in-process hub transport.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::{Duration, Instant};

use bytes::Bytes;

use cp_protocol::core::codec::decode;
use cp_protocol::core::message::{CommandResponse, Message};
use cp_protocol::error::CpError;
use cp_protocol::protocol::cookie_store::CookieStore;
use cp_protocol::transport::memory::{MemoryHub, MemoryTransport};
use cp_protocol::transport::{ProtoId, Transport};
use cp_protocol::{CommandServer, CookieServer, CpClient};

/// Per-attempt timeout kept short so the retry tests stay fast. The engine
/// treats it as an opaque constant.
const FAST_ATTEMPT: Duration = Duration::from_millis(200);

/// Route engine tracing to the test writer so `--nocapture` shows the
/// per-attempt decisions alongside assertion failures.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

struct Harness {
    hub: MemoryHub,
    cookie_addr: std::net::SocketAddr,
    command_addr: std::net::SocketAddr,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Harness {
    /// Spin up a cookie server and command server wired together.
    fn start(store: CookieStore) -> Self {
        init_tracing();
        let hub = MemoryHub::new();

        let cookie_transport = hub.bind(ProtoId::CP);
        let cookie_addr = cookie_transport.local_addr();
        let command_transport = hub.bind(ProtoId::CP);
        let command_addr = command_transport.local_addr();

        let mut cookie_server = CookieServer::with_store(cookie_transport, store);
        let mut command_server = CommandServer::new(command_transport, cookie_addr);

        let tasks = vec![
            tokio::spawn(async move {
                let _ = cookie_server.run().await;
            }),
            tokio::spawn(async move {
                let _ = command_server.run().await;
            }),
        ];

        Self {
            hub,
            cookie_addr,
            command_addr,
            tasks,
        }
    }

    fn client(&self) -> CpClient<MemoryTransport> {
        CpClient::new(self.hub.bind(ProtoId::CP), self.command_addr, self.cookie_addr)
            .with_timing(FAST_ATTEMPT, 3)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[tokio::test]
async fn full_two_hop_scenario_succeeds() {
    let harness = Harness::start(CookieStore::new());
    let mut client = harness.client();

    // No cookie yet: send runs the acquisition round trip first.
    assert!(client.cookie().is_none());
    let id = client.send("status").await.unwrap();
    assert_eq!(id, 0);
    assert!(client.cookie().is_some());

    let reply = client.receive().await.unwrap();
    assert_eq!(reply, "command executed");
}

#[tokio::test]
async fn ids_stay_monotonic_and_correlated_across_commands() {
    let harness = Harness::start(CookieStore::new());
    let mut client = harness.client();

    for expected_id in 0..3u16 {
        let id = client.send("print hello").await.unwrap();
        assert_eq!(id, expected_id);
        assert_eq!(client.receive().await.unwrap(), "command executed");
    }
}

#[tokio::test]
async fn silent_command_server_raises_server_timeout() {
    let harness = Harness::start(CookieStore::new());
    let hub = &harness.hub;

    // Real cookie server, but commands go to an address nobody answers.
    let mut client = CpClient::new(hub.bind(ProtoId::CP), hub.black_hole(), harness.cookie_addr)
        .with_timing(FAST_ATTEMPT, 3);
    client.send("status").await.unwrap();

    let started = Instant::now();
    let outcome = client.receive().await;
    let elapsed = started.elapsed();

    assert!(matches!(outcome, Err(CpError::ServerTimeout { attempts: 3 })));
    // Three full attempt windows must elapse, and not meaningfully more.
    assert!(elapsed >= FAST_ATTEMPT * 3, "returned early: {elapsed:?}");
    assert!(elapsed < FAST_ATTEMPT * 6, "returned late: {elapsed:?}");
}

#[tokio::test]
async fn silent_cookie_server_fails_acquisition() {
    init_tracing();
    let hub = MemoryHub::new();
    let mut client = CpClient::new(hub.bind(ProtoId::CP), hub.black_hole(), hub.black_hole())
        .with_timing(FAST_ATTEMPT, 3);

    let outcome = client.send("status").await;
    assert!(matches!(outcome, Err(CpError::CookieAcquisitionFailed(_))));
    assert!(client.cookie().is_none());
}

#[tokio::test]
async fn full_cookie_store_rejects_acquisition() {
    // Zero-capacity store: every issue request is rejected with a reason.
    let harness = Harness::start(CookieStore::with_settings(Duration::from_secs(60), 0));
    let mut client = harness.client();

    match client.send("status").await {
        Err(CpError::CookieAcquisitionFailed(reason)) => assert_eq!(reason, "server full"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn expired_cookie_is_rejected_by_verification() {
    let ttl = Duration::from_millis(50);
    let harness = Harness::start(CookieStore::with_settings(ttl, 20));
    let mut client = harness.client();

    client.request_cookie().await.unwrap();
    tokio::time::sleep(ttl + Duration::from_millis(30)).await;

    client.send("status").await.unwrap();
    match client.receive().await {
        Err(CpError::CommandRejected(reason)) => {
            assert_eq!(reason, "invalid or expired cookie");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn receive_without_send_is_a_sequence_error() {
    init_tracing();
    let hub = MemoryHub::new();
    let mut client = CpClient::new(hub.bind(ProtoId::CP), hub.black_hole(), hub.black_hole());

    assert!(matches!(
        client.receive().await,
        Err(CpError::ProtocolSequence)
    ));
}

#[tokio::test]
async fn stray_traffic_consumes_attempts_without_extending_the_deadline() {
    init_tracing();
    let hub = MemoryHub::new();
    let stray = hub.bind(ProtoId(0x7F));
    let cookie_transport = hub.bind(ProtoId::CP);
    let cookie_addr = cookie_transport.local_addr();
    let mut cookie_server = CookieServer::new(cookie_transport);
    let server = tokio::spawn(async move {
        let _ = cookie_server.run().await;
    });

    let client_transport = hub.bind(ProtoId::CP);
    let client_addr = client_transport.local_addr();
    let mut client = CpClient::new(client_transport, hub.black_hole(), cookie_addr)
        .with_timing(FAST_ATTEMPT, 3);
    client.send("status").await.unwrap();

    // Three foreign-protocol datagrams are already queued; each burns one
    // attempt, so receive fails without ever waiting out a timeout window.
    for _ in 0..3 {
        stray.send(Bytes::from_static(b"noise"), client_addr).await.unwrap();
    }

    let started = Instant::now();
    let outcome = client.receive().await;

    assert!(matches!(outcome, Err(CpError::ServerTimeout { .. })));
    assert!(started.elapsed() < FAST_ATTEMPT, "stray traffic extended the deadline");
    server.abort();
}

#[tokio::test]
async fn mismatched_id_is_discarded_and_the_real_reply_accepted() {
    init_tracing();
    let hub = MemoryHub::new();
    let cookie_transport = hub.bind(ProtoId::CP);
    let cookie_addr = cookie_transport.local_addr();
    let mut cookie_server = CookieServer::new(cookie_transport);
    let cookie_task = tokio::spawn(async move {
        let _ = cookie_server.run().await;
    });

    // Hand-rolled command server: answers once with the wrong id, then with
    // the right one.
    let fake_transport = hub.bind(ProtoId::CP);
    let fake_addr = fake_transport.local_addr();
    let fake_task = tokio::spawn(async move {
        let datagram = fake_transport.recv(None).await.unwrap();
        let Ok(Message::Command(command)) = decode(&datagram.payload) else {
            panic!("expected a command");
        };

        for id in [command.id.wrapping_add(1), command.id] {
            let reply = Message::CommandResponse(CommandResponse {
                id,
                success: true,
                message: String::new(),
            });
            fake_transport
                .send(reply.encode().unwrap(), datagram.source)
                .await
                .unwrap();
        }
    });

    let mut client = CpClient::new(hub.bind(ProtoId::CP), fake_addr, cookie_addr)
        .with_timing(FAST_ATTEMPT, 3);
    client.send("status").await.unwrap();

    // The empty payload on the accepted reply is defaulted to the success
    // marker.
    assert_eq!(client.receive().await.unwrap(), "ok");

    fake_task.await.unwrap();
    cookie_task.abort();
}

#[tokio::test]
async fn renewing_a_cookie_invalidates_the_previous_one() {
    let harness = Harness::start(CookieStore::new());
    let mut client = harness.client();

    client.request_cookie().await.unwrap();
    let first = client.cookie().unwrap();

    client.request_cookie().await.unwrap();
    let second = client.cookie().unwrap();
    assert_ne!(first, second);

    // A command presented under the fresh cookie still verifies.
    client.send("status").await.unwrap();
    assert_eq!(client.receive().await.unwrap(), "command executed");
}
