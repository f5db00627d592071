use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;

use codec::crypto::Password;
use codec::message::attributes::RequestedTransport;
use codec::message::methods::{Method, MethodType};
use codec::message::MessageEncoder;

use service::actor::{self, Event};
use service::core::blacklist::Blacklist;
use service::core::error::CoreError;
use service::core::hooks::NullHooks;
use service::core::registry::NullRegistry;
use service::core::relay::{Parent, ParentResolver};
use service::core::{ClientTransport, CoreOptions, TransportKind};

fn password() -> Password {
    Password::Md5(*b"0123456789abcdef")
}

struct CapturingTransport {
    sent: Mutex<Vec<Vec<u8>>>,
}

impl CapturingTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
        })
    }
}

impl ClientTransport for CapturingTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Datagram
    }

    fn send(&self, bytes: &[u8]) -> Result<(), CoreError> {
        self.sent.lock().push(bytes.to_vec());
        Ok(())
    }
}

struct NullResolver;

impl ParentResolver for NullResolver {
    fn resolve(&self, relay_port: u16) -> Result<Arc<dyn Parent>, CoreError> {
        Err(CoreError::ParentUnavailable(relay_port))
    }
}

fn encode_allocate(trid: [u8; 12], auth_key: &Password) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(256);
    {
        let mut enc = MessageEncoder::new(Method::Allocate(MethodType::Request), &trid, &mut buf);
        enc.append::<RequestedTransport>(RequestedTransport::Udp);
        enc.flush(Some(auth_key)).unwrap();
    }
    buf.to_vec()
}

/// An `Allocate` request driven through a real actor task (not the core
/// directly) gets a response delivered back through its transport.
#[tokio::test]
async fn allocate_through_the_actor_produces_a_response() {
    let transport = CapturingTransport::new();
    let client: SocketAddr = "10.0.0.1:4000".parse().unwrap();

    let handle = actor::spawn(CoreOptions {
        client,
        transport: transport.clone(),
        realm: "example.org".into(),
        username: "alice".into(),
        auth_key: password(),
        relay_ipv4: "203.0.113.1".parse().unwrap(),
        relay_ipv6: None,
        mock_relay_ip: "203.0.113.1".parse().unwrap(),
        relay_port_range: (50000, 50100),
        max_permissions: 4,
        max_allocations: 10,
        blacklist: Arc::new(Blacklist::default()),
        parent_resolver: Arc::new(NullResolver),
        registry: Arc::new(NullRegistry),
        hooks: Arc::new(NullHooks),
        lifetime_secs: None,
        owner: None,
    });

    let request = encode_allocate([7u8; 12], &password());
    handle.send(Event::ClientMessage(request));

    // the actor task processes events asynchronously; give it a moment
    // rather than asserting on an unsynchronized read.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(transport.sent.lock().len(), 1);
}

/// A message that authenticates against the wrong key is silently dropped
/// -- `ClientRequest::from_message` returns `None` for a request-class
/// message whose MESSAGE-INTEGRITY fails, and nothing reaches `dispatch`
/// -- but the actor itself never panics on it.
#[tokio::test]
async fn allocate_with_wrong_key_is_rejected_without_crashing() {
    let transport = CapturingTransport::new();
    let client: SocketAddr = "10.0.0.2:4000".parse().unwrap();

    let handle = actor::spawn(CoreOptions {
        client,
        transport: transport.clone(),
        realm: "example.org".into(),
        username: "alice".into(),
        auth_key: password(),
        relay_ipv4: "203.0.113.1".parse().unwrap(),
        relay_ipv6: None,
        mock_relay_ip: "203.0.113.1".parse().unwrap(),
        relay_port_range: (50000, 50100),
        max_permissions: 4,
        max_allocations: 10,
        blacklist: Arc::new(Blacklist::default()),
        parent_resolver: Arc::new(NullResolver),
        registry: Arc::new(NullRegistry),
        hooks: Arc::new(NullHooks),
        lifetime_secs: None,
        owner: None,
    });

    let wrong_key = Password::Md5(*b"ffffffffffffffff");
    let request = encode_allocate([8u8; 12], &wrong_key);
    handle.send(Event::ClientMessage(request));

    tokio::time::sleep(Duration::from_millis(50)).await;

    // silently dropped, not answered with an error: no reply at all.
    assert_eq!(transport.sent.lock().len(), 0);
}
