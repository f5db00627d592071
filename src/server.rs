//! UDP front door: demultiplexes inbound datagrams by client address into
//! one per-allocation actor each, following the same read/dispatch/send
//! loop shape as a plain stateless UDP proxy but replacing the one-shot
//! process call with a long-lived `service::actor::AllocationHandle` per
//! client, matching this core's single-instance-per-allocation
//! architecture.

use std::net::SocketAddr;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use tokio::net::UdpSocket;

use codec::message::Message;
use codec::message::attributes::UserName;
use codec::Attributes;

use service::actor::{self, AllocationHandle, Event};
use service::core::blacklist::Blacklist;
use service::core::error::CoreError;
use service::core::hooks::SessionObserver;
use service::core::registry::AllocationRegistry;
use service::core::relay::ParentResolver;
use service::core::{ClientTransport, CoreOptions, TransportKind};

use crate::auth::StaticCredentials;
use crate::config::Config;

/// Sends response bytes back out through the socket shared across every
/// client, addressed to the one client this transport was built for.
struct UdpClientTransport {
    socket: Arc<UdpSocket>,
    client: SocketAddr,
}

impl ClientTransport for UdpClientTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Datagram
    }

    fn send(&self, bytes: &[u8]) -> Result<(), CoreError> {
        // `try_send_to` never blocks; a momentarily full send buffer is
        // just another dropped UDP datagram to the allocation above us,
        // same as `TransportKind::Datagram` already being unreliable.
        match self.socket.try_send_to(bytes, self.client) {
            Ok(_) => Ok(()),
            Err(e) => {
                log::warn!("udp send to {} failed: {e}", self.client);
                Ok(())
            }
        }
    }
}

/// Everything a freshly seen client address needs in order to spawn its
/// allocation actor.
struct Shared {
    socket: Arc<UdpSocket>,
    config: Config,
    credentials: StaticCredentials,
    blacklist: Arc<Blacklist>,
    parent_resolver: Arc<dyn ParentResolver>,
    registry: Arc<dyn AllocationRegistry>,
    hooks: Arc<dyn SessionObserver>,
}

/// Pull `USERNAME` out of the first packet a new client sends, if it's a
/// decodable STUN message carrying one. Channel data and anything else
/// undecodable has no username to find; such a client can never pass
/// long-term credential checks and the core itself turns that request away.
fn sniff_username(bytes: &[u8]) -> Option<String> {
    let mut attributes = Attributes::default();
    let message = Message::decode(bytes, &mut attributes).ok()?;
    message.get::<UserName>().map(str::to_string)
}

fn spawn_allocation(shared: &Shared, client: SocketAddr, first_packet: &[u8]) -> AllocationHandle {
    let username = sniff_username(first_packet).unwrap_or_default();
    let auth_key = shared
        .credentials
        .derive(&username)
        .unwrap_or_else(|| shared.credentials.derive_unknown());

    let transport = Arc::new(UdpClientTransport {
        socket: shared.socket.clone(),
        client,
    });

    actor::spawn(CoreOptions {
        client,
        transport,
        realm: shared.config.turn.realm.clone(),
        username,
        auth_key,
        relay_ipv4: shared.config.turn.relay_ipv4,
        relay_ipv6: shared.config.turn.relay_ipv6,
        mock_relay_ip: shared.config.turn.mock_relay_ip,
        relay_port_range: (shared.config.turn.port_range.min, shared.config.turn.port_range.max),
        max_permissions: shared.config.turn.max_permissions,
        max_allocations: shared.config.turn.max_allocations,
        blacklist: shared.blacklist.clone(),
        parent_resolver: shared.parent_resolver.clone(),
        registry: shared.registry.clone(),
        hooks: shared.hooks.clone(),
        lifetime_secs: shared.config.turn.lifetime,
        owner: None,
    })
}

/// Run the UDP server until the socket itself fails. Binds once, then
/// loops forever: unseen client addresses get a fresh allocation actor,
/// seen ones get their datagram forwarded to the actor already tracking
/// them.
///
/// Terminated allocations are never removed from the client table here:
/// a real deployment observes `SessionObserver::on_session_stop` (or adds
/// a `JoinHandle` to `service::actor::spawn`) to prune it. This binary is
/// a thin reference wiring, not a production listener; allocation-table
/// lifecycle management belongs at the registry/hooks seams, not in this
/// loop.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let socket = Arc::new(UdpSocket::bind(config.turn.listen).await?);
    log::info!("turn server listening: {}", config.turn.listen);

    let blacklist = Arc::new(config.turn.build_blacklist()?);
    let credentials = StaticCredentials::new(config.turn.realm.clone(), &config.auth);

    let shared = Shared {
        socket: socket.clone(),
        config,
        credentials,
        blacklist,
        parent_resolver: Arc::new(crate::relay::LoggingParentResolver),
        registry: Arc::new(crate::registry::CountingRegistry::new()),
        hooks: Arc::new(crate::observer::LoggingObserver),
    };

    let clients: Mutex<AHashMap<SocketAddr, AllocationHandle>> = Mutex::new(AHashMap::default());
    let mut buf = vec![0u8; 4096];

    loop {
        let (size, client) = match socket.recv_from(&mut buf).await {
            Ok(s) => s,
            Err(e) => {
                log::warn!("udp socket receive error: {e}");
                continue;
            }
        };

        if size < 4 {
            continue;
        }

        let bytes = buf[..size].to_vec();

        let handle = {
            let mut clients = clients.lock();
            if let Some(handle) = clients.get(&client) {
                handle.clone()
            } else {
                let handle = spawn_allocation(&shared, client, &bytes);
                clients.insert(client, handle.clone());
                handle
            }
        };

        handle.send(Event::ClientMessage(bytes));
    }
}
