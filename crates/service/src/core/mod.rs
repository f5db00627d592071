//! The per-allocation core: a single-instance state machine that owns one
//! TURN allocation from `Allocate` through teardown.
//!
//! Unlike the shared `SessionManager`/`PortAllocator` model this replaces,
//! there is one `AllocationCore` per allocation, driven cooperatively by
//! whatever owns its client socket. It never shares mutable state with any
//! other allocation, so nothing here takes a lock: collaborators
//! (`ClientTransport`, `Parent`, `Hooks`, `AllocationRegistry`) are the only
//! seams where the outside world gets in.
//!
//! A core never schedules anything itself -- it has no runtime handle. Every
//! handler method that needs a timer returns it as an [`timer::ArmedTimer`]
//! value via [`AllocationCore::take_armed_timers`]; arming the actual
//! `tokio::time::sleep` and feeding the fire event back through
//! [`AllocationCore::on_timer`] is the actor wrapper's job, not this one's.

pub mod blacklist;
pub mod channels;
pub mod error;
pub mod hooks;
pub mod ice;
pub mod permissions;
pub mod registry;
pub mod relay;
pub mod timer;
mod transport;

pub use transport::{ClientTransport, TransportKind};

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use rand::Rng;

use codec::crypto::Password;
use codec::message::attributes::address::IpFamily;
use codec::message::attributes::error::ErrorType;
use codec::message::attributes::{
    AttributeType, ChannelNumber, Data, DontFragment, ErrorCode, EvenPort, Lifetime,
    RequestedAddressFamily, RequestedTransport, UnknownAttributes, XorMappedAddress,
    XorPeerAddress, XorRelayedAddress,
};
use codec::message::methods::{Method, MethodType};
use codec::message::{Message, MessageEncoder};
use codec::{DecodeResult, Decoder};

use blacklist::Blacklist;
use channels::{ChannelError, ChannelTable};
use error::CoreError;
use hooks::{SessionObserver, SessionStartInfo, SessionStopInfo};
use ice::ConnectivityCheck;
use permissions::{PermissionError, PermissionTable};
use registry::AllocationRegistry;
use relay::{FromParent, Parent, ParentPayload, ParentResolver, UnknownPorts, classify, PayloadClass};
use timer::{ArmedTimer, TimerKind};

/// RFC5766 section 2.2: the default and the minimum the server is willing
/// to grant are the same value here; the maximum is the ceiling a refresh
/// can ask for.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(600);
const MAX_LIFETIME: Duration = Duration::from_secs(3600);

/// RFC5766 section 8: a permission expires 5 minutes after it is installed
/// or refreshed, independent of the allocation's own lifetime.
const PERMISSION_LIFETIME: Duration = Duration::from_secs(300);

/// RFC5766 section 11: channel bindings last 10 minutes.
const CHANNEL_LIFETIME: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitForAllocate,
    Active,
}

/// What a handler method asks its driver to do after processing one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    /// The allocation is gone; the driver should drop this core and stop
    /// feeding it events.
    pub terminated: bool,
}

impl Outcome {
    fn none() -> Self {
        Self { terminated: false }
    }

    fn terminated() -> Self {
        Self { terminated: true }
    }
}

/// Everything needed to build a fresh [`AllocationCore`] for one client.
pub struct CoreOptions {
    pub client: SocketAddr,
    pub transport: Arc<dyn ClientTransport>,
    pub realm: String,
    pub username: String,
    pub auth_key: Password,
    /// Relay addresses the server can allocate from for each family;
    /// `relay_ipv6` is `None` on a server that relays IPv4 only.
    pub relay_ipv4: IpAddr,
    pub relay_ipv6: Option<IpAddr>,
    /// The address advertised to the client in `XOR-RELAYED-ADDRESS`. The
    /// core never owns the socket behind it -- see [`relay::ParentResolver`]
    /// -- so this stands in for whatever address the parent process
    /// actually bound, regardless of which family was allocated.
    pub mock_relay_ip: IpAddr,
    pub relay_port_range: (u16, u16),
    pub max_permissions: usize,
    /// Per-user allocation quota handed to the registry on every successful
    /// `Allocate`. Enforcement is the registry's business, not the core's.
    pub max_allocations: u32,
    pub blacklist: Arc<Blacklist>,
    pub parent_resolver: Arc<dyn ParentResolver>,
    pub registry: Arc<dyn AllocationRegistry>,
    pub hooks: Arc<dyn SessionObserver>,
    /// The operator-configured default allocation lifetime, in seconds, as
    /// read from `lifetime` in the external configuration. A value below
    /// 600 seconds, or no value at all, falls back to the RFC default;
    /// anything above the 1 hour ceiling is clamped.
    /// This seeds the timer armed at construction, before the client has
    /// even sent `Allocate` -- see [`AllocationCore::initial_timer`].
    pub lifetime_secs: Option<u64>,
    /// A link to whatever connection or session owns this allocation. See
    /// [`OwnerLink`].
    pub owner: Option<OwnerLink>,
}

/// The two ends of an allocation's link to whatever owns it -- a control
/// connection, a session. `down` resolves (or just closes) when the owner
/// goes away, telling the driver to tear the allocation down immediately
/// instead of waiting for its lifetime timer. `stopped` is fired once by
/// the driver when the allocation terminates for any other reason, so the
/// owner can react to a normal teardown rather than only ever hearing
/// about a crash.
pub struct OwnerLink {
    pub down: tokio::sync::oneshot::Receiver<()>,
    pub stopped: tokio::sync::oneshot::Sender<()>,
}

/// Normalize an operator-supplied `lifetime` option the way §4.2 requires:
/// below 600 seconds (including absent/non-numeric, which the caller
/// represents as `None`) falls back to the 10 minute default; anything
/// else is clamped to the 1 hour ceiling.
fn normalize_configured_lifetime(secs: Option<u64>) -> Duration {
    match secs {
        Some(secs) if secs >= DEFAULT_LIFETIME.as_secs() => Duration::from_secs(secs).min(MAX_LIFETIME),
        _ => DEFAULT_LIFETIME,
    }
}

#[derive(Debug, Default)]
struct Stats {
    sent_bytes: u64,
    sent_packets: u64,
    received_bytes: u64,
    received_packets: u64,
}

/// One TURN allocation, from the first `Allocate` request through teardown.
///
/// `AllocationCore` is not `Send`-bound by itself (its collaborators are),
/// but it is meant to be driven from a single task: nothing here is
/// synchronized, because nothing here is meant to be touched concurrently.
pub struct AllocationCore {
    state: State,
    client: SocketAddr,
    transport: Arc<dyn ClientTransport>,
    realm: String,
    username: String,
    auth_key: Password,

    relay_ipv4: IpAddr,
    relay_ipv6: Option<IpAddr>,
    mock_relay_ip: IpAddr,
    relay_port_range: (u16, u16),
    relay_port: Option<u16>,
    max_allocations: u32,

    /// The address family this allocation is using, fixed by the first
    /// successful `Allocate` and compared against for every request after.
    /// Meaningless before that (defaults to `V4`, the family every server
    /// supports).
    family: IpFamily,

    permissions: PermissionTable,
    channels: ChannelTable,
    blacklist: Arc<Blacklist>,

    /// The first peer endpoint the client ever addressed via a Send
    /// indication or ChannelBind. Used both to resolve the parent (via
    /// its port) and as the sole destination for every parent→client
    /// delivery, regardless of which peer a given payload actually came
    /// from -- see `relay::FromParent`'s doc comment.
    candidate_addr: Option<SocketAddr>,
    /// Opaque identity handed to the parent alongside a decoded
    /// connectivity check, so it can route a later
    /// `send_connectivity_check` back to this allocation.
    sender_handle: u64,

    parent_resolver: Arc<dyn ParentResolver>,
    parent: Option<Arc<dyn Parent>>,
    unknown_ports: UnknownPorts,

    registry: Arc<dyn AllocationRegistry>,
    hooks: Arc<dyn SessionObserver>,

    decoder: Decoder,
    lifetime_generation: u64,
    /// When the currently-armed lifetime timer is due to fire. Tracked
    /// separately from the timer arming itself so `Allocate`'s response
    /// can report the time actually remaining on the clock that has been
    /// running since construction (see [`AllocationCore::initial_timer`])
    /// rather than restarting it.
    life_deadline: Instant,
    pending_timers: Vec<ArmedTimer>,
    terminate_requested: bool,

    /// The most recently answered transaction, replayed verbatim on a
    /// byte-identical retransmission instead of being re-processed. Only
    /// ever holds one entry: TURN clients retransmit serially, never
    /// pipelined, so there is nothing to gain from a deeper cache.
    last_trid: Option<[u8; 12]>,
    last_response: Option<Vec<u8>>,

    started_at: Instant,
    stats: Stats,
}

impl AllocationCore {
    pub fn new(opts: CoreOptions) -> Self {
        let started_at = Instant::now();
        let configured_lifetime = normalize_configured_lifetime(opts.lifetime_secs);

        let mut core = Self {
            state: State::WaitForAllocate,
            client: opts.client,
            transport: opts.transport,
            realm: opts.realm,
            username: opts.username,
            auth_key: opts.auth_key,

            relay_ipv4: opts.relay_ipv4,
            relay_ipv6: opts.relay_ipv6,
            mock_relay_ip: opts.mock_relay_ip,
            relay_port_range: opts.relay_port_range,
            relay_port: None,
            max_allocations: opts.max_allocations,
            family: IpFamily::V4,

            permissions: PermissionTable::new(opts.max_permissions),
            channels: ChannelTable::new(),
            blacklist: opts.blacklist,

            candidate_addr: None,
            sender_handle: rand::rng().random(),

            parent_resolver: opts.parent_resolver,
            parent: None,
            unknown_ports: UnknownPorts::new(),

            registry: opts.registry,
            hooks: opts.hooks,

            decoder: Decoder::default(),
            lifetime_generation: 0,
            life_deadline: started_at + configured_lifetime,
            pending_timers: Vec::new(),
            terminate_requested: false,

            last_trid: None,
            last_response: None,

            started_at,
            stats: Stats::default(),
        };

        let generation = core.arm_lifetime_timer();
        core.pending_timers.push(ArmedTimer {
            kind: TimerKind::Lifetime,
            generation,
            after: configured_lifetime,
        });

        core
    }

    /// Drain the timer armed at construction time. The driver must call
    /// this once, immediately after [`AllocationCore::new`] and before
    /// feeding the core any events, or the allocation will never expire
    /// while it sits in `WaitForAllocate`.
    ///
    /// This is just [`AllocationCore::take_armed_timers`] under a name
    /// that documents when it must be called; both drain the same queue.
    pub fn initial_timer(&mut self) -> Vec<ArmedTimer> {
        self.take_armed_timers()
    }

    pub fn client(&self) -> SocketAddr {
        self.client
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active)
    }

    /// Drain the timers armed by the handler calls since the last drain.
    /// The driver is expected to call this after every `on_*` call and
    /// schedule whatever comes back.
    pub fn take_armed_timers(&mut self) -> Vec<ArmedTimer> {
        std::mem::take(&mut self.pending_timers)
    }

    fn finish(&mut self, mut outcome: Outcome) -> Outcome {
        if self.terminate_requested {
            outcome.terminated = true;
        }
        outcome
    }

    /// Feed a datagram (or stream segment) the transport received from the
    /// client. Handles both STUN messages and ChannelData framing.
    pub fn on_client_message(&mut self, bytes: &[u8]) -> Outcome {
        self.stats.received_bytes += bytes.len() as u64;
        self.stats.received_packets += 1;

        if bytes.len() < 4 {
            return self.finish(Outcome::none());
        }

        let outcome = {
            let decoded = match self.decoder.decode(bytes) {
                Ok(d) => d,
                Err(err) => {
                    log::debug!("dropping malformed packet from {}: {err}", self.client);
                    return self.finish(Outcome::none());
                }
            };

            match decoded {
                DecodeResult::ChannelData(cd) => {
                    let number = cd.number();
                    let payload = cd.as_bytes().to_vec();
                    self.handle_channel_data(number, &payload)
                }
                DecodeResult::Message(msg) => match ClientRequest::from_message(&msg, &self.auth_key) {
                    Some(request) => self.dispatch(request),
                    None => Outcome::none(),
                },
            }
        };

        self.finish(outcome)
    }

    /// Feed a payload the parent wants delivered to the client: a relayed
    /// peer datagram, or an ICE connectivity-check message to build and
    /// sign (or one already built). Delivery always targets
    /// `candidate_addr`, never the payload's actual origin -- see
    /// `relay::FromParent`.
    pub fn on_parent_message(&mut self, msg: FromParent) -> Outcome {
        let Some(candidate) = self.candidate_addr else {
            return self.finish(Outcome::none());
        };

        if !self.is_active() || !self.permissions.contains(&candidate.ip()) {
            return self.finish(Outcome::none());
        }

        let bytes = match msg.payload {
            ParentPayload::Opaque(bytes) | ParentPayload::IcePayload(bytes) => bytes,
            ParentPayload::ConnectivityCheck(params) => {
                let Some(port) = self.relay_port else {
                    return self.finish(Outcome::none());
                };
                ice::encode_connectivity_check(&params, SocketAddr::new(self.mock_relay_ip, port))
            }
        };

        let outcome = if let Some(channel) = self.channels.channel_of(&candidate) {
            self.send_channel_data(channel, &bytes)
        } else {
            self.send_data_indication(candidate, &bytes)
        };

        self.finish(outcome)
    }

    /// A previously armed timer fired. `generation` must match the one the
    /// relevant table or the core itself handed out when arming it, or the
    /// fire is stale and ignored.
    pub fn on_timer(&mut self, kind: TimerKind, generation: u64) -> Outcome {
        match kind {
            TimerKind::Lifetime => {
                if generation == self.lifetime_generation {
                    self.deallocate("lifetime expired");
                }
            }
            TimerKind::Permission(addr) => {
                self.permissions.expire(&addr, generation);
            }
            TimerKind::Channel(channel) => {
                self.channels.expire(channel, generation);
            }
        }

        self.finish(Outcome::none())
    }

    /// The connection (or session) that owns this allocation went away --
    /// e.g. a TCP/TLS control connection dropped. Tears the allocation down
    /// immediately rather than waiting for its lifetime timer.
    pub fn on_owner_down(&mut self) -> Outcome {
        self.deallocate("owner disconnected");
        Outcome::terminated()
    }

    fn dispatch(&mut self, request: ClientRequest) -> Outcome {
        let retransmit_trid = match &request {
            ClientRequest::Allocate { trid, .. }
            | ClientRequest::Refresh { trid, .. }
            | ClientRequest::CreatePermission { trid, .. }
            | ClientRequest::ChannelBind { trid, .. } => Some(*trid),
            ClientRequest::SendIndication { .. } => None,
        };

        if let Some(trid) = retransmit_trid {
            if self.last_trid == Some(trid) {
                if let Some(cached) = self.last_response.clone() {
                    return self.send_raw(&cached);
                }
            }
        }

        match request {
            ClientRequest::Allocate { .. } => self.handle_allocate(request),
            ClientRequest::Refresh { .. } => self.handle_refresh(request),
            ClientRequest::CreatePermission { .. } => self.handle_create_permission(request),
            ClientRequest::ChannelBind { .. } => self.handle_channel_bind(request),
            ClientRequest::SendIndication { .. } => self.handle_send_indication(request),
        }
    }

    fn handle_allocate(&mut self, request: ClientRequest) -> Outcome {
        let ClientRequest::Allocate {
            trid,
            dont_fragment,
            requested_transport,
            even_port,
            requested_family,
        } = request
        else {
            unreachable!("handle_allocate called with a non-Allocate request")
        };

        const METHOD: Method = Method::Allocate(MethodType::Request);

        if self.is_active() {
            return self.respond_error(METHOD, trid, ErrorType::AllocationMismatch);
        }

        // Ordered checks, first failure wins.
        match requested_transport {
            None => return self.respond_error(METHOD, trid, ErrorType::BadRequest),
            Some(RequestedTransport::Tcp) => {
                return self.respond_error(METHOD, trid, ErrorType::UnsupportedTransportAddress);
            }
            Some(RequestedTransport::Udp) => {}
        }

        if dont_fragment {
            return self.respond_unknown_attribute(METHOD, trid, vec![AttributeType::DontFragment as u16]);
        }

        let desired_family = requested_family.unwrap_or(IpFamily::V4);
        let family_supported = match desired_family {
            IpFamily::V4 => true,
            IpFamily::V6 => self.relay_ipv6.is_some(),
        };
        if !family_supported {
            return self.respond_error(METHOD, trid, ErrorType::AddressFamilyNotSupported);
        }

        if self.blacklist.is_blacklisted(self.client.ip()) {
            return self.respond_error(METHOD, trid, ErrorType::Forbidden);
        }

        self.family = desired_family;
        let port = self.pick_relay_port(even_port);
        self.relay_port = Some(port);
        self.state = State::Active;

        self.registry
            .add(self.client, &self.username, &self.realm, self.max_allocations);

        let relay_addr = SocketAddr::new(self.mock_relay_ip, port);
        self.call_allocate_hooks(relay_addr);

        // The lifetime timer has been running since construction (see
        // `initial_timer`), not restarted here: §4.1 asks for "LIFETIME =
        // remaining life_timer in seconds", the time left on that clock,
        // not a fresh grant.
        let client_addr = self.client;
        let lifetime_secs = self.life_deadline.saturating_duration_since(Instant::now()).as_secs() as u32;

        self.respond(Method::Allocate(MethodType::Response), trid, true, move |enc| {
            enc.append::<XorRelayedAddress>(relay_addr);
            enc.append::<XorMappedAddress>(client_addr);
            enc.append::<Lifetime>(lifetime_secs);
        })
    }

    fn handle_refresh(&mut self, request: ClientRequest) -> Outcome {
        let ClientRequest::Refresh { trid, lifetime, requested_family } = request else {
            unreachable!("handle_refresh called with a non-Refresh request")
        };

        const METHOD: Method = Method::Refresh(MethodType::Request);

        if !self.is_active() {
            return self.respond_error(METHOD, trid, ErrorType::AllocationMismatch);
        }

        if let Some(family) = requested_family {
            if family != self.family {
                return self.respond_error(METHOD, trid, ErrorType::PeerAddressFamilyMismatch);
            }
        }

        if lifetime == Some(0) {
            self.deallocate("refresh requested zero lifetime");
            return self.respond(Method::Refresh(MethodType::Response), trid, true, |enc| {
                enc.append::<Lifetime>(0);
            });
        }

        let requested = lifetime.map(|secs| Duration::from_secs(secs as u64)).unwrap_or(DEFAULT_LIFETIME);
        let clamped = requested.min(MAX_LIFETIME);

        let generation = self.arm_lifetime_timer();
        self.life_deadline = Instant::now() + clamped;
        self.pending_timers.push(ArmedTimer {
            kind: TimerKind::Lifetime,
            generation,
            after: clamped,
        });

        let clamped_secs = clamped.as_secs() as u32;

        let hooks = self.hooks.clone();
        let username = self.username.clone();
        let client = self.client;
        hooks::call_hook("on_refresh", move || {
            hooks.on_refresh(client, &username, clamped_secs);
        });

        self.respond(Method::Refresh(MethodType::Response), trid, true, move |enc| {
            enc.append::<Lifetime>(clamped_secs);
        })
    }

    fn handle_create_permission(&mut self, request: ClientRequest) -> Outcome {
        let ClientRequest::CreatePermission { trid, peers } = request else {
            unreachable!("handle_create_permission called with a non-CreatePermission request")
        };

        const METHOD: Method = Method::CreatePermission(MethodType::Request);

        if !self.is_active() {
            return self.respond_error(METHOD, trid, ErrorType::AllocationMismatch);
        }

        if let Err(err) = self.permissions.validate(&peers, self.family, &self.blacklist) {
            let error_type = match err {
                PermissionError::Empty => ErrorType::BadRequest,
                PermissionError::QuotaExceeded => ErrorType::InsufficientCapacity,
                PermissionError::FamilyMismatch => ErrorType::PeerAddressFamilyMismatch,
                PermissionError::Blacklisted(_) => ErrorType::Forbidden,
            };
            return self.respond_error(METHOD, trid, error_type);
        }

        for (addr, generation) in self.permissions.install(&peers) {
            self.pending_timers.push(ArmedTimer {
                kind: TimerKind::Permission(addr),
                generation,
                after: PERMISSION_LIFETIME,
            });
        }

        let hooks = self.hooks.clone();
        let username = self.username.clone();
        let client = self.client;
        let peer_addrs: Vec<SocketAddr> = peers.iter().map(|ip| SocketAddr::new(*ip, 0)).collect();
        hooks::call_hook("on_create_permission", move || {
            hooks.on_create_permission(client, &username, &peer_addrs);
        });

        self.respond(Method::CreatePermission(MethodType::Response), trid, true, |_enc| {})
    }

    fn handle_channel_bind(&mut self, request: ClientRequest) -> Outcome {
        let ClientRequest::ChannelBind { trid, channel, peer } = request else {
            unreachable!("handle_channel_bind called with a non-ChannelBind request")
        };

        const METHOD: Method = Method::ChannelBind(MethodType::Request);

        if !self.is_active() {
            return self.respond_error(METHOD, trid, ErrorType::AllocationMismatch);
        }

        let (Some(channel), Some(peer)) = (channel, peer) else {
            return self.respond_error(METHOD, trid, ErrorType::BadRequest);
        };

        let generation = match self.channels.bind(channel, peer) {
            Ok(generation) => generation,
            Err(ChannelError::OutOfRange) => {
                return self.respond_error(METHOD, trid, ErrorType::BadRequest);
            }
            Err(ChannelError::PeerBoundElsewhere(_)) | Err(ChannelError::ChannelBoundElsewhere(_)) => {
                return self.respond_error(METHOD, trid, ErrorType::BadRequest);
            }
        };

        if let Err(err) = self.permissions.validate(&[peer.ip()], self.family, &self.blacklist) {
            // The channel/peer pair was just committed to the table; undo it
            // so a rejected bind never leaves a channel without a permission.
            self.channels.expire(channel, generation);

            let error_type = match err {
                PermissionError::Empty => ErrorType::BadRequest,
                PermissionError::QuotaExceeded => ErrorType::InsufficientCapacity,
                PermissionError::FamilyMismatch => ErrorType::PeerAddressFamilyMismatch,
                PermissionError::Blacklisted(_) => ErrorType::Forbidden,
            };
            return self.respond_error(METHOD, trid, error_type);
        }

        if self.candidate_addr.is_none() {
            self.candidate_addr = Some(peer);
        }

        self.pending_timers.push(ArmedTimer {
            kind: TimerKind::Channel(channel),
            generation,
            after: CHANNEL_LIFETIME,
        });

        for (addr, generation) in self.permissions.install(&[peer.ip()]) {
            self.pending_timers.push(ArmedTimer {
                kind: TimerKind::Permission(addr),
                generation,
                after: PERMISSION_LIFETIME,
            });
        }

        let hooks = self.hooks.clone();
        let username = self.username.clone();
        let client = self.client;
        hooks::call_hook("on_channel_bind", move || {
            hooks.on_channel_bind(client, &username, channel);
        });

        self.respond(Method::ChannelBind(MethodType::Response), trid, true, |_enc| {})
    }

    /// A Send indication is never answered, successfully or not -- RFC5766
    /// section 10 treats it like any other indication.
    fn handle_send_indication(&mut self, request: ClientRequest) -> Outcome {
        let ClientRequest::SendIndication { peer, data } = request else {
            unreachable!("handle_send_indication called with a non-SendIndication request")
        };

        if !self.is_active() {
            return Outcome::none();
        }

        let (Some(peer), Some(data)) = (peer, data) else {
            return Outcome::none();
        };

        if self.candidate_addr.is_none() {
            self.candidate_addr = Some(peer);
        }

        if !self.permissions.contains(&peer.ip()) {
            return Outcome::none();
        }

        self.forward_to_peer(peer, &data)
    }

    fn handle_channel_data(&mut self, number: u16, payload: &[u8]) -> Outcome {
        if !self.is_active() {
            return Outcome::none();
        }

        let Some(peer) = self.channels.peer_of(number) else {
            return Outcome::none();
        };

        self.forward_to_peer(peer, payload)
    }

    /// Forward a client→peer payload to the parent that owns the real
    /// relay socket. The parent is looked up by `candidate_addr.port`,
    /// not `relay_port` -- the implicit port used to find the parent
    /// owner is the first peer endpoint the client ever addressed, per
    /// `candidate_addr`'s doc comment. A payload whose first byte marks
    /// it as STUN-like is decoded as an ICE connectivity check and
    /// handed to the parent structured; anything else goes as an opaque
    /// payload.
    fn forward_to_peer(&mut self, peer: SocketAddr, bytes: &[u8]) -> Outcome {
        let Some(candidate) = self.candidate_addr else {
            return Outcome::none();
        };
        let port = candidate.port();

        if self.unknown_ports.contains(port) {
            return Outcome::none();
        }

        if self.parent.is_none() {
            match self.parent_resolver.resolve(port) {
                Ok(parent) => self.parent = Some(parent),
                Err(err) => {
                    log::debug!("no parent for candidate port {port}: {err}");
                    self.unknown_ports.mark(port);
                    return Outcome::none();
                }
            }
        }

        if let Some(parent) = self.parent.clone() {
            let result = if classify(bytes) == PayloadClass::StunLike {
                match ConnectivityCheck::decode(bytes, self.sender_handle) {
                    Some(check) => parent.send_connectivity_check(peer, check, bytes),
                    None => parent.send_to_peer(peer, bytes),
                }
            } else {
                parent.send_to_peer(peer, bytes)
            };

            match result {
                Ok(()) => {
                    self.stats.sent_bytes += bytes.len() as u64;
                    self.stats.sent_packets += 1;
                }
                Err(err) => log::debug!("failed forwarding to peer {peer}: {err}"),
            }
        }

        Outcome::none()
    }

    fn send_channel_data(&mut self, channel: u16, payload: &[u8]) -> Outcome {
        let mut buf = BytesMut::with_capacity(payload.len() + 4);
        codec::channel_data::ChannelData {
            number: channel,
            bytes: payload,
        }
        .encode(&mut buf);
        self.send_raw(&buf)
    }

    fn send_data_indication(&mut self, peer: SocketAddr, payload: &[u8]) -> Outcome {
        let trid = random_trid();
        let payload = payload.to_vec();

        self.respond_indication(Method::DataIndication, trid, move |enc| {
            enc.append::<XorPeerAddress>(peer);
            enc.append::<Data>(&payload);
        })
    }

    fn pick_relay_port(&self, even: bool) -> u16 {
        let (lo, hi) = self.relay_port_range;
        loop {
            let port = rand::rng().random_range(lo..=hi);
            if !even || port % 2 == 0 {
                return port;
            }
        }
    }

    fn arm_lifetime_timer(&mut self) -> u64 {
        self.lifetime_generation += 1;
        self.lifetime_generation
    }

    fn call_allocate_hooks(&self, relay: SocketAddr) {
        let hooks = self.hooks.clone();
        let username = self.username.clone();
        let realm = self.realm.clone();
        let client = self.client;
        let transport = self.transport.kind();

        hooks::call_hook("on_session_start", move || {
            hooks.on_session_start(SessionStartInfo {
                username: &username,
                realm: &realm,
                client,
                relay,
                transport,
            });
        });

        let hooks = self.hooks.clone();
        let username = self.username.clone();
        hooks::call_hook("on_allocated", move || {
            hooks.on_allocated(client, &username, relay.port());
        });
    }

    fn deallocate(&mut self, reason: &str) {
        if !self.is_active() {
            return;
        }

        log::info!("allocation for {} torn down: {reason}", self.client);
        self.registry.del(self.client, &self.username, &self.realm);

        let relay = self
            .relay_port
            .map(|port| SocketAddr::new(self.mock_relay_ip, port))
            .unwrap_or(self.client);

        let hooks = self.hooks.clone();
        let username = self.username.clone();
        let realm = self.realm.clone();
        let client = self.client;
        let transport = self.transport.kind();
        let (sent_bytes, sent_packets, received_bytes, received_packets) = (
            self.stats.sent_bytes,
            self.stats.sent_packets,
            self.stats.received_bytes,
            self.stats.received_packets,
        );
        let duration = self.started_at.elapsed();

        hooks::call_hook("on_session_stop", move || {
            hooks.on_session_stop(SessionStopInfo {
                username: &username,
                realm: &realm,
                client,
                relay,
                transport,
                sent_bytes,
                sent_packets,
                received_bytes,
                received_packets,
                duration,
            });
        });

        self.state = State::WaitForAllocate;
        self.relay_port = None;
        self.permissions = PermissionTable::new(self.permissions.len().max(1));
        self.channels = ChannelTable::new();
        self.candidate_addr = None;
        self.parent = None;
        self.unknown_ports.clear();
        self.terminate_requested = true;
    }

    fn respond<F: FnOnce(&mut MessageEncoder)>(
        &mut self,
        method: Method,
        trid: [u8; 12],
        sign: bool,
        build: F,
    ) -> Outcome {
        let mut buf = BytesMut::with_capacity(512);
        {
            let mut encoder = MessageEncoder::new(method, &trid, &mut buf);
            build(&mut encoder);
            let _ = encoder.flush(if sign { Some(&self.auth_key) } else { None });
        }

        self.last_trid = Some(trid);
        self.last_response = Some(buf.to_vec());
        self.send_raw(&buf)
    }

    fn respond_indication<F: FnOnce(&mut MessageEncoder)>(
        &mut self,
        method: Method,
        trid: [u8; 12],
        build: F,
    ) -> Outcome {
        let mut buf = BytesMut::with_capacity(512);
        {
            let mut encoder = MessageEncoder::new(method, &trid, &mut buf);
            build(&mut encoder);
            let _ = encoder.flush(None);
        }
        self.send_raw(&buf)
    }

    fn respond_error(&mut self, method: Method, trid: [u8; 12], error: ErrorType) -> Outcome {
        let err_method = method.error().unwrap_or(method);
        self.respond(err_method, trid, true, |enc| {
            enc.append::<ErrorCode>(ErrorCode::from(error));
        })
    }

    fn respond_unknown_attribute(&mut self, method: Method, trid: [u8; 12], codes: Vec<u16>) -> Outcome {
        let err_method = method.error().unwrap_or(method);
        self.respond(err_method, trid, true, move |enc| {
            enc.append::<ErrorCode>(ErrorCode::from(ErrorType::UnknownAttribute));
            enc.append::<UnknownAttributes>(codes);
        })
    }

    fn send_raw(&mut self, bytes: &[u8]) -> Outcome {
        self.stats.sent_bytes += bytes.len() as u64;
        self.stats.sent_packets += 1;

        match self.transport.send(bytes) {
            Ok(()) => Outcome::none(),
            Err(err) => {
                if self.transport.kind().is_reliable() {
                    log::warn!("reliable transport send failed for {}: {err}", self.client);
                    Outcome::terminated()
                } else {
                    log::debug!("datagram send failed for {}: {err}", self.client);
                    Outcome::none()
                }
            }
        }
    }
}

fn random_trid() -> [u8; 12] {
    let mut trid = [0u8; 12];
    rand::rng().fill(&mut trid);
    trid
}

/// An owned, fully-decoded client request. Built eagerly from a borrowed
/// [`Message`] so the borrow of the decoder's internal attribute cache ends
/// before any handler needs `&mut self` on the whole core.
enum ClientRequest {
    Allocate {
        trid: [u8; 12],
        dont_fragment: bool,
        requested_transport: Option<RequestedTransport>,
        even_port: bool,
        requested_family: Option<IpFamily>,
    },
    Refresh {
        trid: [u8; 12],
        lifetime: Option<u32>,
        requested_family: Option<IpFamily>,
    },
    CreatePermission {
        trid: [u8; 12],
        peers: Vec<IpAddr>,
    },
    ChannelBind {
        trid: [u8; 12],
        channel: Option<u16>,
        peer: Option<SocketAddr>,
    },
    SendIndication {
        peer: Option<SocketAddr>,
        data: Option<Vec<u8>>,
    },
}

impl ClientRequest {
    /// Returns `None` for anything that should be silently dropped: an
    /// unsupported/unknown method, or a request-class message whose
    /// MESSAGE-INTEGRITY does not check out. Authentication challenge
    /// (401/NONCE) handling lives upstream of the core, so by the time a
    /// message reaches here it either carries a verifiable key or it
    /// doesn't belong to this allocation at all.
    fn from_message(msg: &Message<'_>, auth_key: &Password) -> Option<Self> {
        let method = msg.method();

        // Indications are not authenticated per RFC5766 section 10.1: a
        // peer's DATA-INDICATION-triggering traffic has nothing to do with
        // the client's long-term credential, and Send indications are
        // accepted unsigned by every deployed client.
        let requires_integrity = !matches!(method, Method::SendIndication | Method::DataIndication);
        if requires_integrity && msg.checksum(auth_key).is_err() {
            return None;
        }

        let mut trid = [0u8; 12];
        trid.copy_from_slice(msg.token());

        Some(match method {
            Method::Allocate(MethodType::Request) => ClientRequest::Allocate {
                trid,
                dont_fragment: msg.get::<DontFragment>().is_some(),
                requested_transport: msg.get::<RequestedTransport>(),
                even_port: msg.get::<EvenPort>().unwrap_or(false),
                requested_family: msg.get::<RequestedAddressFamily>(),
            },
            Method::Refresh(MethodType::Request) => ClientRequest::Refresh {
                trid,
                lifetime: msg.get::<Lifetime>(),
                requested_family: msg.get::<RequestedAddressFamily>(),
            },
            Method::CreatePermission(MethodType::Request) => ClientRequest::CreatePermission {
                trid,
                peers: msg.get_all::<XorPeerAddress>().map(|addr| addr.ip()).collect(),
            },
            Method::ChannelBind(MethodType::Request) => ClientRequest::ChannelBind {
                trid,
                channel: msg.get::<ChannelNumber>(),
                peer: msg.get::<XorPeerAddress>(),
            },
            Method::SendIndication => ClientRequest::SendIndication {
                peer: msg.get::<XorPeerAddress>(),
                data: msg.get::<Data>().map(|bytes| bytes.to_vec()),
            },
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn password() -> Password {
        Password::Md5(*b"0123456789abcdef")
    }

    struct CapturingTransport {
        sent: Mutex<Vec<Vec<u8>>>,
        kind: TransportKind,
    }

    impl CapturingTransport {
        fn new(kind: TransportKind) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                kind,
            })
        }
    }

    impl ClientTransport for CapturingTransport {
        fn kind(&self) -> TransportKind {
            self.kind
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

    fn core_with(transport: Arc<CapturingTransport>) -> AllocationCore {
        AllocationCore::new(CoreOptions {
            client: "10.0.0.1:4000".parse().unwrap(),
            transport,
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
            registry: Arc::new(registry::NullRegistry),
            hooks: Arc::new(hooks::NullHooks),
            lifetime_secs: None,
            owner: None,
        })
    }

    fn encode_allocate(trid: [u8; 12], auth_key: &Password, dont_fragment: bool) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(256);
        {
            let mut enc = MessageEncoder::new(Method::Allocate(MethodType::Request), &trid, &mut buf);
            enc.append::<RequestedTransport>(RequestedTransport::Udp);
            if dont_fragment {
                enc.append::<DontFragment>(());
            }
            enc.flush(Some(auth_key)).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn successful_allocate_transitions_to_active() {
        let transport = CapturingTransport::new(TransportKind::Datagram);
        let mut core = core_with(transport.clone());

        let trid = [7u8; 12];
        let request = encode_allocate(trid, &password(), false);
        let outcome = core.on_client_message(&request);

        assert!(!outcome.terminated);
        assert!(core.is_active());
        assert_eq!(transport.sent.lock().len(), 1);

        let armed = core.take_armed_timers();
        assert_eq!(armed.len(), 1);
        assert!(matches!(armed[0].kind, TimerKind::Lifetime));
    }

    #[test]
    fn configured_lifetime_is_reported_on_allocate() {
        let transport = CapturingTransport::new(TransportKind::Datagram);
        let mut core = AllocationCore::new(CoreOptions {
            client: "10.0.0.1:4000".parse().unwrap(),
            transport: transport.clone(),
            realm: "example.org".into(),
            username: "alice".into(),
            auth_key: password(),
            relay_ipv4: "127.0.0.1".parse().unwrap(),
            relay_ipv6: None,
            mock_relay_ip: "127.0.0.1".parse().unwrap(),
            relay_port_range: (50000, 50000),
            max_permissions: 4,
            max_allocations: 10,
            blacklist: Arc::new(Blacklist::default()),
            parent_resolver: Arc::new(NullResolver),
            registry: Arc::new(registry::NullRegistry),
            hooks: Arc::new(hooks::NullHooks),
            lifetime_secs: Some(700),
            owner: None,
        });
        core.initial_timer();

        core.on_client_message(&encode_allocate([1u8; 12], &password(), false));
        assert!(core.is_active());

        let sent = transport.sent.lock();
        let mut attrs = codec::Attributes::default();
        let msg = codec::message::Message::decode(&sent[0], &mut attrs).unwrap();
        let lifetime = msg.get::<Lifetime>().unwrap();
        assert!((690..=700).contains(&lifetime), "lifetime {lifetime} not close to configured 700");
    }

    #[test]
    fn below_minimum_configured_lifetime_falls_back_to_default() {
        assert_eq!(normalize_configured_lifetime(Some(30)), DEFAULT_LIFETIME);
        assert_eq!(normalize_configured_lifetime(None), DEFAULT_LIFETIME);
        assert_eq!(normalize_configured_lifetime(Some(7200)), MAX_LIFETIME);
        assert_eq!(normalize_configured_lifetime(Some(700)), Duration::from_secs(700));
    }

    #[test]
    fn dont_fragment_is_rejected_with_unknown_attributes() {
        let transport = CapturingTransport::new(TransportKind::Datagram);
        let mut core = core_with(transport.clone());

        let trid = [9u8; 12];
        let request = encode_allocate(trid, &password(), true);
        core.on_client_message(&request);

        assert!(!core.is_active());
        assert_eq!(transport.sent.lock().len(), 1);
    }

    #[test]
    fn retransmitted_allocate_replays_cached_response_without_reallocating() {
        let transport = CapturingTransport::new(TransportKind::Datagram);
        let mut core = core_with(transport.clone());

        let trid = [3u8; 12];
        let request = encode_allocate(trid, &password(), false);

        core.on_client_message(&request);
        let first_port = core.relay_port;

        core.on_client_message(&request);
        let second_port = core.relay_port;

        assert_eq!(first_port, second_port);
        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
    }

    #[test]
    fn create_permission_rejects_family_mismatch_without_changing_table() {
        let transport = CapturingTransport::new(TransportKind::Datagram);
        let mut core = core_with(transport.clone());

        core.on_client_message(&encode_allocate([1u8; 12], &password(), false));
        assert!(core.is_active());

        let trid = [2u8; 12];
        let mut buf = BytesMut::with_capacity(256);
        {
            let mut enc = MessageEncoder::new(Method::CreatePermission(MethodType::Request), &trid, &mut buf);
            enc.append::<XorPeerAddress>("[::1]:9".parse().unwrap());
            enc.flush(Some(&password())).unwrap();
        }

        core.on_client_message(&buf);
        assert!(core.permissions.is_empty());
    }

    #[test]
    fn create_permission_over_quota_is_rejected() {
        let transport = CapturingTransport::new(TransportKind::Datagram);
        let mut core = core_with(transport.clone());
        core.on_client_message(&encode_allocate([1u8; 12], &password(), false));

        for i in 0..5u8 {
            let trid = [i; 12];
            let mut buf = BytesMut::with_capacity(256);
            {
                let addr: SocketAddr = format!("198.51.100.{i}:9").parse().unwrap();
                let mut enc = MessageEncoder::new(Method::CreatePermission(MethodType::Request), &trid, &mut buf);
                enc.append::<XorPeerAddress>(addr);
                enc.flush(Some(&password())).unwrap();
            }
            core.on_client_message(&buf);
        }

        // max_permissions is 4: the 5th distinct peer must be rejected and
        // the table must not have grown past 4 entries.
        assert!(core.permissions.len() <= 4);
    }

    #[test]
    fn allocate_from_blacklisted_client_is_rejected() {
        let transport = CapturingTransport::new(TransportKind::Datagram);
        let client: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        let blacklist = Blacklist::new(vec!["10.0.0.0/8".parse().unwrap()]);

        let mut core = AllocationCore::new(CoreOptions {
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
            blacklist: Arc::new(blacklist),
            parent_resolver: Arc::new(NullResolver),
            registry: Arc::new(registry::NullRegistry),
            hooks: Arc::new(hooks::NullHooks),
            lifetime_secs: None,
            owner: None,
        });

        let request = encode_allocate([4u8; 12], &password(), false);
        core.on_client_message(&request);

        assert!(!core.is_active());
        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        let mut attrs = codec::Attributes::default();
        let msg = codec::message::Message::decode(&sent[0], &mut attrs).unwrap();
        assert_eq!(msg.get::<ErrorCode>().unwrap().code, ErrorType::Forbidden as u16);
    }

    #[test]
    fn channel_bind_over_quota_rolls_back_the_channel() {
        let transport = CapturingTransport::new(TransportKind::Datagram);
        let mut core = AllocationCore::new(CoreOptions {
            client: "10.0.0.1:4000".parse().unwrap(),
            transport: transport.clone(),
            realm: "example.org".into(),
            username: "alice".into(),
            auth_key: password(),
            relay_ipv4: "203.0.113.1".parse().unwrap(),
            relay_ipv6: None,
            mock_relay_ip: "203.0.113.1".parse().unwrap(),
            relay_port_range: (50000, 50100),
            max_permissions: 0,
            max_allocations: 10,
            blacklist: Arc::new(Blacklist::default()),
            parent_resolver: Arc::new(NullResolver),
            registry: Arc::new(registry::NullRegistry),
            hooks: Arc::new(hooks::NullHooks),
            lifetime_secs: None,
            owner: None,
        });

        core.on_client_message(&encode_allocate([1u8; 12], &password(), false));
        assert!(core.is_active());

        let trid = [2u8; 12];
        let mut buf = BytesMut::with_capacity(256);
        {
            let mut enc = MessageEncoder::new(Method::ChannelBind(MethodType::Request), &trid, &mut buf);
            enc.append::<ChannelNumber>(0x4000);
            enc.append::<XorPeerAddress>("198.51.100.1:9".parse().unwrap());
            enc.flush(Some(&password())).unwrap();
        }
        core.on_client_message(&buf);

        // max_permissions is 0: the permission check must fail, and the
        // channel binding it would have depended on must not survive it.
        assert!(core.permissions.is_empty());
        assert_eq!(core.channels.len(), 0);
    }
}
