use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use crate::core::TransportKind;

/// Everything a `turn_session_start` hook payload carries.
#[derive(Debug, Clone, Copy)]
pub struct SessionStartInfo<'a> {
    pub username: &'a str,
    pub realm: &'a str,
    pub client: SocketAddr,
    pub relay: SocketAddr,
    pub transport: TransportKind,
}

/// Everything a `turn_session_stop` hook payload carries, on top of the
/// identifying fields already present at session start.
#[derive(Debug, Clone, Copy)]
pub struct SessionStopInfo<'a> {
    pub username: &'a str,
    pub realm: &'a str,
    pub client: SocketAddr,
    pub relay: SocketAddr,
    pub transport: TransportKind,
    pub sent_bytes: u64,
    pub sent_packets: u64,
    pub received_bytes: u64,
    pub received_packets: u64,
    pub duration: Duration,
}

/// Host-provided observer for allocation lifecycle and per-operation
/// events.
///
/// A hook is foreign code the core does not control; a panicking hook
/// must not take an allocation's event loop down with it, so callers
/// invoke these through [`call_hook`] rather than calling the trait
/// directly. Every method has a default no-op body, so a minimal
/// observer is `impl SessionObserver for () {}`.
pub trait SessionObserver: Send + Sync {
    fn on_session_start(&self, info: SessionStartInfo<'_>) {
        let _ = info;
    }

    fn on_session_stop(&self, info: SessionStopInfo<'_>) {
        let _ = info;
    }

    /// allocate request
    ///
    /// [rfc8489](https://tools.ietf.org/html/rfc8489)
    ///
    /// In all cases, the server SHOULD only allocate ports from the range
    /// 49152 - 65535 (the Dynamic and/or Private Port range [PORT-NUMBERS]),
    /// unless the TURN server application knows, through some means not
    /// specified here, that other applications running on the same host as
    /// the TURN server application will not be impacted by allocating ports
    /// outside this range. This condition can often be satisfied by running
    /// the TURN server application on a dedicated machine and/or by
    /// arranging that any other applications on the machine allocate ports
    /// before the TURN server application starts. In any case, the TURN
    /// server SHOULD NOT allocate ports in the range 0 - 1023 (the Well-
    /// Known Port range) to discourage clients from using TURN to run
    /// standard services.
    #[allow(unused_variables)]
    fn on_allocated(&self, client: SocketAddr, username: &str, port: u16) {}

    /// channel binding request
    ///
    /// The server MAY impose restrictions on the IP address and port values
    /// allowed in the XOR-PEER-ADDRESS attribute; if a value is not allowed,
    /// the server rejects the request with a 403 (Forbidden) error.
    ///
    /// If the server can satisfy the request, then the server creates or
    /// refreshes the channel binding using the channel number in the
    /// CHANNEL-NUMBER attribute and the transport address in the XOR-PEER-
    /// ADDRESS attribute. The server also installs or refreshes a
    /// permission for the IP address in the XOR-PEER-ADDRESS attribute as
    /// described in Section 9.
    ///
    /// NOTE: A server need not do anything special to implement
    /// idempotency of ChannelBind requests over UDP using the
    /// "stateless stack approach". Retransmitted ChannelBind requests
    /// will simply refresh the channel binding and the corresponding
    /// permission.
    #[allow(unused_variables)]
    fn on_channel_bind(&self, client: SocketAddr, username: &str, channel: u16) {}

    /// create permission request
    ///
    /// [rfc8489](https://tools.ietf.org/html/rfc8489)
    ///
    /// The CreatePermission request MUST contain at least one
    /// XOR-PEER-ADDRESS attribute and MAY contain multiple such
    /// attributes. If the message is valid and the server is capable of
    /// carrying out the request, then the server installs or refreshes a
    /// permission for the IP address contained in each XOR-PEER-ADDRESS
    /// attribute as described in Section 9. The port portion of each
    /// attribute is ignored and may be any arbitrary value.
    #[allow(unused_variables)]
    fn on_create_permission(&self, client: SocketAddr, username: &str, peers: &[SocketAddr]) {}

    /// refresh request
    ///
    /// The server computes a value called the "desired lifetime": if the
    /// request contains a LIFETIME attribute and the attribute value is
    /// zero, the "desired lifetime" is zero and the allocation is
    /// deleted. Otherwise the server computes the minimum of the
    /// client's requested lifetime and the server's maximum allowed
    /// lifetime, falling back to the default lifetime if that computed
    /// value is smaller.
    ///
    /// NOTE: A server need not do anything special to implement
    /// idempotency of Refresh requests over UDP using the "stateless
    /// stack approach". Retransmitted Refresh requests with a non-zero
    /// "desired lifetime" will simply refresh the allocation.
    #[allow(unused_variables)]
    fn on_refresh(&self, client: SocketAddr, username: &str, lifetime: u32) {}
}

/// Run a hook call, catching and logging a panic instead of propagating it
/// into the allocation's own event loop.
pub fn call_hook<F: FnOnce()>(name: &str, f: F) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        log::error!("hook {name} panicked; ignoring");
    }
}

/// A `SessionObserver` implementation that does nothing, for deployments
/// with no webhook/event sink configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHooks;

impl SessionObserver for NullHooks {}
