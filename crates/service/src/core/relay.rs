use std::net::SocketAddr;
use std::sync::Arc;

use ahash::AHashSet;

use crate::core::error::CoreError;
use crate::core::ice::{ConnectivityCheck, SendConnectivityCheck};

/// Classifies a relayed payload as an opaque application payload or a STUN
/// message -- the latter covers ICE connectivity checks a peer runs
/// directly against the relayed candidate. The core does not decode or
/// rewrite the STUN content; ICE authentication is between the two ICE
/// agents, and the relay's job ends at byte-transparent forwarding. This
/// classification only exists so callers can log/account for the two
/// traffic classes separately.
///
/// # Test
///
/// ```
/// use turn_server_service::core::relay::classify;
///
/// assert!(matches!(classify(&[0x00, 0x01, 0, 0]), turn_server_service::core::relay::PayloadClass::StunLike));
/// assert!(matches!(classify(&[0xff, 0x01, 0, 0]), turn_server_service::core::relay::PayloadClass::Opaque));
/// ```
pub fn classify(bytes: &[u8]) -> PayloadClass {
    if bytes.first().is_some_and(|b| *b < 2) {
        PayloadClass::StunLike
    } else {
        PayloadClass::Opaque
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadClass {
    StunLike,
    Opaque,
}

/// The handle that owns the real relay socket for one allocation's
/// candidate port. A core never holds a socket itself: it asks a
/// [`ParentResolver`] to resolve one lazily, the first time it actually
/// needs to send something to a peer.
pub trait Parent: Send + Sync {
    /// Write `bytes` to `peer` from the relayed candidate address.
    fn send_to_peer(&self, peer: SocketAddr, bytes: &[u8]) -> Result<(), CoreError>;

    /// Write a decoded ICE connectivity check to `peer`. `raw` is the
    /// original encoded bytes the check was decoded from, for a parent
    /// that has no structured handling and just wants to forward
    /// verbatim -- the default implementation does exactly that.
    fn send_connectivity_check(
        &self,
        peer: SocketAddr,
        check: ConnectivityCheck,
        raw: &[u8],
    ) -> Result<(), CoreError> {
        let _ = check;
        self.send_to_peer(peer, raw)
    }
}

/// Resolves the parent responsible for a relay port, on demand.
pub trait ParentResolver: Send + Sync {
    fn resolve(&self, relay_port: u16) -> Result<Arc<dyn Parent>, CoreError>;
}

/// A message delivered into the core from its parent.
///
/// There is deliberately no peer address carried here: the core's
/// peer-to-client delivery always addresses `candidate_addr`, the first
/// peer endpoint the client itself ever addressed (see
/// `AllocationCore::candidate_addr`), even when the payload actually
/// originated from a different peer. This mirrors the source this
/// crate was ported from and is recorded as an intentional, scoped
/// quirk rather than general TURN behavior.
#[derive(Debug, Clone)]
pub enum ParentPayload {
    /// An application payload the parent already has in hand -- a
    /// datagram it received on the real relay socket verbatim.
    Opaque(Vec<u8>),
    /// The parent wants the core to build and sign a Binding message
    /// for an ICE connectivity check, using the allocation's relay
    /// address and the ICE password supplied in `params`.
    ConnectivityCheck(SendConnectivityCheck),
    /// A fully-encoded STUN packet the parent already built; forwarded
    /// to the client verbatim.
    IcePayload(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct FromParent {
    pub payload: ParentPayload,
}

/// Bookkeeping for peer ports whose parent could not be resolved. Once a
/// port lands here the core stops re-attempting resolution for every
/// subsequent packet to that port until the allocation is refreshed,
/// avoiding a resolver hammering on a permanently dead port.
///
/// Named for the corrected spelling of what started life as
/// `unknonw_ports` in an earlier draft.
#[derive(Debug, Default)]
pub struct UnknownPorts(AHashSet<u16>);

impl UnknownPorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, port: u16) -> bool {
        self.0.contains(&port)
    }

    pub fn mark(&mut self, port: u16) {
        self.0.insert(port);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}
